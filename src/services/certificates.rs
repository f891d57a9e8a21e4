use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::fmt::Display;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::batch::{BatchGenerator, BatchItem};
use crate::db::{Certificate, CertificateRepository, NewCertificate};
use crate::error::{AppError, Result};
use crate::positioning::PositioningConfig;
use crate::storage::keys::{asset_key, LOGO_FOLDER, SIGNATURE_FOLDER};
use crate::storage::{sanitize_file_name, ObjectStore, StorageError, TemplateKeys};

use super::tracks::TrackService;

/// An auxiliary image sent along with a new certificate.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    fn mime(&self) -> String {
        self.content_type
            .clone()
            .unwrap_or_else(|| mime_guess::from_path(&self.file_name).first_or_octet_stream().to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CertificateUpload {
    pub record: NewCertificate,
    /// Rasterized template, as a `data:` URL or bare base64.
    pub template: String,
    /// Raw positioning JSON captured by the preview.
    pub positioning: Option<String>,
    pub logo: Option<UploadedFile>,
    pub signature: Option<UploadedFile>,
}

/// What a certificate deletion cleaned up, and what it could not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    pub failures: Vec<String>,
    pub tracks_updated: Vec<i32>,
}

impl CleanupReport {
    fn record<E: Display>(&mut self, what: &str, result: std::result::Result<(), E>) {
        match result {
            Ok(()) => self.removed.push(what.to_string()),
            Err(e) => {
                tracing::warn!("Cleanup of {} failed: {}", what, e);
                self.failures.push(format!("{}: {}", what, e));
            }
        }
    }
}

pub struct CertificateService {
    certificates: Arc<dyn CertificateRepository>,
    tracks: Arc<TrackService>,
    store: Arc<dyn ObjectStore>,
    generator: BatchGenerator,
    legacy_web_root: PathBuf,
}

impl CertificateService {
    pub fn new(
        certificates: Arc<dyn CertificateRepository>,
        tracks: Arc<TrackService>,
        store: Arc<dyn ObjectStore>,
        generator: BatchGenerator,
        legacy_web_root: PathBuf,
    ) -> Self {
        Self {
            certificates,
            tracks,
            store,
            generator,
            legacy_web_root,
        }
    }

    pub async fn create(&self, upload: CertificateUpload) -> Result<Certificate> {
        let mut record = upload.record;
        record.course_name = record.course_name.trim().to_string();
        record.institution_name = record.institution_name.trim().to_string();

        let mut errors = Vec::new();
        if record.course_name.is_empty() {
            errors.push("course name required".to_string());
        }
        if record.institution_name.is_empty() {
            errors.push("institution name required".to_string());
        }
        if upload.template.trim().is_empty() {
            errors.push("template required".to_string());
        }
        if let Some(raw) = &upload.positioning {
            if let Err(e) = PositioningConfig::from_json(raw.as_bytes()) {
                errors.push(format!("positioning config is not valid: {}", e));
            }
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let sanitized = sanitize_file_name(&record.course_name);
        let taken = self
            .certificates
            .list()
            .await?
            .iter()
            .any(|c| sanitize_file_name(&c.course_name) == sanitized);
        if taken {
            return Err(AppError::validation(format!(
                "a certificate for course '{}' already exists",
                record.course_name
            )));
        }

        let template = decode_data_url(&upload.template)?;

        let mut stored = Vec::new();
        let result = self
            .store_and_insert(record, template, upload.positioning, upload.logo, upload.signature, &mut stored)
            .await;

        match result {
            Ok(certificate) => {
                tracing::info!("Created certificate {} for course '{}'", certificate.id, certificate.course_name);
                Ok(certificate)
            }
            Err(e) => {
                for key in &stored {
                    if let Err(cleanup) = self.store.delete(key).await {
                        tracing::warn!("Could not remove {} after failed create: {}", key, cleanup);
                    }
                }
                Err(e)
            }
        }
    }

    /// Uploads the files and inserts the record. Every key written is pushed
    /// to `stored` so the caller can roll the uploads back on failure.
    async fn store_and_insert(
        &self,
        mut record: NewCertificate,
        template: Vec<u8>,
        positioning: Option<String>,
        logo: Option<UploadedFile>,
        signature: Option<UploadedFile>,
        stored: &mut Vec<String>,
    ) -> Result<Certificate> {
        let keys = TemplateKeys::for_course(&record.course_name);

        if let Some(logo) = logo {
            let key = asset_key(LOGO_FOLDER, &logo.file_name);
            let mime = logo.mime();
            record.logo_ref = Some(self.store.upload(&key, logo.bytes, &mime).await?);
            stored.push(key);
        }
        if let Some(signature) = signature {
            let key = asset_key(SIGNATURE_FOLDER, &signature.file_name);
            let mime = signature.mime();
            record.signature_ref = Some(self.store.upload(&key, signature.bytes, &mime).await?);
            stored.push(key);
        }

        record.template_ref = Some(self.store.upload(&keys.pdf, template, "application/pdf").await?);
        stored.push(keys.pdf.clone());

        if let Some(raw) = positioning {
            match self
                .store
                .upload(&keys.config, raw.into_bytes(), "application/json")
                .await
            {
                Ok(_) => stored.push(keys.config.clone()),
                Err(e) => tracing::warn!("Could not store positioning config {}: {}", keys.config, e),
            }
        }

        Ok(self.certificates.create(record).await?)
    }

    pub async fn list(&self) -> Result<Vec<Certificate>> {
        Ok(self.certificates.list().await?)
    }

    pub async fn get(&self, id: i32) -> Result<Certificate> {
        self.certificates
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("certificate {}", id)))
    }

    /// Renders the course's certificate for one student.
    pub async fn certify(&self, course_name: &str, student_name: &str) -> Result<Vec<u8>> {
        let student_name = super::require_student_name(student_name)?;
        let keys = TemplateKeys::for_course(course_name.trim());

        match self.generator.render(&keys, student_name).await {
            Err(AppError::Storage(StorageError::NotFound(_))) => Err(AppError::NotFound(format!(
                "template for course '{}'",
                course_name.trim()
            ))),
            result => result,
        }
    }

    /// Ad-hoc batch over an explicit list of certificates.
    pub async fn generate_selection(&self, certificate_ids: &[i32], student_name: &str) -> Result<Vec<u8>> {
        if certificate_ids.is_empty() {
            return Err(AppError::InvalidInput("select at least one certificate".to_string()));
        }
        let student_name = super::require_student_name(student_name)?;

        let mut items = Vec::with_capacity(certificate_ids.len());
        for id in certificate_ids {
            let item = match self.certificates.get(*id).await? {
                Some(c) => BatchItem::for_course(&c.course_name),
                None => BatchItem::missing(*id),
            };
            items.push(item);
        }

        self.generator.generate_batch(&items, student_name).await
    }

    /// Deletes the record after pruning it from tracks and removing its files.
    /// File cleanup is best-effort; failures end up in the report. Deleting an
    /// unknown id is a no-op.
    pub async fn delete(&self, id: i32) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();
        let Some(certificate) = self.certificates.get(id).await? else {
            tracing::debug!("Certificate {} already gone", id);
            return Ok(report);
        };

        report.tracks_updated = self
            .tracks
            .remove_certificate(id)
            .await?
            .iter()
            .map(|t| t.id)
            .collect();

        if let Some(reference) = &certificate.template_ref {
            self.remove_template(&certificate, reference, &mut report).await;
        }
        for reference in [&certificate.logo_ref, &certificate.signature_ref]
            .into_iter()
            .flatten()
        {
            self.remove_object(reference, &mut report).await;
        }

        self.certificates.delete(id).await?;
        tracing::info!(
            "Deleted certificate {} ('{}'), {} tracks updated, {} cleanup failures",
            id,
            certificate.course_name,
            report.tracks_updated.len(),
            report.failures.len()
        );
        Ok(report)
    }

    async fn remove_template(&self, certificate: &Certificate, reference: &str, report: &mut CleanupReport) {
        let Some(key) = self.store.key_for(reference) else {
            self.remove_legacy_template(reference, report).await;
            return;
        };

        report.record(&key, self.store.delete(&key).await);

        let config_key = TemplateKeys::for_course(&certificate.course_name).config;
        match self.store.exists(&config_key).await {
            Ok(true) => report.record(&config_key, self.store.delete(&config_key).await),
            Ok(false) => {}
            Err(e) => report.record::<StorageError>(&config_key, Err(e)),
        }
    }

    async fn remove_object(&self, reference: &str, report: &mut CleanupReport) {
        match self.store.key_for(reference) {
            Some(key) => report.record(&key, self.store.delete(&key).await),
            None => tracing::debug!("Skipping cleanup of unmanaged reference {}", reference),
        }
    }

    async fn remove_legacy_template(&self, reference: &str, report: &mut CleanupReport) {
        let Some(folder) = legacy_template_folder(&self.legacy_web_root, reference) else {
            tracing::debug!("Skipping cleanup of unmanaged template {}", reference);
            return;
        };

        let result = match tokio::fs::remove_dir_all(&folder).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        };
        report.record(&folder.display().to_string(), result);
    }
}

/// Folder of a template stored by older deployments under the web root, e.g.
/// `/certificados/Rust/Rust.pdf` -> `{root}/certificados/Rust`.
fn legacy_template_folder(root: &Path, reference: &str) -> Option<PathBuf> {
    if reference.contains("://") {
        return None;
    }
    let relative = Path::new(reference.trim_start_matches('/'));
    if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    let folder = relative.parent().filter(|p| !p.as_os_str().is_empty())?;
    Some(root.join(folder))
}

/// Accepts `data:<mime>;base64,<payload>` or a bare base64 payload.
fn decode_data_url(raw: &str) -> Result<Vec<u8>> {
    let raw = raw.trim();
    let payload = match raw.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| AppError::validation("template data URL has no payload"))?,
        None => raw,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| AppError::validation(format!("template is not valid base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(AppError::validation("template required"));
    }
    Ok(bytes)
}
