use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error as _;
use std::io::{Cursor, Write};
use std::sync::Arc;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::AppError;
use crate::pdf::Renderer;
use crate::positioning::PositioningConfig;
use crate::storage::{sanitize_file_name, ObjectStore, StorageError, TemplateKeys};

pub const SUMMARY_ENTRY: &str = "_SUMMARY.txt";
pub const ERRORS_FOLDER: &str = "_ERRORS";

const SUMMARY_TEMPLATE: &str = r#"CERTIFICATE GENERATION SUMMARY
==============================

Student: {{ student }}
Generated at: {{ generated_at }} (UTC)

Processed: {{ processed }}
Succeeded: {{ succeeded }}
Failed: {{ failed }}
{% if successes %}
Generated certificates:
{% for name in successes %}  - {{ name }}
{% endfor %}{% endif %}{% if failures %}
Failures:
{% for message in failures %}  - {{ message }}
{% endfor %}{% endif %}"#;

/// One certificate to generate. `template` is `None` when the certificate
/// record no longer exists; the item is then reported as a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub display_name: String,
    pub template: Option<TemplateKeys>,
}

impl BatchItem {
    pub fn for_course(course_name: &str) -> Self {
        Self {
            display_name: course_name.to_string(),
            template: Some(TemplateKeys::for_course(course_name)),
        }
    }

    pub fn missing(certificate_id: i32) -> Self {
        Self {
            display_name: format!("certificate {}", certificate_id),
            template: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    student: &'a str,
    generated_at: String,
    processed: usize,
    succeeded: usize,
    failed: usize,
    successes: Vec<String>,
    failures: Vec<String>,
}

/// Fetches the blank template and its positioning sidecar. A missing or
/// unreadable sidecar falls back to the default positioning.
pub async fn load_template(
    store: &dyn ObjectStore,
    keys: &TemplateKeys,
) -> Result<(Vec<u8>, PositioningConfig), StorageError> {
    let template = store.download(&keys.pdf).await?;
    tracing::debug!("Downloaded template {} ({} bytes)", keys.pdf, template.len());

    let config = match store.download(&keys.config).await {
        Ok(bytes) => match PositioningConfig::from_json(&bytes) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Unreadable positioning config {}: {}; using defaults", keys.config, e);
                PositioningConfig::default()
            }
        },
        Err(StorageError::NotFound(_)) => {
            tracing::warn!("No positioning config at {}; using defaults", keys.config);
            PositioningConfig::default()
        }
        Err(e) => return Err(e),
    };

    Ok((template, config))
}

/// Renders certificates from stored templates, one at a time or as a zip archive.
#[derive(Clone)]
pub struct BatchGenerator {
    store: Arc<dyn ObjectStore>,
    renderer: Renderer,
}

impl BatchGenerator {
    pub fn new(store: Arc<dyn ObjectStore>, renderer: Renderer) -> Self {
        Self { store, renderer }
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Renders one certificate. Rendering is CPU-bound and runs on the
    /// blocking pool.
    pub async fn render(&self, keys: &TemplateKeys, student_name: &str) -> Result<Vec<u8>, AppError> {
        let (template, config) = load_template(self.store.as_ref(), keys).await?;
        let renderer = self.renderer.clone();
        let name = student_name.to_string();

        let pdf = tokio::task::spawn_blocking(move || renderer.render(&template, &config, &name))
            .await
            .map_err(|e| AppError::Internal(format!("render task failed: {}", e)))??;
        Ok(pdf)
    }

    async fn render_item(&self, item: &BatchItem, student_name: &str) -> Result<Vec<u8>, AppError> {
        let keys = item
            .template
            .as_ref()
            .ok_or_else(|| AppError::NotFound(item.display_name.clone()))?;
        self.render(keys, student_name).await
    }

    /// Builds a zip with one PDF per rendered item, one `_ERRORS/` entry per
    /// failed item and a `_SUMMARY.txt`. Item failures never abort the batch;
    /// only archive or summary construction errors are returned.
    pub async fn generate_batch(&self, items: &[BatchItem], student_name: &str) -> Result<Vec<u8>, AppError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().unix_permissions(0o644);

        let mut used_names = HashSet::new();
        let mut successes = Vec::new();
        let mut failures = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let entry_name = unique_name(&mut used_names, &entry_stem(&item.display_name));

            match self.render_item(item, student_name).await {
                Ok(pdf) => {
                    zip.start_file(format!("{}.pdf", entry_name), options)?;
                    zip.write_all(&pdf).map_err(ZipError::from)?;
                    tracing::info!("Batch item {}/{} '{}' generated", index + 1, items.len(), item.display_name);
                    successes.push(item.display_name.clone());
                }
                Err(e) => {
                    tracing::warn!("Batch item {}/{} '{}' failed: {}", index + 1, items.len(), item.display_name, e);
                    zip.start_file(format!("{}/{}_erro.txt", ERRORS_FOLDER, entry_name), options)?;
                    zip.write_all(error_report(&item.display_name, &e).as_bytes())
                        .map_err(ZipError::from)?;
                    failures.push(format!("{}: {}", item.display_name, e));
                }
            }
        }

        let summary = render_summary(&Summary {
            student: student_name,
            generated_at: Utc::now().format("%d/%m/%Y %H:%M:%S").to_string(),
            processed: items.len(),
            succeeded: successes.len(),
            failed: failures.len(),
            successes,
            failures,
        })?;
        zip.start_file(SUMMARY_ENTRY, options)?;
        zip.write_all(summary.as_bytes()).map_err(ZipError::from)?;

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

fn render_summary(summary: &Summary<'_>) -> Result<String, tera::Error> {
    let context = tera::Context::from_serialize(summary)?;
    tera::Tera::one_off(SUMMARY_TEMPLATE, &context, false)
}

fn entry_stem(display_name: &str) -> String {
    let sanitized = sanitize_file_name(display_name);
    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        "certificate".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `stem`, or `stem (2)`, `stem (3)`, ... when already taken.
fn unique_name(used: &mut HashSet<String>, stem: &str) -> String {
    let mut candidate = stem.to_string();
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{} ({})", stem, n);
        n += 1;
    }
    candidate
}

fn error_report(display_name: &str, error: &AppError) -> String {
    let mut report = format!("Certificate: {}\nError: {}\n", display_name, error);
    let mut source = error.source();
    while let Some(cause) = source {
        report.push_str(&format!("Caused by: {}\n", cause));
        source = cause.source();
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::test_support::blank_pdf;
    use crate::storage::InMemoryStore;
    use std::io::Read;
    use zip::ZipArchive;

    async fn store_with_courses(courses: &[&str]) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for course in courses {
            let keys = TemplateKeys::for_course(course);
            store
                .upload(&keys.pdf, blank_pdf(800.0, 400.0, 1), "application/pdf")
                .await
                .unwrap();
            store
                .upload(&keys.config, br#"{"top": "50px", "left": "50px"}"#.to_vec(), "application/json")
                .await
                .unwrap();
        }
        store
    }

    fn entries(archive: &[u8]) -> Vec<String> {
        let zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        zip.file_names().map(str::to_string).collect()
    }

    fn read_entry(archive: &[u8], name: &str) -> String {
        let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        let mut text = String::new();
        zip.by_name(name).unwrap().read_to_string(&mut text).unwrap();
        text
    }

    #[tokio::test]
    async fn test_missing_template_is_isolated() {
        let store = store_with_courses(&["Rust Basics", "Async Rust"]).await;
        let generator = BatchGenerator::new(store, Renderer::default());
        let items = vec![
            BatchItem::for_course("Rust Basics"),
            BatchItem::for_course("Unsafe Rust"),
            BatchItem::for_course("Async Rust"),
        ];

        let archive = generator.generate_batch(&items, "Ana Lima").await.unwrap();

        let names = entries(&archive);
        assert_eq!(names.iter().filter(|n| n.ends_with(".pdf")).count(), 2);
        assert!(names.contains(&"Rust Basics.pdf".to_string()));
        assert!(names.contains(&"Async Rust.pdf".to_string()));
        assert_eq!(names.iter().filter(|n| n.starts_with("_ERRORS/")).count(), 1);
        assert!(names.contains(&"_ERRORS/Unsafe Rust_erro.txt".to_string()));

        let summary = read_entry(&archive, SUMMARY_ENTRY);
        assert!(summary.contains("Student: Ana Lima"));
        assert!(summary.contains("Processed: 3"));
        assert!(summary.contains("Succeeded: 2"));
        assert!(summary.contains("Failed: 1"));
        assert!(summary.contains("  - Unsafe Rust: "));

        let error = read_entry(&archive, "_ERRORS/Unsafe Rust_erro.txt");
        assert!(error.contains("Certificate: Unsafe Rust"));
        assert!(error.contains("certificados/Unsafe Rust/Unsafe Rust.pdf"));
    }

    #[tokio::test]
    async fn test_duplicate_names_are_disambiguated() {
        let store = store_with_courses(&["Rust: Intro", "Rust Intro"]).await;
        let generator = BatchGenerator::new(store, Renderer::default());
        let items = vec![
            BatchItem::for_course("Rust: Intro"),
            BatchItem::for_course("Rust Intro"),
            BatchItem::missing(7),
        ];

        let archive = generator.generate_batch(&items, "Ana").await.unwrap();

        let names = entries(&archive);
        assert!(names.contains(&"Rust Intro.pdf".to_string()));
        assert!(names.contains(&"Rust Intro (2).pdf".to_string()));
        assert!(names.contains(&"_ERRORS/certificate 7_erro.txt".to_string()));
    }

    #[tokio::test]
    async fn test_every_item_failing_still_yields_archive() {
        let store = Arc::new(InMemoryStore::new());
        store
            .upload("certificados/Broken/Broken.pdf", b"not a pdf".to_vec(), "application/pdf")
            .await
            .unwrap();
        let generator = BatchGenerator::new(store, Renderer::default());

        let archive = generator
            .generate_batch(&[BatchItem::for_course("Broken")], "Ana")
            .await
            .unwrap();

        let names = entries(&archive);
        assert_eq!(names.len(), 2);
        let summary = read_entry(&archive, SUMMARY_ENTRY);
        assert!(summary.contains("Succeeded: 0"));
        assert!(!summary.contains("Generated certificates:"));

        let error = read_entry(&archive, "_ERRORS/Broken_erro.txt");
        assert!(error.contains("render failed"));
        assert!(error.contains("Caused by:"));
    }

    #[tokio::test]
    async fn test_load_template_falls_back_to_default_config() {
        let store = InMemoryStore::new();
        let keys = TemplateKeys::for_course("Plain");
        store.upload(&keys.pdf, vec![1, 2, 3], "application/pdf").await.unwrap();

        let (bytes, config) = load_template(&store, &keys).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(config, PositioningConfig::default());

        store.upload(&keys.config, b"{not json".to_vec(), "application/json").await.unwrap();
        let (_, config) = load_template(&store, &keys).await.unwrap();
        assert_eq!(config, PositioningConfig::default());
    }

    #[test]
    fn test_unique_name() {
        let mut used = HashSet::new();
        assert_eq!(unique_name(&mut used, "A"), "A");
        assert_eq!(unique_name(&mut used, "A"), "A (2)");
        assert_eq!(unique_name(&mut used, "A"), "A (3)");
        assert_eq!(entry_stem("  ??  "), "certificate");
    }
}
