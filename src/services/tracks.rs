use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::batch::{BatchGenerator, BatchItem};
use crate::db::{CertificateRepository, NewTrack, Track, TrackRepository};
use crate::error::{AppError, Result};

/// Column widths of `tracks.name` and `tracks.description`.
const MAX_NAME_CHARS: usize = 200;
const MAX_DESCRIPTION_CHARS: usize = 500;

fn default_active() -> bool {
    true
}

/// Fields an administrator submits when creating or editing a track.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub certificate_ids: Vec<i32>,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateSummary {
    pub id: i32,
    pub course_name: String,
    pub workload_hours: Option<i32>,
    pub institution_name: String,
    pub issue_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackDetails {
    #[serde(flatten)]
    pub track: Track,
    pub certificates: Vec<CertificateSummary>,
}

/// Validated, trimmed values ready to be written to a track row.
struct ValidTrack {
    name: String,
    description: Option<String>,
    certificate_ids: Vec<i32>,
    active: bool,
}

pub struct TrackService {
    tracks: Arc<dyn TrackRepository>,
    certificates: Arc<dyn CertificateRepository>,
    generator: BatchGenerator,
}

impl TrackService {
    pub fn new(
        tracks: Arc<dyn TrackRepository>,
        certificates: Arc<dyn CertificateRepository>,
        generator: BatchGenerator,
    ) -> Self {
        Self {
            tracks,
            certificates,
            generator,
        }
    }

    async fn validate(&self, input: TrackInput) -> Result<ValidTrack> {
        let name = input.name.trim().to_string();
        let description = input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let mut errors = Vec::new();
        if name.is_empty() {
            errors.push("name required".to_string());
        } else if name.chars().count() > MAX_NAME_CHARS {
            errors.push(format!("name must be at most {} characters", MAX_NAME_CHARS));
        }
        if description
            .as_ref()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_CHARS)
        {
            errors.push(format!(
                "description must be at most {} characters",
                MAX_DESCRIPTION_CHARS
            ));
        }
        if input.certificate_ids.is_empty() {
            errors.push("at least one certificate required".to_string());
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let mut missing = Vec::new();
        for id in &input.certificate_ids {
            if self.certificates.get(*id).await?.is_none() && !missing.contains(id) {
                missing.push(*id);
            }
        }
        if !missing.is_empty() {
            return Err(AppError::validation(format!(
                "certificates not found: {:?}",
                missing
            )));
        }

        Ok(ValidTrack {
            name,
            description,
            certificate_ids: input.certificate_ids,
            active: input.active,
        })
    }

    pub async fn create(&self, input: TrackInput, created_by: Option<String>) -> Result<Track> {
        let valid = self.validate(input).await?;
        let track = self
            .tracks
            .create(NewTrack {
                name: valid.name,
                description: valid.description,
                certificate_ids: valid.certificate_ids,
                active: valid.active,
                created_by,
            })
            .await?;

        tracing::info!("Created track {} '{}' with {} certificates", track.id, track.name, track.certificate_ids.len());
        Ok(track)
    }

    pub async fn update(&self, id: i32, input: TrackInput) -> Result<Track> {
        let mut track = self.get(id).await?;
        let valid = self.validate(input).await?;

        track.name = valid.name;
        track.description = valid.description;
        track.certificate_ids = valid.certificate_ids;
        track.active = valid.active;
        track.updated_at = Some(Utc::now());
        self.tracks.update(&track).await?;

        tracing::info!("Updated track {} '{}'", track.id, track.name);
        Ok(track)
    }

    /// Deleting an unknown track is a no-op.
    pub async fn delete(&self, id: i32) -> Result<()> {
        self.tracks.delete(id).await?;
        tracing::info!("Deleted track {}", id);
        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<Track>> {
        Ok(self.tracks.list().await?)
    }

    pub async fn list_active(&self) -> Result<Vec<Track>> {
        Ok(self.tracks.list_active().await?)
    }

    pub async fn get(&self, id: i32) -> Result<Track> {
        self.tracks
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("track {}", id)))
    }

    pub async fn details(&self, id: i32) -> Result<TrackDetails> {
        let track = self.get(id).await?;

        let mut certificates = Vec::with_capacity(track.certificate_ids.len());
        for certificate_id in &track.certificate_ids {
            if let Some(c) = self.certificates.get(*certificate_id).await? {
                certificates.push(CertificateSummary {
                    id: c.id,
                    course_name: c.course_name,
                    workload_hours: c.workload_hours,
                    institution_name: c.institution_name,
                    issue_date: c.issue_date,
                });
            }
        }

        Ok(TrackDetails { track, certificates })
    }

    /// Builds the zip archive with every certificate of the track for one student.
    pub async fn generate_for_student(&self, id: i32, student_name: &str) -> Result<(Track, Vec<u8>)> {
        let track = self.get(id).await?;
        if !track.active {
            return Err(AppError::InactiveTrack(track.name));
        }
        let student_name = super::require_student_name(student_name)?;

        let mut items = Vec::with_capacity(track.certificate_ids.len());
        for certificate_id in &track.certificate_ids {
            let item = match self.certificates.get(*certificate_id).await? {
                Some(c) => BatchItem::for_course(&c.course_name),
                None => BatchItem::missing(*certificate_id),
            };
            items.push(item);
        }

        tracing::info!("Generating track {} '{}' ({} certificates) for {}", track.id, track.name, items.len(), student_name);
        let archive = self.generator.generate_batch(&items, student_name).await?;
        Ok((track, archive))
    }

    /// Drops `certificate_id` from every track that references it. Tracks left
    /// without members are deactivated. Returns the tracks that changed.
    pub async fn remove_certificate(&self, certificate_id: i32) -> Result<Vec<Track>> {
        let mut affected = Vec::new();

        for mut track in self.tracks.list().await? {
            if !track.certificate_ids.contains(&certificate_id) {
                continue;
            }
            track.certificate_ids.retain(|id| *id != certificate_id);
            if track.certificate_ids.is_empty() {
                track.active = false;
            }
            track.updated_at = Some(Utc::now());
            self.tracks.update(&track).await?;

            tracing::info!(
                "Removed certificate {} from track {} ({} left, active: {})",
                certificate_id,
                track.id,
                track.certificate_ids.len(),
                track.active
            );
            affected.push(track);
        }

        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryCertificates, InMemoryTracks, NewCertificate};
    use crate::pdf::Renderer;
    use crate::storage::InMemoryStore;

    struct Fixture {
        certificates: Arc<InMemoryCertificates>,
        tracks: Arc<InMemoryTracks>,
        service: TrackService,
    }

    fn fixture() -> Fixture {
        let certificates = Arc::new(InMemoryCertificates::new());
        let tracks = Arc::new(InMemoryTracks::new());
        let generator = BatchGenerator::new(Arc::new(InMemoryStore::new()), Renderer::default());
        let service = TrackService::new(tracks.clone(), certificates.clone(), generator);
        Fixture {
            certificates,
            tracks,
            service,
        }
    }

    async fn add_certificate(fixture: &Fixture, course: &str) -> i32 {
        fixture
            .certificates
            .create(NewCertificate {
                course_name: course.to_string(),
                institution_name: "Instituto".to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    fn input(name: &str, ids: Vec<i32>) -> TrackInput {
        TrackInput {
            name: name.to_string(),
            description: None,
            certificate_ids: ids,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_certificates() {
        let f = fixture();
        let id = add_certificate(&f, "Rust").await;

        let err = f.service.create(input("Backend", vec![id, 99]), None).await.unwrap_err();
        match err {
            AppError::Validation(errors) => assert_eq!(errors, vec!["certificates not found: [99]"]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(f.tracks.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_name_and_members() {
        let f = fixture();
        let err = f.service.create(input("   ", vec![]), None).await.unwrap_err();
        match err {
            AppError::Validation(errors) => assert_eq!(
                errors,
                vec!["name required", "at least one certificate required"]
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_enforces_column_lengths() {
        let f = fixture();
        let id = add_certificate(&f, "Rust").await;
        let mut too_long = input(&"a".repeat(201), vec![id]);
        too_long.description = Some("d".repeat(501));

        match f.service.create(too_long, None).await.unwrap_err() {
            AppError::Validation(errors) => assert_eq!(
                errors,
                vec![
                    "name must be at most 200 characters",
                    "description must be at most 500 characters"
                ]
            ),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(f.tracks.list().await.unwrap().is_empty());

        // limits count characters, not bytes
        let track = f.service.create(input(&"ç".repeat(200), vec![id]), None).await.unwrap();
        assert_eq!(track.name.chars().count(), 200);
    }

    #[tokio::test]
    async fn test_create_trims_and_keeps_duplicates() {
        let f = fixture();
        let id = add_certificate(&f, "Rust").await;
        let mut track_input = input("  Backend  ", vec![id, id]);
        track_input.description = Some("   ".to_string());

        let track = f.service.create(track_input, Some("admin".to_string())).await.unwrap();
        assert_eq!(track.name, "Backend");
        assert_eq!(track.description, None);
        assert_eq!(track.certificate_ids, vec![id, id]);
        assert_eq!(track.created_by.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_update_checks_existence_first() {
        let f = fixture();
        let err = f.service.update(42, input("", vec![])).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let a = add_certificate(&f, "A").await;
        let b = add_certificate(&f, "B").await;
        let track = f.service.create(input("T", vec![a]), None).await.unwrap();

        let updated = f.service.update(track.id, input("T2", vec![b, a])).await.unwrap();
        assert_eq!(updated.certificate_ids, vec![b, a]);
        assert!(updated.updated_at.is_some());
        assert_eq!(f.service.get(track.id).await.unwrap(), updated);

        let err = f.service.update(track.id, input("T3", vec![a, 500])).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(f.service.get(track.id).await.unwrap().name, "T2");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let f = fixture();
        let a = add_certificate(&f, "A").await;
        let track = f.service.create(input("T", vec![a]), None).await.unwrap();

        f.service.delete(track.id).await.unwrap();
        f.service.delete(track.id).await.unwrap();
        assert!(matches!(f.service.get(track.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_certificate_cascades_to_all_tracks() {
        let f = fixture();
        let a = add_certificate(&f, "A").await;
        let b = add_certificate(&f, "B").await;
        let track_a = f.service.create(input("Track A", vec![a, b]), None).await.unwrap();
        let track_b = f.service.create(input("Track B", vec![b]), None).await.unwrap();
        let track_c = f.service.create(input("Track C", vec![a]), None).await.unwrap();

        let affected = f.service.remove_certificate(b).await.unwrap();
        assert_eq!(affected.len(), 2);

        let track_a = f.service.get(track_a.id).await.unwrap();
        assert_eq!(track_a.certificate_ids, vec![a]);
        assert!(track_a.active);

        let track_b = f.service.get(track_b.id).await.unwrap();
        assert!(track_b.certificate_ids.is_empty());
        assert!(!track_b.active);
        assert!(track_b.updated_at.is_some());

        let track_c = f.service.get(track_c.id).await.unwrap();
        assert_eq!(track_c.updated_at, None);

        let active: Vec<i32> = f.service.list_active().await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(active, vec![track_a.id, track_c.id]);
    }

    #[tokio::test]
    async fn test_generate_preconditions() {
        let f = fixture();
        assert!(matches!(
            f.service.generate_for_student(1, "Ana").await,
            Err(AppError::NotFound(_))
        ));

        let a = add_certificate(&f, "A").await;
        let mut inactive = input("Closed", vec![a]);
        inactive.active = false;
        let closed = f.service.create(inactive, None).await.unwrap();
        assert!(matches!(
            f.service.generate_for_student(closed.id, "Ana").await,
            Err(AppError::InactiveTrack(name)) if name == "Closed"
        ));

        let open = f.service.create(input("Open", vec![a]), None).await.unwrap();
        assert!(matches!(
            f.service.generate_for_student(open.id, "  ").await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_details_skips_deleted_members() {
        let f = fixture();
        let a = add_certificate(&f, "A").await;
        let b = add_certificate(&f, "B").await;
        let track = f.service.create(input("T", vec![a, b]), None).await.unwrap();
        f.certificates.delete(b).await.unwrap();

        let details = f.service.details(track.id).await.unwrap();
        assert_eq!(details.certificates.len(), 1);
        assert_eq!(details.certificates[0].course_name, "A");
    }
}
