use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::{Certificate, CertificateRepository, NewCertificate, NewTrack, Track, TrackRepository};

#[derive(Debug)]
struct Table<T> {
    next_id: i32,
    rows: BTreeMap<i32, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Certificate rows held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCertificates {
    table: Mutex<Table<Certificate>>,
}

impl InMemoryCertificates {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CertificateRepository for InMemoryCertificates {
    async fn create(&self, c: NewCertificate) -> Result<Certificate, sqlx::Error> {
        let mut table = self.table.lock().await;
        let certificate = Certificate {
            id: table.allocate_id(),
            course_name: c.course_name,
            workload_hours: c.workload_hours,
            start_date: c.start_date,
            end_date: c.end_date,
            institution_name: c.institution_name,
            institution_address: c.institution_address,
            city: c.city,
            issue_date: c.issue_date,
            logo_ref: c.logo_ref,
            responsible_name: c.responsible_name,
            responsible_role: c.responsible_role,
            signature_ref: c.signature_ref,
            seal_ref: c.seal_ref,
            certificate_code: c.certificate_code,
            template_ref: c.template_ref,
            created_at: Utc::now(),
        };
        table.rows.insert(certificate.id, certificate.clone());
        Ok(certificate)
    }

    async fn list(&self) -> Result<Vec<Certificate>, sqlx::Error> {
        Ok(self.table.lock().await.rows.values().cloned().collect())
    }

    async fn get(&self, id: i32) -> Result<Option<Certificate>, sqlx::Error> {
        Ok(self.table.lock().await.rows.get(&id).cloned())
    }

    async fn delete(&self, id: i32) -> Result<(), sqlx::Error> {
        self.table.lock().await.rows.remove(&id);
        Ok(())
    }
}

/// Track rows held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryTracks {
    table: Mutex<Table<Track>>,
}

impl InMemoryTracks {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrackRepository for InMemoryTracks {
    async fn create(&self, track: NewTrack) -> Result<Track, sqlx::Error> {
        let mut table = self.table.lock().await;
        let track = Track {
            id: table.allocate_id(),
            name: track.name,
            description: track.description,
            certificate_ids: track.certificate_ids,
            active: track.active,
            created_at: Utc::now(),
            updated_at: None,
            created_by: track.created_by,
        };
        table.rows.insert(track.id, track.clone());
        Ok(track)
    }

    async fn list(&self) -> Result<Vec<Track>, sqlx::Error> {
        let mut tracks: Vec<Track> = self.table.lock().await.rows.values().cloned().collect();
        tracks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tracks)
    }

    async fn list_active(&self) -> Result<Vec<Track>, sqlx::Error> {
        let mut tracks: Vec<Track> = self
            .table
            .lock()
            .await
            .rows
            .values()
            .filter(|t| t.active)
            .cloned()
            .collect();
        tracks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tracks)
    }

    async fn get(&self, id: i32) -> Result<Option<Track>, sqlx::Error> {
        Ok(self.table.lock().await.rows.get(&id).cloned())
    }

    async fn update(&self, track: &Track) -> Result<(), sqlx::Error> {
        let mut table = self.table.lock().await;
        if let Some(row) = table.rows.get_mut(&track.id) {
            *row = track.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<(), sqlx::Error> {
        self.table.lock().await.rows.remove(&id);
        Ok(())
    }
}
