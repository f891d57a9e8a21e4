mod memory;
mod models;
mod postgres;

pub use memory::{InMemoryCertificates, InMemoryTracks};
pub use models::*;
pub use postgres::{PgCertificateRepository, PgTrackRepository};

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub type DbPool = Arc<PgPool>;

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    async fn create(&self, certificate: NewCertificate) -> Result<Certificate, sqlx::Error>;
    async fn list(&self) -> Result<Vec<Certificate>, sqlx::Error>;
    async fn get(&self, id: i32) -> Result<Option<Certificate>, sqlx::Error>;
    async fn delete(&self, id: i32) -> Result<(), sqlx::Error>;
}

#[async_trait]
pub trait TrackRepository: Send + Sync {
    async fn create(&self, track: NewTrack) -> Result<Track, sqlx::Error>;
    async fn list(&self) -> Result<Vec<Track>, sqlx::Error>;
    async fn list_active(&self) -> Result<Vec<Track>, sqlx::Error>;
    async fn get(&self, id: i32) -> Result<Option<Track>, sqlx::Error>;
    async fn update(&self, track: &Track) -> Result<(), sqlx::Error>;
    async fn delete(&self, id: i32) -> Result<(), sqlx::Error>;
}
