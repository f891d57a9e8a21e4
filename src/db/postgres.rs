use async_trait::async_trait;

use super::{
    Certificate, CertificateRepository, DbPool, NewCertificate, NewTrack, Track, TrackRepository,
};

pub struct PgCertificateRepository {
    pool: DbPool,
}

impl PgCertificateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CertificateRepository for PgCertificateRepository {
    async fn create(&self, c: NewCertificate) -> Result<Certificate, sqlx::Error> {
        sqlx::query_as::<_, Certificate>(
            r#"
            INSERT INTO certificates (
                course_name, workload_hours, start_date, end_date, institution_name,
                institution_address, city, issue_date, logo_ref, responsible_name,
                responsible_role, signature_ref, seal_ref, certificate_code, template_ref
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(&c.course_name)
        .bind(c.workload_hours)
        .bind(c.start_date)
        .bind(c.end_date)
        .bind(&c.institution_name)
        .bind(&c.institution_address)
        .bind(&c.city)
        .bind(c.issue_date)
        .bind(&c.logo_ref)
        .bind(&c.responsible_name)
        .bind(&c.responsible_role)
        .bind(&c.signature_ref)
        .bind(&c.seal_ref)
        .bind(&c.certificate_code)
        .bind(&c.template_ref)
        .fetch_one(self.pool.as_ref())
        .await
    }

    async fn list(&self) -> Result<Vec<Certificate>, sqlx::Error> {
        sqlx::query_as::<_, Certificate>("SELECT * FROM certificates ORDER BY id")
            .fetch_all(self.pool.as_ref())
            .await
    }

    async fn get(&self, id: i32) -> Result<Option<Certificate>, sqlx::Error> {
        sqlx::query_as::<_, Certificate>("SELECT * FROM certificates WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await
    }

    async fn delete(&self, id: i32) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM certificates WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}

pub struct PgTrackRepository {
    pool: DbPool,
}

impl PgTrackRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackRepository for PgTrackRepository {
    async fn create(&self, track: NewTrack) -> Result<Track, sqlx::Error> {
        sqlx::query_as::<_, Track>(
            r#"
            INSERT INTO tracks (name, description, certificate_ids, active, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&track.name)
        .bind(&track.description)
        .bind(&track.certificate_ids)
        .bind(track.active)
        .bind(&track.created_by)
        .fetch_one(self.pool.as_ref())
        .await
    }

    async fn list(&self) -> Result<Vec<Track>, sqlx::Error> {
        sqlx::query_as::<_, Track>("SELECT * FROM tracks ORDER BY created_at DESC, id DESC")
            .fetch_all(self.pool.as_ref())
            .await
    }

    async fn list_active(&self) -> Result<Vec<Track>, sqlx::Error> {
        sqlx::query_as::<_, Track>("SELECT * FROM tracks WHERE active ORDER BY name")
            .fetch_all(self.pool.as_ref())
            .await
    }

    async fn get(&self, id: i32) -> Result<Option<Track>, sqlx::Error> {
        sqlx::query_as::<_, Track>("SELECT * FROM tracks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await
    }

    async fn update(&self, track: &Track) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE tracks
            SET name = $2, description = $3, certificate_ids = $4, active = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(track.id)
        .bind(&track.name)
        .bind(&track.description)
        .bind(&track.certificate_ids)
        .bind(track.active)
        .bind(track.updated_at)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM tracks WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}
