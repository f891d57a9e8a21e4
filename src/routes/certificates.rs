use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::Certificate;
use crate::error::{AppError, Result};
use crate::pdf::{layout_name, NameLayout, PageSize};
use crate::positioning::PositioningConfig;
use crate::services::{CertificateUpload, CleanupReport, UploadedFile};
use crate::state::AppState;

use super::attachment;

pub async fn list_certificates(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Certificate>>> {
    Ok(Json(state.certificates.list().await?))
}

pub async fn get_certificate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<Certificate>> {
    Ok(Json(state.certificates.get(id).await?))
}

pub async fn create_certificate(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Certificate>)> {
    let mut upload = CertificateUpload::default();
    let mut issue_date = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("multipart body", e))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "logo" || name == "signature" {
            let file_name = field.file_name().unwrap_or(&name).to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| multipart_error(&name, e))?;
            if bytes.is_empty() {
                continue;
            }
            let file = UploadedFile {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            };
            if name == "logo" {
                upload.logo = Some(file);
            } else {
                upload.signature = Some(file);
            }
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| multipart_error(&name, e))?;
        let value = Some(text.trim().to_string()).filter(|v| !v.is_empty());
        let record = &mut upload.record;

        match name.as_str() {
            "course_name" => record.course_name = text,
            "institution_name" => record.institution_name = text,
            "institution_address" => record.institution_address = value,
            "city" => record.city = value,
            "responsible_name" => record.responsible_name = value,
            "responsible_role" => record.responsible_role = value,
            "seal_ref" => record.seal_ref = value,
            "certificate_code" => record.certificate_code = value,
            "workload_hours" => record.workload_hours = parse_field(&name, value.as_deref())?,
            "start_date" => record.start_date = parse_date(&name, value.as_deref())?,
            "end_date" => record.end_date = parse_date(&name, value.as_deref())?,
            "issue_date" => issue_date = parse_date(&name, value.as_deref())?,
            "template" => upload.template = text,
            "positioning" => upload.positioning = value,
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    upload.record.issue_date = issue_date.unwrap_or_else(|| Utc::now().date_naive());

    let certificate = state.certificates.create(upload).await?;
    Ok((StatusCode::CREATED, Json(certificate)))
}

/// Maps a multipart read failure, keeping 413 for bodies over the upload limit.
fn multipart_error(part: &str, error: MultipartError) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("{}: {}", part, error.body_text()))
    } else {
        AppError::InvalidInput(format!("could not read {}: {}", part, error.body_text()))
    }
}

fn parse_field<T: std::str::FromStr>(name: &str, value: Option<&str>) -> Result<Option<T>> {
    value
        .map(|v| {
            v.parse()
                .map_err(|_| AppError::validation(format!("{} must be a number", name)))
        })
        .transpose()
}

fn parse_date(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map_err(|_| AppError::validation(format!("{} must be a date (YYYY-MM-DD)", name)))
        })
        .transpose()
}

pub async fn delete_certificate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<CleanupReport>> {
    Ok(Json(state.certificates.delete(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CertifyRequest {
    pub course_name: String,
    pub student_name: String,
}

pub async fn certify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CertifyRequest>,
) -> Result<Response> {
    let pdf = state
        .certificates
        .certify(&request.course_name, &request.student_name)
        .await?;

    let file_name = format!("{} - {}.pdf", request.course_name.trim(), request.student_name.trim());
    Ok(attachment(pdf, "application/pdf", &file_name))
}

#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    #[serde(default)]
    pub certificate_ids: Vec<i32>,
    pub student_name: String,
}

pub async fn generate_selection(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectionRequest>,
) -> Result<Response> {
    let archive = state
        .certificates
        .generate_selection(&request.certificate_ids, &request.student_name)
        .await?;

    let file_name = format!("Certificados - {}.zip", request.student_name.trim());
    Ok(attachment(archive, "application/zip", &file_name))
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub page: PageSize,
    #[serde(default)]
    pub config: PositioningConfig,
    pub student_name: String,
}

/// Layout the server would use for the name, without producing a PDF.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PreviewRequest>,
) -> Result<Json<NameLayout>> {
    if request.page.width <= 0.0 || request.page.height <= 0.0 {
        return Err(AppError::InvalidInput("page size must be positive".to_string()));
    }
    Ok(Json(layout_name(
        request.page,
        &request.config,
        &request.student_name,
        state.renderer.settings(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optional_fields() {
        assert_eq!(parse_field::<i32>("workload_hours", Some("40")).unwrap(), Some(40));
        assert_eq!(parse_field::<i32>("workload_hours", None).unwrap(), None);
        assert!(parse_field::<i32>("workload_hours", Some("forty")).is_err());

        assert_eq!(
            parse_date("issue_date", Some("2024-03-01")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert!(parse_date("issue_date", Some("01/03/2024")).is_err());
    }
}
