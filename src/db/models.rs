use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Certificate {
    pub id: i32,
    pub course_name: String,
    pub workload_hours: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub institution_name: String,
    pub institution_address: Option<String>,
    pub city: Option<String>,
    pub issue_date: NaiveDate,
    pub logo_ref: Option<String>,
    pub responsible_name: Option<String>,
    pub responsible_role: Option<String>,
    pub signature_ref: Option<String>,
    pub seal_ref: Option<String>,
    pub certificate_code: Option<String>,
    /// Public URL of the blank template, or a legacy path under the web root.
    pub template_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCertificate {
    pub course_name: String,
    pub workload_hours: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub institution_name: String,
    pub institution_address: Option<String>,
    pub city: Option<String>,
    pub issue_date: NaiveDate,
    pub logo_ref: Option<String>,
    pub responsible_name: Option<String>,
    pub responsible_role: Option<String>,
    pub signature_ref: Option<String>,
    pub seal_ref: Option<String>,
    pub certificate_code: Option<String>,
    pub template_ref: Option<String>,
}

/// A named, ordered group of certificates generated together for one student.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Track {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub certificate_ids: Vec<i32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTrack {
    pub name: String,
    pub description: Option<String>,
    pub certificate_ids: Vec<i32>,
    pub active: bool,
    pub created_by: Option<String>,
}
