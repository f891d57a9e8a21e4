pub mod certificates;
pub mod tracks;

pub use certificates::{CertificateService, CertificateUpload, CleanupReport, UploadedFile};
pub use tracks::{CertificateSummary, TrackDetails, TrackInput, TrackService};

use crate::error::{AppError, Result};

fn require_student_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("student name is required".to_string()));
    }
    Ok(name)
}
