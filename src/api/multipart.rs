//! Decoding of the multipart "create listing" form.

use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::http::StatusCode;
use tracing::debug;

use crate::domain::{AppError, ItemSubmission, PhotoUpload, ValidationError};

/// Form field carrying the photo file.
pub const PHOTO_FIELD: &str = "photo";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        ValidationError::MalformedRequest(err.body_text()).into()
    }
}

async fn read_photo(field: Field<'_>) -> Result<Option<PhotoUpload>, AppError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field
        .content_type()
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string();
    let bytes = field.bytes().await.map_err(multipart_error)?;

    // Browsers send an empty, nameless part when no file was chosen.
    if file_name.is_empty() && bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(PhotoUpload::new(file_name, content_type, bytes)))
}

/// Reads every part of the form into an [`ItemSubmission`].
///
/// Unknown fields are skipped. A repeated field keeps its last value.
pub async fn read_item_submission(mut multipart: Multipart) -> Result<ItemSubmission, AppError> {
    let mut submission = ItemSubmission::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == PHOTO_FIELD {
            submission.photo = read_photo(field).await?;
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        if !submission.set_field(&name, value) {
            debug!(field = %name, "Ignoring unknown form field");
        }
    }

    Ok(submission)
}
