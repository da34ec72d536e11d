//! Validation of item submissions and the photo policy.
//!
//! Everything here is pure: it runs before the workflow touches either
//! storage, so a rejected submission never leaves anything behind.

use chrono::{DateTime, Utc};
use validator::Validate;

use crate::domain::{CallerIdentity, ItemSubmission, NewItem, PhotoUpload, ValidationError};

/// Default upper bound on photo size (5 MiB).
pub const DEFAULT_MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

/// Content types accepted for listing photos unless configured otherwise.
pub const DEFAULT_ALLOWED_PHOTO_TYPES: [&str; 4] =
    ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Rules applied to the photo of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoPolicy {
    /// Reject submissions without a photo
    pub required: bool,
    /// Maximum photo size in bytes
    pub max_bytes: usize,
    /// Accepted content types, lower-case, without parameters
    pub allowed_content_types: Vec<String>,
}

impl Default for PhotoPolicy {
    fn default() -> Self {
        Self {
            required: true,
            max_bytes: DEFAULT_MAX_PHOTO_BYTES,
            allowed_content_types: DEFAULT_ALLOWED_PHOTO_TYPES
                .iter()
                .map(|t| (*t).to_string())
                .collect(),
        }
    }
}

impl PhotoPolicy {
    /// Checks presence, emptiness, content type and size, in that order.
    pub fn check(&self, photo: Option<&PhotoUpload>) -> Result<(), ValidationError> {
        let Some(photo) = photo else {
            return if self.required {
                Err(ValidationError::NoPhoto)
            } else {
                Ok(())
            };
        };

        if photo.is_empty() {
            return Err(ValidationError::EmptyPhoto);
        }

        let content_type = normalize_content_type(&photo.content_type);
        if !self
            .allowed_content_types
            .iter()
            .any(|allowed| *allowed == content_type)
        {
            return Err(ValidationError::UnsupportedPhotoType(
                photo.content_type.clone(),
            ));
        }

        if photo.len() > self.max_bytes {
            return Err(ValidationError::PhotoTooLarge {
                size: photo.len(),
                limit: self.max_bytes,
            });
        }

        Ok(())
    }
}

/// Lower-cases a content type and drops any parameters (`; charset=...`).
pub fn normalize_content_type(content_type: &str) -> String {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => essence,
    }
}

/// Parses a submitted price. It must be a finite number greater than zero.
pub fn parse_price(raw: &str) -> Result<f64, ValidationError> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(price) if price.is_finite() && price > 0.0 => Ok(price),
        _ => Err(ValidationError::InvalidPrice(trimmed.to_string())),
    }
}

fn required<'a>(value: &'a Option<String>, name: &str, missing: &mut Vec<String>) -> &'a str {
    let trimmed = value.as_deref().map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        missing.push(name.to_string());
    }
    trimmed
}

/// Validates the text fields of a submission and normalizes them into a
/// record owned by `caller`. The photo location is filled in later, once the
/// photo has been stored.
pub fn validate_submission(
    submission: &ItemSubmission,
    caller: &CallerIdentity,
    now: DateTime<Utc>,
) -> Result<NewItem, ValidationError> {
    let mut missing = Vec::new();
    let title = required(&submission.title, "title", &mut missing);
    let description = required(&submission.description, "description", &mut missing);
    let price = required(&submission.price, "price", &mut missing);
    let category = required(&submission.category, "category", &mut missing);
    let used_duration = required(&submission.used_duration, "usedDuration", &mut missing);
    let uploaded_by = required(&submission.uploaded_by, "uploadedBy", &mut missing);

    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    let item = NewItem {
        title: title.to_string(),
        description: description.to_string(),
        price: parse_price(price)?,
        category: category.to_string(),
        photo: None,
        sold: false,
        used_duration: used_duration.to_string(),
        uploaded_by: uploaded_by.to_string(),
        user_id: caller.uid.clone(),
        created_at: now,
        updated_at: now,
    };

    item.validate().map_err(ValidationError::from)?;

    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_submission() -> ItemSubmission {
        ItemSubmission {
            title: Some("  Desk Lamp ".to_string()),
            description: Some("Works great, barely used".to_string()),
            price: Some(" 15 ".to_string()),
            category: Some("Furniture".to_string()),
            used_duration: Some("2 months".to_string()),
            uploaded_by: Some("Jane".to_string()),
            photo: None,
        }
    }

    fn jpeg(size: usize) -> PhotoUpload {
        PhotoUpload::new("lamp.jpg", "image/jpeg", vec![0xFF; size])
    }

    #[test]
    fn test_validate_submission_normalizes_fields() {
        let caller = CallerIdentity::new("u123");
        let item = validate_submission(&full_submission(), &caller, Utc::now()).unwrap();

        assert_eq!(item.title, "Desk Lamp");
        assert_eq!(item.price, 15.0);
        assert_eq!(item.user_id, "u123");
        assert!(!item.sold);
        assert!(item.photo.is_none());
    }

    #[test]
    fn test_validate_submission_names_all_missing_fields() {
        let submission = ItemSubmission {
            title: Some("   ".to_string()),
            price: Some("10".to_string()),
            category: Some("Books".to_string()),
            ..Default::default()
        };

        let err = validate_submission(&submission, &CallerIdentity::new("u1"), Utc::now())
            .unwrap_err();

        match err {
            ValidationError::MissingFields(fields) => assert_eq!(
                fields,
                vec!["title", "description", "usedDuration", "uploadedBy"]
            ),
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_submission_rejects_long_description() {
        let mut submission = full_submission();
        submission.description = Some("a".repeat(2001));

        let err = validate_submission(&submission, &CallerIdentity::new("u1"), Utc::now())
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_FIELDS");
        assert_eq!(err.fields(), vec!["description"]);
    }

    #[test]
    fn test_validate_submission_names_overlong_fields() {
        let mut submission = full_submission();
        submission.title = Some("t".repeat(121));
        submission.used_duration = Some("d".repeat(61));

        let err = validate_submission(&submission, &CallerIdentity::new("u1"), Utc::now())
            .unwrap_err();
        match err {
            ValidationError::InvalidFields { fields, .. } => {
                assert_eq!(fields, vec!["title", "usedDuration"])
            }
            other => panic!("expected InvalidFields, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("15").unwrap(), 15.0);
        assert_eq!(parse_price(" 9.99 ").unwrap(), 9.99);

        for bad in ["0", "-3", "abc", "", "NaN", "inf", "1e400"] {
            assert!(
                matches!(parse_price(bad), Err(ValidationError::InvalidPrice(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_photo_policy_required() {
        let policy = PhotoPolicy::default();
        assert!(matches!(policy.check(None), Err(ValidationError::NoPhoto)));

        let optional = PhotoPolicy {
            required: false,
            ..PhotoPolicy::default()
        };
        assert!(optional.check(None).is_ok());
    }

    #[test]
    fn test_photo_policy_content_type() {
        let policy = PhotoPolicy::default();

        let pdf = PhotoUpload::new("doc.pdf", "application/pdf", vec![1, 2, 3]);
        assert!(matches!(
            policy.check(Some(&pdf)),
            Err(ValidationError::UnsupportedPhotoType(_))
        ));

        let png = PhotoUpload::new("a.png", "IMAGE/PNG; charset=binary", vec![1, 2, 3]);
        assert!(policy.check(Some(&png)).is_ok());

        let jpg_alias = PhotoUpload::new("a.jpg", "image/jpg", vec![1]);
        assert!(policy.check(Some(&jpg_alias)).is_ok());
    }

    #[test]
    fn test_photo_policy_size_limit() {
        let policy = PhotoPolicy {
            max_bytes: 1024,
            ..PhotoPolicy::default()
        };

        assert!(policy.check(Some(&jpeg(1024))).is_ok());
        assert!(matches!(
            policy.check(Some(&jpeg(1025))),
            Err(ValidationError::PhotoTooLarge {
                size: 1025,
                limit: 1024
            })
        ));
        assert!(matches!(
            policy.check(Some(&jpeg(0))),
            Err(ValidationError::EmptyPhoto)
        ));
    }
}
