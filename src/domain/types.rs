//! Domain types for marketplace listings, user profiles and health reporting.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Represents a unique identifier for records in the Record Store.
pub type EntityId = String;

/// Verified identity of the caller, produced by a `CredentialVerifier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub uid: String,
    pub email: Option<String>,
}

impl CallerIdentity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Location of a listing photo: where clients fetch it and the key it is
/// stored under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub url: String,
    pub storage_key: String,
}

/// A marketplace listing as stored in the Record Store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: EntityId,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub photo: Option<Photo>,
    pub sold: bool,
    pub used_duration: String,
    pub uploaded_by: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Assembles a stored item from its normalized record and assigned id.
    pub fn from_new(id: EntityId, new_item: NewItem) -> Self {
        Self {
            id,
            title: new_item.title,
            description: new_item.description,
            price: new_item.price,
            category: new_item.category,
            photo: new_item.photo,
            sold: new_item.sold,
            used_duration: new_item.used_duration,
            uploaded_by: new_item.uploaded_by,
            user_id: new_item.user_id,
            created_at: new_item.created_at,
            updated_at: new_item.updated_at,
        }
    }

    #[must_use]
    pub fn is_owned_by(&self, caller: &CallerIdentity) -> bool {
        self.user_id == caller.uid
    }
}

/// A validated, normalized listing ready to be inserted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    #[validate(range(exclusive_min = 0.0))]
    pub price: f64,
    #[validate(length(min = 1, max = 60))]
    pub category: String,
    pub photo: Option<Photo>,
    pub sold: bool,
    #[validate(length(min = 1, max = 60))]
    pub used_duration: String,
    #[validate(length(min = 1, max = 100))]
    pub uploaded_by: String,
    #[validate(length(min = 1))]
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A binary photo received with a submission.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl PhotoUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Raw "create listing" input as decoded from the multipart form.
///
/// Every text field is optional here so that validation can report all
/// missing fields at once.
#[derive(Debug, Clone, Default)]
pub struct ItemSubmission {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub used_duration: Option<String>,
    pub uploaded_by: Option<String>,
    pub photo: Option<PhotoUpload>,
}

impl ItemSubmission {
    /// Sets a text field by its form name. Returns `false` for unknown names.
    pub fn set_field(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "title" => &mut self.title,
            "description" => &mut self.description,
            "price" => &mut self.price,
            "category" => &mut self.category,
            "usedDuration" => &mut self.used_duration,
            "uploadedBy" => &mut self.uploaded_by,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    pub fn with_photo(mut self, photo: PhotoUpload) -> Self {
        self.photo = Some(photo);
        self
    }
}

/// Filters accepted by the listing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemFilter {
    pub category: Option<String>,
    pub sold: Option<bool>,
}

/// Request payload for toggling the sold flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetSoldRequest {
    pub sold: bool,
}

/// Response payload for a successful deletion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteItemResponse {
    pub id: EntityId,
    pub message: String,
}

impl DeleteItemResponse {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            message: "Item deleted".to_string(),
        }
    }
}

/// Progress of a single item submission.
///
/// `Done` and `Failed` are terminal. A failure after the object write goes
/// through `Compensating` so the stored photo can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Validating,
    WritingObject,
    WritingRecord,
    Compensating,
    Done,
    Failed,
}

impl SubmissionState {
    #[must_use]
    pub fn can_transition_to(self, next: SubmissionState) -> bool {
        use SubmissionState::*;

        matches!(
            (self, next),
            (Validating, WritingObject)
                | (Validating, WritingRecord)
                | (Validating, Failed)
                | (WritingObject, WritingRecord)
                | (WritingObject, Failed)
                | (WritingRecord, Done)
                | (WritingRecord, Compensating)
                | (WritingRecord, Failed)
                | (Compensating, Failed)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionState::Done | SubmissionState::Failed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionState::Validating => "validating",
            SubmissionState::WritingObject => "writing_object",
            SubmissionState::WritingRecord => "writing_record",
            SubmissionState::Compensating => "compensating",
            SubmissionState::Done => "done",
            SubmissionState::Failed => "failed",
        }
    }
}

/// A registered marketplace user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request payload for registering the caller's profile.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// Must match the caller identity when supplied.
    #[serde(default)]
    pub uid: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 7, max = 20))]
    pub phone_number: String,
    #[serde(default)]
    #[validate(url)]
    pub avatar: Option<String>,
}

impl CreateUserRequest {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            uid: None,
            name: name.into(),
            email: email.into(),
            phone_number: phone_number.into(),
            avatar: None,
        }
    }
}

/// Health check status for services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check response for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub database: HealthStatus,
    pub storage: HealthStatus,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn new(database: HealthStatus, storage: HealthStatus) -> Self {
        let status = match (&database, &storage) {
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            _ => HealthStatus::Unhealthy,
        };

        Self {
            status,
            database,
            storage,
            timestamp: Utc::now(),
        }
    }
}

/// Error payload returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub r#type: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
}

impl ErrorDetail {
    pub fn new(r#type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            r#type: r#type.into(),
            message: message.into(),
            code: None,
            fields: Vec::new(),
            step: None,
        }
    }
}

/// Body of a 429 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResponse {
    pub error: ErrorDetail,
    pub retry_after: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_new_item() -> NewItem {
        let now = Utc::now();
        NewItem {
            title: "Desk Lamp".to_string(),
            description: "Works great".to_string(),
            price: 15.0,
            category: "Furniture".to_string(),
            photo: Some(Photo {
                url: "https://cdn.example/photos/a.jpg".to_string(),
                storage_key: "photos/a.jpg".to_string(),
            }),
            sold: false,
            used_duration: "2 months".to_string(),
            uploaded_by: "Jane".to_string(),
            user_id: "u123".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_item_from_new_keeps_fields() {
        let item = Item::from_new("abc".to_string(), sample_new_item());

        assert_eq!(item.id, "abc");
        assert_eq!(item.price, 15.0);
        assert!(!item.sold);
        assert!(item.is_owned_by(&CallerIdentity::new("u123")));
        assert!(!item.is_owned_by(&CallerIdentity::new("u456")));
    }

    #[test]
    fn test_item_serializes_camel_case() {
        let item = Item::from_new("abc".to_string(), sample_new_item());
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["usedDuration"], "2 months");
        assert_eq!(json["uploadedBy"], "Jane");
        assert_eq!(json["userId"], "u123");
        assert_eq!(json["photo"]["storageKey"], "photos/a.jpg");
        assert_eq!(json["price"].as_f64(), Some(15.0));
    }

    #[test]
    fn test_new_item_validation_rejects_long_title() {
        let mut item = sample_new_item();
        item.title = "x".repeat(121);
        assert!(item.validate().is_err());

        let item = sample_new_item();
        assert!(item.validate().is_ok());
    }

    #[test]
    fn test_submission_set_field() {
        let mut submission = ItemSubmission::default();

        assert!(submission.set_field("usedDuration", "1 year".to_string()));
        assert!(submission.set_field("price", "10".to_string()));
        assert!(!submission.set_field("colour", "red".to_string()));

        assert_eq!(submission.used_duration.as_deref(), Some("1 year"));
        assert_eq!(submission.price.as_deref(), Some("10"));
    }

    #[test]
    fn test_submission_state_transitions() {
        use SubmissionState::*;

        assert!(Validating.can_transition_to(WritingObject));
        assert!(WritingObject.can_transition_to(WritingRecord));
        assert!(WritingRecord.can_transition_to(Done));
        assert!(WritingRecord.can_transition_to(Compensating));
        assert!(Compensating.can_transition_to(Failed));

        assert!(!Compensating.can_transition_to(Done));
        assert!(!Done.can_transition_to(Validating));
        assert!(!Failed.can_transition_to(WritingRecord));

        assert!(Done.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Compensating.is_terminal());
    }

    #[test]
    fn test_create_user_request_validation() {
        let request = CreateUserRequest::new("Jane", "jane@mavs.uta.edu", "8175550100");
        assert!(request.validate().is_ok());

        let request = CreateUserRequest::new("Jane", "not-an-email", "8175550100");
        assert!(request.validate().is_err());

        let request = CreateUserRequest::new("", "jane@mavs.uta.edu", "12");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_health_response_all_healthy() {
        let response = HealthResponse::new(HealthStatus::Healthy, HealthStatus::Healthy);
        assert_eq!(response.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_health_response_storage_down() {
        let response = HealthResponse::new(HealthStatus::Healthy, HealthStatus::Unhealthy);
        assert_eq!(response.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_health_response_unhealthy() {
        let response = HealthResponse::new(HealthStatus::Unhealthy, HealthStatus::Healthy);
        assert_eq!(response.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_error_detail_skips_empty_extras() {
        let detail = ErrorDetail::new("not_found", "Record not found: x");
        let json = serde_json::to_string(&detail).unwrap();
        assert_eq!(json, r#"{"type":"not_found","message":"Record not found: x"}"#);
    }
}
