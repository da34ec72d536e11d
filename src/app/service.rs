//! Application service layer.
//!
//! This module contains the core business logic that orchestrates
//! operations between infrastructure components using trait abstractions.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, CallerIdentity, CreateUserRequest, DatabaseError, DeleteItemResponse,
    HealthResponse, HealthStatus, Item, ItemFilter, ItemRepository, ItemSubmission,
    ObjectStorage, Photo, SubmissionState, SubmissionStep, User, UserRepository, ValidationError,
};

use super::keys::photo_storage_key;
use super::submission::{PhotoPolicy, normalize_content_type, validate_submission};

/// Default institutional email domain for registered users.
pub const DEFAULT_EMAIL_DOMAIN: &str = "mavs.uta.edu";

/// Tunable business rules of the service.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Rules applied to the photo of every submission
    pub photo_policy: PhotoPolicy,
    /// Required domain of registered emails, lower-case, without `@`
    pub email_domain: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            photo_policy: PhotoPolicy::default(),
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
        }
    }
}

/// Tracks the state of one submission and traces every transition.
struct SubmissionTracker {
    state: SubmissionState,
}

impl SubmissionTracker {
    fn new() -> Self {
        Self {
            state: SubmissionState::Validating,
        }
    }

    fn advance(&mut self, next: SubmissionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal submission transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = self.state.as_str(), to = next.as_str(), "Submission state change");
        self.state = next;
    }
}

fn item_not_found(id: &str) -> AppError {
    AppError::Database(DatabaseError::NotFound(format!("item {id}")))
}

/// Application service containing core business logic.
///
/// Holds the Record Store repositories and the Object Store behind trait
/// objects so the workflows can run against in-memory fakes in tests.
///
/// # Example
///
/// ```ignore
/// let mongo = Arc::new(MongoRepository::connect(&uri, "mavsmart").await?);
/// let storage = Arc::new(ObjectStoreStorage::local("./uploads", "/uploads")?);
/// let service = AppService::new(mongo.clone(), mongo, storage);
///
/// let item = service.submit_item(&caller, submission).await?;
/// ```
pub struct AppService {
    items: Arc<dyn ItemRepository>,
    users: Arc<dyn UserRepository>,
    storage: Arc<dyn ObjectStorage>,
    settings: ServiceSettings,
}

impl AppService {
    /// Creates a new `AppService` with default settings.
    #[must_use]
    pub fn new(
        items: Arc<dyn ItemRepository>,
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self::with_settings(items, users, storage, ServiceSettings::default())
    }

    /// Creates a new `AppService` with explicit settings.
    #[must_use]
    pub fn with_settings(
        items: Arc<dyn ItemRepository>,
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn ObjectStorage>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            items,
            users,
            storage,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Validates a submission, stores its photo and persists the listing.
    ///
    /// Workflow:
    /// 1. Validate the text fields and price
    /// 2. Apply the photo policy
    /// 3. Write the photo to the Object Store
    /// 4. Insert the record into the Record Store
    /// 5. If step 4 fails, delete the photo written in step 3 (best-effort)
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if steps 1-2 reject the input, and
    /// `AppError::Submission` naming the failed step if a storage call fails.
    /// A failed cleanup in step 5 is logged, never returned.
    #[instrument(skip(self, caller, submission), fields(owner = %caller.uid))]
    pub async fn submit_item(
        &self,
        caller: &CallerIdentity,
        submission: ItemSubmission,
    ) -> Result<Item, AppError> {
        let mut tracker = SubmissionTracker::new();

        let validated = validate_submission(&submission, caller, Utc::now()).and_then(|item| {
            self.settings
                .photo_policy
                .check(submission.photo.as_ref())
                .map(|()| item)
        });
        let mut new_item = match validated {
            Ok(item) => item,
            Err(e) => {
                tracker.advance(SubmissionState::Failed);
                warn!(code = e.code(), error = %e, "Item submission rejected");
                return Err(e.into());
            }
        };

        let stored_key = match submission.photo {
            Some(photo) => {
                tracker.advance(SubmissionState::WritingObject);
                let content_type = normalize_content_type(&photo.content_type);
                let key = photo_storage_key(&photo.file_name, &content_type);
                match self.storage.put(&key, photo.bytes, &content_type).await
                {
                    Ok(url) => {
                        debug!(storage_key = %key, "Photo stored");
                        new_item.photo = Some(Photo {
                            url,
                            storage_key: key.clone(),
                        });
                        Some(key)
                    }
                    Err(e) => {
                        tracker.advance(SubmissionState::Failed);
                        error!(storage_key = %key, error = ?e, "Photo write failed");
                        return Err(e.at_step(SubmissionStep::WritingObject));
                    }
                }
            }
            None => None,
        };

        tracker.advance(SubmissionState::WritingRecord);
        match self.items.insert_item(&new_item).await {
            Ok(item) => {
                tracker.advance(SubmissionState::Done);
                counter!("mavsmart_items_created_total").increment(1);
                info!(item_id = %item.id, "Item created");
                Ok(item)
            }
            Err(e) => {
                error!(error = ?e, "Item record write failed");
                if let Some(key) = stored_key {
                    tracker.advance(SubmissionState::Compensating);
                    self.remove_orphaned_photo(&key).await;
                }
                tracker.advance(SubmissionState::Failed);
                Err(e.at_step(SubmissionStep::WritingRecord))
            }
        }
    }

    async fn remove_orphaned_photo(&self, key: &str) {
        match self.storage.delete(key).await {
            Ok(()) => {
                counter!("mavsmart_photo_compensations_total", "outcome" => "deleted").increment(1);
                info!(storage_key = %key, "Removed photo of failed submission");
            }
            Err(e) => {
                counter!("mavsmart_photo_compensations_total", "outcome" => "failed").increment(1);
                error!(
                    storage_key = %key,
                    error = ?e,
                    "Compensating photo delete failed, object is orphaned"
                );
            }
        }
    }

    /// Deletes a listing owned by the caller, then its photo.
    ///
    /// The photo delete is best-effort: once the record is gone the
    /// operation reports success even if the object could not be removed.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown ids and `AppError::Authorization`
    /// when the caller is not the owner.
    #[instrument(skip(self, caller), fields(caller = %caller.uid))]
    pub async fn delete_item(
        &self,
        caller: &CallerIdentity,
        id: &str,
    ) -> Result<DeleteItemResponse, AppError> {
        let item = self
            .items
            .get_item(id)
            .await?
            .ok_or_else(|| item_not_found(id))?;

        if !item.is_owned_by(caller) {
            warn!(item_id = %id, owner = %item.user_id, "Delete refused: caller is not the owner");
            return Err(AppError::Authorization(
                "only the owner can delete this item".to_string(),
            ));
        }

        if !self.items.delete_item(id).await? {
            return Err(item_not_found(id));
        }
        info!(item_id = %id, "Item deleted");

        if let Some(photo) = &item.photo {
            if let Err(e) = self.storage.delete(&photo.storage_key).await {
                counter!("mavsmart_photo_cleanup_failures_total").increment(1);
                warn!(
                    item_id = %id,
                    storage_key = %photo.storage_key,
                    error = ?e,
                    "Photo delete failed after item removal"
                );
            }
        }

        Ok(DeleteItemResponse::new(item.id))
    }

    /// Marks a listing owned by the caller as sold or available.
    #[instrument(skip(self, caller), fields(caller = %caller.uid))]
    pub async fn set_item_sold(
        &self,
        caller: &CallerIdentity,
        id: &str,
        sold: bool,
    ) -> Result<Item, AppError> {
        let item = self
            .items
            .get_item(id)
            .await?
            .ok_or_else(|| item_not_found(id))?;

        if !item.is_owned_by(caller) {
            return Err(AppError::Authorization(
                "only the owner can update this item".to_string(),
            ));
        }

        self.items
            .set_sold(id, sold)
            .await?
            .ok_or_else(|| item_not_found(id))
    }

    /// Gets an item by ID.
    #[instrument(skip(self))]
    pub async fn get_item(&self, id: &str) -> Result<Option<Item>, AppError> {
        self.items.get_item(id).await
    }

    /// Lists items, newest first.
    #[instrument(skip(self))]
    pub async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, AppError> {
        self.items.list_items(filter).await
    }

    /// Registers the caller's profile.
    ///
    /// The stored uid is always the caller identity; a body uid naming
    /// anyone else is refused.
    #[instrument(skip(self, caller, request), fields(caller = %caller.uid))]
    pub async fn register_user(
        &self,
        caller: &CallerIdentity,
        request: &CreateUserRequest,
    ) -> Result<User, AppError> {
        if let Some(uid) = request.uid.as_deref() {
            if uid != caller.uid {
                warn!(requested_uid = %uid, "Refusing to register a profile for another uid");
                return Err(AppError::Authorization(
                    "cannot register a profile for another user".to_string(),
                ));
            }
        }

        let normalized = CreateUserRequest {
            uid: Some(caller.uid.clone()),
            name: request.name.trim().to_string(),
            email: request.email.trim().to_ascii_lowercase(),
            phone_number: request.phone_number.trim().to_string(),
            avatar: request
                .avatar
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
        };
        normalized.validate()?;

        let domain = self.settings.email_domain.to_ascii_lowercase();
        let email_domain = normalized
            .email
            .rsplit_once('@')
            .map(|(_, d)| d)
            .unwrap_or_default();
        if email_domain != domain {
            return Err(ValidationError::EmailDomain(domain).into());
        }

        let user = User {
            uid: caller.uid.clone(),
            name: normalized.name,
            email: normalized.email,
            phone_number: normalized.phone_number,
            avatar: normalized.avatar,
            created_at: Utc::now(),
        };

        let created = self.users.insert_user(&user).await?;
        info!(uid = %created.uid, "User registered");
        Ok(created)
    }

    /// Gets a user by uid.
    #[instrument(skip(self))]
    pub async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        self.users.get_user(uid).await
    }

    /// Lists registered users.
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.users.list_users().await
    }

    /// Performs a health check on the Record Store and the Object Store.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let db_health = match self.items.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = ?e, "Database health check failed");
                HealthStatus::Unhealthy
            }
        };

        let storage_health = match self.storage.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = ?e, "Storage health check failed");
                HealthStatus::Unhealthy
            }
        };

        HealthResponse::new(db_health, storage_health)
    }
}
