//! Domain traits defining contracts for external systems.

use async_trait::async_trait;
use bytes::Bytes;

use super::error::AppError;
use super::types::{CallerIdentity, Item, ItemFilter, NewItem, User};

/// Verifies bearer credentials and yields the caller identity.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Verify an opaque bearer token
    async fn verify(&self, token: &str) -> Result<CallerIdentity, AppError>;
}

/// Binary blob storage for listing photos.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Check storage connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Store `bytes` under `key` and return the public location
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String, AppError>;

    /// Delete the object stored under `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// Record Store access for listings.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Check database connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Insert a new item and return it with its assigned identifier
    async fn insert_item(&self, item: &NewItem) -> Result<Item, AppError>;

    /// Get a single item by ID
    async fn get_item(&self, id: &str) -> Result<Option<Item>, AppError>;

    /// List items, newest first
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, AppError>;

    /// Set the sold flag, returning the updated item if it exists
    async fn set_sold(&self, id: &str, sold: bool) -> Result<Option<Item>, AppError>;

    /// Delete an item, returning whether a record was removed
    async fn delete_item(&self, id: &str) -> Result<bool, AppError>;
}

/// Record Store access for user profiles.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; a duplicate uid or email is a `DatabaseError::Duplicate`
    async fn insert_user(&self, user: &User) -> Result<User, AppError>;

    /// Get a user by uid
    async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError>;

    /// List all users
    async fn list_users(&self) -> Result<Vec<User>, AppError>;
}
