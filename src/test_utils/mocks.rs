//! Mock implementations for testing.
//!
//! These mocks provide in-memory implementations of domain traits
//! that can be configured to simulate various scenarios including
//! success, failure, and edge cases.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::{
    AppError, CallerIdentity, CredentialVerifier, DatabaseError, Item, ItemFilter,
    ItemRepository, NewItem, ObjectStorage, StorageError, User, UserRepository,
};

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// If true, operations will fail.
    pub should_fail: bool,
    /// Custom error message for failures.
    pub error_message: Option<String>,
}

impl MockConfig {
    /// Creates a config that always succeeds.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a config that always fails.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }

    fn message_or(&self, default: &str) -> String {
        self.error_message
            .clone()
            .unwrap_or_else(|| default.to_string())
    }
}

/// Mock item repository backed by a `HashMap`.
///
/// # Example
///
/// ```ignore
/// use mavsmart_api::test_utils::{MockItemRepository, mocks::MockConfig};
///
/// let mock = MockItemRepository::new();
/// mock.set_fail_inserts(true);
///
/// let failing_mock = MockItemRepository::with_config(MockConfig::failure("DB error"));
/// ```
pub struct MockItemRepository {
    storage: Arc<Mutex<HashMap<String, Item>>>,
    config: MockConfig,
    call_count: AtomicU64,
    next_id: AtomicU64,
    is_healthy: AtomicBool,
    fail_inserts: AtomicBool,
}

impl MockItemRepository {
    /// Creates a new mock with default (success) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    /// Creates a new mock with the given configuration.
    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
            config,
            call_count: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
            is_healthy: AtomicBool::new(true),
            fail_inserts: AtomicBool::new(false),
        }
    }

    /// Gets the number of times any method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Sets the health status.
    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Makes only `insert_item` fail.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::Relaxed);
    }

    /// Gets all stored items.
    pub fn get_all_items(&self) -> Vec<Item> {
        self.storage.lock().unwrap().values().cloned().collect()
    }

    async fn enter(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.config.should_fail {
            return Err(AppError::Database(DatabaseError::Query(
                self.config.message_or("Mock database error"),
            )));
        }
        Ok(())
    }
}

impl Default for MockItemRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemRepository for MockItemRepository {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Mock database unhealthy".to_string(),
            )));
        }
        self.enter().await
    }

    async fn insert_item(&self, item: &NewItem) -> Result<Item, AppError> {
        self.enter().await?;
        if self.fail_inserts.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Query(
                self.config.message_or("Mock insert failure"),
            )));
        }

        let id = format!("item_{:06}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let created = Item::from_new(id.clone(), item.clone());
        self.storage.lock().unwrap().insert(id, created.clone());
        Ok(created)
    }

    async fn get_item(&self, id: &str) -> Result<Option<Item>, AppError> {
        self.enter().await?;
        Ok(self.storage.lock().unwrap().get(id).cloned())
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, AppError> {
        self.enter().await?;
        let mut items: Vec<Item> = self
            .storage
            .lock()
            .unwrap()
            .values()
            .filter(|i| filter.category.as_ref().is_none_or(|c| &i.category == c))
            .filter(|i| filter.sold.is_none_or(|s| i.sold == s))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(items)
    }

    async fn set_sold(&self, id: &str, sold: bool) -> Result<Option<Item>, AppError> {
        self.enter().await?;
        let mut storage = self.storage.lock().unwrap();
        Ok(storage.get_mut(id).map(|item| {
            item.sold = sold;
            item.updated_at = Utc::now();
            item.clone()
        }))
    }

    async fn delete_item(&self, id: &str) -> Result<bool, AppError> {
        self.enter().await?;
        Ok(self.storage.lock().unwrap().remove(id).is_some())
    }
}

/// Mock user repository enforcing uid and email uniqueness like the
/// MongoDB unique indexes do.
pub struct MockUserRepository {
    storage: Arc<Mutex<Vec<User>>>,
    config: MockConfig,
}

impl MockUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            storage: Arc::new(Mutex::new(Vec::new())),
            config,
        }
    }

    pub fn get_all_users(&self) -> Vec<User> {
        self.storage.lock().unwrap().clone()
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            return Err(AppError::Database(DatabaseError::Query(
                self.config.message_or("Mock database error"),
            )));
        }
        Ok(())
    }
}

impl Default for MockUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn insert_user(&self, user: &User) -> Result<User, AppError> {
        self.check_should_fail()?;
        let mut storage = self.storage.lock().unwrap();
        if storage
            .iter()
            .any(|u| u.uid == user.uid || u.email == user.email)
        {
            return Err(AppError::Database(DatabaseError::Duplicate(format!(
                "user {} or {} already registered",
                user.uid, user.email
            ))));
        }
        storage.push(user.clone());
        Ok(user.clone())
    }

    async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        self.check_should_fail()?;
        Ok(self
            .storage
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.uid == uid)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.check_should_fail()?;
        Ok(self.get_all_users())
    }
}

/// Mock object storage keeping objects in memory.
///
/// Puts and deletes can be made to fail independently so that the
/// compensation paths of the workflows can be exercised.
pub struct MockObjectStorage {
    objects: Arc<Mutex<HashMap<String, (Bytes, String)>>>,
    base_url: String,
    put_count: AtomicU64,
    delete_count: AtomicU64,
    is_healthy: AtomicBool,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockObjectStorage {
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            base_url: "https://photos.test".to_string(),
            put_count: AtomicU64::new(0),
            delete_count: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
            fail_puts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::Relaxed);
    }

    /// Number of `put` calls, successful or not.
    pub fn put_count(&self) -> u64 {
        self.put_count.load(Ordering::Relaxed)
    }

    /// Number of `delete` calls, successful or not.
    pub fn delete_count(&self) -> u64 {
        self.delete_count.load(Ordering::Relaxed)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn object_keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Content type recorded for `key`.
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, content_type)| content_type.clone())
    }
}

impl Default for MockObjectStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Storage(StorageError::Connection(
                "Mock storage unhealthy".to_string(),
            )));
        }
        Ok(())
    }

    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String, AppError> {
        self.put_count.fetch_add(1, Ordering::Relaxed);
        if self.fail_puts.load(Ordering::Relaxed) {
            return Err(AppError::Storage(StorageError::Write(
                "Mock put failure".to_string(),
            )));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(format!("{}/{}", self.base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.delete_count.fetch_add(1, Ordering::Relaxed);
        if self.fail_deletes.load(Ordering::Relaxed) {
            return Err(AppError::Storage(StorageError::Delete(
                "Mock delete failure".to_string(),
            )));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Mock credential verifier with a fixed token table.
///
/// Tokens of the form `test-token-{uid}` are accepted for any uid, which
/// keeps HTTP tests readable.
pub struct MockCredentialVerifier {
    tokens: Mutex<HashMap<String, CallerIdentity>>,
}

impl MockCredentialVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Registers an explicit token.
    pub fn insert(&self, token: impl Into<String>, identity: CallerIdentity) {
        self.tokens.lock().unwrap().insert(token.into(), identity);
    }

    /// The token accepted for `uid`.
    pub fn token_for(uid: &str) -> String {
        format!("test-token-{uid}")
    }
}

impl Default for MockCredentialVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialVerifier for MockCredentialVerifier {
    async fn verify(&self, token: &str) -> Result<CallerIdentity, AppError> {
        if let Some(identity) = self.tokens.lock().unwrap().get(token) {
            return Ok(identity.clone());
        }
        match token.strip_prefix("test-token-") {
            Some(uid) if !uid.is_empty() => Ok(CallerIdentity::new(uid)),
            _ => Err(AppError::Authentication("invalid token".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_item() -> NewItem {
        let now = Utc::now();
        NewItem {
            title: "Chair".to_string(),
            description: "Sturdy".to_string(),
            price: 20.0,
            category: "Furniture".to_string(),
            photo: None,
            sold: false,
            used_duration: "1 year".to_string(),
            uploaded_by: "Sam".to_string(),
            user_id: "u1".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_mock_items_insert_and_get() {
        let mock = MockItemRepository::new();

        let created = mock.insert_item(&new_item()).await.unwrap();
        assert_eq!(created.title, "Chair");

        let fetched = mock.get_item(&created.id).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn test_mock_items_failure() {
        let mock = MockItemRepository::with_config(MockConfig::failure("Connection timeout"));

        match mock.insert_item(&new_item()).await {
            Err(AppError::Database(DatabaseError::Query(msg))) => {
                assert_eq!(msg, "Connection timeout")
            }
            other => panic!("expected query error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mock_items_fail_inserts_only() {
        let mock = MockItemRepository::new();
        mock.set_fail_inserts(true);

        assert!(mock.insert_item(&new_item()).await.is_err());
        assert!(mock.list_items(&ItemFilter::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_items_call_count() {
        let mock = MockItemRepository::new();
        assert_eq!(mock.call_count(), 0);

        let _ = mock.health_check().await;
        assert_eq!(mock.call_count(), 1);

        let _ = mock.get_item("test").await;
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_users_enforce_uniqueness() {
        let mock = MockUserRepository::new();
        let user = User {
            uid: "u1".to_string(),
            name: "Sam".to_string(),
            email: "sam@mavs.uta.edu".to_string(),
            phone_number: "8175550100".to_string(),
            avatar: None,
            created_at: Utc::now(),
        };

        mock.insert_user(&user).await.unwrap();

        let mut same_email = user.clone();
        same_email.uid = "u2".to_string();
        assert!(matches!(
            mock.insert_user(&same_email).await,
            Err(AppError::Database(DatabaseError::Duplicate(_)))
        ));
        assert_eq!(mock.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_users_failure() {
        let mock = MockUserRepository::with_config(MockConfig::failure("Replica set down"));

        assert!(matches!(
            mock.list_users().await,
            Err(AppError::Database(DatabaseError::Query(msg))) if msg == "Replica set down"
        ));
    }

    #[tokio::test]
    async fn test_mock_storage_put_and_delete() {
        let mock = MockObjectStorage::new();

        let url = mock
            .put("photos/a.jpg", Bytes::from_static(b"jpeg"), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "https://photos.test/photos/a.jpg");
        assert_eq!(mock.content_type("photos/a.jpg").as_deref(), Some("image/jpeg"));

        mock.delete("photos/a.jpg").await.unwrap();
        assert!(!mock.contains("photos/a.jpg"));
        assert_eq!(mock.put_count(), 1);
        assert_eq!(mock.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_storage_failures() {
        let mock = MockObjectStorage::new();
        mock.set_fail_puts(true);
        assert!(mock.put("k", Bytes::new(), "image/png").await.is_err());
        assert!(mock.object_keys().is_empty());

        mock.set_fail_deletes(true);
        assert!(mock.delete("k").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_verifier() {
        let mock = MockCredentialVerifier::new();
        mock.insert("admin", CallerIdentity::new("root").with_email("root@mavs.uta.edu"));

        let caller = mock
            .verify(&MockCredentialVerifier::token_for("u123"))
            .await
            .unwrap();
        assert_eq!(caller.uid, "u123");

        let admin = mock.verify("admin").await.unwrap();
        assert_eq!(admin.email.as_deref(), Some("root@mavs.uta.edu"));

        assert!(mock.verify("garbage").await.is_err());
        assert!(mock.verify("test-token-").await.is_err());
    }
}
