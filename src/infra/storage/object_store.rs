//! `object_store` backed photo storage.
//!
//! One adapter covers S3 in production, the local filesystem in development
//! and an in-memory store in tests.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ::object_store::{
    Attribute, Attributes, ObjectStore, PutOptions, PutPayload, aws::AmazonS3Builder,
    local::LocalFileSystem, memory::InMemory, path::Path,
};
use tracing::{debug, instrument};

use crate::domain::{AppError, ObjectStorage, StorageError};

/// Key probed by the health check. It is never written.
const HEALTH_PROBE_KEY: &str = "photos/.health-probe";

/// Photo storage on top of any [`ObjectStore`].
pub struct ObjectStoreStorage {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
    /// `LocalFileSystem` rejects puts that carry attributes.
    content_type_attributes: bool,
    backend: &'static str,
}

impl ObjectStoreStorage {
    /// Wraps an arbitrary store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into(),
            content_type_attributes: true,
            backend: "custom",
        }
    }

    /// S3 bucket, with credentials and region taken from the standard
    /// `AWS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the S3 client cannot be built.
    pub fn s3(bucket: &str, public_base_url: impl Into<String>) -> Result<Self, AppError> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Self {
            backend: "s3",
            ..Self::new(Arc::new(store), public_base_url)
        })
    }

    /// Directory on the local filesystem, created if missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the directory cannot be created
    /// or opened.
    pub fn local(
        dir: impl AsRef<std::path::Path>,
        public_base_url: impl Into<String>,
    ) -> Result<Self, AppError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            StorageError::Connection(format!("cannot create {}: {e}", dir.display()))
        })?;
        let store = LocalFileSystem::new_with_prefix(dir)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Self {
            content_type_attributes: false,
            backend: "local",
            ..Self::new(Arc::new(store), public_base_url)
        })
    }

    #[must_use]
    pub fn in_memory(public_base_url: impl Into<String>) -> Self {
        Self {
            backend: "memory",
            ..Self::new(Arc::new(InMemory::new()), public_base_url)
        }
    }

    /// Public location of the object stored under `key`.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }

    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    fn parse_key(key: &str) -> Result<Path, AppError> {
        Path::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()).into())
    }
}

#[async_trait]
impl ObjectStorage for ObjectStoreStorage {
    async fn health_check(&self) -> Result<(), AppError> {
        match self.store.head(&Path::from(HEALTH_PROBE_KEY)).await {
            Ok(_) | Err(::object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::Connection(e.to_string()).into()),
        }
    }

    #[instrument(skip(self, bytes), fields(backend = self.backend, size = bytes.len()))]
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String, AppError> {
        let path = Self::parse_key(key)?;

        let mut attributes = Attributes::new();
        if self.content_type_attributes {
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
        }
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&path, PutPayload::from(bytes), options)
            .await
            .map_err(StorageError::from)?;
        debug!(key = %key, "Object written");
        Ok(self.public_url(key))
    }

    #[instrument(skip(self), fields(backend = self.backend))]
    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = Self::parse_key(key)?;
        match self.store.delete(&path).await {
            Ok(()) | Err(::object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::Delete(e.to_string()).into()),
        }
    }
}
