//! MavsMart marketplace API
//!
//! Backend for a campus marketplace: students list items with a photo,
//! browse listings and remove their own. Listings and user profiles live in
//! MongoDB, photos in an object store, and callers are identified by
//! Firebase ID tokens.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   API Layer                  │
//! │   routing, bearer auth, multipart decoding   │
//! ├─────────────────────────────────────────────┤
//! │               Application Layer              │
//! │  submission workflow, ownership, user rules  │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │       traits, types, errors (no I/O)         │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │   MongoDB, object_store, Firebase, tracing   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The submission workflow writes the photo first and the record second.
//! When the record write fails the photo is deleted again, so a failed
//! submission leaves nothing behind in either store.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mavsmart_api::api::create_router;
//! use mavsmart_api::app::AppState;
//! use mavsmart_api::infra::{FirebaseTokenVerifier, MongoRepository, ObjectStoreStorage};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mongo = Arc::new(MongoRepository::connect(&uri, "mavsmart").await?);
//!     let storage = Arc::new(ObjectStoreStorage::local("./uploads", "/uploads")?);
//!     let verifier = Arc::new(FirebaseTokenVerifier::new("my-project")?);
//!
//!     let state = Arc::new(AppState::new(mongo.clone(), mongo, storage, verifier));
//!     let router = create_router(state);
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod infra;

// Test utilities are available in tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
