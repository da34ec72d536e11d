//! Infrastructure layer implementations.

pub mod auth;
pub mod database;
pub mod observability;
pub mod storage;

pub use auth::{FirebaseTokenVerifier, StaticTokenVerifier};
pub use database::MongoRepository;
pub use storage::ObjectStoreStorage;
