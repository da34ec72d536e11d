//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{
    AppError, ConfigError, DatabaseError, StorageError, SubmissionStep, ValidationError,
};
pub use traits::{CredentialVerifier, ItemRepository, ObjectStorage, UserRepository};
pub use types::{
    CallerIdentity, CreateUserRequest, DeleteItemResponse, EntityId, ErrorDetail, ErrorResponse,
    HealthResponse, HealthStatus, Item, ItemFilter, ItemSubmission, NewItem, Photo, PhotoUpload,
    RateLimitResponse, SetSoldRequest, SubmissionState, User,
};
