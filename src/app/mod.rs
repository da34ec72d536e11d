//! Application layer containing business logic and shared state.

pub mod keys;
pub mod service;
pub mod state;
pub mod submission;

pub use service::{AppService, DEFAULT_EMAIL_DOMAIN, ServiceSettings};
pub use state::AppState;
pub use submission::PhotoPolicy;
