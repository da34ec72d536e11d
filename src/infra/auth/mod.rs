//! Credential verifiers.

pub mod firebase;
pub mod static_tokens;

pub use firebase::FirebaseTokenVerifier;
pub use static_tokens::StaticTokenVerifier;
