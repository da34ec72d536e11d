//! Fixed bearer tokens for local development and test deployments.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::domain::{AppError, CallerIdentity, ConfigError, CredentialVerifier};

/// Constant-time comparison of two byte slices to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Maps configured tokens to identities.
///
/// Only SHA-256 digests of the tokens are kept, and every entry is compared
/// so lookup time does not depend on which token matched.
pub struct StaticTokenVerifier {
    entries: Vec<([u8; 32], CallerIdentity)>,
}

impl StaticTokenVerifier {
    pub fn new<I, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (T, CallerIdentity)>,
        T: AsRef<[u8]>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(token, identity)| (Sha256::digest(token.as_ref()).into(), identity))
                .collect(),
        }
    }

    /// Parses a comma separated `token:uid[:email]` list.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for entries without a token or uid,
    /// and for an empty list.
    pub fn parse(list: &str) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: "AUTH_STATIC_TOKENS".to_string(),
            message,
        };

        let mut entries = Vec::new();
        for (index, entry) in list.split(',').map(str::trim).enumerate() {
            if entry.is_empty() {
                continue;
            }
            let mut parts = entry.splitn(3, ':').map(str::trim);
            let token = parts.next().unwrap_or_default();
            let uid = parts.next().unwrap_or_default();
            if token.is_empty() || uid.is_empty() {
                return Err(invalid(format!(
                    "entry {} must look like token:uid[:email]",
                    index + 1
                )));
            }

            let identity = CallerIdentity::new(uid);
            let identity = match parts.next().filter(|e| !e.is_empty()) {
                Some(email) => identity.with_email(email),
                None => identity,
            };
            entries.push((token.to_string(), identity));
        }

        if entries.is_empty() {
            return Err(invalid("no tokens configured".to_string()));
        }
        Ok(Self::new(entries))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CredentialVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<CallerIdentity, AppError> {
        let provided = Sha256::digest(token.as_bytes());

        let mut matched = None;
        for (digest, identity) in &self.entries {
            if constant_time_eq(digest, provided.as_slice()) && matched.is_none() {
                matched = Some(identity);
            }
        }

        match matched {
            Some(identity) => Ok(identity.clone()),
            None => {
                warn!("Static token rejected");
                Err(AppError::Authentication("invalid token".to_string()))
            }
        }
    }
}
