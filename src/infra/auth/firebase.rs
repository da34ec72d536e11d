//! Firebase ID token verification.
//!
//! Tokens are RS256 JWTs signed by Google. The public keys are published as
//! a JWK set and rotate regularly, so they are cached for a bounded time and
//! re-fetched whenever a token names a key id the cache does not know. Fetches
//! are at least [`MIN_KEYS_REFRESH`] apart, so tokens carrying made-up key ids
//! cannot make every request hit Google.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, jwk::Jwk, jwk::JwkSet};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::domain::{AppError, CallerIdentity, CredentialVerifier};

pub const GOOGLE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

pub const DEFAULT_KEYS_TTL: Duration = Duration::from_secs(3600);

/// Minimum time between two fetches of the key set.
pub const MIN_KEYS_REFRESH: Duration = Duration::from_secs(60);

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Claims read from a Firebase ID token.
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

#[derive(Default)]
struct KeyCache {
    current: Option<CachedKeys>,
    /// Start of the last fetch, successful or not.
    last_attempt: Option<Instant>,
}

impl KeyCache {
    fn fresh_key(&self, kid: &str, ttl: Duration) -> Option<Jwk> {
        self.current
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < ttl)
            .and_then(|c| c.keys.find(kid).cloned())
    }
}

/// Verifies Firebase ID tokens for one project.
pub struct FirebaseTokenVerifier {
    project_id: String,
    jwks_url: String,
    http: reqwest::Client,
    keys_ttl: Duration,
    min_refresh: Duration,
    cache: RwLock<KeyCache>,
}

fn rejected(reason: impl Into<String>) -> AppError {
    AppError::Authentication(reason.into())
}

impl FirebaseTokenVerifier {
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client cannot be built.
    pub fn new(project_id: impl Into<String>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            project_id: project_id.into(),
            jwks_url: GOOGLE_JWKS_URL.to_string(),
            http,
            keys_ttl: DEFAULT_KEYS_TTL,
            min_refresh: MIN_KEYS_REFRESH,
            cache: RwLock::new(KeyCache::default()),
        })
    }

    #[must_use]
    pub fn with_keys_ttl(mut self, ttl: Duration) -> Self {
        self.keys_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh = interval;
        self
    }

    #[must_use]
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = url.into();
        self
    }

    #[must_use]
    pub fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[self.issuer()]);
        validation
    }

    async fn cached_key(&self, kid: &str) -> Option<Jwk> {
        self.cache.read().await.fresh_key(kid, self.keys_ttl)
    }

    async fn fetch_keys(&self) -> Result<JwkSet, AppError> {
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AppError::Internal(format!("cannot fetch signing keys: {e}")))?;

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AppError::Internal(format!("invalid signing key set: {e}")))
    }

    async fn key_for(&self, kid: &str) -> Result<Jwk, AppError> {
        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }

        let mut cache = self.cache.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(key) = cache.fresh_key(kid, self.keys_ttl) {
            return Ok(key);
        }

        if cache
            .last_attempt
            .is_some_and(|at| at.elapsed() < self.min_refresh)
        {
            // Too soon to fetch again. Answer from whatever set we hold.
            return match &cache.current {
                Some(current) => current
                    .keys
                    .find(kid)
                    .cloned()
                    .ok_or_else(|| rejected("token signed with an unknown key")),
                None => Err(AppError::Internal(
                    "signing keys unavailable, retrying shortly".to_string(),
                )),
            };
        }

        cache.last_attempt = Some(Instant::now());
        let keys = self.fetch_keys().await?;
        debug!(count = keys.keys.len(), "Refreshed Firebase signing keys");
        let key = keys.find(kid).cloned();
        cache.current = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });

        key.ok_or_else(|| rejected("token signed with an unknown key"))
    }
}

#[async_trait]
impl CredentialVerifier for FirebaseTokenVerifier {
    #[instrument(skip_all)]
    async fn verify(&self, token: &str) -> Result<CallerIdentity, AppError> {
        let header = decode_header(token).map_err(|e| rejected(format!("malformed token: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(rejected(format!("unexpected algorithm {:?}", header.alg)));
        }
        let kid = header.kid.ok_or_else(|| rejected("token has no key id"))?;

        let jwk = self.key_for(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| AppError::Internal(format!("unusable signing key {kid}: {e}")))?;

        let data = decode::<FirebaseClaims>(token, &key, &self.validation()).map_err(|e| {
            warn!(error = %e, "Firebase token rejected");
            rejected(e.to_string())
        })?;

        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(rejected("token has an empty subject"));
        }

        let identity = CallerIdentity::new(claims.sub);
        Ok(match claims.email {
            Some(email) => identity.with_email(email),
            None => identity,
        })
    }
}
