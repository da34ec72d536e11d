//! Runtime configuration read from environment variables.
//!
//! `main` loads a `.env` file with `dotenvy` first, so every variable can
//! also be set there. Parsing goes through [`AppConfig::from_lookup`] so
//! tests can feed a map instead of mutating the process environment.

use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::api::RateLimitConfig;
use crate::app::{DEFAULT_EMAIL_DOMAIN, PhotoPolicy};
use crate::app::submission::{DEFAULT_MAX_PHOTO_BYTES, normalize_content_type};
use crate::domain::ConfigError;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_DATABASE: &str = "mavsmart";
pub const DEFAULT_LOCAL_STORAGE_DIR: &str = "./uploads";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "/uploads";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FIREBASE_KEYS_TTL_SECS: u64 = 3600;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected 'json' or 'pretty', got '{other}'")),
        }
    }
}

/// Where listing photos are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    S3 { bucket: String },
    Local { dir: PathBuf },
}

/// How bearer tokens are verified.
#[derive(Debug)]
pub enum AuthConfig {
    Firebase {
        project_id: String,
        keys_ttl: Duration,
    },
    /// `token:uid[:email]` list, for development only.
    Static { tokens: SecretString },
}

#[derive(Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub mongodb_uri: SecretString,
    pub mongodb_database: String,
    pub storage: StorageConfig,
    pub photo_public_base_url: String,
    pub auth: AuthConfig,
    pub photo_policy: PhotoPolicy,
    pub email_domain: String,
    pub rate_limit: RateLimitConfig,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
    pub metrics_enabled: bool,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first missing or malformed variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration from `lookup`. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first missing or malformed variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let storage = match env.get("STORAGE_BACKEND").as_deref().unwrap_or("local") {
            "s3" => StorageConfig::S3 {
                bucket: env.require("S3_BUCKET")?,
            },
            "local" => StorageConfig::Local {
                dir: PathBuf::from(env.get_or("LOCAL_STORAGE_DIR", DEFAULT_LOCAL_STORAGE_DIR)),
            },
            other => {
                return Err(invalid(
                    "STORAGE_BACKEND",
                    format!("expected 's3' or 'local', got '{other}'"),
                ));
            }
        };

        let photo_public_base_url = match (&storage, env.get("PHOTO_PUBLIC_BASE_URL")) {
            (_, Some(url)) => url,
            (StorageConfig::S3 { bucket }, None) => format!("https://{bucket}.s3.amazonaws.com"),
            (StorageConfig::Local { .. }, None) => DEFAULT_PUBLIC_BASE_URL.to_string(),
        };

        let auth = match env.get("AUTH_BACKEND").as_deref().unwrap_or("firebase") {
            "firebase" => AuthConfig::Firebase {
                project_id: env.require("FIREBASE_PROJECT_ID")?,
                keys_ttl: Duration::from_secs(
                    env.parse_or("FIREBASE_KEYS_TTL_SECS", DEFAULT_FIREBASE_KEYS_TTL_SECS)?,
                ),
            },
            "static" => AuthConfig::Static {
                tokens: SecretString::from(env.require("AUTH_STATIC_TOKENS")?),
            },
            other => {
                return Err(invalid(
                    "AUTH_BACKEND",
                    format!("expected 'firebase' or 'static', got '{other}'"),
                ));
            }
        };

        let defaults = PhotoPolicy::default();
        let allowed_content_types = match env.get("PHOTO_ALLOWED_TYPES") {
            Some(list) => parse_content_types(&list)?,
            None => defaults.allowed_content_types,
        };
        let photo_policy = PhotoPolicy {
            required: env.parse_bool_or("PHOTO_REQUIRED", defaults.required)?,
            max_bytes: env.parse_or("PHOTO_MAX_BYTES", DEFAULT_MAX_PHOTO_BYTES)?,
            allowed_content_types,
        };
        if photo_policy.max_bytes == 0 {
            return Err(invalid("PHOTO_MAX_BYTES", "must be greater than zero"));
        }

        let rate_defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            general_rps: env.parse_or("RATE_LIMIT_RPS", rate_defaults.general_rps)?,
            general_burst: env.parse_or("RATE_LIMIT_BURST", rate_defaults.general_burst)?,
            trust_proxy_headers: env
                .parse_bool_or("TRUST_PROXY_HEADERS", rate_defaults.trust_proxy_headers)?,
            ..rate_defaults
        };

        let request_timeout_secs: u64 =
            env.parse_or("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        if request_timeout_secs == 0 {
            return Err(invalid("REQUEST_TIMEOUT_SECS", "must be greater than zero"));
        }

        Ok(Self {
            bind_addr: env.parse_or("BIND_ADDR", parse_default(DEFAULT_BIND_ADDR)?)?,
            mongodb_uri: SecretString::from(env.require("MONGODB_URI")?),
            mongodb_database: env.get_or("MONGODB_DATABASE", DEFAULT_DATABASE),
            storage,
            photo_public_base_url,
            auth,
            photo_policy,
            email_domain: env
                .get_or("ALLOWED_EMAIL_DOMAIN", DEFAULT_EMAIL_DOMAIN)
                .trim_start_matches('@')
                .to_ascii_lowercase(),
            rate_limit,
            request_timeout: Duration::from_secs(request_timeout_secs),
            log_format: env.parse_or("LOG_FORMAT", LogFormat::Pretty)?,
            metrics_enabled: env.parse_bool_or("METRICS_ENABLED", true)?,
        })
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse_default<T: FromStr>(value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::ParseError(format!("bad built-in default '{value}'")))
}

fn parse_content_types(list: &str) -> Result<Vec<String>, ConfigError> {
    let types: Vec<String> = list
        .split(',')
        .map(normalize_content_type)
        .filter(|t| !t.is_empty())
        .collect();

    if let Some(bad) = types.iter().find(|t| !t.contains('/')) {
        return Err(invalid(
            "PHOTO_ALLOWED_TYPES",
            format!("'{bad}' is not a content type"),
        ));
    }
    if types.is_empty() {
        return Err(invalid("PHOTO_ALLOWED_TYPES", "list is empty"));
    }
    Ok(types)
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn require(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, e.to_string())),
            None => Ok(default),
        }
    }

    fn parse_bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key).map(|v| v.to_ascii_lowercase()).as_deref() {
            None => Ok(default),
            Some("true" | "1" | "yes" | "on") => Ok(true),
            Some("false" | "0" | "no" | "off") => Ok(false),
            Some(other) => Err(invalid(key, format!("expected a boolean, got '{other}'"))),
        }
    }
}
