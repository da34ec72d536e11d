//! Application error types with proper error chaining.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Query execution failed: {0}")]
    Query(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Duplicate record: {0}")]
    Duplicate(String),
    #[error("Index setup failed: {0}")]
    Index(String),
}

#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Object write failed: {0}")]
    Write(String),
    #[error("Object delete failed: {0}")]
    Delete(String),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<&str> for ConfigError {
    fn from(s: &str) -> Self {
        ConfigError::ParseError(s.to_string())
    }
}

/// Client-side input problems. Every variant is detected before any
/// storage write happens.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("Invalid price '{0}': must be a positive number")]
    InvalidPrice(String),
    #[error("A photo is required")]
    NoPhoto,
    #[error("Photo is empty")]
    EmptyPhoto,
    #[error("Unsupported photo type '{0}'")]
    UnsupportedPhotoType(String),
    #[error("Photo is {size} bytes, limit is {limit} bytes")]
    PhotoTooLarge { size: usize, limit: usize },
    #[error("Email domain must be '{0}'")]
    EmailDomain(String),
    #[error("Invalid fields {fields:?}: {message}")]
    InvalidFields { fields: Vec<String>, message: String },
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

impl ValidationError {
    /// Stable machine-readable code reported to clients.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingFields(_) => "MISSING_FIELDS",
            ValidationError::InvalidPrice(_) => "INVALID_PRICE",
            ValidationError::NoPhoto => "NO_PHOTO",
            ValidationError::EmptyPhoto => "EMPTY_PHOTO",
            ValidationError::UnsupportedPhotoType(_) => "INVALID_PHOTO_TYPE",
            ValidationError::PhotoTooLarge { .. } => "PHOTO_TOO_LARGE",
            ValidationError::EmailDomain(_) => "INVALID_EMAIL_DOMAIN",
            ValidationError::InvalidFields { .. } => "INVALID_FIELDS",
            ValidationError::MalformedRequest(_) => "MALFORMED_REQUEST",
        }
    }

    /// Names of the offending fields, when known.
    #[must_use]
    pub fn fields(&self) -> Vec<String> {
        match self {
            ValidationError::MissingFields(fields) => fields.clone(),
            ValidationError::InvalidPrice(_) => vec!["price".to_string()],
            ValidationError::NoPhoto
            | ValidationError::EmptyPhoto
            | ValidationError::UnsupportedPhotoType(_)
            | ValidationError::PhotoTooLarge { .. } => vec!["photo".to_string()],
            ValidationError::EmailDomain(_) => vec!["email".to_string()],
            ValidationError::InvalidFields { fields, .. } => fields.clone(),
            ValidationError::MalformedRequest(_) => Vec::new(),
        }
    }
}

/// `used_duration` -> `usedDuration`, matching the JSON and form names.
fn wire_field_name(field: &str) -> String {
    let mut name = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            name.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            name.push(c);
        }
    }
    name
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = err
            .field_errors()
            .keys()
            .map(|field| wire_field_name(field))
            .collect();
        fields.sort();
        ValidationError::InvalidFields {
            fields,
            message: err.to_string(),
        }
    }
}

impl From<&str> for ValidationError {
    fn from(s: &str) -> Self {
        ValidationError::MalformedRequest(s.to_string())
    }
}

/// Step of the item submission workflow at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStep {
    WritingObject,
    WritingRecord,
}

impl SubmissionStep {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStep::WritingObject => "writing_object",
            SubmissionStep::WritingRecord => "writing_record",
        }
    }
}

impl fmt::Display for SubmissionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Item submission failed while {step}: {source}")]
    Submission {
        step: SubmissionStep,
        #[source]
        source: Box<AppError>,
    },
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Authorization denied: {0}")]
    Authorization(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wraps a storage failure with the workflow step it happened in.
    #[must_use]
    pub fn at_step(self, step: SubmissionStep) -> Self {
        AppError::Submission {
            step,
            source: Box::new(self),
        }
    }

    /// The error underneath any `Submission` wrapping.
    #[must_use]
    pub fn root(&self) -> &AppError {
        match self {
            AppError::Submission { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(ValidationError::from(err))
    }
}

impl From<mongodb::error::Error> for DatabaseError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(write_err)) if write_err.code == 11000 => {
                DatabaseError::Duplicate(write_err.message.clone())
            }
            ErrorKind::ServerSelection { message, .. } => {
                DatabaseError::Connection(message.clone())
            }
            ErrorKind::Io(io_err) => DatabaseError::Connection(io_err.to_string()),
            _ => DatabaseError::Query(err.to_string()),
        }
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::Database(DatabaseError::from(err))
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::InvalidPath { source } => {
                StorageError::InvalidKey(source.to_string())
            }
            other => StorageError::Write(other.to_string()),
        }
    }
}
