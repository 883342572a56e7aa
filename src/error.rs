//! Error types for todovault
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad input, unknown record, bad configuration)
//! - 3: Blocked by policy (default group deletion, refused or throttled
//!   authentication)
//! - 4: Operation failed (storage fault, lock contention)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the todovault CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Message surfaced to external callers for storage faults.
pub const STORAGE_FAILURE_MESSAGE: &str = "storage failure";

/// Main error type for todovault operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // Policy blocks (exit code 3)
    #[error("The default group cannot be deleted")]
    DefaultGroupProtected,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Too many authentication attempts; retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // Operation failures (exit code 4)
    #[error("Storage unavailable at {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage document is corrupt at {path}: {source}")]
    StorageCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::StorageUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::Validation { .. }
            | Error::NotFound { .. }
            | Error::InvalidConfiguration(_)
            | Error::TomlParse(_) => exit_codes::USER_ERROR,

            // Policy blocks
            Error::DefaultGroupProtected
            | Error::AuthenticationFailed
            | Error::RateLimited { .. } => exit_codes::POLICY_BLOCKED,

            // Operation failures
            Error::StorageUnavailable { .. }
            | Error::StorageCorrupt { .. }
            | Error::LockFailed(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlSerialize(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// True for faults in the persistence layer, which are logged in full
    /// and reported to callers only generically.
    pub fn is_storage_fault(&self) -> bool {
        matches!(
            self,
            Error::StorageUnavailable { .. }
                | Error::StorageCorrupt { .. }
                | Error::LockFailed(_)
                | Error::Io(_)
                | Error::Json(_)
        )
    }

    /// Message that is safe to hand to an end user. Storage faults never
    /// reveal paths or parser detail.
    pub fn public_message(&self) -> String {
        if self.is_storage_fault() {
            STORAGE_FAILURE_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }

    /// Structured details for JSON output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::Validation { field, reason } => Some(serde_json::json!({
                "field": field,
                "reason": reason,
            })),
            Error::NotFound { kind, id } => Some(serde_json::json!({
                "kind": kind,
                "id": id,
            })),
            Error::InvalidConfiguration(message) => Some(serde_json::json!({
                "message": message,
            })),
            Error::RateLimited { retry_after_secs } => Some(serde_json::json!({
                "retryAfter": retry_after_secs,
            })),
            _ => None,
        }
    }
}

/// Result type alias for todovault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.public_message(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
