//! Core error types for intervalkit-core.
//!
//! Most engine entry points are infallible by contract: storage, decode and
//! effect failures are logged and recovered from. These types describe what
//! went wrong on the inner paths that feed those recoveries.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for intervalkit-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Key-value store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Audio/flash effect errors
    #[error("Effect error: {0}")]
    Effect(#[from] EffectError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a [`KeyValueStore`](crate::storage::KeyValueStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store cannot be read or written at all
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Writing the value would exceed the store's quota
    #[error("Quota exceeded writing '{key}' ({bytes} bytes)")]
    QuotaExceeded { key: String, bytes: usize },

    /// Failed to open the SQLite database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked by another writer
    #[error("Store is locked")]
    Locked,
}

impl StoreError {
    /// Whether this failure means the store as a whole is gone, as opposed to
    /// a single rejected write.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::OpenFailed { .. }
        )
    }
}

/// Audio/flash/vibration effect errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    /// The output device or API does not exist
    #[error("Effect '{0}' unavailable")]
    Unavailable(&'static str),

    /// The output exists but refused to play
    #[error("Effect '{effect}' blocked: {reason}")]
    Blocked { effect: &'static str, reason: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Why a stored record was replaced by its kind's default.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    #[error("record is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("schema version {found:?} does not match expected {expected}")]
    VersionMismatch { found: Option<u64>, expected: u32 },

    #[error("record kind '{found}' does not match expected '{expected}'")]
    KindMismatch { found: String, expected: String },

    #[error("untagged record shape does not fit kind '{0}'")]
    UnrecognizedShape(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
