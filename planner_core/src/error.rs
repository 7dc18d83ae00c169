//! Error types for the planner_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification surfaced to callers alongside the message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    CapacityExceeded,
    Conflict,
    ValidationFailed,
    Internal,
}

/// Core error type for planner_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Caller identity does not own the target subtree
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Structural cap reached (sessions per day, letters per session)
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Target occupied, or a version check failed
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed input
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::CapacityExceeded(_) => ErrorKind::CapacityExceeded,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Error::Io(_)
            | Error::Json(_)
            | Error::Toml(_)
            | Error::Config(_)
            | Error::Internal(_) => ErrorKind::Internal,
        }
    }
}
