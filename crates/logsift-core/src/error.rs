//! Error types for logsift

use std::sync::Arc;

/// Result type alias using logsift's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for logsift operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A defect inside a stage's own logic (e.g. malformed rule definition)
    #[error("stage error: {0}")]
    Stage(String),

    /// Network/timeout/non-success response from the fallback service
    #[error("external service error: {0}")]
    ExternalService(String),

    /// Cache storage tier unavailable or corrupted
    #[error("cache error: {0}")]
    Cache(String),

    /// Configuration errors, surfaced at startup validation
    #[error("configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("operation timed out")]
    Timeout,

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A failure propagated from a shared single-flight computation.
    /// All waiters on the same cache key observe the same underlying error.
    #[error("shared computation failed: {0}")]
    SharedCompute(Arc<Error>),
}

impl Error {
    /// Create a new stage error
    pub fn stage(msg: impl Into<String>) -> Self {
        Self::Stage(msg.into())
    }

    /// Create a new external-service error
    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    /// Create a new cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
