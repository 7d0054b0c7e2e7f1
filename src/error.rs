//! Error taxonomy for the document store and chunking pipeline.
//!
//! Four conditions cover every failure surfaced by this crate:
//! [`Error::Validation`] and [`Error::NotFound`] are expected, recoverable
//! outcomes reported to the caller and never retried automatically.
//! [`Error::Persistence`] wraps backing-store failures; callers may retry
//! with backoff, this crate does not. [`Error::Configuration`] is fatal at
//! construction time — an invalid chunker or config never accepts work.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure conditions of store and pipeline operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field is missing or invalid on create.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced document or chunk does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration that would prevent forward progress.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The backing store failed during a read or write.
    #[error("persistence failure: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Persistence(Box::new(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Persistence(Box::new(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Persistence(Box::new(e))
    }
}
