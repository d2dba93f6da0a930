//! Error types for the document index.
//!
//! The index uses a hierarchical error system:
//! - `IndexError` is the top-level error returned by all public APIs
//! - Specific error types (`StorageError`, `ValidationError`) provide detail
//! - `StreamingFault` describes streaming-path failures; the facade absorbs
//!   them and never returns them to callers
//!
//! # Propagation
//!
//! Failures of the system-of-record write ([`IndexError::Persistence`]) and of
//! the embedding step ([`IndexError::Embedding`]) reach the caller. Failures
//! of the best-effort streaming path are reported as warnings and logs only.
//!
//! ```rust,ignore
//! use newsindex::{Config, DocumentIndex, Result, Source};
//!
//! fn example() -> Result<()> {
//!     let index = DocumentIndex::open("./news.db", Config::default())?;
//!     index.add_document("AAPL", "Apple beats estimates", Source::Manual)?;
//!     index.close()?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use thiserror::Error;

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Top-level error enum for all index operations.
///
/// This is the only error type returned by public APIs.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The durable store write or read failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),

    /// Input validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The embedding provider failed to produce a usable vector.
    #[error("Embedding error: {0}")]
    Embedding(String),
}

impl IndexError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates an embedding error with the given message.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Returns true if the durable store failed.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if the embedding provider failed.
    pub fn is_embedding(&self) -> bool {
        matches!(self, Self::Embedding(_))
    }

    /// Returns true if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

/// Storage-related errors.
///
/// These errors indicate problems with the durable store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database file or data is corrupted.
    #[error("Database corrupted: {0}")]
    Corrupted(String),

    /// Database is locked by another process.
    #[error("Database is locked by another writer")]
    DatabaseLocked,

    /// Transaction failed (commit, rollback, etc.).
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from the redb storage engine.
    #[error("Storage engine error: {0}")]
    Redb(String),

    /// The store cannot accept writes right now (closed, unreachable).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Database schema version doesn't match expected version.
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version.
        expected: u32,
        /// Actual schema version found in database.
        found: u32,
    },
}

impl StorageError {
    /// Creates a corruption error with the given message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a serialization error with the given message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates an unavailable error with the given message.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

// Conversions from redb error types
impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::Transaction(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::Transaction(format!("Commit failed: {}", err))
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        StorageError::Redb(format!("Table error: {}", err))
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        StorageError::Redb(format!("Storage error: {}", err))
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// Direct conversions to IndexError so storage code can use `?` on redb calls
impl From<redb::Error> for IndexError {
    fn from(err: redb::Error) -> Self {
        IndexError::Persistence(StorageError::from(err))
    }
}

impl From<redb::DatabaseError> for IndexError {
    fn from(err: redb::DatabaseError) -> Self {
        IndexError::Persistence(StorageError::from(err))
    }
}

impl From<redb::TransactionError> for IndexError {
    fn from(err: redb::TransactionError) -> Self {
        IndexError::Persistence(StorageError::from(err))
    }
}

impl From<redb::CommitError> for IndexError {
    fn from(err: redb::CommitError) -> Self {
        IndexError::Persistence(StorageError::from(err))
    }
}

impl From<redb::TableError> for IndexError {
    fn from(err: redb::TableError) -> Self {
        IndexError::Persistence(StorageError::from(err))
    }
}

impl From<redb::StorageError> for IndexError {
    fn from(err: redb::StorageError) -> Self {
        IndexError::Persistence(StorageError::from(err))
    }
}

impl From<bincode::Error> for IndexError {
    fn from(err: bincode::Error) -> Self {
        IndexError::Persistence(StorageError::from(err))
    }
}

/// Validation errors for input data.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Embedding dimension doesn't match the configured dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Actual dimension provided.
        got: usize,
    },

    /// A field has an invalid value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// Content exceeds maximum allowed size.
    #[error("Content too large: {size} bytes (max: {max} bytes)")]
    ContentTooLarge {
        /// Actual content size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },

    /// A required field is missing or empty.
    #[error("Required field missing: {field}")]
    RequiredField {
        /// Name of the missing field.
        field: String,
    },
}

impl ValidationError {
    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a content too large error.
    pub fn content_too_large(size: usize, max: usize) -> Self {
        Self::ContentTooLarge { size, max }
    }

    /// Creates a required field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }
}

/// Runtime faults of the streaming index.
///
/// Every fault sends the facade down the fallback path. None of them is
/// returned from [`DocumentIndex`](crate::DocumentIndex) methods.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StreamingFault {
    /// The query did not complete within the configured timeout.
    #[error("Streaming query timed out after {0:?}")]
    Timeout(Duration),

    /// The pipeline worker is gone (shut down or panicked).
    #[error("Streaming pipeline disconnected")]
    Disconnected,

    /// Any other runtime fault.
    #[error("Streaming pipeline fault: {0}")]
    Internal(String),
}

impl StreamingFault {
    /// Creates an internal fault with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
