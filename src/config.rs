//! Configuration types for the document index.
//!
//! The [`Config`] struct controls index behavior including:
//! - Embedding provider (feature hashing or builtin ONNX)
//! - Embedding dimension (384, 768, or custom)
//! - Streaming index timeout and supported query shapes
//! - Durability of the redb store
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use newsindex::{Config, EmbeddingDimension, StreamingConfig, SyncMode};
//!
//! // Use defaults (hashing provider, 384 dimensions, streaming enabled)
//! let config = Config::default();
//!
//! // Customize for production
//! let config = Config {
//!     embedding_dimension: EmbeddingDimension::D768,
//!     streaming: StreamingConfig {
//!         query_timeout: Duration::from_millis(100),
//!         ..Default::default()
//!     },
//!     sync_mode: SyncMode::Paranoid,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Upper bound for custom embedding dimensions.
pub const MAX_DIMENSION: usize = 4096;

/// Index configuration options.
///
/// All fields have sensible defaults. Use struct update syntax to override
/// specific settings.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// How embeddings are generated.
    pub embedding_provider: EmbeddingProvider,

    /// Embedding vector dimension (must match provider output).
    pub embedding_dimension: EmbeddingDimension,

    /// Streaming index settings.
    pub streaming: StreamingConfig,

    /// Durability mode for durable store writes.
    pub sync_mode: SyncMode,
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a Config for builtin ONNX embedding generation.
    ///
    /// This requires the `builtin-embeddings` feature to be enabled.
    pub fn with_builtin_embeddings() -> Self {
        Self {
            embedding_provider: EmbeddingProvider::Builtin { model_path: None },
            ..Default::default()
        }
    }

    /// Creates a Config that never consults the streaming index.
    ///
    /// Every search is answered by the local brute-force index.
    pub fn without_streaming() -> Self {
        Self {
            streaming: StreamingConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// Called automatically by `DocumentIndex::open()`.
    ///
    /// # Errors
    /// Returns `ValidationError` if:
    /// - Custom dimension is 0 or > 4096
    /// - Streaming query timeout is zero
    /// - Streaming `max_query_k` is zero
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let EmbeddingDimension::Custom(dim) = self.embedding_dimension {
            if dim == 0 {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    "custom dimension must be greater than 0",
                ));
            }
            if dim > MAX_DIMENSION {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    format!("custom dimension must not exceed {}", MAX_DIMENSION),
                ));
            }
        }

        self.streaming.validate()
    }

    /// Returns the embedding dimension as a numeric value.
    pub fn dimension(&self) -> usize {
        self.embedding_dimension.size()
    }
}

/// Embedding provider configuration.
#[derive(Clone, Debug, Default)]
pub enum EmbeddingProvider {
    /// Deterministic feature-hashing embedder.
    ///
    /// Needs no model files. Texts sharing tokens score higher; useful for
    /// development, tests and keyword-heavy corpora.
    #[default]
    Hashing,

    /// Embeddings generated by a built-in ONNX model.
    ///
    /// Requires the `builtin-embeddings` feature. The default model is
    /// bge-small-en-v1.5 (384 dimensions).
    Builtin {
        /// Custom model directory. If `None`, uses the model cache.
        model_path: Option<PathBuf>,
    },
}

impl EmbeddingProvider {
    /// Returns true if this is the builtin provider.
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin { .. })
    }

    /// Returns true if this is the hashing provider.
    pub fn is_hashing(&self) -> bool {
        matches!(self, Self::Hashing)
    }
}

/// Embedding vector dimensions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingDimension {
    /// 384 dimensions (bge-small-en-v1.5, the reference deployment).
    #[default]
    D384,

    /// 768 dimensions (bge-base-en-v1.5).
    D768,

    /// Custom dimension for other embedding models.
    ///
    /// Must be between 1 and 4096.
    Custom(usize),
}

impl EmbeddingDimension {
    /// Returns the numeric size of this dimension.
    ///
    /// # Example
    /// ```rust
    /// use newsindex::EmbeddingDimension;
    ///
    /// assert_eq!(EmbeddingDimension::D384.size(), 384);
    /// assert_eq!(EmbeddingDimension::Custom(1536).size(), 1536);
    /// ```
    #[inline]
    pub const fn size(&self) -> usize {
        match self {
            Self::D384 => 384,
            Self::D768 => 768,
            Self::Custom(n) => *n,
        }
    }
}

/// Streaming index settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamingConfig {
    /// Whether the streaming index is consulted at all.
    ///
    /// When disabled, every query reports the streaming path as unsupported
    /// and is answered by the local brute-force index.
    pub enabled: bool,

    /// Upper bound for a single streaming query, including the forced flush
    /// of pending ingestion. Exceeding it counts as a transient failure.
    ///
    /// Default: 250 ms
    pub query_timeout: Duration,

    /// Largest `k` the streaming index accepts. Larger requests are an
    /// unsupported query shape.
    ///
    /// Default: 1000
    pub max_query_k: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            query_timeout: Duration::from_millis(250),
            max_query_k: 1000,
        }
    }
}

impl StreamingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.query_timeout.is_zero() {
            return Err(ValidationError::invalid_field(
                "streaming.query_timeout",
                "must be greater than 0",
            ));
        }
        if self.max_query_k == 0 {
            return Err(ValidationError::invalid_field(
                "streaming.max_query_k",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Durability mode for durable store writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Sync to disk on transaction commit.
    ///
    /// This is the default. Committed records survive crashes.
    #[default]
    Normal,

    /// Commit without fsync (faster writes, may lose recent records on crash).
    Fast,

    /// Commit with two-phase durability (slowest, maximum safety).
    Paranoid,
}

impl SyncMode {
    /// Returns true if this mode uses two-phase commits.
    pub fn is_paranoid(&self) -> bool {
        matches!(self, Self::Paranoid)
    }

    /// Returns true if this mode may lose data on crash.
    pub fn is_fast(&self) -> bool {
        matches!(self, Self::Fast)
    }
}
