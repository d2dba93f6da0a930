//! # newsindex
//!
//! Embedding-backed document index for financial news retrieval.
//!
//! `newsindex` accepts short text documents (news snippets, analyst
//! summaries), embeds them into dense vectors, and answers top-k similarity
//! queries for retrieval-augmented generation. Every query has a guaranteed
//! exact answer: when the streaming index is unavailable, stale, or cannot
//! serve the query shape, the local brute-force index answers instead.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use newsindex::{Config, DocumentIndex, Source};
//!
//! // Open or create an index backed by a redb file
//! let index = DocumentIndex::open("./news.db", Config::default())?;
//!
//! // Warm the in-memory indexes from the durable store
//! index.preload("ACME", 50)?;
//!
//! // Admit a document
//! index.add_document("ACME", "Company X faces fraud probe", Source::Perplexity)?;
//!
//! // Retrieve context for a prompt
//! let context = index.context("fraud investigation", 5)?;
//! println!("{}", context);
//!
//! index.close()?;
//! # Ok::<(), newsindex::IndexError>(())
//! ```
//!
//! ## Key Concepts
//!
//! ### Durable store
//!
//! The append-only system of record ([`storage::DocumentStore`], redb by
//! default). A document is admitted only once it is durably written.
//!
//! ### Local brute-force index
//!
//! An exact cosine index ([`vector::FlatIndex`]) that every admitted
//! document enters before `add_document` returns.
//!
//! ### Streaming index
//!
//! An asynchronously materialized index ([`vector::StreamingIndex`]). It is
//! preferred for queries but never trusted for correctness.
//!
//! ## Features
//!
//! - `builtin-embeddings` - Enable built-in ONNX embedding generation
//!   (bge-small-en-v1.5 by default)
//!
//! ## Thread Safety
//!
//! [`DocumentIndex`] is `Send + Sync` and can be shared across threads using
//! `Arc`.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod config;
mod document;
mod error;
mod index;
mod types;

pub mod embedding;
pub mod search;
pub mod storage;

/// In-memory vector indexes: exact brute force and streaming.
pub mod vector;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main index interface
pub use index::DocumentIndex;

// Configuration
pub use config::{
    Config, EmbeddingDimension, EmbeddingProvider, StreamingConfig, SyncMode, MAX_DIMENSION,
};

// Error handling
pub use error::{IndexError, Result, StorageError, StreamingFault, ValidationError};

// Core types
pub use types::{Embedding, RecordSeq, Timestamp};

// Documents
pub use document::{AddedDocument, Document, IndexWarning, Source, MAX_CONTENT_SIZE};

// Search
pub use search::{FallbackReason, SearchOutcome, SearchPath, SearchResult};

// Storage (for advanced users)
pub use storage::{DatabaseMetadata, StoredRecord};

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common usage.
///
/// ```rust
/// use newsindex::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{Config, EmbeddingDimension, SyncMode};
    pub use crate::document::{AddedDocument, Source};
    pub use crate::error::{IndexError, Result};
    pub use crate::index::DocumentIndex;
    pub use crate::search::SearchResult;
}
