//! Document types.
//!
//! A **document** is a short text (typically a financial news snippet or an
//! analyst summary) together with its embedding. Documents are created once
//! by [`DocumentIndex::add_document`](crate::DocumentIndex::add_document) and
//! never updated or deleted; corrections are new documents.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StreamingFault;
use crate::types::{Embedding, RecordSeq, Timestamp};

/// Maximum content size in bytes (100 KB).
pub const MAX_CONTENT_SIZE: usize = 100 * 1024;

/// Where a document came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Analysis fetched from the Perplexity search API.
    Perplexity,
    /// Entered by an operator or script.
    #[default]
    Manual,
    /// Seed data loaded ahead of queries.
    Preload,
}

impl Source {
    /// Returns the lowercase name used in logs and rendered context.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Perplexity => "perplexity",
            Self::Manual => "manual",
            Self::Preload => "preload",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document admitted to the index.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Caller-supplied id. Non-empty, not necessarily unique.
    ///
    /// The same id is also the durable store tag used by `preload`.
    pub id: String,

    /// The document text.
    pub content: String,

    /// Embedding of `content`; always exactly the configured dimension.
    pub embedding: Embedding,

    /// Where the document came from.
    pub source: Source,

    /// When the document was admitted.
    pub timestamp: Timestamp,

    /// Durable store sequence of the system-of-record copy.
    pub seq: RecordSeq,
}

/// A best-effort side effect that failed without failing the operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexWarning {
    /// The streaming index did not accept the document. It is still
    /// durable and searchable through the local brute-force index.
    StreamingIngest {
        /// Id of the affected document.
        id: String,
        /// What went wrong.
        fault: StreamingFault,
    },
}

impl fmt::Display for IndexWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StreamingIngest { id, fault } => {
                write!(f, "streaming ingest of '{}' failed: {}", id, fault)
            }
        }
    }
}

/// Result of [`DocumentIndex::add_document`](crate::DocumentIndex::add_document).
#[derive(Clone, Debug)]
pub struct AddedDocument {
    /// The admitted document.
    pub document: Document,

    /// Best-effort failures observed while admitting it.
    pub warnings: Vec<IndexWarning>,
}

impl AddedDocument {
    /// Returns true if every backing index accepted the document.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
