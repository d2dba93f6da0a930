//! Durable store abstractions.
//!
//! The durable store is the system of record: every admitted document is
//! written here first, and both in-memory indexes can be rebuilt from it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DocumentIndex                             │
//! │                         │                                    │
//! │                         ▼                                    │
//! │              ┌─────────────────────┐                        │
//! │              │   DocumentStore     │  ← Trait               │
//! │              └─────────────────────┘                        │
//! │                    ▲         ▲                              │
//! │                    │         │                              │
//! │          ┌────────┴──┐   ┌──┴──────────┐                   │
//! │          │ RedbStore │   │ MemoryStore │                   │
//! │          └───────────┘   └─────────────┘                   │
//! │            (prod)         (tests, ephemeral)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod memory;
pub mod redb;
pub mod schema;

pub use self::memory::MemoryStore;
pub use self::redb::RedbStore;
pub use schema::{DatabaseMetadata, SCHEMA_VERSION};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::document::Source;
use crate::error::Result;
use crate::types::{Embedding, RecordSeq, Timestamp};

/// A record about to be written.
#[derive(Clone, Debug, PartialEq)]
pub struct NewRecord {
    /// Grouping key. The facade uses the document id.
    pub tag: String,
    /// Document text.
    pub text: String,
    /// Document embedding.
    pub embedding: Embedding,
    /// Where the document came from.
    pub source: Source,
    /// Admission time.
    pub timestamp: Timestamp,
}

/// A record read back from the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Store-assigned sequence (the table key, not part of the body).
    #[serde(skip)]
    pub seq: RecordSeq,

    /// Grouping key.
    pub tag: String,

    /// Document text.
    pub text: String,

    /// Where the document came from.
    pub source: Source,

    /// Admission time.
    pub timestamp: Timestamp,

    /// Document embedding (stored in its own table).
    #[serde(skip)]
    pub embedding: Embedding,
}

impl StoredRecord {
    /// Builds the stored form of `record` under `seq`.
    pub fn from_new(seq: RecordSeq, record: &NewRecord) -> Self {
        Self {
            seq,
            tag: record.tag.clone(),
            text: record.text.clone(),
            source: record.source,
            timestamp: record.timestamp,
            embedding: record.embedding.clone(),
        }
    }
}

/// Durable store contract.
///
/// Writes are all-or-nothing: once `insert` returns `Ok`, the record is
/// visible to every subsequent read. Sequences are assigned densely starting
/// at [`RecordSeq::FIRST`].
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; they handle their own
/// synchronization.
pub trait DocumentStore: Send + Sync {
    /// Persists a record and returns its sequence.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Persistence` if the write could not be committed.
    fn insert(&self, record: &NewRecord) -> Result<RecordSeq>;

    /// Returns up to `limit` records with the given tag, newest first.
    fn query_recent(&self, tag: &str, limit: usize) -> Result<Vec<StoredRecord>>;

    /// Returns up to `limit` records of any tag, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>>;

    /// Returns the number of stored records.
    fn len(&self) -> Result<u64>;

    /// Returns true if no records are stored.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the backing file, if any.
    fn path(&self) -> Option<&Path>;

    /// Closes the store, flushing pending writes.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Opens the redb-backed store at `path`.
///
/// # Errors
///
/// See [`RedbStore::open`].
pub fn open_storage(path: impl AsRef<Path>, config: &Config) -> Result<Box<dyn DocumentStore>> {
    Ok(Box::new(RedbStore::open(path, config)?))
}
