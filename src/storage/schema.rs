//! Database schema definitions and versioning.
//!
//! All table definitions are compile-time constants to ensure consistency.
//!
//! # Schema Versioning
//!
//! The schema version is stored in the metadata table. When opening an
//! existing database, we check the version and fail if it doesn't match.
//!
//! # Table Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ METADATA_TABLE                                               │
//! │   Key: &str                                                  │
//! │   Value: &[u8] (bincode)                                     │
//! │   Entries: "db_metadata" -> DatabaseMetadata                 │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ RECORDS_TABLE                                                │
//! │   Key: u64 (RecordSeq, dense from 1)                         │
//! │   Value: &[u8] (bincode-serialized StoredRecord, no vector)  │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ EMBEDDINGS_TABLE                                             │
//! │   Key: u64 (RecordSeq)                                       │
//! │   Value: &[u8] (little-endian f32, dimension * 4 bytes)      │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ RECORDS_BY_TAG_TABLE (multimap)                              │
//! │   Key: &str (tag)                                            │
//! │   Values: u64 (RecordSeq), ascending                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use redb::{MultimapTableDefinition, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingDimension;
use crate::error::StorageError;
use crate::types::{Embedding, Timestamp};

/// Current schema version.
///
/// Increment this when making breaking changes to the schema.
/// The database will refuse to open if versions don't match.
pub const SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Table Definitions
// ============================================================================

/// Metadata table for database-level information.
pub const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Records table.
///
/// Key: RecordSeq
/// Value: bincode-serialized record body (without embedding)
pub const RECORDS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("records");

/// Embeddings table.
///
/// Stored separately from records to keep the main table compact.
pub const EMBEDDINGS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("embeddings");

/// Index: record sequences by tag.
///
/// Multimap values are kept sorted, so iterating a tag's values in reverse
/// yields its records newest first.
pub const RECORDS_BY_TAG_TABLE: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("records_by_tag");

// ============================================================================
// Database Metadata
// ============================================================================

/// Database metadata stored in the metadata table under `"db_metadata"`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// Schema version for compatibility checking.
    pub schema_version: u32,

    /// Embedding dimension configured for this database.
    ///
    /// Once set, this cannot be changed without recreating the database.
    pub embedding_dimension: EmbeddingDimension,

    /// Timestamp when the database was created.
    pub created_at: Timestamp,

    /// Last time the database was opened (updated on each open).
    pub last_opened_at: Timestamp,
}

impl DatabaseMetadata {
    /// Creates new metadata for a fresh database.
    pub fn new(embedding_dimension: EmbeddingDimension) -> Self {
        let now = Timestamp::now();
        Self {
            schema_version: SCHEMA_VERSION,
            embedding_dimension,
            created_at: now,
            last_opened_at: now,
        }
    }

    /// Updates the last_opened_at timestamp.
    pub fn touch(&mut self) {
        self.last_opened_at = Timestamp::now();
    }

    /// Checks if this metadata is compatible with the current schema.
    pub fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}

// ============================================================================
// Value Encoding Helpers
// ============================================================================

/// Encodes an embedding as little-endian f32 bytes.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decodes little-endian f32 bytes back into an embedding.
///
/// # Errors
///
/// Returns `StorageError::Corrupted` if the length is not a multiple of 4.
pub fn decode_embedding(bytes: &[u8]) -> Result<Embedding, StorageError> {
    if bytes.len() % 4 != 0 {
        return Err(StorageError::corrupted(format!(
            "Embedding byte length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version() {
        assert_eq!(SCHEMA_VERSION, 1);
    }

    #[test]
    fn test_metadata_new() {
        let meta = DatabaseMetadata::new(EmbeddingDimension::D768);
        assert_eq!(meta.schema_version, SCHEMA_VERSION);
        assert_eq!(meta.embedding_dimension, EmbeddingDimension::D768);
        assert_eq!(meta.created_at, meta.last_opened_at);
        assert!(meta.is_compatible());
    }

    #[test]
    fn test_metadata_touch() {
        let mut meta = DatabaseMetadata::new(EmbeddingDimension::D384);
        let created = meta.created_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        meta.touch();
        assert!(meta.last_opened_at > created);
        assert_eq!(meta.created_at, created);
    }

    #[test]
    fn test_metadata_incompatible_version() {
        let mut meta = DatabaseMetadata::new(EmbeddingDimension::D384);
        meta.schema_version = SCHEMA_VERSION + 1;
        assert!(!meta.is_compatible());
    }

    #[test]
    fn test_embedding_encoding_is_little_endian() {
        let bytes = encode_embedding(&[1.0, -2.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_embedding(&bytes).unwrap(), vec![1.0, -2.5]);
    }

    #[test]
    fn test_decode_embedding_rejects_truncated_bytes() {
        let err = decode_embedding(&[0, 0, 128]).unwrap_err();
        assert!(matches!(err, StorageError::Corrupted(_)));
    }
}
