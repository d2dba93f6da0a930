//! redb storage engine implementation.
//!
//! This module provides the durable store for the index using
//! [redb](https://docs.rs/redb), a pure Rust embedded key-value store.
//!
//! # Features
//!
//! - ACID transactions with MVCC
//! - Single-writer, multiple-reader concurrency
//! - Automatic crash recovery
//!
//! # File Layout
//!
//! When you open a store at `./news.db`, redb creates:
//! - `./news.db` - Main database file
//! - `./news.db.lock` - Lock file for writer coordination (may not be visible)

use std::path::{Path, PathBuf};

use ::redb::{Database, Durability, ReadOnlyTable, ReadableTable, WriteTransaction};
use tracing::{debug, info, instrument, warn};

use super::schema::{
    decode_embedding, encode_embedding, DatabaseMetadata, EMBEDDINGS_TABLE, METADATA_TABLE,
    RECORDS_BY_TAG_TABLE, RECORDS_TABLE, SCHEMA_VERSION,
};
use super::{DocumentStore, NewRecord, StoredRecord};
use crate::config::{Config, EmbeddingDimension, SyncMode};
use crate::error::{IndexError, Result, StorageError, ValidationError};
use crate::types::RecordSeq;

/// Metadata key in the metadata table.
const METADATA_KEY: &str = "db_metadata";

type BytesTable = ReadOnlyTable<u64, &'static [u8]>;

/// redb-backed durable store.
///
/// Holds the redb database handle and cached metadata.
///
/// # Thread Safety
///
/// `RedbStore` is `Send + Sync`. redb handles internal synchronization
/// using MVCC for readers and exclusive locking for writers; concurrent
/// `insert` calls are serialized by redb's single writer.
#[derive(Debug)]
pub struct RedbStore {
    /// The redb database handle.
    db: Database,

    /// Cached database metadata.
    metadata: DatabaseMetadata,

    /// Durability applied to every write transaction.
    sync_mode: SyncMode,

    /// Path to the database file.
    path: PathBuf,
}

impl RedbStore {
    /// Opens or creates a store at the given path.
    ///
    /// If the file doesn't exist, it is created and initialized with the
    /// configured embedding dimension. If it exists, the configuration is
    /// validated against the stored metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database file is corrupted
    /// - The database is locked by another process
    /// - Schema version doesn't match
    /// - Embedding dimension doesn't match (for existing databases)
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use newsindex::{Config, storage::RedbStore};
    ///
    /// let store = RedbStore::open("./news.db", &Config::default())?;
    /// # Ok::<(), newsindex::IndexError>(())
    /// ```
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        let db_exists = path.exists();

        debug!(db_exists = db_exists, "Opening durable store");

        let db = Self::create_database(path)?;

        if db_exists {
            Self::open_existing(db, path.to_path_buf(), config)
        } else {
            Self::initialize_new(db, path.to_path_buf(), config)
        }
    }

    /// Creates the redb database handle.
    fn create_database(path: &Path) -> Result<Database> {
        // redb doesn't expose a typed error variant for lock conflicts, so
        // they are detected via the error message.
        let db = Database::create(path).map_err(|e| {
            if e.to_string().contains("locked") {
                StorageError::DatabaseLocked
            } else {
                StorageError::Redb(e.to_string())
            }
        })?;

        debug!("Database file opened successfully");
        Ok(db)
    }

    /// Initializes a new database with tables and metadata.
    #[instrument(skip(db, config), fields(path = %path.display()))]
    fn initialize_new(db: Database, path: PathBuf, config: &Config) -> Result<Self> {
        info!("Initializing new store");

        let metadata = DatabaseMetadata::new(config.embedding_dimension);

        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let metadata_bytes = bincode::serialize(&metadata)
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            meta_table.insert(METADATA_KEY, metadata_bytes.as_slice())?;

            // Tables are created on first open.
            let _ = write_txn.open_table(RECORDS_TABLE)?;
            let _ = write_txn.open_table(EMBEDDINGS_TABLE)?;
            let _ = write_txn.open_multimap_table(RECORDS_BY_TAG_TABLE)?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(
            schema_version = SCHEMA_VERSION,
            dimension = config.embedding_dimension.size(),
            "Store initialized"
        );

        Ok(Self {
            db,
            metadata,
            sync_mode: config.sync_mode,
            path,
        })
    }

    /// Opens and validates an existing database.
    #[instrument(skip(db, config), fields(path = %path.display()))]
    fn open_existing(db: Database, path: PathBuf, config: &Config) -> Result<Self> {
        info!("Opening existing store");

        let read_txn = db.begin_read().map_err(StorageError::from)?;
        let metadata = {
            let meta_table = read_txn.open_table(METADATA_TABLE).map_err(|e| {
                StorageError::corrupted(format!("Cannot open metadata table: {}", e))
            })?;

            let metadata_bytes = meta_table
                .get(METADATA_KEY)
                .map_err(StorageError::from)?
                .ok_or_else(|| StorageError::corrupted("Missing database metadata"))?;

            bincode::deserialize::<DatabaseMetadata>(metadata_bytes.value())
                .map_err(|e| StorageError::corrupted(format!("Invalid metadata format: {}", e)))?
        };
        drop(read_txn);

        if !metadata.is_compatible() {
            warn!(
                expected = SCHEMA_VERSION,
                found = metadata.schema_version,
                "Schema version mismatch"
            );
            return Err(IndexError::Persistence(StorageError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found: metadata.schema_version,
            }));
        }

        if metadata.embedding_dimension != config.embedding_dimension {
            warn!(
                expected = config.embedding_dimension.size(),
                found = metadata.embedding_dimension.size(),
                "Embedding dimension mismatch"
            );
            return Err(IndexError::Validation(ValidationError::DimensionMismatch {
                expected: config.embedding_dimension.size(),
                got: metadata.embedding_dimension.size(),
            }));
        }

        let mut metadata = metadata;
        metadata.touch();

        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let metadata_bytes = bincode::serialize(&metadata)
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            meta_table.insert(METADATA_KEY, metadata_bytes.as_slice())?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(
            schema_version = metadata.schema_version,
            dimension = metadata.embedding_dimension.size(),
            "Store opened successfully"
        );

        Ok(Self {
            db,
            metadata,
            sync_mode: config.sync_mode,
            path,
        })
    }

    /// Returns the database metadata.
    pub fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }

    /// Returns the embedding dimension configured for this store.
    #[inline]
    pub fn embedding_dimension(&self) -> EmbeddingDimension {
        self.metadata.embedding_dimension
    }

    /// Returns a reference to the underlying redb database.
    #[cfg(test)]
    pub(crate) fn database(&self) -> &Database {
        &self.db
    }

    fn begin_write(&self) -> Result<WriteTransaction> {
        let mut write_txn = self.db.begin_write().map_err(StorageError::from)?;
        match self.sync_mode {
            SyncMode::Normal => write_txn.set_durability(Durability::Immediate),
            SyncMode::Fast => write_txn.set_durability(Durability::Eventual),
            SyncMode::Paranoid => {
                write_txn.set_durability(Durability::Immediate);
                write_txn.set_two_phase_commit(true);
            }
        }
        Ok(write_txn)
    }

    fn load_record(records: &BytesTable, embeddings: &BytesTable, seq: u64) -> Result<StoredRecord> {
        let body = records
            .get(seq)?
            .ok_or_else(|| StorageError::corrupted(format!("Missing record {}", seq)))?;
        let mut record: StoredRecord = bincode::deserialize(body.value())
            .map_err(|e| StorageError::corrupted(format!("Invalid record {}: {}", seq, e)))?;
        record.seq = RecordSeq(seq);

        let bytes = embeddings
            .get(seq)?
            .ok_or_else(|| StorageError::corrupted(format!("Missing embedding for record {}", seq)))?;
        record.embedding = decode_embedding(bytes.value())?;

        Ok(record)
    }
}

impl DocumentStore for RedbStore {
    fn insert(&self, record: &NewRecord) -> Result<RecordSeq> {
        let dimension = self.metadata.embedding_dimension.size();
        if record.embedding.len() != dimension {
            return Err(ValidationError::dimension_mismatch(dimension, record.embedding.len()).into());
        }

        let body = bincode::serialize(&StoredRecord::from_new(RecordSeq::default(), record))
            .map_err(|e| StorageError::serialization(e.to_string()))?;
        let vector = encode_embedding(&record.embedding);

        let write_txn = self.begin_write()?;
        let seq = {
            let mut records = write_txn.open_table(RECORDS_TABLE)?;
            let seq = match records.last()? {
                Some((key, _)) => RecordSeq(key.value()).next(),
                None => RecordSeq::FIRST,
            };
            records.insert(seq.get(), body.as_slice())?;

            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;
            embeddings.insert(seq.get(), vector.as_slice())?;

            let mut by_tag = write_txn.open_multimap_table(RECORDS_BY_TAG_TABLE)?;
            by_tag.insert(record.tag.as_str(), seq.get())?;
            seq
        };
        write_txn.commit().map_err(StorageError::from)?;

        debug!(seq = %seq, tag = %record.tag, source = %record.source, "Record committed");
        Ok(seq)
    }

    fn query_recent(&self, tag: &str, limit: usize) -> Result<Vec<StoredRecord>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let by_tag = read_txn.open_multimap_table(RECORDS_BY_TAG_TABLE)?;
        let records = read_txn.open_table(RECORDS_TABLE)?;
        let embeddings = read_txn.open_table(EMBEDDINGS_TABLE)?;

        let mut out = Vec::new();
        for seq in by_tag.get(tag)?.rev().take(limit) {
            let seq = seq.map_err(StorageError::from)?.value();
            out.push(Self::load_record(&records, &embeddings, seq)?);
        }
        Ok(out)
    }

    fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let records = read_txn.open_table(RECORDS_TABLE)?;
        let embeddings = read_txn.open_table(EMBEDDINGS_TABLE)?;

        let mut out = Vec::new();
        for entry in records.iter()?.rev().take(limit) {
            let (key, _) = entry.map_err(StorageError::from)?;
            out.push(Self::load_record(&records, &embeddings, key.value())?);
        }
        Ok(out)
    }

    fn len(&self) -> Result<u64> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let records = read_txn.open_table(RECORDS_TABLE)?;
        // Sequences are dense from 1, so the last key is the count.
        let last = records.last()?;
        Ok(last.map_or(0, |(key, _)| key.value()))
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    #[instrument(skip(self))]
    fn close(self: Box<Self>) -> Result<()> {
        info!("Closing durable store");

        // redb flushes all data durably on drop, which is infallible.
        drop(self.db);

        info!("Durable store closed");
        Ok(())
    }
}
