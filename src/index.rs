//! The document index facade.
//!
//! [`DocumentIndex`] coordinates the three backing structures:
//!
//! - the **durable store**, the append-only system of record
//! - the **local brute-force index**, exact and always available
//! - the **streaming index**, preferred for queries but allowed to fail
//!
//! Writes go to all three. Reads try the streaming index first and fall
//! back deterministically to the local index, so `search` only fails when
//! the query cannot be embedded.
//!
//! # Quick Start
//!
//! ```rust
//! use newsindex::{Config, DocumentIndex, Source};
//!
//! let index = DocumentIndex::in_memory(Config::default())?;
//!
//! index.add_document("ACME", "Company X profit up 20%", Source::Perplexity)?;
//! index.add_document("ACME", "Company X faces fraud probe", Source::Perplexity)?;
//!
//! let results = index.search("fraud probe", 1)?;
//! assert_eq!(results[0].content, "Company X faces fraud probe");
//!
//! index.close()?;
//! # Ok::<(), newsindex::IndexError>(())
//! ```
//!
//! # Thread Safety
//!
//! `DocumentIndex` is `Send + Sync` and can be shared across threads using
//! `Arc`. `add_document` calls are serialized internally; `search` calls run
//! concurrently and each observes a consistent prefix of admitted documents.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::document::{AddedDocument, Document, IndexWarning, Source, MAX_CONTENT_SIZE};
use crate::embedding::{create_embedding_service, EmbeddingService};
use crate::error::{IndexError, Result, StreamingFault, ValidationError};
use crate::search::{render_context, FallbackReason, SearchOutcome, SearchPath, SearchResult};
use crate::storage::{open_storage, DocumentStore, MemoryStore, NewRecord, StoredRecord};
use crate::types::{Embedding, Timestamp};
use crate::vector::{
    DisabledStreaming, FlatIndex, IndexEntry, PipelineIndex, StreamQuery, StreamingIndex,
};

/// Embedding-backed document index.
///
/// Create one with [`DocumentIndex::open()`] (redb-backed) or
/// [`DocumentIndex::in_memory()`], and release it with
/// [`DocumentIndex::close()`].
///
/// The in-memory indexes start empty. Call [`preload`](Self::preload) or
/// [`preload_recent`](Self::preload_recent) to rebuild them from the durable
/// store after a restart.
pub struct DocumentIndex {
    /// System of record.
    store: Box<dyn DocumentStore>,

    /// Text to vector.
    embedding: Box<dyn EmbeddingService>,

    /// Local brute-force index.
    local: FlatIndex,

    /// Preferred query path.
    streaming: Box<dyn StreamingIndex>,

    /// Serializes writers so store order equals in-memory insertion order.
    write_lock: Mutex<()>,

    /// Configuration used to open this index.
    config: Config,
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("config", &self.config)
            .field("indexed", &self.local.len())
            .finish_non_exhaustive()
    }
}

impl DocumentIndex {
    /// Opens or creates an index backed by a redb file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration is invalid (see [`Config::validate`])
    /// - The database file is corrupted, locked, or has another schema version
    /// - The embedding dimension doesn't match an existing database
    /// - The embedding provider cannot be created
    /// - The streaming worker cannot be started
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate()?;

        info!("Opening document index");

        let store = open_storage(&path, &config)?;
        let embedding = create_embedding_service(&config)?;
        let streaming = Self::start_streaming(&config)?;

        Self::with_components(config, store, embedding, streaming)
    }

    /// Creates an index whose durable store lives in memory.
    ///
    /// Nothing survives the process.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open), minus the database errors.
    pub fn in_memory(config: Config) -> Result<Self> {
        config.validate()?;

        let embedding = create_embedding_service(&config)?;
        let streaming = Self::start_streaming(&config)?;

        Self::with_components(config, Box::new(MemoryStore::new()), embedding, streaming)
    }

    /// Assembles an index from explicit components.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Config` if the configuration is invalid or the
    /// embedding service dimension differs from the configured dimension.
    pub fn with_components(
        config: Config,
        store: Box<dyn DocumentStore>,
        embedding: Box<dyn EmbeddingService>,
        streaming: Box<dyn StreamingIndex>,
    ) -> Result<Self> {
        config.validate()?;

        if embedding.dimension() != config.dimension() {
            return Err(IndexError::config(format!(
                "embedding service produces {} dimensions, config expects {}",
                embedding.dimension(),
                config.dimension()
            )));
        }

        info!(
            dimension = config.dimension(),
            streaming = config.streaming.enabled,
            "Document index ready"
        );

        Ok(Self {
            store,
            embedding,
            local: FlatIndex::new(),
            streaming,
            write_lock: Mutex::new(()),
            config,
        })
    }

    fn start_streaming(config: &Config) -> Result<Box<dyn StreamingIndex>> {
        if config.streaming.enabled {
            Ok(Box::new(PipelineIndex::start(
                config.dimension(),
                config.streaming.clone(),
            )?))
        } else {
            Ok(Box::new(DisabledStreaming))
        }
    }

    /// Closes the index.
    ///
    /// Stops the streaming worker and closes the durable store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store reports a flush failure.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        info!(indexed = self.local.len(), "Closing document index");
        self.streaming.shutdown();
        self.store.close()?;
        info!("Document index closed");
        Ok(())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Admits a document.
    ///
    /// The document is embedded, written to the durable store, appended to
    /// the local index and offered to the streaming index. When this returns
    /// `Ok`, the document is durable and visible to every later `search`.
    ///
    /// A streaming ingest failure does not fail the call; it is logged and
    /// reported in [`AddedDocument::warnings`].
    ///
    /// # Errors
    ///
    /// - `IndexError::Validation` if `id` is empty or `content` exceeds 100 KB
    /// - `IndexError::Embedding` if the text cannot be embedded
    /// - `IndexError::Persistence` if the durable write fails; nothing is
    ///   added to the in-memory indexes in that case
    pub fn add_document(&self, id: &str, content: &str, source: Source) -> Result<AddedDocument> {
        if id.is_empty() {
            return Err(ValidationError::required_field("id").into());
        }
        if content.len() > MAX_CONTENT_SIZE {
            return Err(ValidationError::content_too_large(content.len(), MAX_CONTENT_SIZE).into());
        }

        let embedding = self.embed(content)?;

        let _guard = self.lock_writes();

        let timestamp = Timestamp::now();
        let seq = self.store.insert(&NewRecord {
            tag: id.to_string(),
            text: content.to_string(),
            embedding: embedding.clone(),
            source,
            timestamp,
        })?;

        let entry = IndexEntry::new(id, content, embedding.clone());
        self.local.insert(entry.clone());

        let mut warnings = Vec::new();
        if let Err(fault) = self.streaming.ingest(entry) {
            warn!(id, error = %fault, "Streaming ingest failed; document served by local index");
            warnings.push(IndexWarning::StreamingIngest {
                id: id.to_string(),
                fault,
            });
        }

        debug!(id, seq = %seq, source = %source, len = content.len(), "Document added");

        Ok(AddedDocument {
            document: Document {
                id: id.to_string(),
                content: content.to_string(),
                embedding,
                source,
                timestamp,
                seq,
            },
            warnings,
        })
    }

    /// Rebuilds the in-memory indexes from the newest `limit` records tagged
    /// `tag`, newest first. Returns the number of records loaded.
    ///
    /// The tag is the document id given to [`add_document`](Self::add_document)
    /// and matches exactly: `preload("tata", ..)` does not load documents
    /// admitted as `tata1` or `tata2`. Use one id per entity, or
    /// [`preload_recent`](Self::preload_recent) to load across ids.
    ///
    /// Re-running it inserts the same entries again. Duplicates never change
    /// the relative ranking of distinct documents.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Persistence` if the store cannot be read.
    #[instrument(skip(self))]
    pub fn preload(&self, tag: &str, limit: usize) -> Result<usize> {
        let records = self.store.query_recent(tag, limit)?;
        let loaded = self.reingest(records);
        info!(loaded, "Preloaded records");
        Ok(loaded)
    }

    /// Rebuilds the in-memory indexes from the newest `limit` records of any
    /// tag. Returns the number of records loaded.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Persistence` if the store cannot be read.
    #[instrument(skip(self))]
    pub fn preload_recent(&self, limit: usize) -> Result<usize> {
        let records = self.store.recent(limit)?;
        let loaded = self.reingest(records);
        info!(loaded, "Preloaded records");
        Ok(loaded)
    }

    fn reingest(&self, records: Vec<StoredRecord>) -> usize {
        let dimension = self.config.dimension();
        let _guard = self.lock_writes();

        let mut loaded = 0;
        for record in records {
            if record.embedding.len() != dimension {
                warn!(
                    seq = %record.seq,
                    got = record.embedding.len(),
                    expected = dimension,
                    "Skipping stored record with wrong dimension"
                );
                continue;
            }

            let entry = IndexEntry::new(record.tag, record.text, record.embedding);
            self.local.insert(entry.clone());
            if let Err(fault) = self.streaming.ingest(entry) {
                warn!(seq = %record.seq, error = %fault, "Streaming ingest failed during preload");
            }
            loaded += 1;
        }
        loaded
    }

    /// Forces the streaming index to materialize pending ingestion and
    /// returns the number of documents it holds.
    ///
    /// Queries flush on their own; this is for callers that want to bound
    /// staleness eagerly, such as after a bulk load.
    ///
    /// # Errors
    ///
    /// Returns the streaming fault when the pipeline is unavailable.
    pub fn flush(&self) -> std::result::Result<usize, StreamingFault> {
        self.streaming.flush()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Returns up to `k` documents by descending similarity to `query`.
    ///
    /// Returns an empty list for an empty corpus or `k == 0`.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Embedding` if the query cannot be embedded.
    /// Streaming index failures are never surfaced.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        Ok(self.search_with_outcome(query, k)?.results)
    }

    /// Like [`search`](Self::search), but also reports which path answered.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Embedding` if the query cannot be embedded.
    pub fn search_with_outcome(&self, query: &str, k: usize) -> Result<SearchOutcome> {
        let vector = self.embed(query)?;
        self.search_vector(&vector, k)
    }

    /// Searches with a precomputed query vector.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Validation` if `vector` does not have the
    /// configured embedding dimension.
    pub fn search_vector(&self, vector: &[f32], k: usize) -> Result<SearchOutcome> {
        let dimension = self.config.dimension();
        if vector.len() != dimension {
            return Err(ValidationError::dimension_mismatch(dimension, vector.len()).into());
        }

        let expected = self.local.len();

        let reason = match self.streaming.query(vector, k) {
            StreamQuery::Hits { results, indexed } if !results.is_empty() && indexed >= expected => {
                return Ok(SearchOutcome {
                    results: truncate(results, k),
                    path: SearchPath::Streaming,
                });
            }
            StreamQuery::Hits { results, .. } if results.is_empty() => {
                if expected == 0 {
                    return Ok(SearchOutcome {
                        results,
                        path: SearchPath::Streaming,
                    });
                }
                debug!(corpus = expected, "Streaming index returned no hits");
                FallbackReason::Empty
            }
            StreamQuery::Hits { indexed, .. } => {
                debug!(indexed, expected, "Streaming index is stale");
                FallbackReason::Stale { indexed, expected }
            }
            StreamQuery::Unsupported(reason) => {
                debug!(reason = %reason, "Streaming query unsupported");
                FallbackReason::Unsupported(reason)
            }
            StreamQuery::Transient(fault) => {
                warn!(error = %fault, "Streaming query failed");
                FallbackReason::Transient(fault)
            }
        };

        Ok(SearchOutcome {
            results: self.local.query(vector, k),
            path: SearchPath::Fallback(reason),
        })
    }

    /// Renders the top `k` hits for `query` as prompt context lines.
    ///
    /// See [`render_context`].
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Embedding` if the query cannot be embedded.
    pub fn context(&self, query: &str, k: usize) -> Result<String> {
        Ok(render_context(&self.search(query, k)?))
    }

    /// Returns up to `limit` stored records for `tag`, newest first.
    ///
    /// Reads the durable store, so records admitted before a restart are
    /// included even when the in-memory indexes are cold.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Persistence` if the store cannot be read.
    pub fn recent_records(&self, tag: &str, limit: usize) -> Result<Vec<StoredRecord>> {
        self.store.query_recent(tag, limit)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the number of entries in the local index.
    pub fn len(&self) -> usize {
        self.local.len()
    }

    /// Returns true if the local index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    /// Returns the number of records in the durable store.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Persistence` if the store cannot be read.
    pub fn stored_len(&self) -> Result<u64> {
        self.store.len()
    }

    /// Returns the configuration used to open this index.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the embedding dimension.
    #[inline]
    pub fn embedding_dimension(&self) -> usize {
        self.config.dimension()
    }

    /// Returns the backing file of the durable store, if any.
    pub fn path(&self) -> Option<&Path> {
        self.store.path()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn embed(&self, text: &str) -> Result<Embedding> {
        let embedding = self.embedding.embed(text)?;
        if embedding.len() != self.config.dimension() {
            return Err(IndexError::embedding(format!(
                "embedding service returned {} dimensions, expected {}",
                embedding.len(),
                self.config.dimension()
            )));
        }
        Ok(embedding)
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn truncate(mut results: Vec<SearchResult>, k: usize) -> Vec<SearchResult> {
    results.truncate(k);
    results
}
