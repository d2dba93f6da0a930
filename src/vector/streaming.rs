//! Streaming index contract.

use super::IndexEntry;
use crate::error::StreamingFault;
use crate::search::SearchResult;

/// Answer of a streaming query.
///
/// A tagged value rather than an error: the facade must tell an unsupported
/// query shape apart from a transient runtime fault, and both apart from a
/// usable answer.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamQuery {
    /// The query ran. `results` may be empty.
    Hits {
        /// Up to `k` hits by descending score.
        results: Vec<SearchResult>,
        /// Number of documents materialized when the query ran.
        indexed: usize,
    },

    /// The query shape cannot be served (dimension mismatch, `k` out of
    /// range, streaming disabled).
    Unsupported(String),

    /// A runtime fault that may succeed on retry.
    Transient(StreamingFault),
}

/// Asynchronously materialized similarity index.
///
/// Ingestion only appends to a buffer; documents become queryable once the
/// pipeline materializes them. Every query forces pending ingestion to be
/// materialized before scoring, and must return within a bounded time.
///
/// Implementations must rank the same way as
/// [`FlatIndex`](super::FlatIndex): cosine similarity, ties to the earlier
/// insertion.
pub trait StreamingIndex: Send + Sync {
    /// Appends an entry to the ingestion buffer.
    ///
    /// # Errors
    ///
    /// Returns a fault if the pipeline is unavailable or rejects the entry.
    fn ingest(&self, entry: IndexEntry) -> Result<(), StreamingFault>;

    /// Materializes everything ingested so far and returns the number of
    /// materialized documents.
    ///
    /// # Errors
    ///
    /// Returns a fault if the pipeline is unavailable or does not respond in
    /// time.
    fn flush(&self) -> Result<usize, StreamingFault>;

    /// Flushes pending ingestion, then returns up to `k` hits for `vector`.
    fn query(&self, vector: &[f32], k: usize) -> StreamQuery;

    /// Stops background work. Further calls report faults.
    ///
    /// The default implementation does nothing.
    fn shutdown(&self) {}
}

/// Streaming index used when streaming is turned off.
///
/// Accepts and discards ingestion; every query is unsupported, so the facade
/// always answers from the local brute-force index.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledStreaming;

impl StreamingIndex for DisabledStreaming {
    fn ingest(&self, _entry: IndexEntry) -> Result<(), StreamingFault> {
        Ok(())
    }

    fn flush(&self) -> Result<usize, StreamingFault> {
        Ok(0)
    }

    fn query(&self, _vector: &[f32], _k: usize) -> StreamQuery {
        StreamQuery::Unsupported("streaming index disabled".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_streaming_is_unsupported() {
        let streaming = DisabledStreaming;
        assert!(streaming
            .ingest(IndexEntry::new("a", "text", vec![1.0]))
            .is_ok());
        assert_eq!(streaming.flush(), Ok(0));
        assert!(matches!(
            streaming.query(&[1.0], 3),
            StreamQuery::Unsupported(_)
        ));
    }
}
