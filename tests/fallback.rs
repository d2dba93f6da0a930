//! Integration tests for streaming index degradation.
//!
//! Every failure mode of the streaming index must leave `search` answering
//! with exactly the ranking a healthy index produces.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use newsindex::embedding::HashingEmbedding;
use newsindex::storage::MemoryStore;
use newsindex::vector::{IndexEntry, PipelineIndex, StreamQuery, StreamingIndex};
use newsindex::{
    Config, DocumentIndex, EmbeddingDimension, FallbackReason, IndexWarning, SearchPath,
    SearchResult, Source, StreamingFault,
};

const DIM: usize = 64;

const CORPUS: &[(&str, &str)] = &[
    ("AAPL", "Apple beats earnings as iPhone sales rise"),
    ("MSFT", "Microsoft cloud revenue grows 30%"),
    ("ACME", "Company X faces fraud probe"),
    ("ACME", "Company X profit up 20%"),
    ("TSLA", "Tesla recalls vehicles over software fault"),
    ("XOM", "Oil prices climb as supply tightens"),
    ("JPM", "Bank earnings beat on trading revenue"),
    ("NFLX", "Streaming subscribers grow faster than expected"),
];

const QUERIES: &[&str] = &[
    "fraud probe",
    "earnings beat",
    "revenue grows",
    "oil supply",
    "software recall",
    "",
];

fn config() -> Config {
    Config {
        embedding_dimension: EmbeddingDimension::Custom(DIM),
        ..Default::default()
    }
}

fn build(streaming: Box<dyn StreamingIndex>) -> DocumentIndex {
    let index = DocumentIndex::with_components(
        config(),
        Box::new(MemoryStore::new()),
        Box::new(HashingEmbedding::new(DIM)),
        streaming,
    )
    .unwrap();
    for (id, content) in CORPUS {
        index.add_document(id, content, Source::Perplexity).unwrap();
    }
    index
}

fn healthy() -> DocumentIndex {
    build(Box::new(
        PipelineIndex::start(DIM, config().streaming).unwrap(),
    ))
}

/// Asserts `degraded` answers every query like the healthy index, via the
/// fallback path.
fn assert_same_rankings(degraded: &DocumentIndex, expect: impl Fn(&FallbackReason) -> bool) {
    let reference = healthy();
    for query in QUERIES {
        for k in [1, 3, CORPUS.len(), CORPUS.len() + 5] {
            let want: Vec<SearchResult> = reference.search(query, k).unwrap();
            let got = degraded.search_with_outcome(query, k).unwrap();
            assert_eq!(got.results, want, "query {:?} k {}", query, k);
            match &got.path {
                SearchPath::Fallback(reason) => assert!(expect(reason), "reason: {:?}", reason),
                SearchPath::Streaming => panic!("expected fallback for {:?}", query),
            }
        }
    }
}

// ============================================================================
// Test doubles
// ============================================================================

/// Rejects every query shape.
struct UnsupportedStreaming;

impl StreamingIndex for UnsupportedStreaming {
    fn ingest(&self, _entry: IndexEntry) -> Result<(), StreamingFault> {
        Ok(())
    }

    fn flush(&self) -> Result<usize, StreamingFault> {
        Ok(0)
    }

    fn query(&self, _vector: &[f32], _k: usize) -> StreamQuery {
        StreamQuery::Unsupported("as-of-now queries not available".to_string())
    }
}

/// Fails every call with a runtime fault.
struct FaultyStreaming;

impl StreamingIndex for FaultyStreaming {
    fn ingest(&self, _entry: IndexEntry) -> Result<(), StreamingFault> {
        Err(StreamingFault::internal("pipeline crashed"))
    }

    fn flush(&self) -> Result<usize, StreamingFault> {
        Err(StreamingFault::internal("pipeline crashed"))
    }

    fn query(&self, _vector: &[f32], _k: usize) -> StreamQuery {
        StreamQuery::Transient(StreamingFault::internal("pipeline crashed"))
    }
}

/// Claims to be complete but never finds anything.
struct EmptyStreaming;

impl StreamingIndex for EmptyStreaming {
    fn ingest(&self, _entry: IndexEntry) -> Result<(), StreamingFault> {
        Ok(())
    }

    fn flush(&self) -> Result<usize, StreamingFault> {
        Ok(usize::MAX)
    }

    fn query(&self, _vector: &[f32], _k: usize) -> StreamQuery {
        StreamQuery::Hits {
            results: vec![],
            indexed: usize::MAX,
        }
    }
}

/// Real pipeline that loses every other ingested entry.
struct LossyStreaming {
    inner: PipelineIndex,
    calls: AtomicUsize,
}

impl StreamingIndex for LossyStreaming {
    fn ingest(&self, entry: IndexEntry) -> Result<(), StreamingFault> {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
            return Err(StreamingFault::Disconnected);
        }
        self.inner.ingest(entry)
    }

    fn flush(&self) -> Result<usize, StreamingFault> {
        self.inner.flush()
    }

    fn query(&self, vector: &[f32], k: usize) -> StreamQuery {
        self.inner.query(vector, k)
    }
}

/// Never answers within the timeout.
struct HungStreaming;

impl StreamingIndex for HungStreaming {
    fn ingest(&self, _entry: IndexEntry) -> Result<(), StreamingFault> {
        Ok(())
    }

    fn flush(&self) -> Result<usize, StreamingFault> {
        Err(StreamingFault::Timeout(Duration::from_millis(250)))
    }

    fn query(&self, _vector: &[f32], _k: usize) -> StreamQuery {
        StreamQuery::Transient(StreamingFault::Timeout(Duration::from_millis(250)))
    }
}

// ============================================================================
// Fallback equivalence
// ============================================================================

#[test]
fn test_unsupported_matches_healthy_ranking() {
    let index = build(Box::new(UnsupportedStreaming));
    assert_same_rankings(&index, |r| matches!(r, FallbackReason::Unsupported(_)));
}

#[test]
fn test_runtime_fault_matches_healthy_ranking() {
    let index = build(Box::new(FaultyStreaming));
    assert_same_rankings(&index, |r| {
        matches!(r, FallbackReason::Transient(StreamingFault::Internal(_)))
    });
}

#[test]
fn test_empty_result_over_non_empty_corpus_falls_back() {
    let index = build(Box::new(EmptyStreaming));
    assert_same_rankings(&index, |r| *r == FallbackReason::Empty);
}

#[test]
fn test_lost_ingestion_is_detected_as_stale() {
    let index = build(Box::new(LossyStreaming {
        inner: PipelineIndex::start(DIM, config().streaming).unwrap(),
        calls: AtomicUsize::new(0),
    }));
    assert_same_rankings(&index, |r| {
        *r == FallbackReason::Stale {
            indexed: CORPUS.len() / 2,
            expected: CORPUS.len(),
        }
    });
}

#[test]
fn test_timeout_matches_healthy_ranking() {
    let index = build(Box::new(HungStreaming));
    assert_same_rankings(&index, |r| {
        matches!(r, FallbackReason::Transient(StreamingFault::Timeout(_)))
    });
}

#[test]
fn test_shut_down_pipeline_falls_back() {
    let pipeline = PipelineIndex::start(DIM, config().streaming).unwrap();
    pipeline.shutdown();
    let index = build(Box::new(pipeline));
    assert_same_rankings(&index, |r| {
        *r == FallbackReason::Transient(StreamingFault::Disconnected)
    });
}

// ============================================================================
// Best-effort ingestion
// ============================================================================

#[test]
fn test_streaming_ingest_failure_is_reported_not_fatal() {
    let index = DocumentIndex::with_components(
        config(),
        Box::new(MemoryStore::new()),
        Box::new(HashingEmbedding::new(DIM)),
        Box::new(FaultyStreaming),
    )
    .unwrap();

    let added = index
        .add_document("ACME", "Company X faces fraud probe", Source::Perplexity)
        .unwrap();

    assert!(!added.is_clean());
    assert_eq!(
        added.warnings,
        vec![IndexWarning::StreamingIngest {
            id: "ACME".to_string(),
            fault: StreamingFault::internal("pipeline crashed"),
        }]
    );
    assert_eq!(index.len(), 1);
    assert_eq!(index.stored_len().unwrap(), 1);
    assert_eq!(index.search("fraud probe", 1).unwrap()[0].id, "ACME");
    assert!(index.flush().is_err());
}

#[test]
fn test_empty_corpus_with_failing_streaming_is_empty() {
    let index = DocumentIndex::with_components(
        config(),
        Box::new(MemoryStore::new()),
        Box::new(HashingEmbedding::new(DIM)),
        Box::new(FaultyStreaming),
    )
    .unwrap();
    assert!(index.search("anything", 3).unwrap().is_empty());
}
