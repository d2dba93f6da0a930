//! Exact brute-force cosine index.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::{cosine_similarity, IndexEntry, TopK};
use crate::search::SearchResult;

/// Local brute-force index over an in-memory entry list.
///
/// Insertion is O(1) amortized and never fails. A query scores every entry
/// (O(n·D)) and keeps the best `k` in a bounded heap, so results are exact.
/// Equal scores are ordered by insertion, earliest first.
///
/// Queries hold the lock for the whole scan, so they observe a single
/// consistent prefix of the insertion sequence.
#[derive(Debug, Default)]
pub struct FlatIndex {
    entries: Mutex<Vec<IndexEntry>>,
}

impl FlatIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn insert(&self, entry: IndexEntry) {
        self.lock().push(entry);
    }

    /// Returns up to `k` entries by descending cosine similarity to `vector`.
    ///
    /// Returns an empty list when `k == 0` or the index is empty. Entries
    /// whose embedding (or the query) has zero norm score 0.0.
    pub fn query(&self, vector: &[f32], k: usize) -> Vec<SearchResult> {
        if k == 0 {
            return Vec::new();
        }

        let entries = self.lock();
        let mut top = TopK::new(k);
        for (order, entry) in entries.iter().enumerate() {
            let score = cosine_similarity(&entry.embedding, vector);
            top.offer(score, order, || entry);
        }
        trace!(scanned = entries.len(), k, "Brute-force query");

        top.into_sorted()
            .into_iter()
            .map(|(score, entry)| SearchResult {
                id: entry.id.clone(),
                content: entry.content.clone(),
                score,
            })
            .collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock can only happen mid-push, which leaves
    // the Vec valid, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Vec<IndexEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry::new(id, format!("content of {}", id), embedding)
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = FlatIndex::new();
        assert!(index.is_empty());
        assert!(index.query(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn test_query_orders_by_similarity() {
        let index = FlatIndex::new();
        index.insert(entry("far", vec![0.0, 1.0]));
        index.insert(entry("near", vec![1.0, 0.1]));
        index.insert(entry("mid", vec![1.0, 1.0]));

        let results = index.query(&[1.0, 0.0], 3);
        assert_eq!(ids(&results), vec!["near", "mid", "far"]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(results[0].content, "content of near");
    }

    #[test]
    fn test_query_truncates_to_k() {
        let index = FlatIndex::new();
        for i in 0..10 {
            index.insert(entry(&format!("d{}", i), vec![1.0, i as f32]));
        }
        assert_eq!(index.query(&[1.0, 0.0], 3).len(), 3);
        assert_eq!(index.query(&[1.0, 0.0], 50).len(), 10);
    }

    #[test]
    fn test_k_zero_returns_nothing() {
        let index = FlatIndex::new();
        index.insert(entry("a", vec![1.0]));
        assert!(index.query(&[1.0], 0).is_empty());
    }

    #[test]
    fn test_ties_prefer_earlier_insertion() {
        let index = FlatIndex::new();
        index.insert(entry("first", vec![2.0, 0.0]));
        index.insert(entry("second", vec![1.0, 0.0]));
        index.insert(entry("third", vec![5.0, 0.0]));

        let results = index.query(&[1.0, 0.0], 2);
        assert_eq!(ids(&results), vec!["first", "second"]);
    }

    #[test]
    fn test_zero_vector_entry_scores_zero() {
        let index = FlatIndex::new();
        index.insert(entry("zero", vec![0.0, 0.0]));
        let results = index.query(&[1.0, 1.0], 1);
        assert_eq!(results[0].score, 0.0);
    }

    #[test]
    fn test_self_similarity() {
        let index = FlatIndex::new();
        index.insert(entry("a", vec![0.2, 0.9, -0.4]));
        index.insert(entry("b", vec![-0.7, 0.1, 0.3]));

        let results = index.query(&[0.2, 0.9, -0.4], 1);
        assert_eq!(results[0].id, "a");
        assert!(results[0].score >= 0.999);
    }

    #[test]
    fn test_duplicate_ids_are_separate_entries() {
        let index = FlatIndex::new();
        index.insert(entry("dup", vec![1.0, 0.0]));
        index.insert(entry("dup", vec![0.0, 1.0]));
        assert_eq!(index.len(), 2);
        assert_eq!(index.query(&[1.0, 1.0], 5).len(), 2);
    }

    #[test]
    fn test_concurrent_inserts_and_queries() {
        use std::sync::Arc;
        use std::thread;

        let index = Arc::new(FlatIndex::new());
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let index = Arc::clone(&index);
                thread::spawn(move || {
                    for i in 0..50 {
                        index.insert(entry(&format!("{}-{}", t, i), vec![1.0, i as f32]));
                        let _ = index.query(&[1.0, 0.0], 3);
                    }
                })
            })
            .collect();
        for handle in writers {
            handle.join().unwrap();
        }
        assert_eq!(index.len(), 200);
    }

    #[test]
    fn test_flat_index_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FlatIndex>();
    }
}
