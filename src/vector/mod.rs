//! In-memory vector indexes.
//!
//! Two projections of the durable store live here:
//!
//! ```text
//!              ┌──────────────────────────────┐
//!              │        DocumentIndex          │
//!              └──────┬─────────────────┬─────┘
//!                     │                 │
//!        ┌────────────┴───┐     ┌───────┴──────────────┐
//!        │   FlatIndex    │     │ dyn StreamingIndex   │
//!        │ (exact, always │     │  PipelineIndex /     │
//!        │   available)   │     │  DisabledStreaming   │
//!        └────────────────┘     └──────────────────────┘
//! ```
//!
//! Both score by cosine similarity and break ties by insertion order, so a
//! healthy streaming index and the fallback return the same ranking for the
//! same corpus. Both are rebuildable from the durable store.

mod flat;
mod pipeline;
mod streaming;

pub use flat::FlatIndex;
pub use pipeline::PipelineIndex;
pub use streaming::{DisabledStreaming, StreamQuery, StreamingIndex};

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::types::Embedding;

/// An `(id, content, embedding)` triple held by both in-memory indexes.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    /// Caller-supplied document id.
    pub id: String,
    /// Document text.
    pub content: String,
    /// Document embedding.
    pub embedding: Embedding,
}

impl IndexEntry {
    /// Creates an entry.
    pub fn new(id: impl Into<String>, content: impl Into<String>, embedding: Embedding) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            embedding,
        }
    }
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when either vector has zero norm (or the result is not
/// finite) instead of NaN. The result is clamped to `[-1, 1]` and is exactly
/// symmetric in its arguments.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if score.is_finite() {
        score.clamp(-1.0, 1.0) as f32
    } else {
        0.0
    }
}

/// Bounded top-k selector.
///
/// Keeps at most `k` candidates in a heap whose root is the current worst,
/// so selecting from `n` candidates costs O(n log k) time and O(k) space.
/// Higher scores win; equal scores go to the lower `order` (earlier
/// insertion).
pub(crate) struct TopK<T> {
    k: usize,
    heap: BinaryHeap<Candidate<T>>,
}

struct Candidate<T> {
    score: f32,
    order: usize,
    item: T,
}

impl<T> Candidate<T> {
    /// `Less` means better: higher score first, then earlier insertion.
    fn rank(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.order.cmp(&other.order))
    }
}

impl<T> PartialEq for Candidate<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rank(other) == Ordering::Equal
    }
}

impl<T> Eq for Candidate<T> {}

impl<T> PartialOrd for Candidate<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Candidate<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank(other)
    }
}

impl<T> TopK<T> {
    pub(crate) fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)),
        }
    }

    /// Offers a candidate. `item` is only built when the candidate makes
    /// the cut, so callers can defer cloning.
    pub(crate) fn offer(&mut self, score: f32, order: usize, item: impl FnOnce() -> T) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(Candidate {
                score,
                order,
                item: item(),
            });
            return;
        }
        let beats_worst = self.heap.peek().is_some_and(|worst| {
            score.total_cmp(&worst.score) == Ordering::Greater
                || (score.total_cmp(&worst.score) == Ordering::Equal && order < worst.order)
        });
        if beats_worst {
            self.heap.pop();
            self.heap.push(Candidate {
                score,
                order,
                item: item(),
            });
        }
    }

    /// Returns `(score, item)` pairs, best first.
    pub(crate) fn into_sorted(self) -> Vec<(f32, T)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| (c.score, c.item))
            .collect()
    }
}
