//! Search result types and context rendering.
//!
//! A search answers "which documents are semantically closest to this
//! text?" with up to `k` [`SearchResult`]s ordered by descending cosine
//! similarity. [`SearchOutcome`] additionally reports which path produced
//! the answer, so callers and tests can observe the fallback.

use std::fmt;
use std::fmt::Write as _;

use crate::error::StreamingFault;

/// One ranked hit.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    /// Id of the matched document.
    pub id: String,

    /// Text of the matched document.
    pub content: String,

    /// Cosine similarity to the query, in `[-1, 1]`.
    pub score: f32,
}

/// Which index answered a query.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchPath {
    /// The streaming index returned a usable answer.
    Streaming,

    /// The local brute-force index answered after the streaming index
    /// could not.
    Fallback(FallbackReason),
}

impl SearchPath {
    /// Returns true if the local brute-force index answered.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Why a query fell back to the local brute-force index.
#[derive(Clone, Debug, PartialEq)]
pub enum FallbackReason {
    /// The streaming index does not support this query shape.
    Unsupported(String),

    /// The streaming index failed transiently (timeout, disconnect).
    Transient(StreamingFault),

    /// The streaming index answered with no hits while the corpus is
    /// non-empty.
    Empty,

    /// The streaming index has materialized fewer documents than the local
    /// index holds, so its answer may miss documents.
    Stale {
        /// Documents materialized by the streaming index.
        indexed: usize,
        /// Documents held by the local index when the query started.
        expected: usize,
    },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(reason) => write!(f, "unsupported query: {}", reason),
            Self::Transient(fault) => write!(f, "transient failure: {}", fault),
            Self::Empty => f.write_str("empty result"),
            Self::Stale { indexed, expected } => {
                write!(f, "stale index ({} of {} documents)", indexed, expected)
            }
        }
    }
}

/// Ranked results plus the path that produced them.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    /// Results ordered by descending score.
    pub results: Vec<SearchResult>,

    /// Which index answered.
    pub path: SearchPath,
}

/// Renders results as a bullet list suitable for a prompt context.
///
/// Each line is `- {content} (score: {score:.2})`. An empty slice renders as
/// an empty string.
///
/// # Example
///
/// ```rust
/// use newsindex::search::{render_context, SearchResult};
///
/// let results = vec![SearchResult {
///     id: "ACME".into(),
///     content: "Company X faces fraud probe".into(),
///     score: 0.8731,
/// }];
/// assert_eq!(render_context(&results), "- Company X faces fraud probe (score: 0.87)");
/// ```
pub fn render_context(results: &[SearchResult]) -> String {
    let mut out = String::new();
    for (i, result) in results.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        // Writing to a String cannot fail.
        let _ = write!(out, "- {} (score: {:.2})", result.content, result.score);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(content: &str, score: f32) -> SearchResult {
        SearchResult {
            id: "id".to_string(),
            content: content.to_string(),
            score,
        }
    }

    #[test]
    fn test_render_context_empty() {
        assert_eq!(render_context(&[]), "");
    }

    #[test]
    fn test_render_context_lines() {
        let rendered = render_context(&[hit("profit up 20%", 0.914), hit("fraud probe", 0.5)]);
        assert_eq!(
            rendered,
            "- profit up 20% (score: 0.91)\n- fraud probe (score: 0.50)"
        );
    }

    #[test]
    fn test_render_context_negative_score() {
        assert_eq!(render_context(&[hit("x", -0.256)]), "- x (score: -0.26)");
    }

    #[test]
    fn test_fallback_reason_display() {
        assert_eq!(FallbackReason::Empty.to_string(), "empty result");
        assert_eq!(
            FallbackReason::Stale {
                indexed: 1,
                expected: 3
            }
            .to_string(),
            "stale index (1 of 3 documents)"
        );
        assert_eq!(
            FallbackReason::Transient(StreamingFault::Disconnected).to_string(),
            "transient failure: Streaming pipeline disconnected"
        );
    }

    #[test]
    fn test_search_path_is_fallback() {
        assert!(!SearchPath::Streaming.is_fallback());
        assert!(SearchPath::Fallback(FallbackReason::Empty).is_fallback());
    }
}
