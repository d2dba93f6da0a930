//! Core type definitions shared across the index.
//!
//! Document ids are caller-supplied strings and are not unique, so the
//! durable store keys its records by a store-assigned [`RecordSeq`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense embedding vector.
///
/// Every embedding admitted by the index has exactly the configured
/// dimension.
pub type Embedding = Vec<f32>;

/// Insertion sequence number assigned by the durable store.
///
/// Strictly increasing per store: a larger sequence was inserted later.
/// "Newest first" ordering is descending `RecordSeq`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RecordSeq(pub u64);

impl RecordSeq {
    /// The first sequence number handed out by an empty store.
    pub const FIRST: RecordSeq = RecordSeq(1);

    /// Returns the raw sequence value.
    #[inline]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the sequence that follows this one.
    #[inline]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RecordSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix timestamp in milliseconds.
///
/// Using i64 allows representing dates far into the future and past.
/// Millisecond precision is sufficient for news ingestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    ///
    /// If the system clock is before the Unix epoch, returns a timestamp
    /// of 0 (epoch) rather than panicking.
    #[inline]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    /// Creates a timestamp from Unix milliseconds.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix milliseconds.
    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
