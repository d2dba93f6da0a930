//! Ephemeral in-process store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{DocumentStore, NewRecord, StoredRecord};
use crate::error::Result;
use crate::types::RecordSeq;

/// [`DocumentStore`] that keeps records in memory.
///
/// Nothing survives the process. Useful for tests and for running the index
/// without a database file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<StoredRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StoredRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentStore for MemoryStore {
    fn insert(&self, record: &NewRecord) -> Result<RecordSeq> {
        let mut records = self.lock();
        let seq = RecordSeq(records.len() as u64 + 1);
        records.push(StoredRecord::from_new(seq, record));
        Ok(seq)
    }

    fn query_recent(&self, tag: &str, limit: usize) -> Result<Vec<StoredRecord>> {
        Ok(self
            .lock()
            .iter()
            .rev()
            .filter(|r| r.tag == tag)
            .take(limit)
            .cloned()
            .collect())
    }

    fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>> {
        Ok(self.lock().iter().rev().take(limit).cloned().collect())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.lock().len() as u64)
    }

    fn path(&self) -> Option<&Path> {
        None
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
