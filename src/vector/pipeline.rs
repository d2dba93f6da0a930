//! Worker-backed streaming index.
//!
//! ```text
//!   ingest() ──► [ingest channel: append-only buffer] ──┐
//!                                                      ▼
//!   query()  ──► [control channel] ──────────► worker thread
//!      ▲                                     (owns the matrix)
//!      └──── reply channel, waited on with a timeout ◄──┘
//! ```
//!
//! Callers never touch the materialized data. The worker drains the whole
//! ingestion buffer before answering any flush or query, so a query observes
//! every document ingested before it was issued.
//!
//! Every request carries the deadline its caller waits on. Requests that
//! reach the worker after their deadline are dropped unanswered, so a burst
//! of timed-out queries does not delay the requests behind it.

use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};
#[cfg(test)]
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::{bounded, select, unbounded, Receiver, RecvTimeoutError, Sender};
use ndarray::{Array2, ArrayView1};
use tracing::{debug, info, warn};

use super::streaming::{StreamQuery, StreamingIndex};
use super::{cosine_similarity, IndexEntry, TopK};
use crate::config::StreamingConfig;
use crate::error::{Result, StreamingFault};
use crate::search::SearchResult;

const WORKER_NAME: &str = "streaming-index";

enum Command {
    Flush {
        reply: Sender<usize>,
        deadline: Instant,
    },
    Query {
        vector: Vec<f32>,
        k: usize,
        reply: Sender<(Vec<SearchResult>, usize)>,
        deadline: Instant,
    },
    Shutdown,
    /// Blocks the worker, so tests can drive the reply timeout.
    #[cfg(test)]
    Stall(Duration),
    /// Reports how many requests were dropped as expired.
    #[cfg(test)]
    Expired(Sender<usize>),
}

/// Streaming index whose data is materialized by a background worker.
///
/// Scores are computed with the same cosine function as
/// [`FlatIndex`](super::FlatIndex) and ties go to the earlier insertion, so
/// a healthy pipeline ranks exactly like the fallback.
pub struct PipelineIndex {
    dimension: usize,
    config: StreamingConfig,
    ingest_tx: Sender<IndexEntry>,
    control_tx: Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PipelineIndex {
    /// Starts the pipeline worker for `dimension`-length embeddings.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Io` if the worker thread cannot be spawned.
    pub fn start(dimension: usize, config: StreamingConfig) -> Result<Self> {
        let (ingest_tx, ingest_rx) = unbounded();
        let (control_tx, control_rx) = unbounded();

        let worker = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || {
                let mut table = Materialized::new(dimension);
                table.run(&ingest_rx, &control_rx);
            })?;

        info!(dimension, timeout = ?config.query_timeout, "Streaming index started");

        Ok(Self {
            dimension,
            config,
            ingest_tx,
            control_tx,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Returns the embedding dimension this pipeline accepts.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Sends the command built for this request's deadline and waits for
    /// the reply until that deadline.
    fn request<T>(
        &self,
        command: impl FnOnce(Instant) -> Command,
        reply: &Receiver<T>,
    ) -> std::result::Result<T, StreamingFault> {
        let deadline = Instant::now() + self.config.query_timeout;
        self.control_tx
            .send(command(deadline))
            .map_err(|_| StreamingFault::Disconnected)?;
        match reply.recv_deadline(deadline) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => Err(StreamingFault::Timeout(self.config.query_timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(StreamingFault::Disconnected),
        }
    }

    #[cfg(test)]
    fn stall(&self, duration: Duration) {
        let _ = self.control_tx.send(Command::Stall(duration));
    }

    #[cfg(test)]
    fn expired(&self) -> usize {
        let (reply_tx, reply_rx) = bounded(1);
        let _ = self.control_tx.send(Command::Expired(reply_tx));
        reply_rx.recv().unwrap_or(0)
    }
}

impl StreamingIndex for PipelineIndex {
    fn ingest(&self, entry: IndexEntry) -> std::result::Result<(), StreamingFault> {
        if entry.embedding.len() != self.dimension {
            return Err(StreamingFault::internal(format!(
                "embedding has {} dimensions, pipeline expects {}",
                entry.embedding.len(),
                self.dimension
            )));
        }
        self.ingest_tx
            .send(entry)
            .map_err(|_| StreamingFault::Disconnected)
    }

    fn flush(&self) -> std::result::Result<usize, StreamingFault> {
        let (reply_tx, reply_rx) = bounded(1);
        self.request(
            |deadline| Command::Flush {
                reply: reply_tx,
                deadline,
            },
            &reply_rx,
        )
    }

    fn query(&self, vector: &[f32], k: usize) -> StreamQuery {
        if vector.len() != self.dimension {
            return StreamQuery::Unsupported(format!(
                "query has {} dimensions, pipeline expects {}",
                vector.len(),
                self.dimension
            ));
        }
        if k == 0 || k > self.config.max_query_k {
            return StreamQuery::Unsupported(format!(
                "k must be between 1 and {}, got {}",
                self.config.max_query_k, k
            ));
        }

        let (reply_tx, reply_rx) = bounded(1);
        let vector = vector.to_vec();
        let command = |deadline| Command::Query {
            vector,
            k,
            reply: reply_tx,
            deadline,
        };
        match self.request(command, &reply_rx) {
            Ok((results, indexed)) => StreamQuery::Hits { results, indexed },
            Err(fault) => StreamQuery::Transient(fault),
        }
    }

    fn shutdown(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        let _ = self.control_tx.send(Command::Shutdown);
        if handle.join().is_err() {
            warn!("Streaming index worker panicked");
        } else {
            info!("Streaming index stopped");
        }
    }
}

impl Drop for PipelineIndex {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PipelineIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineIndex")
            .field("dimension", &self.dimension)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Worker state
// ============================================================================

/// Materialized rows, owned by the worker thread.
struct Materialized {
    ids: Vec<String>,
    contents: Vec<String>,
    /// One embedding per row, in ingestion order.
    rows: Array2<f32>,
    /// Requests dropped because their caller had already given up.
    expired: usize,
}

impl Materialized {
    fn new(dimension: usize) -> Self {
        Self {
            ids: Vec::new(),
            contents: Vec::new(),
            rows: Array2::zeros((0, dimension)),
            expired: 0,
        }
    }

    fn run(&mut self, ingest_rx: &Receiver<IndexEntry>, control_rx: &Receiver<Command>) {
        loop {
            select! {
                recv(ingest_rx) -> msg => match msg {
                    Ok(entry) => self.materialize(entry),
                    Err(_) => break,
                },
                recv(control_rx) -> msg => match msg {
                    Ok(Command::Flush { reply, deadline }) => {
                        if self.expire(deadline) {
                            continue;
                        }
                        self.drain(ingest_rx);
                        let _ = reply.send(self.len());
                    }
                    Ok(Command::Query { vector, k, reply, deadline }) => {
                        if self.expire(deadline) {
                            continue;
                        }
                        self.drain(ingest_rx);
                        let _ = reply.send((self.search(&vector, k), self.len()));
                    }
                    #[cfg(test)]
                    Ok(Command::Stall(duration)) => thread::sleep(duration),
                    #[cfg(test)]
                    Ok(Command::Expired(reply)) => {
                        let _ = reply.send(self.expired);
                    }
                    Ok(Command::Shutdown) | Err(_) => break,
                },
            }
        }
        debug!(rows = self.len(), expired = self.expired, "Streaming index worker exiting");
    }

    /// Returns true, and counts the request as dropped, once `deadline` has
    /// passed.
    fn expire(&mut self, deadline: Instant) -> bool {
        if Instant::now() < deadline {
            return false;
        }
        self.expired += 1;
        debug!(expired = self.expired, "Dropping request past its deadline");
        true
    }

    fn drain(&mut self, ingest_rx: &Receiver<IndexEntry>) {
        let before = self.len();
        for entry in ingest_rx.try_iter() {
            self.materialize(entry);
        }
        if self.len() > before {
            debug!(materialized = self.len() - before, total = self.len(), "Drained ingestion buffer");
        }
    }

    fn materialize(&mut self, entry: IndexEntry) {
        if let Err(e) = self.rows.push_row(ArrayView1::from(entry.embedding.as_slice())) {
            warn!(id = %entry.id, error = %e, "Dropping entry with wrong shape");
            return;
        }
        self.ids.push(entry.id);
        self.contents.push(entry.content);
    }

    fn search(&self, vector: &[f32], k: usize) -> Vec<SearchResult> {
        let mut top = TopK::new(k);
        for (row, embedding) in self.rows.outer_iter().enumerate() {
            let score = match embedding.as_slice() {
                Some(embedding) => cosine_similarity(embedding, vector),
                None => cosine_similarity(&embedding.to_vec(), vector),
            };
            top.offer(score, row, || row);
        }
        top.into_sorted()
            .into_iter()
            .map(|(score, row)| SearchResult {
                id: self.ids[row].clone(),
                content: self.contents[row].clone(),
                score,
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}
