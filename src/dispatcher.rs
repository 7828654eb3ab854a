//! Bounded-concurrency batch dispatcher
//!
//! Splits a prioritized id list into contiguous chunks and runs one task per
//! chunk. A semaphore created for each dispatch caps how many chunks do work
//! at the same time; the remaining tasks wait for a permit.

use crate::{error::SyncError, types::ChunkFailure};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

/// A contiguous slice of the prioritized id list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in submission order
    pub index: usize,
    pub ids: Vec<String>,
}

/// Aggregated result of a dispatch
#[derive(Debug)]
pub struct DispatchOutcome<T> {
    /// Results of successful chunks in completion order
    pub results: Vec<T>,
    pub failures: Vec<ChunkFailure>,
    pub chunks_total: usize,
}

/// Dispatcher for chunked provider work
#[derive(Debug, Clone, Copy)]
pub struct BatchDispatcher {
    chunk_size: usize,
    max_concurrent: usize,
}

impl BatchDispatcher {
    /// Creates a dispatcher; zero sizes are raised to one
    pub fn new(chunk_size: usize, max_concurrent: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Partitions `ids` into chunks of at most `chunk_size`, preserving order
    pub fn split(&self, ids: &[String]) -> Vec<Chunk> {
        ids.chunks(self.chunk_size)
            .enumerate()
            .map(|(index, ids)| Chunk {
                index,
                ids: ids.to_vec(),
            })
            .collect()
    }

    /// Runs `work` once per chunk and waits for every chunk to finish
    ///
    /// The permit is held for the whole of `work` and released when the
    /// task ends, whether it succeeded, failed, panicked or was aborted.
    /// A failing chunk is recorded in `failures` and does not affect the
    /// others.
    pub async fn dispatch<T, F, Fut>(&self, ids: &[String], work: F) -> DispatchOutcome<T>
    where
        T: Send + 'static,
        F: Fn(Chunk) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        let chunks = self.split(ids);
        let chunks_total = chunks.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let work = Arc::new(work);

        let mut tasks = JoinSet::new();
        let mut chunk_of = HashMap::with_capacity(chunks_total);

        for chunk in chunks {
            let semaphore = semaphore.clone();
            let work = work.clone();
            let index = chunk.index;
            let id_count = chunk.ids.len();

            let handle = tasks.spawn(
                async move {
                    let _permit = semaphore.acquire_owned().await.map_err(|e| {
                        SyncError::ChunkAborted {
                            chunk: index,
                            reason: e.to_string(),
                        }
                    })?;
                    tracing::debug!(chunk = index, ids = id_count, "Chunk acquired permit");
                    work(chunk).await
                }
                .in_current_span(),
            );
            chunk_of.insert(handle.id(), (index, id_count));
        }

        let mut results = Vec::with_capacity(chunks_total);
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, Ok(value))) => results.push(value),
                Ok((task_id, Err(e))) => {
                    let (chunk_index, id_count) =
                        chunk_of.get(&task_id).copied().unwrap_or_default();
                    tracing::warn!(chunk = chunk_index, error = %e, "Chunk failed");
                    failures.push(ChunkFailure {
                        chunk_index,
                        id_count,
                        reason: e.to_string(),
                    });
                }
                Err(join_error) => {
                    let (chunk_index, id_count) =
                        chunk_of.get(&join_error.id()).copied().unwrap_or_default();
                    let e = SyncError::ChunkAborted {
                        chunk: chunk_index,
                        reason: join_error.to_string(),
                    };
                    tracing::warn!(chunk = chunk_index, error = %e, "Chunk task aborted");
                    failures.push(ChunkFailure {
                        chunk_index,
                        id_count,
                        reason: e.to_string(),
                    });
                }
            }
        }

        DispatchOutcome {
            results,
            failures,
            chunks_total,
        }
    }
}
