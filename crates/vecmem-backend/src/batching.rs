// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Async adapter with micro-batched writes over any [`VectorBackend`].
//!
//! Inserts are validated immediately, then buffered until `flush_batch_size`
//! records are pending or [`AsyncVectorBackend::flush`] is called. Reads and
//! removes flush first so they observe every earlier write. A failed flush
//! keeps its records pending, and an insert whose threshold flush fails still
//! reports its records as accepted. Once more than `max_pending_writes` are
//! waiting, new writes are rejected with [`VecmemError::Backpressure`].

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use vecmem_core::validation::{validate_batch, MAX_PENDING_WRITES};
use vecmem_core::{
    AsyncVectorBackend, BackendStats, Result, SearchOptions, SearchResult, VecmemError,
    VectorBackend, VectorRecord,
};

/// Flush thresholds for [`BatchingBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchingConfig {
    pub flush_batch_size: usize,
    pub max_pending_writes: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            flush_batch_size: 100,
            max_pending_writes: 1_000,
        }
    }
}

struct State<B> {
    backend: B,
    pending: Vec<VectorRecord>,
}

impl<B: VectorBackend> State<B> {
    /// Dimension established by the backend or, failing that, by the
    /// oldest pending write.
    fn dimension(&self) -> Result<Option<usize>> {
        let stored = self.backend.stats()?.dimension;
        Ok(stored.or_else(|| self.pending.first().map(|r| r.embedding.len())))
    }

    fn flush(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        match self.backend.insert_batch(&self.pending) {
            Ok(count) => {
                self.pending.clear();
                debug!(backend = self.backend.name(), count, "flushed pending writes");
                Ok(count)
            }
            Err(e) => {
                warn!(
                    backend = self.backend.name(),
                    pending = self.pending.len(),
                    error = %e,
                    "flush failed, writes stay pending"
                );
                Err(e)
            }
        }
    }
}

pub struct BatchingBackend<B> {
    name: String,
    config: BatchingConfig,
    state: Mutex<State<B>>,
}

impl<B: VectorBackend> BatchingBackend<B> {
    /// Wrap an initialized backend. `max_pending_writes` is capped at the
    /// global ceiling and `flush_batch_size` at `max_pending_writes`.
    pub fn new(backend: B, config: BatchingConfig) -> Self {
        let max_pending_writes = config.max_pending_writes.clamp(1, MAX_PENDING_WRITES);
        let flush_batch_size = config.flush_batch_size.clamp(1, max_pending_writes);
        Self {
            name: backend.name().to_string(),
            config: BatchingConfig {
                flush_batch_size,
                max_pending_writes,
            },
            state: Mutex::new(State {
                backend,
                pending: Vec::new(),
            }),
        }
    }

    pub fn config(&self) -> BatchingConfig {
        self.config
    }

    /// Unwrap the inner backend after flushing pending writes.
    pub fn into_inner(self) -> Result<B> {
        let mut state = self.state.into_inner();
        state.flush()?;
        Ok(state.backend)
    }

    fn check_capacity(&self, pending: usize, incoming: usize) -> Result<()> {
        let total = pending + incoming;
        if total > self.config.max_pending_writes {
            return Err(VecmemError::Backpressure {
                pending: total,
                limit: self.config.max_pending_writes,
            });
        }
        Ok(())
    }

    /// Validate against the current dimension and buffer, under one lock.
    async fn enqueue(&self, records: Vec<VectorRecord>) -> Result<usize> {
        let mut state = self.state.lock().await;
        let records = validate_batch(&records, state.dimension()?)?;
        let count = records.len();
        self.check_capacity(state.pending.len(), count)?;
        state.pending.extend(records);
        if state.pending.len() >= self.config.flush_batch_size {
            // The writes are queued either way. A failed flush is logged and
            // retried by the next one.
            let _ = state.flush();
        }
        Ok(count)
    }
}

#[async_trait]
impl<B: VectorBackend> AsyncVectorBackend for BatchingBackend<B> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, record: VectorRecord) -> Result<()> {
        self.enqueue(vec![record]).await.map(|_| ())
    }

    async fn insert_batch(&self, records: Vec<VectorRecord>) -> Result<usize> {
        self.enqueue(records).await
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let mut state = self.state.lock().await;
        state.flush()?;
        state.backend.search(query, k, options)
    }

    async fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        let mut state = self.state.lock().await;
        state.flush()?;
        state.backend.get(id)
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.flush()?;
        state.backend.remove(id)
    }

    async fn stats(&self) -> Result<BackendStats> {
        let state = self.state.lock().await;
        let mut stats = state.backend.stats()?;
        stats.pending_writes = state.pending.len();
        Ok(stats)
    }

    async fn save(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().await;
        state.flush()?;
        state.backend.save(path)
    }

    async fn load(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().await;
        state.flush()?;
        state.backend.load(path)
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.flush()?;
        state.backend.close()
    }

    async fn flush(&self) -> Result<usize> {
        self.state.lock().await.flush()
    }
}
