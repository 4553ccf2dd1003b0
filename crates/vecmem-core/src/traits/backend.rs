// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The vector backend capability contract.
//!
//! Every storage/search implementation satisfies [`VectorBackend`]. Identifiers
//! are opaque strings; any numeric label mapping stays inside the backend.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    BackendDetection, BackendExtensions, BackendSettings, BackendStats, Metadata, SearchOptions,
    SearchResult, VectorRecord,
};

/// Synchronous backend contract.
///
/// Inserting an existing id replaces the stored record. Search results are
/// sorted by descending similarity.
pub trait VectorBackend: Send {
    /// Candidate name of this implementation, e.g. `sqlite-vec`.
    fn name(&self) -> &str;

    /// Acquire resources. Calling it on an initialized backend is a no-op.
    fn initialize(&mut self) -> Result<()>;

    fn is_initialized(&self) -> bool;

    fn insert(&mut self, id: &str, embedding: &[f32], metadata: Option<Metadata>) -> Result<()>;

    /// Insert many records. The batch is validated in full before any write.
    fn insert_batch(&mut self, records: &[VectorRecord]) -> Result<usize>;

    fn search(&self, query: &[f32], k: usize, options: &SearchOptions) -> Result<Vec<SearchResult>>;

    fn get(&self, id: &str) -> Result<Option<VectorRecord>>;

    /// Returns `true` if a record was removed.
    fn remove(&mut self, id: &str) -> Result<bool>;

    fn stats(&self) -> Result<BackendStats>;

    fn save(&self, path: &Path) -> Result<()>;

    fn load(&mut self, path: &Path) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// Optional extensions hosted by this backend.
    fn extensions(&self) -> BackendExtensions {
        BackendExtensions::default()
    }
}

impl<T: VectorBackend + ?Sized> VectorBackend for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn initialize(&mut self) -> Result<()> {
        (**self).initialize()
    }

    fn is_initialized(&self) -> bool {
        (**self).is_initialized()
    }

    fn insert(&mut self, id: &str, embedding: &[f32], metadata: Option<Metadata>) -> Result<()> {
        (**self).insert(id, embedding, metadata)
    }

    fn insert_batch(&mut self, records: &[VectorRecord]) -> Result<usize> {
        (**self).insert_batch(records)
    }

    fn search(&self, query: &[f32], k: usize, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        (**self).search(query, k, options)
    }

    fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        (**self).get(id)
    }

    fn remove(&mut self, id: &str) -> Result<bool> {
        (**self).remove(id)
    }

    fn stats(&self) -> Result<BackendStats> {
        (**self).stats()
    }

    fn save(&self, path: &Path) -> Result<()> {
        (**self).save(path)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        (**self).load(path)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn extensions(&self) -> BackendExtensions {
        (**self).extensions()
    }
}

/// Non-blocking mirror of [`VectorBackend`] with explicit flushing of
/// internally batched writes.
#[async_trait]
pub trait AsyncVectorBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn insert(&self, record: VectorRecord) -> Result<()>;

    async fn insert_batch(&self, records: Vec<VectorRecord>) -> Result<usize>;

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>>;

    async fn get(&self, id: &str) -> Result<Option<VectorRecord>>;

    async fn remove(&self, id: &str) -> Result<bool>;

    async fn stats(&self) -> Result<BackendStats>;

    async fn save(&self, path: &Path) -> Result<()>;

    async fn load(&self, path: &Path) -> Result<()>;

    async fn close(&self) -> Result<()>;

    /// Force pending writes into the backend. Returns how many were written.
    async fn flush(&self) -> Result<usize>;
}

/// Named constructor for one backend candidate.
///
/// Detection must not fully initialize the backend; it only probes whether
/// construction can work in this process.
pub trait BackendFactory: Send + Sync {
    /// Candidate name, unique within a registry.
    fn name(&self) -> &str;

    /// Family used for explicit selection (`native`, `sqlite`, `flat`).
    fn family(&self) -> &str;

    /// Lower runs earlier under automatic resolution.
    fn priority(&self) -> u32;

    fn detect(&self) -> BackendDetection;

    /// Build an uninitialized backend.
    fn create(&self, settings: &BackendSettings) -> Result<Box<dyn VectorBackend>>;

    /// What to install or enable when this candidate is missing.
    fn install_hint(&self) -> &str;
}
