// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable backend candidate.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vecmem_core::types::sort_by_similarity;
use vecmem_core::validation::{validate_batch, validate_k};
use vecmem_core::{
    BackendDetection, BackendFactory, BackendSettings, BackendStats, Metadata, Metric, Result,
    SearchOptions, SearchResult, VecmemError, VectorBackend, VectorRecord,
};

/// Factory whose detection and initialization outcome is set by the test.
pub struct MockBackendFactory {
    name: String,
    family: String,
    priority: u32,
    unavailable: Option<String>,
    init_failure: Option<String>,
    created: Arc<AtomicUsize>,
}

impl MockBackendFactory {
    /// An available candidate that initializes successfully.
    pub fn new(name: &str, family: &str, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            family: family.to_string(),
            priority,
            unavailable: None,
            init_failure: None,
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Detection reports the candidate as not installed.
    pub fn unavailable(mut self, reason: &str) -> Self {
        self.unavailable = Some(reason.to_string());
        self
    }

    /// Construction succeeds but `initialize()` fails with this message.
    pub fn failing_init(mut self, message: &str) -> Self {
        self.init_failure = Some(message.to_string());
        self
    }

    /// Shared counter of backends created by this factory.
    pub fn created(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.created)
    }
}

impl BackendFactory for MockBackendFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> &str {
        &self.family
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn detect(&self) -> BackendDetection {
        match &self.unavailable {
            Some(reason) => BackendDetection::unavailable(&self.name, &self.family, reason.clone()),
            None => BackendDetection::available(&self.name, &self.family, false),
        }
    }

    fn create(&self, settings: &BackendSettings) -> Result<Box<dyn VectorBackend>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockBackend {
            name: self.name.clone(),
            metric: settings.metric,
            dimension: settings.dimension,
            records: Vec::new(),
            init_failure: self.init_failure.clone(),
            initialized: false,
        }))
    }

    fn install_hint(&self) -> &str {
        "install the mock backend"
    }
}

/// Minimal in-memory backend produced by [`MockBackendFactory`].
pub struct MockBackend {
    name: String,
    metric: Metric,
    dimension: Option<usize>,
    records: Vec<VectorRecord>,
    init_failure: Option<String>,
    initialized: bool,
}

impl VectorBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        if let Some(message) = &self.init_failure {
            return Err(VecmemError::Backend {
                backend: self.name.clone(),
                message: message.clone(),
            });
        }
        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn insert(&mut self, id: &str, embedding: &[f32], metadata: Option<Metadata>) -> Result<()> {
        let record = VectorRecord {
            id: id.to_string(),
            embedding: embedding.to_vec(),
            metadata,
        };
        self.insert_batch(&[record]).map(|_| ())
    }

    fn insert_batch(&mut self, records: &[VectorRecord]) -> Result<usize> {
        let records = validate_batch(records, self.dimension)?;
        for record in &records {
            self.dimension.get_or_insert(record.embedding.len());
            self.records.retain(|r| r.id != record.id);
            self.records.push(record.clone());
        }
        Ok(records.len())
    }

    fn search(&self, query: &[f32], k: usize, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        validate_k(k)?;
        let mut results: Vec<SearchResult> = self
            .records
            .iter()
            .filter(|r| options.matches(r.metadata.as_ref()))
            .map(|r| {
                let distance = self.metric.distance(query, &r.embedding);
                SearchResult {
                    id: r.id.clone(),
                    distance,
                    similarity: self.metric.similarity(distance),
                    metadata: r.metadata.clone(),
                }
            })
            .filter(|r| options.accepts(r.similarity))
            .collect();
        sort_by_similarity(&mut results);
        results.truncate(k);
        Ok(results)
    }

    fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        Ok(self.records.iter().find(|r| r.id == id).cloned())
    }

    fn remove(&mut self, id: &str) -> Result<bool> {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        Ok(self.records.len() != before)
    }

    fn stats(&self) -> Result<BackendStats> {
        Ok(BackendStats {
            backend: self.name.clone(),
            count: self.records.len(),
            dimension: self.dimension,
            metric: self.metric,
            pending_writes: 0,
        })
    }

    fn save(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn load(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.initialized = false;
        Ok(())
    }
}
