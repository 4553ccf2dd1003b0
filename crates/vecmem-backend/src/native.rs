// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process arena backend.
//!
//! Embeddings live in one contiguous row-major `Vec<f32>`. Each row is
//! addressed by a dense `u32` label; the string id to label mapping never
//! leaves this module. Removal swaps the last row into the hole so the arena
//! stays dense without tombstones.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;
use vecmem_core::validation::{check_dimension, validate_batch, validate_k, validate_record, validate_vector};
use vecmem_core::{
    BackendExtensions, BackendSettings, BackendStats, Metadata, Metric, Result, SearchOptions,
    SearchResult, VecmemError, VectorBackend, VectorRecord,
};

use crate::scan;
use crate::snapshot::{self, Snapshot};

pub const NATIVE_BACKEND: &str = "native";

/// Most capable in-memory backend.
pub struct NativeBackend {
    metric: Metric,
    dimension: Option<usize>,
    arena: Vec<f32>,
    ids: Vec<String>,
    metadata: Vec<Option<Metadata>>,
    labels: HashMap<String, u32>,
    snapshot_path: Option<PathBuf>,
    initialized: bool,
}

impl NativeBackend {
    pub fn new(settings: &BackendSettings) -> Self {
        Self {
            metric: settings.metric,
            dimension: settings.dimension,
            arena: Vec::new(),
            ids: Vec::new(),
            metadata: Vec::new(),
            labels: HashMap::new(),
            snapshot_path: settings.path.clone(),
            initialized: false,
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(VecmemError::NotInitialized(NATIVE_BACKEND.to_string()))
        }
    }

    fn row(&self, label: usize) -> &[f32] {
        let dim = self.dimension.unwrap_or(0);
        &self.arena[label * dim..(label + 1) * dim]
    }

    /// Insert or overwrite an already validated record.
    fn apply(&mut self, record: VectorRecord) {
        let dim = *self.dimension.get_or_insert(record.embedding.len());
        match self.labels.get(&record.id) {
            Some(&label) => {
                let start = label as usize * dim;
                self.arena[start..start + dim].copy_from_slice(&record.embedding);
                self.metadata[label as usize] = record.metadata;
            }
            None => {
                let label = self.ids.len() as u32;
                self.arena.extend_from_slice(&record.embedding);
                self.labels.insert(record.id.clone(), label);
                self.ids.push(record.id);
                self.metadata.push(record.metadata);
            }
        }
    }

    fn clear(&mut self) {
        self.arena.clear();
        self.ids.clear();
        self.metadata.clear();
        self.labels.clear();
    }

    fn snapshot(&self) -> Snapshot {
        let records = (0..self.ids.len())
            .map(|label| VectorRecord {
                id: self.ids[label].clone(),
                embedding: self.row(label).to_vec(),
                metadata: self.metadata[label].clone(),
            })
            .collect();
        Snapshot {
            backend: NATIVE_BACKEND.to_string(),
            metric: self.metric,
            dimension: self.dimension,
            records,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) -> Result<()> {
        let dimension = snapshot.dimension.or(self.dimension);
        let records = validate_batch(&snapshot.records, dimension)?;
        self.clear();
        self.dimension = dimension;
        for record in records {
            self.apply(record);
        }
        Ok(())
    }
}

impl VectorBackend for NativeBackend {
    fn name(&self) -> &str {
        NATIVE_BACKEND
    }

    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        if let Some(path) = self.snapshot_path.clone() {
            if path.exists() {
                let snapshot = snapshot::read(&path, self.metric, self.dimension)?;
                self.restore(snapshot)?;
                debug!(path = %path.display(), count = self.ids.len(), "native snapshot restored");
            }
        }
        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn insert(&mut self, id: &str, embedding: &[f32], metadata: Option<Metadata>) -> Result<()> {
        self.ensure_initialized()?;
        let record = VectorRecord {
            id: id.to_string(),
            embedding: embedding.to_vec(),
            metadata,
        };
        let record = validate_record(&record, self.dimension)?;
        self.apply(record);
        Ok(())
    }

    fn insert_batch(&mut self, records: &[VectorRecord]) -> Result<usize> {
        self.ensure_initialized()?;
        let records = validate_batch(records, self.dimension)?;
        let count = records.len();
        for record in records {
            self.apply(record);
        }
        Ok(count)
    }

    fn search(&self, query: &[f32], k: usize, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        self.ensure_initialized()?;
        validate_k(k)?;
        validate_vector(query)?;
        check_dimension(self.dimension, query.len())?;

        let candidates = (0..self.ids.len()).map(|label| {
            (
                self.ids[label].as_str(),
                self.row(label),
                self.metadata[label].as_ref(),
            )
        });
        Ok(scan::rank(query, candidates, self.metric, k, options))
    }

    fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        self.ensure_initialized()?;
        Ok(self.labels.get(id).map(|&label| VectorRecord {
            id: id.to_string(),
            embedding: self.row(label as usize).to_vec(),
            metadata: self.metadata[label as usize].clone(),
        }))
    }

    fn remove(&mut self, id: &str) -> Result<bool> {
        self.ensure_initialized()?;
        let Some(label) = self.labels.remove(id) else {
            return Ok(false);
        };
        let label = label as usize;
        let last = self.ids.len() - 1;
        let dim = self.dimension.unwrap_or(0);

        if label != last {
            let (head, tail) = self.arena.split_at_mut(last * dim);
            head[label * dim..(label + 1) * dim].copy_from_slice(&tail[..dim]);
            self.labels.insert(self.ids[last].clone(), label as u32);
        }
        self.arena.truncate(last * dim);
        self.ids.swap_remove(label);
        self.metadata.swap_remove(label);
        Ok(true)
    }

    fn stats(&self) -> Result<BackendStats> {
        self.ensure_initialized()?;
        Ok(BackendStats {
            backend: NATIVE_BACKEND.to_string(),
            count: self.ids.len(),
            dimension: self.dimension,
            metric: self.metric,
            pending_writes: 0,
        })
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.ensure_initialized()?;
        snapshot::write(path, &self.snapshot())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.ensure_initialized()?;
        let snapshot = snapshot::read(path, self.metric, self.dimension)?;
        self.restore(snapshot)
    }

    fn close(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        if let Some(path) = &self.snapshot_path {
            snapshot::write(path, &self.snapshot())?;
        }
        self.initialized = false;
        Ok(())
    }

    fn extensions(&self) -> BackendExtensions {
        BackendExtensions {
            graph: false,
            learning: true,
        }
    }
}
