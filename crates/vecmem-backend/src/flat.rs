// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Always-available fallback backend: an ordered map scanned in full on
//! every search.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use vecmem_core::validation::{check_dimension, validate_batch, validate_k, validate_record, validate_vector};
use vecmem_core::{
    BackendSettings, BackendStats, Metadata, Metric, Result, SearchOptions, SearchResult,
    VecmemError, VectorBackend, VectorRecord,
};

use crate::scan;
use crate::snapshot::{self, Snapshot};

pub const FLAT_BACKEND: &str = "flat";

struct Entry {
    embedding: Vec<f32>,
    metadata: Option<Metadata>,
}

pub struct FlatBackend {
    metric: Metric,
    dimension: Option<usize>,
    entries: BTreeMap<String, Entry>,
    snapshot_path: Option<PathBuf>,
    initialized: bool,
}

impl FlatBackend {
    pub fn new(settings: &BackendSettings) -> Self {
        Self {
            metric: settings.metric,
            dimension: settings.dimension,
            entries: BTreeMap::new(),
            snapshot_path: settings.path.clone(),
            initialized: false,
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(VecmemError::NotInitialized(FLAT_BACKEND.to_string()))
        }
    }

    fn apply(&mut self, record: VectorRecord) {
        self.dimension.get_or_insert(record.embedding.len());
        self.entries.insert(
            record.id,
            Entry {
                embedding: record.embedding,
                metadata: record.metadata,
            },
        );
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            backend: FLAT_BACKEND.to_string(),
            metric: self.metric,
            dimension: self.dimension,
            records: self
                .entries
                .iter()
                .map(|(id, e)| VectorRecord {
                    id: id.clone(),
                    embedding: e.embedding.clone(),
                    metadata: e.metadata.clone(),
                })
                .collect(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) -> Result<()> {
        let dimension = snapshot.dimension.or(self.dimension);
        let records = validate_batch(&snapshot.records, dimension)?;
        self.entries.clear();
        self.dimension = dimension;
        records.into_iter().for_each(|r| self.apply(r));
        Ok(())
    }
}

impl VectorBackend for FlatBackend {
    fn name(&self) -> &str {
        FLAT_BACKEND
    }

    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        if let Some(path) = self.snapshot_path.clone() {
            if path.exists() {
                let snapshot = snapshot::read(&path, self.metric, self.dimension)?;
                self.restore(snapshot)?;
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
        records.into_iter().for_each(|r| self.apply(r));
        Ok(count)
    }

    fn search(&self, query: &[f32], k: usize, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        self.ensure_initialized()?;
        validate_k(k)?;
        validate_vector(query)?;
        check_dimension(self.dimension, query.len())?;

        let candidates = self
            .entries
            .iter()
            .map(|(id, e)| (id.as_str(), e.embedding.as_slice(), e.metadata.as_ref()));
        Ok(scan::rank(query, candidates, self.metric, k, options))
    }

    fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        self.ensure_initialized()?;
        Ok(self.entries.get(id).map(|e| VectorRecord {
            id: id.to_string(),
            embedding: e.embedding.clone(),
            metadata: e.metadata.clone(),
        }))
    }

    fn remove(&mut self, id: &str) -> Result<bool> {
        self.ensure_initialized()?;
        Ok(self.entries.remove(id).is_some())
    }

    fn stats(&self) -> Result<BackendStats> {
        self.ensure_initialized()?;
        Ok(BackendStats {
            backend: FLAT_BACKEND.to_string(),
            count: self.entries.len(),
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
}
