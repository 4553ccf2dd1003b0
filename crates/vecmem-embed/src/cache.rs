// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded embedding cache keyed by `(model id, text)`.
//!
//! Keys match exactly; there is no normalization of the text. Eviction is
//! by insertion order, not access recency: when the cache already holds
//! more than `capacity` entries at insert time, the `evict_count` oldest
//! entries are dropped before the new one is added.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::debug;

/// Default entry count above which eviction runs.
pub const DEFAULT_CAPACITY: usize = 10_000;
/// Default number of entries dropped per eviction.
pub const DEFAULT_EVICT_COUNT: usize = 5_000;

type CacheKey = (String, String);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub capacity: usize,
}

#[derive(Debug)]
pub struct EmbeddingCache {
    entries: HashMap<CacheKey, Vec<f32>>,
    order: VecDeque<CacheKey>,
    capacity: usize,
    evict_count: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_EVICT_COUNT)
    }
}

impl EmbeddingCache {
    /// `evict_count` is clamped to at least 1.
    pub fn new(capacity: usize, evict_count: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
            evict_count: evict_count.max(1),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Look up a vector, recording a hit or miss.
    pub fn get(&mut self, model_id: &str, text: &str) -> Option<Vec<f32>> {
        let key = (model_id.to_string(), text.to_string());
        match self.entries.get(&key) {
            Some(vector) => {
                self.hits += 1;
                metrics::counter!("vecmem_embed_cache_hits_total").increment(1);
                Some(vector.clone())
            }
            None => {
                self.misses += 1;
                metrics::counter!("vecmem_embed_cache_misses_total").increment(1);
                None
            }
        }
    }

    /// Look up without touching the statistics.
    pub fn peek(&self, model_id: &str, text: &str) -> Option<&[f32]> {
        self.entries
            .get(&(model_id.to_string(), text.to_string()))
            .map(Vec::as_slice)
    }

    /// Insert a vector, evicting the oldest entries first when over capacity.
    ///
    /// Replacing an existing key keeps its original insertion position.
    pub fn insert(&mut self, model_id: &str, text: &str, vector: Vec<f32>) {
        let key = (model_id.to_string(), text.to_string());
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = vector;
            return;
        }
        if self.entries.len() > self.capacity {
            self.evict();
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, vector);
    }

    fn evict(&mut self) {
        let count = self.evict_count.min(self.order.len());
        for key in self.order.drain(..count) {
            self.entries.remove(&key);
        }
        self.evictions += count as u64;
        metrics::counter!("vecmem_embed_cache_evictions_total").increment(count as u64);
        debug!(evicted = count, remaining = self.entries.len(), "embedding cache evicted");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Statistics are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            size: self.entries.len(),
            capacity: self.capacity,
        }
    }
}
