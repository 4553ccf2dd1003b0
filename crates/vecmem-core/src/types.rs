// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Value types shared by backends, the resolver and the engine.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opaque key/value metadata attached to a record.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A single stored vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Caller-supplied unique identifier.
    pub id: String,
    /// Fixed-width embedding. Width is pinned per backend at first insert.
    pub embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            embedding,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// One hit returned by a backend search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    /// Raw backend-native distance.
    pub distance: f32,
    /// Normalized to [0, 1], 1 = most similar.
    pub similarity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Sort results by descending similarity, ties broken by id for stable output.
pub fn sort_by_similarity(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Distance metric used by a backend instance.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// `1 - cos(a, b)`.
    #[default]
    Cosine,
    /// Euclidean (L2) distance.
    Euclidean,
    /// Negated inner product.
    Dot,
}

impl Metric {
    /// Backend-native distance between two equal-length vectors.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => 1.0 - vecmem_kernels::cosine_similarity(a, b),
            Metric::Euclidean => vecmem_kernels::l2_distance(a, b),
            Metric::Dot => -vecmem_kernels::dot_product(a, b),
        }
    }

    /// Map a distance of this metric onto [0, 1].
    pub fn similarity(&self, distance: f32) -> f32 {
        if !distance.is_finite() {
            return 0.0;
        }
        match self {
            Metric::Cosine => (1.0 - distance).clamp(0.0, 1.0),
            Metric::Euclidean => 1.0 / (1.0 + distance.max(0.0)),
            Metric::Dot => vecmem_kernels::sigmoid(-distance),
        }
    }
}

/// Optional knobs for [`crate::traits::VectorBackend::search`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    /// Drop results whose similarity is below this value.
    pub threshold: Option<f32>,
    /// Keep only results whose metadata contains every key/value here.
    pub filter: Option<Metadata>,
}

impl SearchOptions {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_filter(mut self, filter: Metadata) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Whether a record with this metadata passes the filter.
    pub fn matches(&self, metadata: Option<&Metadata>) -> bool {
        let Some(filter) = &self.filter else {
            return true;
        };
        let Some(metadata) = metadata else {
            return filter.is_empty();
        };
        filter
            .iter()
            .all(|(key, value)| metadata.get(key) == Some(value))
    }

    /// Whether a similarity passes the threshold.
    pub fn accepts(&self, similarity: f32) -> bool {
        self.threshold.is_none_or(|t| similarity >= t)
    }
}

/// Optional extensions a backend family supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendExtensions {
    /// Graph queries over stored vectors.
    pub graph: bool,
    /// Hosts the learned query enhancer.
    pub learning: bool,
}

/// Capability report for one backend candidate. Not mutated after detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDetection {
    /// Candidate name, e.g. `sqlite-vec`.
    pub name: String,
    /// Family used for explicit selection, e.g. `sqlite`.
    pub family: String,
    /// Whether the candidate can be constructed in this process.
    pub available: bool,
    /// Native/SIMD-accelerated rather than portable.
    pub native: bool,
    pub extensions: BackendExtensions,
    /// Human-readable probe detail (version string or failure reason).
    pub detail: Option<String>,
}

impl BackendDetection {
    pub fn available(name: &str, family: &str, native: bool) -> Self {
        Self {
            name: name.to_string(),
            family: family.to_string(),
            available: true,
            native,
            extensions: BackendExtensions::default(),
            detail: None,
        }
    }

    pub fn unavailable(name: &str, family: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            family: family.to_string(),
            available: false,
            native: false,
            extensions: BackendExtensions::default(),
            detail: Some(reason.into()),
        }
    }

    pub fn with_extensions(mut self, extensions: BackendExtensions) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Point-in-time statistics reported by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStats {
    pub backend: String,
    pub count: usize,
    pub dimension: Option<usize>,
    pub metric: Metric,
    /// Unflushed writes buffered by an async batching layer.
    pub pending_writes: usize,
}

/// Construction parameters handed to a backend factory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendSettings {
    /// Fixed width; `None` pins it at the first insert.
    pub dimension: Option<usize>,
    pub metric: Metric,
    /// Location for single-file backends. `None` keeps data in memory.
    pub path: Option<std::path::PathBuf>,
}
