// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use vecmem_core::Metadata;

/// One entry in the attention registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionMemory {
    pub id: String,
    pub embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl AttentionMemory {
    pub fn new(id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            embedding,
            content: None,
            metadata: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Per-query attention parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttentionConfig {
    /// Longest `scores` list returned.
    pub top_k: usize,
    /// Smallest normalized weight reported in `scores`.
    pub min_score: f32,
    /// Divides the scaled scores; lower values sharpen the distribution.
    pub temperature: f32,
    /// Include the full distribution in [`AttentionOutput::weights`].
    pub return_weights: bool,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_score: 0.0,
            temperature: 1.0,
            return_weights: false,
        }
    }
}

impl AttentionConfig {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_weights(mut self) -> Self {
        self.return_weights = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionScore {
    pub id: String,
    /// Normalized weight in [0, 1].
    pub score: f32,
}

/// Result of one attention computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionOutput {
    /// Filtered, sorted, truncated view of the distribution.
    pub scores: Vec<AttentionScore>,
    /// Weighted sum over all memories, unfiltered.
    pub attended: Vec<f32>,
    /// Full distribution in registry order, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f32>>,
}
