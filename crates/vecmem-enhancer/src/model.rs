// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model seam for the query enhancer.

use serde::{Deserialize, Serialize};
use vecmem_core::Result;

/// One labelled feedback sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub embedding: Vec<f32>,
    /// 1.0 when the raw query led to a successful outcome, 0.0 otherwise.
    pub label: f32,
}

impl TrainingSample {
    pub fn new(embedding: Vec<f32>, success: bool) -> Self {
        Self {
            embedding,
            label: if success { 1.0 } else { 0.0 },
        }
    }
}

/// A trainable query-refinement model.
pub trait EnhancerModel: Send + Sync {
    /// Human-readable model name for logs and stats.
    fn name(&self) -> &str;

    /// Width the model is sized for, once known.
    fn dimension(&self) -> Option<usize>;

    /// Size parameters for `dimension`. Resets learned state when the
    /// width changes.
    fn prepare(&mut self, dimension: usize);

    /// Refine `query` using its neighbors and their edge weights.
    ///
    /// An empty `weights` slice means uniform weights.
    fn forward(&self, query: &[f32], neighbors: &[Vec<f32>], weights: &[f32]) -> Result<Vec<f32>>;

    /// One optimizer step over a mini-batch. Returns the mean batch loss.
    fn train_step(&mut self, batch: &[TrainingSample], learning_rate: f32, weight_decay: f32)
        -> Result<f32>;

    /// Serialize learned parameters.
    fn to_bytes(&self) -> Result<Vec<u8>>;

    /// Replace learned parameters from [`EnhancerModel::to_bytes`] output.
    fn load_bytes(&mut self, bytes: &[u8]) -> Result<()>;
}
