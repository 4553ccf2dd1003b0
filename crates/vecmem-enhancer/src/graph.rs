// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph-attention query model.
//!
//! Neighbors are attended with scaled dot-product scores biased by the log
//! of their edge weight. A learned gate `p = sigmoid(u . q + b)` estimates
//! how likely the raw query is to succeed on its own, and the output mixes
//! the query with the attended context:
//!
//! ```text
//! out = normalize(p * q + (1 - p) * ctx)
//! ```
//!
//! The gate is trained with binary cross-entropy against feedback labels.

use serde::{Deserialize, Serialize};
use vecmem_core::error::{Result, ValidationError, VecmemError};
use vecmem_kernels::{adamw_step, dot_product, l2_normalize, sigmoid, softmax};

use crate::model::{EnhancerModel, TrainingSample};

const MODEL_NAME: &str = "graph-attention";
const FORMAT_VERSION: u32 = 1;
/// Floor for edge weights before taking the log.
const MIN_EDGE_WEIGHT: f32 = 1e-6;
/// Clamp for probabilities inside the BCE log terms.
const BCE_EPS: f32 = 1e-7;

#[derive(Debug, Clone, Default)]
pub struct GraphAttentionModel {
    dimension: Option<usize>,
    /// Gate weights followed by the gate bias.
    params: Vec<f32>,
    first_moment: Vec<f32>,
    second_moment: Vec<f32>,
    step: u32,
}

#[derive(Serialize, Deserialize)]
struct PersistedModel {
    format_version: u32,
    model: String,
    dimension: usize,
    gate: Vec<f32>,
    bias: f32,
    step: u32,
}

impl GraphAttentionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(dimension: usize) -> Self {
        let mut model = Self::new();
        model.prepare(dimension);
        model
    }

    /// Probability that `query` succeeds without refinement.
    pub fn gate(&self, query: &[f32]) -> f32 {
        let (weights, bias) = self.split();
        sigmoid(dot_product(weights, query) + bias)
    }

    fn split(&self) -> (&[f32], f32) {
        match self.params.split_last() {
            Some((bias, weights)) => (weights, *bias),
            None => (&[], 0.0),
        }
    }

    fn require_dimension(&self, actual: usize) -> Result<usize> {
        let expected = self
            .dimension
            .ok_or_else(|| VecmemError::NotInitialized(MODEL_NAME.to_string()))?;
        if expected != actual {
            return Err(ValidationError::DimensionMismatch { expected, actual }.into());
        }
        Ok(expected)
    }
}

impl EnhancerModel for GraphAttentionModel {
    fn name(&self) -> &str {
        MODEL_NAME
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn prepare(&mut self, dimension: usize) {
        if self.dimension == Some(dimension) {
            return;
        }
        self.dimension = Some(dimension);
        self.params = vec![0.0; dimension + 1];
        self.first_moment = vec![0.0; dimension + 1];
        self.second_moment = vec![0.0; dimension + 1];
        self.step = 0;
    }

    fn forward(&self, query: &[f32], neighbors: &[Vec<f32>], weights: &[f32]) -> Result<Vec<f32>> {
        let dimension = self.require_dimension(query.len())?;
        if neighbors.is_empty() {
            return Ok(query.to_vec());
        }
        if !weights.is_empty() && weights.len() != neighbors.len() {
            return Err(ValidationError::Invalid(format!(
                "{} edge weights for {} neighbors",
                weights.len(),
                neighbors.len()
            ))
            .into());
        }

        let scale = (dimension as f32).sqrt();
        let mut logits = Vec::with_capacity(neighbors.len());
        for (i, neighbor) in neighbors.iter().enumerate() {
            if neighbor.len() != dimension {
                return Err(ValidationError::DimensionMismatch {
                    expected: dimension,
                    actual: neighbor.len(),
                }
                .into());
            }
            let edge = weights.get(i).copied().unwrap_or(1.0).max(MIN_EDGE_WEIGHT);
            logits.push(dot_product(query, neighbor) / scale + edge.ln());
        }
        let attention = softmax(&logits);

        let mut context = vec![0.0f32; dimension];
        for (neighbor, a) in neighbors.iter().zip(&attention) {
            for (c, v) in context.iter_mut().zip(neighbor) {
                *c += a * v;
            }
        }

        let p = self.gate(query);
        let mixed: Vec<f32> = query
            .iter()
            .zip(&context)
            .map(|(q, c)| p * q + (1.0 - p) * c)
            .collect();
        let out = l2_normalize(&mixed);
        if out.iter().any(|v| !v.is_finite()) {
            return Err(VecmemError::Internal("enhanced query is not finite".into()));
        }
        Ok(out)
    }

    fn train_step(
        &mut self,
        batch: &[TrainingSample],
        learning_rate: f32,
        weight_decay: f32,
    ) -> Result<f32> {
        if batch.is_empty() {
            return Ok(0.0);
        }
        let dimension = self.require_dimension(batch[0].embedding.len())?;
        let mut grads = vec![0.0f32; dimension + 1];
        let mut loss = 0.0f32;

        for sample in batch {
            self.require_dimension(sample.embedding.len())?;
            let p = self.gate(&sample.embedding).clamp(BCE_EPS, 1.0 - BCE_EPS);
            let y = sample.label;
            loss -= y * p.ln() + (1.0 - y) * (1.0 - p).ln();
            let delta = p - y;
            for (g, x) in grads.iter_mut().zip(&sample.embedding) {
                *g += delta * x;
            }
            grads[dimension] += delta;
        }

        let n = batch.len() as f32;
        for g in &mut grads {
            *g /= n;
        }
        self.step = self.step.saturating_add(1);
        adamw_step(
            &mut self.params,
            &grads,
            &mut self.first_moment,
            &mut self.second_moment,
            self.step,
            learning_rate,
            weight_decay,
        );
        Ok(loss / n)
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let dimension = self
            .dimension
            .ok_or_else(|| VecmemError::NotInitialized(MODEL_NAME.to_string()))?;
        let (gate, bias) = self.split();
        let persisted = PersistedModel {
            format_version: FORMAT_VERSION,
            model: MODEL_NAME.to_string(),
            dimension,
            gate: gate.to_vec(),
            bias,
            step: self.step,
        };
        serde_json::to_vec_pretty(&persisted).map_err(VecmemError::storage)
    }

    fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let persisted: PersistedModel = serde_json::from_slice(bytes).map_err(VecmemError::storage)?;
        if persisted.model != MODEL_NAME {
            return Err(VecmemError::Config(format!(
                "model file holds `{}`, expected `{MODEL_NAME}`",
                persisted.model
            )));
        }
        if persisted.format_version != FORMAT_VERSION {
            return Err(VecmemError::Config(format!(
                "unsupported model format version {}",
                persisted.format_version
            )));
        }
        vecmem_core::validation::validate_dimension(persisted.dimension)?;
        if persisted.gate.len() != persisted.dimension {
            return Err(ValidationError::DimensionMismatch {
                expected: persisted.dimension,
                actual: persisted.gate.len(),
            }
            .into());
        }

        let mut params = persisted.gate;
        params.push(persisted.bias);
        self.dimension = Some(persisted.dimension);
        self.first_moment = vec![0.0; params.len()];
        self.second_moment = vec![0.0; params.len()];
        self.params = params;
        self.step = persisted.step;
        Ok(())
    }
}
