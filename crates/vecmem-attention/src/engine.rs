// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scaled dot-product attention over the memory registry.

use std::collections::HashMap;

use tracing::debug;
use vecmem_core::error::{Result, ValidationError, VecmemError};
use vecmem_core::validation::{
    check_dimension, sanitize_metadata, validate_id, validate_k, validate_vector, MAX_BATCH_SIZE,
};
use vecmem_core::{VectorBackend, VectorRecord};
use vecmem_kernels::{dot_product, softmax};

use crate::types::{AttentionConfig, AttentionMemory, AttentionOutput, AttentionScore};

/// Metadata key under which memory content is persisted by
/// [`AttentionEngine::sync_to_backend`].
pub const CONTENT_KEY: &str = "content";

/// Registry of memories with a lazily-fixed dimension.
///
/// Iteration order is insertion order; replacing an existing id keeps its
/// slot.
#[derive(Debug, Default)]
pub struct AttentionEngine {
    memories: Vec<AttentionMemory>,
    index: HashMap<String, usize>,
    dimension: Option<usize>,
}

impl AttentionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a memory.
    ///
    /// The first memory pins the dimension. A rejected memory leaves the
    /// registry untouched.
    pub fn add_memory(&mut self, memory: AttentionMemory) -> Result<()> {
        validate_id(&memory.id)?;
        validate_vector(&memory.embedding)?;
        check_dimension(self.dimension, memory.embedding.len())?;
        let metadata = memory.metadata.as_ref().map(sanitize_metadata).transpose()?;
        let memory = AttentionMemory { metadata, ..memory };

        self.dimension.get_or_insert(memory.embedding.len());
        match self.index.get(&memory.id) {
            Some(&slot) => self.memories[slot] = memory,
            None => {
                self.index.insert(memory.id.clone(), self.memories.len());
                self.memories.push(memory);
            }
        }
        Ok(())
    }

    /// Remove a memory by id. Returns whether it existed.
    pub fn remove_memory(&mut self, id: &str) -> bool {
        let Some(slot) = self.index.remove(id) else {
            return false;
        };
        self.memories.remove(slot);
        for (position, memory) in self.memories.iter().enumerate().skip(slot) {
            self.index.insert(memory.id.clone(), position);
        }
        true
    }

    /// Drop every memory and forget the established dimension.
    pub fn clear_memories(&mut self) {
        self.memories.clear();
        self.index.clear();
        self.dimension = None;
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn get(&self, id: &str) -> Option<&AttentionMemory> {
        self.index.get(id).map(|&slot| &self.memories[slot])
    }

    pub fn memories(&self) -> impl Iterator<Item = &AttentionMemory> {
        self.memories.iter()
    }

    /// Self-attention of `query` over the registry.
    pub fn compute_attention(
        &self,
        query: &[f32],
        config: &AttentionConfig,
    ) -> Result<AttentionOutput> {
        validate_config(config)?;
        validate_vector(query)?;
        check_dimension(self.dimension, query.len())?;
        debug!(memories = self.memories.len(), top_k = config.top_k, "computing attention");
        Ok(attend(query, &self.memories, config))
    }

    /// Attention of `query` over a caller-supplied context set.
    ///
    /// The context is validated as a whole against the query's dimension;
    /// the registry is not consulted.
    pub fn cross_attention(
        &self,
        query: &[f32],
        context: &[AttentionMemory],
        config: &AttentionConfig,
    ) -> Result<AttentionOutput> {
        validate_config(config)?;
        validate_vector(query)?;
        for memory in context {
            validate_id(&memory.id)?;
            validate_vector(&memory.embedding)?;
            check_dimension(Some(query.len()), memory.embedding.len())?;
        }
        debug!(context = context.len(), "computing cross attention");
        Ok(attend(query, context, config))
    }

    /// Multi-head self-attention.
    ///
    /// The dimension is split into `num_heads` equal slices, each scaled by
    /// `sqrt(head_dim)`. Attended slices are concatenated; reported scores
    /// are the mean of the per-head distributions.
    pub fn multi_head_attention(
        &self,
        query: &[f32],
        config: &AttentionConfig,
        num_heads: usize,
    ) -> Result<AttentionOutput> {
        validate_config(config)?;
        validate_vector(query)?;
        check_dimension(self.dimension, query.len())?;
        if num_heads == 0 || query.len() % num_heads != 0 {
            return Err(ValidationError::Invalid(format!(
                "dimension {} is not divisible into {num_heads} heads",
                query.len()
            ))
            .into());
        }
        if self.memories.is_empty() {
            return Ok(passthrough(query, config));
        }

        let head_dim = query.len() / num_heads;
        let scale = (head_dim as f32).sqrt() * config.temperature;
        let n = self.memories.len();
        let mut mean = vec![0.0f32; n];
        let mut attended = Vec::with_capacity(query.len());

        for head in 0..num_heads {
            let range = head * head_dim..(head + 1) * head_dim;
            let q = &query[range.clone()];
            let logits: Vec<f32> = self
                .memories
                .iter()
                .map(|m| dot_product(q, &m.embedding[range.clone()]) / scale)
                .collect();
            let weights = softmax(&logits);
            attended.extend(weighted_sum(
                self.memories.iter().map(|m| &m.embedding[range.clone()]),
                &weights,
                head_dim,
            ));
            for (acc, w) in mean.iter_mut().zip(&weights) {
                *acc += w / num_heads as f32;
            }
        }

        debug!(memories = n, num_heads, "computed multi-head attention");
        Ok(AttentionOutput {
            scores: rank(&self.memories, &mean, config),
            attended,
            weights: config.return_weights.then_some(mean),
        })
    }

    /// Persist every memory into `backend`. Returns the number written.
    pub fn sync_to_backend(&self, backend: &mut dyn VectorBackend) -> Result<usize> {
        let records: Vec<VectorRecord> = self
            .memories
            .iter()
            .map(|memory| {
                let mut metadata = memory.metadata.clone().unwrap_or_default();
                if let Some(content) = &memory.content {
                    metadata.insert(CONTENT_KEY.to_string(), content.clone().into());
                }
                let record = VectorRecord::new(memory.id.clone(), memory.embedding.clone());
                if metadata.is_empty() {
                    record
                } else {
                    record.with_metadata(metadata)
                }
            })
            .collect();

        let mut written = 0;
        for chunk in records.chunks(MAX_BATCH_SIZE) {
            written += backend.insert_batch(chunk)?;
        }
        debug!(backend = %backend.name(), written, "synced attention memories");
        Ok(written)
    }
}

fn validate_config(config: &AttentionConfig) -> Result<()> {
    validate_k(config.top_k)?;
    if !(config.temperature.is_finite() && config.temperature > 0.0) {
        return Err(VecmemError::Validation(ValidationError::Invalid(format!(
            "temperature must be positive and finite, got {}",
            config.temperature
        ))));
    }
    if config.min_score.is_nan() {
        return Err(ValidationError::Invalid("min_score must not be NaN".into()).into());
    }
    Ok(())
}

fn passthrough(query: &[f32], config: &AttentionConfig) -> AttentionOutput {
    AttentionOutput {
        scores: Vec::new(),
        attended: query.to_vec(),
        weights: config.return_weights.then(Vec::new),
    }
}

fn attend(query: &[f32], memories: &[AttentionMemory], config: &AttentionConfig) -> AttentionOutput {
    if memories.is_empty() {
        return passthrough(query, config);
    }
    let scale = (query.len() as f32).sqrt() * config.temperature;
    let logits: Vec<f32> = memories
        .iter()
        .map(|m| dot_product(query, &m.embedding) / scale)
        .collect();
    let weights = softmax(&logits);
    let attended = weighted_sum(
        memories.iter().map(|m| m.embedding.as_slice()),
        &weights,
        query.len(),
    );
    AttentionOutput {
        scores: rank(memories, &weights, config),
        attended,
        weights: config.return_weights.then_some(weights),
    }
}

fn weighted_sum<'a>(
    values: impl Iterator<Item = &'a [f32]>,
    weights: &[f32],
    dimension: usize,
) -> Vec<f32> {
    let mut out = vec![0.0f32; dimension];
    for (value, &w) in values.zip(weights) {
        for (acc, v) in out.iter_mut().zip(value) {
            *acc += w * v;
        }
    }
    out
}

fn rank(memories: &[AttentionMemory], weights: &[f32], config: &AttentionConfig) -> Vec<AttentionScore> {
    let mut scores: Vec<AttentionScore> = memories
        .iter()
        .zip(weights)
        .filter(|(_, w)| **w >= config.min_score)
        .map(|(m, &w)| AttentionScore {
            id: m.id.clone(),
            score: w,
        })
        .collect();
    // Stable sort keeps insertion order among equal weights.
    scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scores.truncate(config.top_k);
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine_with(memories: &[(&str, Vec<f32>)]) -> AttentionEngine {
        let mut engine = AttentionEngine::new();
        for (id, embedding) in memories {
            engine
                .add_memory(AttentionMemory::new(*id, embedding.clone()))
                .unwrap();
        }
        engine
    }

    #[test]
    fn empty_registry_returns_query() {
        let engine = AttentionEngine::new();
        let out = engine
            .compute_attention(&[0.5, -1.0, 2.0], &AttentionConfig::default())
            .unwrap();
        assert!(out.scores.is_empty());
        assert_eq!(out.attended, vec![0.5, -1.0, 2.0]);
        assert!(out.weights.is_none());
    }

    #[test]
    fn dimension_mismatch_leaves_registry_unchanged() {
        let mut engine = engine_with(&[("a", vec![1.0, 0.0, 0.0])]);
        let err = engine
            .add_memory(AttentionMemory::new("b", vec![1.0, 0.0, 0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            VecmemError::Validation(ValidationError::DimensionMismatch {
                expected: 3,
                actual: 4
            })
        ));
        assert_eq!(engine.len(), 1);
        assert!(engine.get("b").is_none());
        assert_eq!(engine.dimension(), Some(3));
    }

    #[test]
    fn rejects_empty_embedding_and_id() {
        let mut engine = AttentionEngine::new();
        assert!(engine.add_memory(AttentionMemory::new("a", vec![])).is_err());
        assert!(engine.add_memory(AttentionMemory::new("", vec![1.0])).is_err());
        assert!(engine.is_empty());
        assert_eq!(engine.dimension(), None);
    }

    #[test]
    fn clear_resets_dimension() {
        let mut engine = engine_with(&[("a", vec![1.0, 0.0])]);
        engine.clear_memories();
        assert_eq!(engine.dimension(), None);
        engine
            .add_memory(AttentionMemory::new("b", vec![1.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(engine.dimension(), Some(3));
    }

    #[test]
    fn remove_keeps_order_and_index() {
        let mut engine = engine_with(&[
            ("a", vec![1.0, 0.0]),
            ("b", vec![0.0, 1.0]),
            ("c", vec![1.0, 1.0]),
        ]);
        assert!(engine.remove_memory("a"));
        assert!(!engine.remove_memory("a"));
        let ids: Vec<&str> = engine.memories().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(engine.get("c").unwrap().embedding, vec![1.0, 1.0]);
    }

    #[test]
    fn upsert_keeps_slot() {
        let mut engine = engine_with(&[("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])]);
        engine
            .add_memory(AttentionMemory::new("a", vec![0.5, 0.5]).with_content("updated"))
            .unwrap();
        assert_eq!(engine.len(), 2);
        let first = engine.memories().next().unwrap();
        assert_eq!(first.id, "a");
        assert_eq!(first.content.as_deref(), Some("updated"));
    }

    #[test]
    fn metadata_is_sanitized() {
        let mut engine = AttentionEngine::new();
        let metadata = json!({"__proto__": {"x": 1}, "topic": "rust"})
            .as_object()
            .cloned()
            .unwrap();
        engine
            .add_memory(AttentionMemory::new("a", vec![1.0]).with_metadata(metadata))
            .unwrap();
        let stored = engine.get("a").unwrap().metadata.as_ref().unwrap();
        assert!(!stored.contains_key("__proto__"));
        assert_eq!(stored["topic"], "rust");
    }

    #[test]
    fn attended_uses_full_distribution() {
        let engine = engine_with(&[
            ("near", vec![4.0, 0.0]),
            ("far", vec![0.0, 4.0]),
        ]);
        let config = AttentionConfig::default().with_top_k(1).with_weights();
        let out = engine.compute_attention(&[1.0, 0.0], &config).unwrap();

        assert_eq!(out.scores.len(), 1);
        assert_eq!(out.scores[0].id, "near");

        let weights = out.weights.unwrap();
        assert_eq!(weights.len(), 2);
        // The filtered-out memory still contributes to the attended vector.
        assert!(out.attended[1] > 0.0);
        assert!((out.attended[0] - 4.0 * weights[0]).abs() < 1e-5);
        assert!((out.attended[1] - 4.0 * weights[1]).abs() < 1e-5);
    }

    #[test]
    fn scaled_dot_product_matches_hand_computation() {
        let engine = engine_with(&[("a", vec![2.0, 0.0]), ("b", vec![0.0, 0.0])]);
        let out = engine
            .compute_attention(&[1.0, 0.0], &AttentionConfig::default().with_weights())
            .unwrap();
        let logit = 2.0f32 / 2.0f32.sqrt();
        let expected = logit.exp() / (logit.exp() + 1.0);
        let weights = out.weights.unwrap();
        assert!((weights[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn min_score_filters_report_only() {
        let engine = engine_with(&[("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])]);
        let config = AttentionConfig::default().with_min_score(0.99);
        let out = engine.compute_attention(&[1.0, 1.0], &config).unwrap();
        assert!(out.scores.is_empty());
        assert!((out.attended[0] - 0.5).abs() < 1e-5);
        assert!((out.attended[1] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn lower_temperature_sharpens() {
        let engine = engine_with(&[("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])]);
        let warm = engine
            .compute_attention(&[1.0, 0.2], &AttentionConfig::default())
            .unwrap();
        let cold = engine
            .compute_attention(&[1.0, 0.2], &AttentionConfig::default().with_temperature(0.1))
            .unwrap();
        assert!(cold.scores[0].score > warm.scores[0].score);
    }

    #[test]
    fn rejects_bad_config_and_query() {
        let engine = engine_with(&[("a", vec![1.0, 0.0])]);
        let bad_temp = AttentionConfig::default().with_temperature(0.0);
        assert!(engine.compute_attention(&[1.0, 0.0], &bad_temp).is_err());
        let bad_k = AttentionConfig::default().with_top_k(0);
        assert!(engine.compute_attention(&[1.0, 0.0], &bad_k).is_err());
        let err = engine
            .compute_attention(&[1.0, 0.0, 0.0], &AttentionConfig::default())
            .unwrap_err();
        assert!(err.is_validation());
        assert!(engine
            .compute_attention(&[f32::NAN, 0.0], &AttentionConfig::default())
            .is_err());
    }

    #[test]
    fn cross_attention_uses_context_only() {
        let engine = engine_with(&[("registry", vec![1.0, 0.0])]);
        let context = vec![
            AttentionMemory::new("x", vec![0.0, 3.0]),
            AttentionMemory::new("y", vec![3.0, 0.0]),
        ];
        let out = engine
            .cross_attention(&[0.0, 1.0], &context, &AttentionConfig::default())
            .unwrap();
        assert_eq!(out.scores[0].id, "x");
        assert!(out.scores.iter().all(|s| s.id != "registry"));

        let empty = engine
            .cross_attention(&[0.0, 1.0], &[], &AttentionConfig::default())
            .unwrap();
        assert_eq!(empty.attended, vec![0.0, 1.0]);

        let mismatched = vec![AttentionMemory::new("z", vec![1.0, 0.0, 0.0])];
        assert!(engine
            .cross_attention(&[0.0, 1.0], &mismatched, &AttentionConfig::default())
            .is_err());
    }

    #[test]
    fn multi_head_concatenates_heads() {
        let engine = engine_with(&[
            ("a", vec![1.0, 0.0, 0.0, 1.0]),
            ("b", vec![0.0, 1.0, 1.0, 0.0]),
        ]);
        let config = AttentionConfig::default().with_weights();
        let out = engine
            .multi_head_attention(&[1.0, 0.0, 1.0, 0.0], &config, 2)
            .unwrap();
        assert_eq!(out.attended.len(), 4);
        let weights = out.weights.unwrap();
        let total: f32 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        // Head one prefers a, head two prefers b; the mean is balanced.
        assert!((weights[0] - weights[1]).abs() < 1e-5);
        assert!(out.attended[0] > out.attended[1]);
        assert!(out.attended[2] > out.attended[3]);
    }

    #[test]
    fn multi_head_requires_divisible_dimension() {
        let engine = engine_with(&[("a", vec![1.0, 0.0, 0.0])]);
        let err = engine
            .multi_head_attention(&[1.0, 0.0, 0.0], &AttentionConfig::default(), 2)
            .unwrap_err();
        assert!(err.is_validation());
        assert!(engine
            .multi_head_attention(&[1.0, 0.0, 0.0], &AttentionConfig::default(), 0)
            .is_err());
    }

    #[test]
    fn multi_head_on_empty_registry_returns_query() {
        let engine = AttentionEngine::new();
        let out = engine
            .multi_head_attention(&[1.0, 2.0], &AttentionConfig::default(), 2)
            .unwrap();
        assert_eq!(out.attended, vec![1.0, 2.0]);
        assert!(out.scores.is_empty());
    }
}
