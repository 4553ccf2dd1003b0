// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query enhancer lifecycle.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vecmem_core::error::{Result, ValidationError, VecmemError};
use vecmem_core::validation::{check_dimension, validate_dimension, validate_fs_path, validate_vector};

use crate::model::{EnhancerModel, TrainingSample};

const COMPONENT: &str = "query enhancer";

/// Static enhancer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancerSettings {
    /// Model width. Pinned by the first sample when unset.
    pub dimension: Option<usize>,
    pub learning_rate: f32,
    pub weight_decay: f32,
    /// Fewest buffered samples accepted by [`QueryEnhancer::train`].
    pub min_samples: usize,
}

impl Default for EnhancerSettings {
    fn default() -> Self {
        Self {
            dimension: None,
            learning_rate: 0.01,
            weight_decay: 0.01,
            min_samples: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainOptions {
    pub epochs: usize,
    pub batch_size: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub epochs: usize,
    /// Mean loss over the last epoch.
    pub final_loss: f32,
    /// Buffered samples consumed by this run.
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancerStats {
    pub initialized: bool,
    pub trained: bool,
    pub buffered_samples: usize,
    pub dimension: Option<usize>,
    pub model: Option<String>,
    pub settings: EnhancerSettings,
}

/// Learned query enhancer with an explicit lifecycle.
///
/// Every operation except [`QueryEnhancer::stats`] fails with
/// `NotInitialized` until [`QueryEnhancer::initialize`] succeeds.
pub struct QueryEnhancer {
    settings: EnhancerSettings,
    model: Option<Box<dyn EnhancerModel>>,
    trained: bool,
    buffer: Vec<TrainingSample>,
}

impl QueryEnhancer {
    pub fn new(settings: EnhancerSettings) -> Self {
        Self {
            settings,
            model: None,
            trained: false,
            buffer: Vec::new(),
        }
    }

    /// Select and construct the model.
    ///
    /// Fails with `MissingDependency` when no model is compiled in.
    /// Calling it again is a no-op.
    pub fn initialize(&mut self) -> Result<()> {
        if self.model.is_some() {
            return Ok(());
        }
        if let Some(dimension) = self.settings.dimension {
            validate_dimension(dimension)?;
        }
        let mut model = select_model()?;
        if let Some(dimension) = self.settings.dimension {
            model.prepare(dimension);
        }
        info!(model = model.name(), "query enhancer initialized");
        self.model = Some(model);
        Ok(())
    }

    /// Install a caller-supplied model instead of the built-in one.
    pub fn initialize_with(&mut self, mut model: Box<dyn EnhancerModel>) -> Result<()> {
        if let Some(dimension) = self.settings.dimension {
            validate_dimension(dimension)?;
            model.prepare(dimension);
        }
        info!(model = model.name(), "query enhancer initialized");
        self.model = Some(model);
        self.trained = false;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.model.is_some()
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    /// Refine `query` with its neighbors.
    ///
    /// Returns the query unchanged while untrained, when there are no
    /// neighbors, or when the model fails.
    pub fn enhance(&self, query: &[f32], neighbors: &[Vec<f32>], weights: &[f32]) -> Result<Vec<f32>> {
        let model = self.model()?;
        validate_vector(query)?;
        if !self.trained || neighbors.is_empty() {
            return Ok(query.to_vec());
        }
        match model.forward(query, neighbors, weights) {
            Ok(enhanced) => {
                debug!(neighbors = neighbors.len(), "query enhanced");
                Ok(enhanced)
            }
            Err(e) => {
                warn!(error = %e, "query enhancement failed, using original query");
                Ok(query.to_vec())
            }
        }
    }

    /// Buffer one feedback sample.
    pub fn add_sample(&mut self, embedding: &[f32], success: bool) -> Result<()> {
        let expected = self.dimension();
        self.model()?;
        validate_vector(embedding)?;
        check_dimension(expected, embedding.len())?;
        self.buffer.push(TrainingSample::new(embedding.to_vec(), success));
        Ok(())
    }

    /// Train on the buffered samples, then clear the buffer.
    ///
    /// Fewer than `min_samples` buffered samples is an error and leaves the
    /// buffer untouched.
    pub fn train(&mut self, options: &TrainOptions) -> Result<TrainReport> {
        self.model()?;
        let required = self.settings.min_samples.max(1);
        if self.buffer.len() < required {
            return Err(VecmemError::InsufficientSamples {
                required,
                available: self.buffer.len(),
            });
        }
        if options.epochs == 0 || options.batch_size == 0 {
            return Err(ValidationError::Invalid(
                "epochs and batch_size must be at least 1".into(),
            )
            .into());
        }

        let dimension = self.buffer[0].embedding.len();
        let EnhancerSettings {
            learning_rate,
            weight_decay,
            ..
        } = self.settings;
        let Some(model) = self.model.as_mut() else {
            return Err(VecmemError::NotInitialized(COMPONENT.to_string()));
        };
        // Never reshape learned parameters to fit the samples.
        if let Some(expected) = model.dimension() {
            if expected != dimension {
                return Err(ValidationError::DimensionMismatch {
                    expected,
                    actual: dimension,
                }
                .into());
            }
        }
        model.prepare(dimension);

        let mut final_loss = 0.0;
        for epoch in 0..options.epochs {
            let mut total = 0.0f32;
            for batch in self.buffer.chunks(options.batch_size) {
                let loss = model.train_step(batch, learning_rate, weight_decay)?;
                total += loss * batch.len() as f32;
            }
            final_loss = total / self.buffer.len() as f32;
            debug!(epoch, loss = final_loss, "enhancer epoch complete");
        }

        let samples = self.buffer.len();
        self.buffer.clear();
        self.trained = true;
        info!(
            epochs = options.epochs,
            samples,
            final_loss,
            "query enhancer trained"
        );
        Ok(TrainReport {
            epochs: options.epochs,
            final_loss,
            samples,
        })
    }

    /// Persist the trained model to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let model = self.model()?;
        if !self.trained {
            return Err(VecmemError::NotTrained);
        }
        let path = validate_fs_path(path)?;
        let bytes = model.to_bytes()?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        info!(path = %path.display(), "query enhancer saved");
        Ok(())
    }

    /// Load a model saved by [`QueryEnhancer::save`] and mark it trained.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.model()?;
        let path = validate_fs_path(path)?;
        let bytes = std::fs::read(&path)?;
        let Some(model) = self.model.as_mut() else {
            return Err(VecmemError::NotInitialized(COMPONENT.to_string()));
        };
        model.load_bytes(&bytes)?;
        let loaded = model.dimension();
        if let Some(expected) = self.settings.dimension {
            if loaded != Some(expected) {
                model.prepare(expected);
                self.trained = false;
                return Err(ValidationError::DimensionMismatch {
                    expected,
                    actual: loaded.unwrap_or(0),
                }
                .into());
            }
        }
        self.trained = true;
        info!(path = %path.display(), "query enhancer loaded");
        Ok(())
    }

    /// Snapshot of the enhancer state. Has no side effects.
    pub fn stats(&self) -> EnhancerStats {
        EnhancerStats {
            initialized: self.is_initialized(),
            trained: self.trained,
            buffered_samples: self.buffer.len(),
            dimension: self.dimension(),
            model: self.model.as_ref().map(|m| m.name().to_string()),
            settings: self.settings.clone(),
        }
    }

    /// Width samples must match: configured, learned, or first buffered.
    fn dimension(&self) -> Option<usize> {
        self.settings
            .dimension
            .or_else(|| self.model.as_ref().and_then(|m| m.dimension()))
            .or_else(|| self.buffer.first().map(|s| s.embedding.len()))
    }

    fn model(&self) -> Result<&dyn EnhancerModel> {
        self.model
            .as_deref()
            .ok_or_else(|| VecmemError::NotInitialized(COMPONENT.to_string()))
    }
}

#[cfg(feature = "gnn")]
fn select_model() -> Result<Box<dyn EnhancerModel>> {
    Ok(Box::new(crate::graph::GraphAttentionModel::new()))
}

#[cfg(not(feature = "gnn"))]
fn select_model() -> Result<Box<dyn EnhancerModel>> {
    Err(VecmemError::MissingDependency {
        component: "graph attention model".to_string(),
        install: "enable the `gnn` feature of vecmem-enhancer".to_string(),
    })
}

#[cfg(all(test, feature = "gnn"))]
mod tests {
    use super::*;

    fn ready() -> QueryEnhancer {
        let mut enhancer = QueryEnhancer::new(EnhancerSettings::default());
        enhancer.initialize().unwrap();
        enhancer
    }

    fn fill(enhancer: &mut QueryEnhancer, n: usize) {
        for i in 0..n {
            let success = i % 2 == 0;
            let embedding = if success { [1.0, 0.0] } else { [0.0, 1.0] };
            enhancer.add_sample(&embedding, success).unwrap();
        }
    }

    #[test]
    fn operations_require_initialize() {
        let mut enhancer = QueryEnhancer::new(EnhancerSettings::default());
        let err = enhancer.enhance(&[1.0], &[], &[]).unwrap_err();
        assert!(matches!(err, VecmemError::NotInitialized(_)));
        assert!(enhancer.add_sample(&[1.0], true).unwrap_err().is_model_state());
        assert!(enhancer.train(&TrainOptions::default()).unwrap_err().is_model_state());
        assert!(!enhancer.stats().initialized);
    }

    #[test]
    fn untrained_enhance_is_identity() {
        let enhancer = ready();
        let query = [0.3, 0.4];
        let out = enhancer.enhance(&query, &[vec![1.0, 0.0]], &[1.0]).unwrap();
        assert_eq!(out, query.to_vec());
    }

    #[test]
    fn nine_samples_is_not_enough() {
        let mut enhancer = ready();
        fill(&mut enhancer, 9);
        let err = enhancer.train(&TrainOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            VecmemError::InsufficientSamples {
                required: 10,
                available: 9
            }
        ));
        assert_eq!(enhancer.buffered_samples(), 9);
        assert!(!enhancer.is_trained());
    }

    #[test]
    fn train_clears_buffer_and_reports() {
        let mut enhancer = ready();
        fill(&mut enhancer, 12);
        let options = TrainOptions {
            epochs: 5,
            batch_size: 4,
        };
        let report = enhancer.train(&options).unwrap();
        assert_eq!(report.epochs, 5);
        assert_eq!(report.samples, 12);
        assert!(report.final_loss.is_finite());
        assert!(enhancer.is_trained());
        assert_eq!(enhancer.buffered_samples(), 0);
    }

    #[test]
    fn trained_enhance_moves_toward_neighbors() {
        let mut enhancer = ready();
        fill(&mut enhancer, 10);
        enhancer.train(&TrainOptions::default()).unwrap();
        let out = enhancer.enhance(&[0.0, 1.0], &[vec![1.0, 0.0]], &[1.0]).unwrap();
        assert!(out[0] > 0.0);
        let empty = enhancer.enhance(&[0.0, 1.0], &[], &[]).unwrap();
        assert_eq!(empty, vec![0.0, 1.0]);
    }

    #[test]
    fn sample_dimension_is_pinned() {
        let mut enhancer = ready();
        enhancer.add_sample(&[1.0, 0.0], true).unwrap();
        let err = enhancer.add_sample(&[1.0, 0.0, 0.0], false).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(enhancer.buffered_samples(), 1);
    }

    #[test]
    fn train_refuses_samples_narrower_than_installed_model() {
        let mut enhancer = ready();
        fill(&mut enhancer, 10);
        let model = crate::graph::GraphAttentionModel::with_dimension(4);
        enhancer.initialize_with(Box::new(model)).unwrap();

        let err = enhancer.train(&TrainOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            VecmemError::Validation(ValidationError::DimensionMismatch {
                expected: 4,
                actual: 2
            })
        ));
        assert_eq!(enhancer.buffered_samples(), 10);
        assert!(!enhancer.is_trained());
        assert_eq!(enhancer.stats().dimension, Some(4));
    }

    #[test]
    fn save_requires_training() {
        let enhancer = ready();
        let dir = tempfile::tempdir().unwrap();
        let err = enhancer.save(&dir.path().join("model.json")).unwrap_err();
        assert!(matches!(err, VecmemError::NotTrained));
    }

    #[test]
    fn stats_have_no_side_effects() {
        let mut enhancer = ready();
        fill(&mut enhancer, 3);
        let before = enhancer.stats();
        let again = enhancer.stats();
        assert_eq!(before, again);
        assert_eq!(before.buffered_samples, 3);
        assert_eq!(before.dimension, Some(2));
        assert_eq!(before.model.as_deref(), Some("graph-attention"));
    }
}
