// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg(feature = "gnn")]

use tracing_test::traced_test;
use vecmem_core::{Result, VecmemError};
use vecmem_enhancer::{
    EnhancerModel, EnhancerSettings, GraphAttentionModel, QueryEnhancer, TrainOptions,
    TrainingSample,
};

fn trained(settings: EnhancerSettings) -> QueryEnhancer {
    let mut enhancer = QueryEnhancer::new(settings);
    enhancer.initialize().unwrap();
    for i in 0..20 {
        let success = i % 3 != 0;
        let embedding = [i as f32 / 20.0, 1.0 - i as f32 / 20.0, 0.5];
        enhancer.add_sample(&embedding, success).unwrap();
    }
    enhancer
        .train(&TrainOptions {
            epochs: 10,
            batch_size: 8,
        })
        .unwrap();
    enhancer
}

#[test]
fn save_and_load_restore_behavior() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enhancer.json");
    let original = trained(EnhancerSettings::default());
    original.save(&path).unwrap();

    let mut restored = QueryEnhancer::new(EnhancerSettings::default());
    restored.initialize().unwrap();
    assert!(!restored.is_trained());
    restored.load(&path).unwrap();
    assert!(restored.is_trained());

    let query = [0.2, 0.8, 0.5];
    let neighbors = vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0]];
    let a = original.enhance(&query, &neighbors, &[0.9, 0.3]).unwrap();
    let b = restored.enhance(&query, &neighbors, &[0.9, 0.3]).unwrap();
    assert_eq!(a, b);
}

#[test]
fn load_rejects_configured_dimension_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enhancer.json");
    trained(EnhancerSettings::default()).save(&path).unwrap();

    let mut enhancer = QueryEnhancer::new(EnhancerSettings {
        dimension: Some(4),
        ..EnhancerSettings::default()
    });
    enhancer.initialize().unwrap();
    let err = enhancer.load(&path).unwrap_err();
    assert!(err.is_validation());
    assert!(!enhancer.is_trained());
}

#[test]
fn unsafe_paths_are_rejected() {
    let enhancer = trained(EnhancerSettings::default());
    let err = enhancer
        .save(std::path::Path::new("../escape.json"))
        .unwrap_err();
    assert!(err.is_validation());
}

struct BrokenModel;

impl EnhancerModel for BrokenModel {
    fn name(&self) -> &str {
        "broken"
    }

    fn dimension(&self) -> Option<usize> {
        Some(2)
    }

    fn prepare(&mut self, _dimension: usize) {}

    fn forward(&self, _query: &[f32], _neighbors: &[Vec<f32>], _weights: &[f32]) -> Result<Vec<f32>> {
        Err(VecmemError::Internal("forward exploded".into()))
    }

    fn train_step(&mut self, _batch: &[TrainingSample], _lr: f32, _wd: f32) -> Result<f32> {
        Ok(0.25)
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn load_bytes(&mut self, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[traced_test]
#[test]
fn model_failure_degrades_to_original_query() {
    let mut enhancer = QueryEnhancer::new(EnhancerSettings::default());
    enhancer.initialize_with(Box::new(BrokenModel)).unwrap();
    for i in 0..10 {
        enhancer.add_sample(&[1.0, i as f32], i % 2 == 0).unwrap();
    }
    let report = enhancer.train(&TrainOptions::default()).unwrap();
    assert!((report.final_loss - 0.25).abs() < 1e-6);

    let out = enhancer.enhance(&[0.6, 0.8], &[vec![1.0, 0.0]], &[]).unwrap();
    assert_eq!(out, vec![0.6, 0.8]);
    assert!(logs_contain("query enhancement failed"));
}

#[test]
fn graph_model_is_usable_directly() {
    let mut model = GraphAttentionModel::new();
    model.prepare(2);
    let batch = vec![
        TrainingSample::new(vec![1.0, 0.0], true),
        TrainingSample::new(vec![0.0, 1.0], false),
    ];
    let loss = model.train_step(&batch, 0.01, 0.0).unwrap();
    assert!((loss - std::f32::consts::LN_2).abs() < 1e-5);
}
