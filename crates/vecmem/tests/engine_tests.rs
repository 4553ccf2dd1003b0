// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the memory engine on the mock embedding tier.

use std::sync::atomic::Ordering;

use serde_json::json;
use tracing_test::traced_test;
use vecmem::{AttentionConfig, MemoryEngine, SearchOptions, TrainOptions, VecmemConfig, VecmemError};
use vecmem_core::{BackendSettings, ProviderTier, VectorBackend};
use vecmem_embed::{EmbeddingCache, EmbeddingPipeline};
use vecmem_test_utils::CountingProvider;

const DIM: usize = 32;

fn config(kind: &str) -> VecmemConfig {
    let mut config = VecmemConfig::default();
    config.backend.kind = kind.to_string();
    config.embedding.provider = ProviderTier::Mock;
    config.embedding.model = "mock-test".to_string();
    config.embedding.dimension = DIM;
    config
}

fn with_enhancer(mut config: VecmemConfig) -> VecmemConfig {
    config.enhancer.enabled = true;
    config.enhancer.min_samples = 4;
    config
}

async fn seeded(config: &VecmemConfig) -> MemoryEngine {
    let engine = MemoryEngine::from_config(config).await.unwrap();
    for (id, text) in [
        ("rust", "ownership and borrowing"),
        ("sql", "joins across normalized tables"),
        ("net", "tcp congestion windows"),
    ] {
        engine.remember(id, text, None).await.unwrap();
    }
    engine
}

#[tokio::test]
async fn recall_ranks_identical_text_first() {
    for kind in ["flat", "native"] {
        let engine = seeded(&config(kind)).await;
        assert_eq!(engine.backend_name(), kind);

        let hits = engine.recall("joins across normalized tables", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, "sql");
        assert!((hits[0].similarity - 1.0).abs() < 1e-4);
        assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }
}

#[tokio::test]
async fn remembered_text_is_stored_as_content() {
    let engine = MemoryEngine::from_config(&config("flat")).await.unwrap();
    let metadata = json!({"source": "notes"}).as_object().cloned().unwrap();
    engine
        .remember("m1", "lifetimes bound references", Some(metadata))
        .await
        .unwrap();

    let filter = json!({"source": "notes"}).as_object().cloned().unwrap();
    let options = SearchOptions::default().with_filter(filter);
    let hits = engine
        .recall_with("lifetimes bound references", 1, &options)
        .await
        .unwrap();
    let stored = hits[0].metadata.as_ref().unwrap();
    assert_eq!(stored["content"], "lifetimes bound references");
    assert_eq!(stored["source"], "notes");
}

#[tokio::test]
async fn recall_rejects_zero_k() {
    let engine = seeded(&config("flat")).await;
    assert!(engine.recall("anything", 0).await.unwrap_err().is_validation());
}

#[tokio::test]
async fn forget_removes_from_search_and_attention() {
    let engine = seeded(&config("flat")).await;
    assert!(engine.forget("net").await.unwrap());
    assert!(!engine.forget("net").await.unwrap());

    let hits = engine.recall("tcp congestion windows", 5).await.unwrap();
    assert!(hits.iter().all(|h| h.id != "net"));
    assert_eq!(engine.stats().await.unwrap().attention_memories, 2);
}

#[tokio::test]
async fn attend_focuses_on_matching_memory() {
    let engine = seeded(&config("flat")).await;
    let config = AttentionConfig::default().with_weights();
    let output = engine.attend("ownership and borrowing", Some(&config)).await.unwrap();

    assert_eq!(output.scores[0].id, "rust");
    let weights = output.weights.unwrap();
    assert_eq!(weights.len(), 3);
    assert!((weights.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    assert_eq!(output.attended.len(), DIM);
}

#[tokio::test]
async fn attend_on_empty_engine_passes_query_through() {
    let engine = MemoryEngine::from_config(&config("flat")).await.unwrap();
    let output = engine.attend("nothing stored", None).await.unwrap();
    assert!(output.scores.is_empty());
    assert_eq!(output.attended, vecmem_embed::mock_embedding("nothing stored", DIM));
}

#[tokio::test]
async fn multi_head_uses_configured_heads() {
    let mut cfg = config("flat");
    cfg.attention.num_heads = 4;
    let engine = seeded(&cfg).await;
    let output = engine.attend_multi_head("tcp congestion windows").await.unwrap();
    assert_eq!(output.scores.len(), 3);

    cfg.attention.num_heads = 5;
    let engine = seeded(&cfg).await;
    let err = engine.attend_multi_head("tcp").await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn feedback_without_enhancer_is_not_initialized() {
    let engine = seeded(&config("flat")).await;
    let err = engine.feedback("ownership", true).await.unwrap_err();
    assert!(matches!(err, VecmemError::NotInitialized(_)));
    let err = engine.train_enhancer(None).await.unwrap_err();
    assert!(err.is_model_state());
}

#[tokio::test]
async fn enhancer_trains_on_feedback_and_recall_still_ranks() {
    let engine = seeded(&with_enhancer(config("flat"))).await;

    let err = engine.train_enhancer(None).await.unwrap_err();
    assert!(matches!(err, VecmemError::InsufficientSamples { .. }));

    for i in 0..8 {
        engine
            .feedback(&format!("query number {i}"), i % 2 == 0)
            .await
            .unwrap();
    }
    let report = engine
        .train_enhancer(Some(TrainOptions {
            epochs: 5,
            batch_size: 4,
        }))
        .await
        .unwrap();
    assert_eq!(report.epochs, 5);
    assert_eq!(report.samples, 8);
    assert!(report.final_loss.is_finite());

    let stats = engine.stats().await.unwrap();
    let enhancer = stats.enhancer.unwrap();
    assert!(enhancer.trained);
    assert_eq!(enhancer.buffered_samples, 0);

    let hits = engine.recall("tcp congestion windows", 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

#[tokio::test]
async fn enhancer_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enhancer.json");
    let engine = seeded(&with_enhancer(config("flat"))).await;
    for i in 0..4 {
        engine.feedback(&format!("sample {i}"), i < 2).await.unwrap();
    }
    engine
        .train_enhancer(Some(TrainOptions {
            epochs: 2,
            batch_size: 2,
        }))
        .await
        .unwrap();
    engine.save_enhancer(&path).await.unwrap();

    let restored = MemoryEngine::from_config(&with_enhancer(config("flat"))).await.unwrap();
    restored.load_enhancer(&path).await.unwrap();
    assert!(restored.stats().await.unwrap().enhancer.unwrap().trained);
}

#[tokio::test]
async fn mismatched_backend_dimension_is_a_config_error() {
    let mut cfg = config("flat");
    cfg.backend.dimension = Some(DIM * 2);
    let err = MemoryEngine::from_config(&cfg).await.unwrap_err();
    assert!(matches!(err, VecmemError::Config(_)));
}

#[tokio::test]
#[traced_test]
async fn startup_logs_resolved_components() {
    let _engine = MemoryEngine::from_config(&config("native")).await.unwrap();
    assert!(logs_contain("vector backend resolved"));
    assert!(logs_contain("memory engine ready"));
}

#[tokio::test]
async fn unknown_backend_family_is_rejected() {
    let err = MemoryEngine::from_config(&config("no-such-backend")).await.unwrap_err();
    assert!(matches!(err, VecmemError::BackendUnavailable { .. }));
}

#[tokio::test]
async fn writes_buffer_until_flush() {
    let mut cfg = config("flat");
    cfg.backend.flush_batch_size = 10;
    let engine = seeded(&cfg).await;

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.backend.pending_writes, 3);
    assert_eq!(stats.backend.count, 0);

    assert_eq!(engine.flush().await.unwrap(), 3);
    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.backend.pending_writes, 0);
    assert_eq!(stats.backend.count, 3);
    assert_eq!(stats.attention_memories, 3);
    assert_eq!(stats.embedding_tier, "mock");
    assert_eq!(stats.embedding_model, "mock-test");
}

#[tokio::test]
async fn repeated_text_is_served_from_cache() {
    let provider = CountingProvider::new("counting", DIM);
    let calls = provider.calls();
    let pipeline = EmbeddingPipeline::new(Box::new(provider), EmbeddingCache::default());

    let mut backend: Box<dyn VectorBackend> =
        Box::new(vecmem_backend::FlatBackend::new(&BackendSettings::default()));
    backend.initialize().unwrap();
    let engine = MemoryEngine::from_parts(backend, pipeline, None, &config("flat"));

    engine.remember("a", "same words", None).await.unwrap();
    engine.recall("same words", 1).await.unwrap();
    engine.attend("same words", None).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let cache = engine.stats().await.unwrap().cache;
    assert_eq!(cache.hits, 2);
    assert_eq!(cache.misses, 1);
}

#[tokio::test]
async fn save_then_reopen_persists_vectors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memories.flat");
    let mut cfg = config("flat");
    cfg.backend.path = Some(path.display().to_string());

    let engine = seeded(&cfg).await;
    engine.save(&path).await.unwrap();
    engine.close().await.unwrap();

    let reopened = MemoryEngine::from_config(&cfg).await.unwrap();
    let hits = reopened.recall("ownership and borrowing", 1).await.unwrap();
    assert_eq!(hits[0].id, "rust");
}
