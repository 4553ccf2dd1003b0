// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so misspelled keys are
//! rejected at startup with a suggestion instead of being ignored.

use serde::{Deserialize, Serialize};
use vecmem_core::{Metric, ProviderTier};

/// Top-level vecmem configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VecmemConfig {
    /// Vector backend selection and limits.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Embedding generation and cache.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Attention engine defaults.
    #[serde(default)]
    pub attention: AttentionConfig,

    /// Learned query enhancer.
    #[serde(default)]
    pub enhancer: EnhancerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend families accepted by `backend.kind` besides `auto`.
pub const BACKEND_FAMILIES: [&str; 3] = ["native", "sqlite", "flat"];

/// Vector backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// `auto` or one of [`BACKEND_FAMILIES`].
    #[serde(default = "default_backend_kind")]
    pub kind: String,

    /// Fixed vector width. Pinned by the first insert when unset.
    #[serde(default)]
    pub dimension: Option<usize>,

    #[serde(default)]
    pub metric: Metric,

    /// Single-file location for persistent backends. In-memory when unset.
    #[serde(default)]
    pub path: Option<String>,

    /// Ceiling on unflushed writes before inserts are rejected.
    #[serde(default = "default_max_pending_writes")]
    pub max_pending_writes: usize,

    /// Buffered writes that trigger an automatic flush.
    #[serde(default = "default_flush_batch_size")]
    pub flush_batch_size: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            dimension: None,
            metric: Metric::default(),
            path: None,
            max_pending_writes: default_max_pending_writes(),
            flush_batch_size: default_flush_batch_size(),
        }
    }
}

fn default_backend_kind() -> String {
    "auto".to_string()
}

fn default_max_pending_writes() -> usize {
    1_000
}

fn default_flush_batch_size() -> usize {
    100
}

/// Embedding pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Preferred provider tier; lower tiers are tried on failure.
    #[serde(default = "default_provider")]
    pub provider: ProviderTier,

    /// Model identifier. Part of every cache key.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Output width of generated embeddings.
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Path to `model.onnx` (with `tokenizer.json` beside it).
    #[serde(default)]
    pub model_path: Option<String>,

    /// Asset container holding `model.onnx` and `tokenizer.json`.
    #[serde(default)]
    pub asset_container: Option<String>,

    /// Directory for downloaded models. Defaults to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Let the local tier download a missing model into `data_dir`. Off by
    /// default, so a cold start never touches the network.
    #[serde(default)]
    pub allow_download: bool,

    /// Credential for the remote provider. `None` disables that tier.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Cache size above which eviction runs.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Oldest-inserted entries removed per eviction.
    #[serde(default = "default_cache_evict_count")]
    pub cache_evict_count: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            model_path: None,
            asset_container: None,
            data_dir: None,
            allow_download: false,
            api_key: None,
            api_base_url: default_api_base_url(),
            cache_capacity: default_cache_capacity(),
            cache_evict_count: default_cache_evict_count(),
        }
    }
}

fn default_provider() -> ProviderTier {
    ProviderTier::Onnx
}

fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_api_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_cache_capacity() -> usize {
    10_000
}

fn default_cache_evict_count() -> usize {
    5_000
}

/// Default parameters for attention queries.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AttentionConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub min_score: f32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Heads used by multi-head attention.
    #[serde(default = "default_num_heads")]
    pub num_heads: usize,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: 0.0,
            temperature: default_temperature(),
            num_heads: default_num_heads(),
        }
    }
}

fn default_top_k() -> usize {
    10
}

fn default_temperature() -> f32 {
    1.0
}

fn default_num_heads() -> usize {
    4
}

/// Learned query enhancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnhancerConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Model width. Pinned by the first training sample when unset.
    #[serde(default)]
    pub dimension: Option<usize>,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,

    #[serde(default = "default_weight_decay")]
    pub weight_decay: f32,

    /// Fewest buffered samples accepted by `train`.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dimension: None,
            learning_rate: default_learning_rate(),
            weight_decay: default_weight_decay(),
            min_samples: default_min_samples(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_learning_rate() -> f32 {
    0.01
}

fn default_weight_decay() -> f32 {
    0.01
}

fn default_min_samples() -> usize {
    10
}

fn default_epochs() -> usize {
    100
}

fn default_batch_size() -> usize {
    32
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
