// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory engine context object.

use std::path::Path;
use std::time::Instant;

use secrecy::SecretString;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use vecmem_attention::engine::CONTENT_KEY;
use vecmem_attention::{AttentionConfig, AttentionEngine, AttentionMemory, AttentionOutput};
use vecmem_backend::{
    BackendChoice, BackendRegistry, BackendResolver, BatchingBackend, BatchingConfig,
    FallbackTransition,
};
use vecmem_config::model::{AttentionConfig as AttentionDefaults, EnhancerConfig};
use vecmem_config::VecmemConfig;
use vecmem_core::validation::{validate_id, validate_k, validate_path};
use vecmem_core::{
    AsyncVectorBackend, BackendSettings, BackendStats, Metadata, Result, SearchOptions,
    SearchResult, VecmemError, VectorBackend, VectorRecord,
};
use vecmem_embed::{CacheStats, EmbeddingPipeline, EmbeddingSettings};
use vecmem_enhancer::{EnhancerSettings, EnhancerStats, QueryEnhancer, TrainOptions, TrainReport};

type Backend = BatchingBackend<Box<dyn VectorBackend>>;

/// Point-in-time view across every component.
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub backend: BackendStats,
    /// Set when resolution settled below the top-priority candidate.
    pub fallback: Option<FallbackTransition>,
    pub embedding_tier: String,
    pub embedding_model: String,
    pub cache: CacheStats,
    pub attention_memories: usize,
    pub enhancer: Option<EnhancerStats>,
}

pub struct MemoryEngine {
    backend: Backend,
    fallback: Option<FallbackTransition>,
    embeddings: EmbeddingPipeline,
    attention: RwLock<AttentionEngine>,
    enhancer: Option<Mutex<QueryEnhancer>>,
    attention_defaults: AttentionDefaults,
    train_defaults: TrainOptions,
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("backend", &self.backend.name())
            .field("fallback", &self.fallback)
            .field("embeddings", &self.embeddings)
            .field("enhancer", &self.enhancer.is_some())
            .finish_non_exhaustive()
    }
}

impl MemoryEngine {
    /// Resolve the backend, initialize the embedding pipeline and, when
    /// enabled, the query enhancer.
    pub async fn from_config(config: &VecmemConfig) -> Result<Self> {
        let embeddings = EmbeddingPipeline::initialize(&embedding_settings(config)).await?;

        let dimension = match config.backend.dimension {
            Some(d) if d != embeddings.dimensions() => {
                return Err(VecmemError::Config(format!(
                    "backend.dimension is {d} but the {} embedder produces {}",
                    embeddings.tier(),
                    embeddings.dimensions()
                )));
            }
            _ => Some(embeddings.dimensions()),
        };
        let settings = BackendSettings {
            dimension,
            metric: config.backend.metric,
            path: config.backend.path.as_deref().map(validate_path).transpose()?,
        };

        let choice: BackendChoice = match config.backend.kind.parse() {
            Ok(choice) => choice,
            Err(never) => match never {},
        };
        let resolution = BackendResolver::new(BackendRegistry::builtin(), settings).resolve(&choice)?;

        let enhancer = if config.enhancer.enabled {
            let mut enhancer = QueryEnhancer::new(enhancer_settings(&config.enhancer, dimension));
            enhancer.initialize()?;
            Some(enhancer)
        } else {
            None
        };

        let mut engine = Self::from_parts(resolution.backend, embeddings, enhancer, config);
        engine.fallback = resolution.fallback;
        info!(
            backend = %resolution.name,
            embedding_tier = %engine.embeddings.tier(),
            enhancer = engine.enhancer.is_some(),
            "memory engine ready"
        );
        Ok(engine)
    }

    /// Assemble an engine from already-built components.
    ///
    /// `backend` must be initialized. `config` supplies batching limits and
    /// attention/training defaults.
    pub fn from_parts(
        backend: Box<dyn VectorBackend>,
        embeddings: EmbeddingPipeline,
        enhancer: Option<QueryEnhancer>,
        config: &VecmemConfig,
    ) -> Self {
        let batching = BatchingConfig {
            flush_batch_size: config.backend.flush_batch_size,
            max_pending_writes: config.backend.max_pending_writes,
        };
        Self {
            backend: BatchingBackend::new(backend, batching),
            fallback: None,
            embeddings,
            attention: RwLock::new(AttentionEngine::new()),
            enhancer: enhancer.map(Mutex::new),
            attention_defaults: config.attention.clone(),
            train_defaults: TrainOptions {
                epochs: config.enhancer.epochs,
                batch_size: config.enhancer.batch_size,
            },
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn fallback(&self) -> Option<&FallbackTransition> {
        self.fallback.as_ref()
    }

    /// Embed `text` and store it under `id` in the backend and the
    /// attention registry. The text is kept under the `content` metadata key.
    pub async fn remember(&self, id: &str, text: &str, metadata: Option<Metadata>) -> Result<()> {
        validate_id(id)?;
        let embedding = self.embeddings.embed(text).await?;

        let mut stored = metadata.clone().unwrap_or_default();
        stored.insert(CONTENT_KEY.to_string(), text.into());
        self.backend
            .insert(VectorRecord::new(id, embedding.clone()).with_metadata(stored))
            .await?;

        let mut memory = AttentionMemory::new(id, embedding).with_content(text);
        if let Some(metadata) = metadata {
            memory = memory.with_metadata(metadata);
        }
        self.attention.write().await.add_memory(memory)?;
        debug!(id, "memory stored");
        Ok(())
    }

    /// Drop a memory from the backend and the attention registry.
    pub async fn forget(&self, id: &str) -> Result<bool> {
        let removed = self.backend.remove(id).await?;
        let unregistered = self.attention.write().await.remove_memory(id);
        Ok(removed || unregistered)
    }

    /// Nearest memories to `text`.
    ///
    /// Once the enhancer is trained, the query is first refined with its
    /// unrefined neighbors, weighted by their similarity.
    pub async fn recall(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        self.recall_with(text, k, &SearchOptions::default()).await
    }

    pub async fn recall_with(
        &self,
        text: &str,
        k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let started = Instant::now();
        validate_k(k)?;
        let query = self.embeddings.embed(text).await?;
        let query = self.enhance(query, k).await?;
        let results = self.backend.search(&query, k, options).await?;
        metrics::histogram!("vecmem_search_latency_seconds").record(started.elapsed().as_secs_f64());
        debug!(k, hits = results.len(), "recall complete");
        Ok(results)
    }

    async fn enhance(&self, query: Vec<f32>, k: usize) -> Result<Vec<f32>> {
        let Some(enhancer) = &self.enhancer else {
            return Ok(query);
        };
        if !enhancer.lock().await.is_trained() {
            return Ok(query);
        }

        let neighbors = self.backend.search(&query, k, &SearchOptions::default()).await?;
        let mut vectors = Vec::with_capacity(neighbors.len());
        let mut weights = Vec::with_capacity(neighbors.len());
        for hit in &neighbors {
            if let Some(record) = self.backend.get(&hit.id).await? {
                vectors.push(record.embedding);
                weights.push(hit.similarity);
            }
        }
        enhancer.lock().await.enhance(&query, &vectors, &weights)
    }

    /// Attention of `text` over every remembered memory.
    ///
    /// Uses the configured defaults when `config` is `None`.
    pub async fn attend(&self, text: &str, config: Option<&AttentionConfig>) -> Result<AttentionOutput> {
        let defaults = self.default_attention_config();
        let config = config.unwrap_or(&defaults);
        let query = self.embeddings.embed(text).await?;
        self.attention.read().await.compute_attention(&query, config)
    }

    /// Multi-head attention with the configured head count.
    pub async fn attend_multi_head(&self, text: &str) -> Result<AttentionOutput> {
        let config = self.default_attention_config();
        let query = self.embeddings.embed(text).await?;
        self.attention
            .read()
            .await
            .multi_head_attention(&query, &config, self.attention_defaults.num_heads)
    }

    fn default_attention_config(&self) -> AttentionConfig {
        AttentionConfig {
            top_k: self.attention_defaults.top_k,
            min_score: self.attention_defaults.min_score,
            temperature: self.attention_defaults.temperature,
            return_weights: false,
        }
    }

    /// Record whether acting on `text` succeeded, as an enhancer sample.
    pub async fn feedback(&self, text: &str, success: bool) -> Result<()> {
        let enhancer = self.enhancer()?;
        let embedding = self.embeddings.embed(text).await?;
        enhancer.lock().await.add_sample(&embedding, success)
    }

    /// Train the enhancer on buffered feedback.
    ///
    /// Uses the configured epochs and batch size when `options` is `None`.
    pub async fn train_enhancer(&self, options: Option<TrainOptions>) -> Result<TrainReport> {
        let enhancer = self.enhancer()?;
        let options = options.unwrap_or(self.train_defaults);
        enhancer.lock().await.train(&options)
    }

    pub async fn save_enhancer(&self, path: &Path) -> Result<()> {
        self.enhancer()?.lock().await.save(path)
    }

    pub async fn load_enhancer(&self, path: &Path) -> Result<()> {
        self.enhancer()?.lock().await.load(path)
    }

    fn enhancer(&self) -> Result<&Mutex<QueryEnhancer>> {
        self.enhancer
            .as_ref()
            .ok_or_else(|| VecmemError::NotInitialized("query enhancer".to_string()))
    }

    /// Force buffered backend writes through.
    pub async fn flush(&self) -> Result<usize> {
        self.backend.flush().await
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        self.backend.save(path).await
    }

    pub async fn close(&self) -> Result<()> {
        self.backend.close().await
    }

    pub async fn stats(&self) -> Result<EngineStats> {
        let enhancer = match &self.enhancer {
            Some(enhancer) => Some(enhancer.lock().await.stats()),
            None => None,
        };
        Ok(EngineStats {
            backend: self.backend.stats().await?,
            fallback: self.fallback.clone(),
            embedding_tier: self.embeddings.tier().to_string(),
            embedding_model: self.embeddings.model_id().to_string(),
            cache: self.embeddings.cache_stats()?,
            attention_memories: self.attention.read().await.len(),
            enhancer,
        })
    }
}

fn embedding_settings(config: &VecmemConfig) -> EmbeddingSettings {
    let embedding = &config.embedding;
    EmbeddingSettings {
        provider: embedding.provider,
        model: embedding.model.clone(),
        dimension: embedding.dimension,
        model_path: embedding.model_path.clone(),
        asset_container: embedding.asset_container.clone(),
        data_dir: embedding.data_dir.clone(),
        allow_download: embedding.allow_download,
        api_key: embedding.api_key.clone().map(SecretString::from),
        api_base_url: embedding.api_base_url.clone(),
        cache_capacity: embedding.cache_capacity,
        cache_evict_count: embedding.cache_evict_count,
    }
}

fn enhancer_settings(config: &EnhancerConfig, dimension: Option<usize>) -> EnhancerSettings {
    EnhancerSettings {
        dimension: config.dimension.or(dimension),
        learning_rate: config.learning_rate,
        weight_decay: config.weight_decay,
        min_samples: config.min_samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enhancer_dimension_prefers_explicit_setting() {
        let config = EnhancerConfig {
            dimension: Some(8),
            ..EnhancerConfig::default()
        };
        assert_eq!(enhancer_settings(&config, Some(384)).dimension, Some(8));
        let config = EnhancerConfig::default();
        assert_eq!(enhancer_settings(&config, Some(384)).dimension, Some(384));
    }

    #[test]
    fn embedding_settings_wrap_the_key() {
        let mut config = VecmemConfig::default();
        config.embedding.api_key = Some("sk-secret".into());
        let settings = embedding_settings(&config);
        let rendered = format!("{:?}", settings.api_key);
        assert!(!rendered.contains("sk-secret"));
    }
}
