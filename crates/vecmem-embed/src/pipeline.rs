// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tiered provider selection and cached embedding generation.

use std::path::PathBuf;
use std::sync::Mutex;

use futures::future::join_all;
use secrecy::SecretString;
use tracing::{debug, info, warn};
use vecmem_backend::AssetContainer;
use vecmem_core::validation::{validate_batch_size, validate_dimension, validate_path};
use vecmem_core::{EmbeddingProvider, ProviderTier, Result, VecmemError};

use crate::cache::{CacheStats, EmbeddingCache, DEFAULT_CAPACITY, DEFAULT_EVICT_COUNT};
use crate::mock::MockProvider;
use crate::model_manager::ModelManager;
use crate::onnx::OnnxProvider;
use crate::remote::RemoteProvider;

/// Inputs for [`EmbeddingPipeline::initialize`].
///
/// The default prefers the ONNX tier, which needs `model_path` or
/// `asset_container`. Without either it falls to the local tier, which only
/// uses a model already present under `data_dir` unless `allow_download` is
/// set.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    /// Preferred tier; lower tiers are tried when it fails.
    pub provider: ProviderTier,
    pub model: String,
    pub dimension: usize,
    pub model_path: Option<String>,
    pub asset_container: Option<String>,
    pub data_dir: Option<String>,
    /// Fetch a missing local model over the network.
    pub allow_download: bool,
    pub api_key: Option<SecretString>,
    pub api_base_url: String,
    pub cache_capacity: usize,
    pub cache_evict_count: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderTier::Onnx,
            model: "all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            model_path: None,
            asset_container: None,
            data_dir: None,
            allow_download: false,
            api_key: None,
            api_base_url: "https://api.openai.com".to_string(),
            cache_capacity: DEFAULT_CAPACITY,
            cache_evict_count: DEFAULT_EVICT_COUNT,
        }
    }
}

/// The active provider plus its cache.
pub struct EmbeddingPipeline {
    provider: Box<dyn EmbeddingProvider>,
    cache: Mutex<EmbeddingCache>,
}

impl std::fmt::Debug for EmbeddingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingPipeline")
            .field("tier", &self.provider.tier())
            .field("model_id", &self.provider.model_id())
            .field("dimensions", &self.provider.dimensions())
            .finish_non_exhaustive()
    }
}

impl EmbeddingPipeline {
    /// Walk the tiers from `settings.provider` down to mock and keep the
    /// first provider that initializes. Each failed tier logs a warning.
    pub async fn initialize(settings: &EmbeddingSettings) -> Result<Self> {
        validate_dimension(settings.dimension)?;
        let mut tier = Some(settings.provider);
        while let Some(current) = tier {
            match build_provider(current, settings).await {
                Ok(provider) => {
                    info!(
                        tier = %current,
                        model = provider.model_id(),
                        dimensions = provider.dimensions(),
                        "embedding provider initialized"
                    );
                    return Ok(Self::new(provider, cache_for(settings)));
                }
                Err(e) => {
                    let next = current.next().unwrap_or(ProviderTier::Mock);
                    warn!(
                        tier = %current,
                        next = %next,
                        error = %e,
                        "embedding provider unavailable, falling back"
                    );
                    tier = current.next();
                }
            }
        }
        // Mock never fails to build, so the loop always returns.
        Err(VecmemError::Internal("no embedding provider could be built".into()))
    }

    pub fn new(provider: Box<dyn EmbeddingProvider>, cache: EmbeddingCache) -> Self {
        Self {
            provider,
            cache: Mutex::new(cache),
        }
    }

    pub fn tier(&self) -> ProviderTier {
        self.provider.tier()
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed one text, serving repeats from the cache.
    ///
    /// A provider error propagates; the cache is left untouched.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model_id = self.provider.model_id();
        let cached = self.lock_cache()?.get(model_id, text);
        if let Some(hit) = cached {
            return Ok(hit);
        }

        let vector = self.provider.embed(text).await?;
        let expected = self.provider.dimensions();
        if vector.len() != expected {
            return Err(VecmemError::provider(format!(
                "{} returned {} dimensions, expected {expected}",
                self.provider.model_id(),
                vector.len()
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(VecmemError::provider(format!(
                "{} returned a non-finite embedding",
                self.provider.model_id()
            )));
        }

        self.lock_cache()?.insert(model_id, text, vector.clone());
        debug!(model = model_id, "embedding generated");
        Ok(vector)
    }

    /// Embed many texts concurrently. Output order matches input order.
    pub async fn embed_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<f32>>> {
        validate_batch_size(texts.len())?;
        join_all(texts.iter().map(|text| self.embed(text.as_ref())))
            .await
            .into_iter()
            .collect()
    }

    pub fn cache_stats(&self) -> Result<CacheStats> {
        Ok(self.lock_cache()?.stats())
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.lock_cache()?.clear();
        Ok(())
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, EmbeddingCache>> {
        self.cache
            .lock()
            .map_err(|e| VecmemError::Internal(format!("embedding cache lock poisoned: {e}")))
    }
}

fn cache_for(settings: &EmbeddingSettings) -> EmbeddingCache {
    EmbeddingCache::new(settings.cache_capacity, settings.cache_evict_count)
}

async fn build_provider(
    tier: ProviderTier,
    settings: &EmbeddingSettings,
) -> Result<Box<dyn EmbeddingProvider>> {
    match tier {
        ProviderTier::Onnx => {
            if let Some(container) = &settings.asset_container {
                let container = AssetContainer::open(&validate_path(container)?)?;
                return Ok(Box::new(OnnxProvider::from_container(&container)?));
            }
            let model_path = settings.model_path.as_deref().ok_or_else(|| {
                VecmemError::Config("no model_path or asset_container configured".into())
            })?;
            let model_path = validate_path(model_path)?;
            Ok(Box::new(OnnxProvider::from_files(
                &model_path,
                &settings.model,
                settings.dimension,
            )?))
        }
        ProviderTier::Local => {
            let data_dir = match &settings.data_dir {
                Some(dir) => validate_path(dir)?,
                None => ModelManager::default_data_dir().ok_or_else(|| {
                    VecmemError::Config("no data_dir configured and no platform data dir".into())
                })?,
            };
            let manager = ModelManager::new(data_dir, &settings.model);
            if !settings.allow_download && !manager.is_model_available() {
                return Err(VecmemError::Config(format!(
                    "model {} is not in {} and downloads are disabled",
                    settings.model,
                    manager.model_dir().display()
                )));
            }
            let model_path: PathBuf = manager.ensure_model().await?;
            Ok(Box::new(OnnxProvider::from_files(
                &model_path,
                &settings.model,
                settings.dimension,
            )?))
        }
        ProviderTier::Remote => Ok(Box::new(RemoteProvider::new(
            settings.api_key.as_ref(),
            &settings.api_base_url,
            &settings.model,
            settings.dimension,
        )?)),
        ProviderTier::Mock => Ok(Box::new(MockProvider::new(
            settings.model.clone(),
            settings.dimension,
        ))),
    }
}
