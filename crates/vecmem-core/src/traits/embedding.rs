// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider trait for turning text into vectors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::Result;

/// Provider tiers in fallback order, most capable first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderTier {
    /// Local ONNX model already on disk or in an asset container.
    Onnx,
    /// Local model fetched on first run, then run through ONNX.
    Local,
    /// Remote HTTP embedding API; needs a credential.
    Remote,
    /// Deterministic hash-based vectors. Never fails.
    Mock,
}

impl ProviderTier {
    /// The next tier to try after this one fails.
    pub fn next(self) -> Option<ProviderTier> {
        match self {
            ProviderTier::Onnx => Some(ProviderTier::Local),
            ProviderTier::Local => Some(ProviderTier::Remote),
            ProviderTier::Remote => Some(ProviderTier::Mock),
            ProviderTier::Mock => None,
        }
    }
}

/// Generates embeddings for text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier; part of the embedding cache key.
    fn model_id(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn tier(&self) -> ProviderTier;
}
