// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding providers for pipeline and cache tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use vecmem_core::{EmbeddingProvider, ProviderTier, Result, VecmemError};

/// Provider whose every `embed` call fails.
pub struct FailingProvider {
    tier: ProviderTier,
    dimensions: usize,
    message: String,
}

impl FailingProvider {
    pub fn new(tier: ProviderTier, dimensions: usize, message: &str) -> Self {
        Self {
            tier,
            dimensions,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(VecmemError::provider(self.message.clone()))
    }

    fn model_id(&self) -> &str {
        "failing"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn tier(&self) -> ProviderTier {
        self.tier
    }
}

/// Deterministic provider that counts how often it was asked to embed.
///
/// Element `i` of the output is `(byte_sum + i) % 97 + 1`, so distinct texts
/// usually differ and identical texts always match.
pub struct CountingProvider {
    model_id: String,
    dimensions: usize,
    calls: Arc<AtomicUsize>,
}

impl CountingProvider {
    pub fn new(model_id: &str, dimensions: usize) -> Self {
        Self {
            model_id: model_id.to_string(),
            dimensions,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared call counter, readable after the provider moved into a pipeline.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let sum: usize = text.bytes().map(usize::from).sum();
        Ok((0..self.dimensions)
            .map(|i| ((sum + i) % 97 + 1) as f32)
            .collect())
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn tier(&self) -> ProviderTier {
        ProviderTier::Mock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counting_provider_counts_and_repeats() {
        let provider = CountingProvider::new("count", 4);
        let calls = provider.calls();
        let a = provider.embed("hello").await.unwrap();
        let b = provider.embed("hello").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_provider_fails() {
        let provider = FailingProvider::new(ProviderTier::Onnx, 4, "boom");
        let err = provider.embed("x").await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
