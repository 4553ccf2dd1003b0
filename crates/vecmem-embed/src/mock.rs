// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic hash-based embeddings.

use async_trait::async_trait;
use vecmem_core::{EmbeddingProvider, ProviderTier, Result};

/// Embed `text` into a unit vector of width `dimension`.
///
/// The text is folded into a wrapping 32-bit hash over its UTF-16 code
/// units (`h = h * 31 + c`). Element `i` is
/// `sin(h + 31i) * cos((h + 31i) / 2)`, and the result is L2-normalized.
/// Identical inputs always produce bit-identical output.
pub fn mock_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let hash = text
        .encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(i32::from(c)));

    let raw: Vec<f64> = (0..dimension)
        .map(|i| {
            let x = f64::from(hash) + (i as f64) * 31.0;
            x.sin() * (x * 0.5).cos()
        })
        .collect();

    let norm = raw.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|v| (v / norm) as f32).collect()
    } else {
        raw.iter().map(|v| *v as f32).collect()
    }
}

/// Terminal fallback provider. Never fails.
#[derive(Debug, Clone)]
pub struct MockProvider {
    model_id: String,
    dimensions: usize,
}

impl MockProvider {
    pub fn new(model_id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(mock_embedding(text, self.dimensions))
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

    #[test]
    fn identical_input_is_bit_identical() {
        let a = mock_embedding("hello world", 384);
        let b = mock_embedding("hello world", 384);
        assert_eq!(
            a.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            b.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn one_character_changes_output() {
        assert_ne!(mock_embedding("hello world", 16), mock_embedding("hello worle", 16));
    }

    #[test]
    fn output_is_unit_length() {
        let v = mock_embedding("normalize me", 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_uses_zero_hash() {
        // h = 0, so element i is sin(31i) * cos(15.5i) before normalization.
        let v = mock_embedding("", 2);
        let raw = [0.0f64, 31f64.sin() * 15.5f64.cos()];
        let norm = raw.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert_eq!(v[0], 0.0);
        assert!((f64::from(v[1]) - raw[1] / norm).abs() < 1e-6);
    }

    #[test]
    fn hash_wraps_like_32_bit_arithmetic() {
        // Long inputs overflow i32 many times; the result stays finite.
        let text = "x".repeat(10_000);
        assert!(mock_embedding(&text, 8).iter().all(|v| v.is_finite()));
    }

    fn expected(hash: i32, dimension: usize) -> Vec<f32> {
        let raw: Vec<f64> = (0..dimension)
            .map(|i| {
                let x = f64::from(hash) + i as f64 * 31.0;
                x.sin() * (x * 0.5).cos()
            })
            .collect();
        let norm = raw.iter().map(|x| x * x).sum::<f64>().sqrt();
        raw.iter().map(|x| (x / norm) as f32).collect()
    }

    #[test]
    fn hash_folds_utf16_units() {
        // "ab" = 97 * 31 + 98.
        assert_eq!(mock_embedding("ab", 4), expected(97 * 31 + 98, 4));
        // U+1F600 encodes as the surrogate pair D83D DE00.
        assert_eq!(
            mock_embedding("\u{1F600}", 4),
            expected(0xD83D * 31 + 0xDE00, 4)
        );
    }

    #[tokio::test]
    async fn provider_reports_mock_tier() {
        let provider = MockProvider::new("mock-model", 8);
        assert_eq!(provider.tier(), ProviderTier::Mock);
        assert_eq!(provider.embed("x").await.unwrap().len(), 8);
    }
}
