// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ONNX Runtime embedding provider.
//!
//! Runs a sentence-transformer model on CPU, mean-pools the token states
//! under the attention mask and L2-normalizes the result.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use tracing::info;

use vecmem_backend::AssetContainer;
use vecmem_core::{EmbeddingProvider, ProviderTier, Result, VecmemError};
use vecmem_kernels::l2_normalize;

/// File names looked up beside the model or inside an asset container.
pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct OnnxProvider {
    /// ONNX Runtime session, serialized behind a mutex.
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    model_id: String,
    dimensions: usize,
}

// Safety: the session is only reached through the mutex and the tokenizer
// is only used for encoding, which takes `&self`.
unsafe impl Send for OnnxProvider {}
unsafe impl Sync for OnnxProvider {}

fn onnx_err(context: &str, e: impl std::fmt::Display) -> VecmemError {
    VecmemError::provider(format!("{context}: {e}"))
}

fn session_builder() -> Result<ort::session::builder::SessionBuilder> {
    Session::builder()
        .map_err(|e| onnx_err("failed to create ONNX session builder", e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| onnx_err("failed to set optimization level", e))?
        .with_intra_threads(1)
        .map_err(|e| onnx_err("failed to set thread count", e))
}

impl OnnxProvider {
    /// Load `model.onnx` from `model_path` and `tokenizer.json` from the
    /// same directory.
    pub fn from_files(model_path: &Path, model_id: &str, dimensions: usize) -> Result<Self> {
        let model_dir = model_path
            .parent()
            .ok_or_else(|| VecmemError::Config(format!("invalid model path {}", model_path.display())))?;
        let tokenizer_path = model_dir.join(TOKENIZER_FILE);
        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            onnx_err(
                &format!("failed to load tokenizer from {}", tokenizer_path.display()),
                e,
            )
        })?;
        let session = session_builder()?
            .commit_from_file(model_path)
            .map_err(|e| {
                onnx_err(
                    &format!("failed to load ONNX model from {}", model_path.display()),
                    e,
                )
            })?;

        info!(model = model_id, path = %model_path.display(), "onnx embedder loaded");
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model_id: model_id.to_string(),
            dimensions,
        })
    }

    /// Load the model and tokenizer from an asset container.
    ///
    /// Both assets are checksum-verified before use. The container's
    /// `model_id` and `dimension` take precedence over the caller's.
    pub fn from_container(container: &AssetContainer) -> Result<Self> {
        let model = container.asset(MODEL_FILE)?.ok_or_else(|| {
            VecmemError::Config(format!(
                "asset container {} has no {MODEL_FILE}",
                container.path().display()
            ))
        })?;
        let tokenizer = container.asset(TOKENIZER_FILE)?.ok_or_else(|| {
            VecmemError::Config(format!(
                "asset container {} has no {TOKENIZER_FILE}",
                container.path().display()
            ))
        })?;
        let tokenizer = tokenizers::Tokenizer::from_bytes(&tokenizer)
            .map_err(|e| onnx_err("failed to parse tokenizer asset", e))?;
        let session = session_builder()?
            .commit_from_memory(&model)
            .map_err(|e| onnx_err("failed to load ONNX model asset", e))?;

        let meta = container.meta();
        info!(
            model = %meta.model_id,
            container = %container.path().display(),
            "onnx embedder loaded from asset container"
        );
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model_id: meta.model_id.clone(),
            dimensions: meta.dimension,
        })
    }

    /// Embed a single text.
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| onnx_err("tokenization failed", e))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| i64::from(m))
            .collect();
        let token_type_ids: Vec<i64> = encoding
            .get_type_ids()
            .iter()
            .map(|&t| i64::from(t))
            .collect();
        let seq_len = input_ids.len();

        let input_ids = Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| onnx_err("failed to shape input_ids", e))?;
        let mask = Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(|e| onnx_err("failed to shape attention_mask", e))?;
        let token_type_ids = Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| onnx_err("failed to shape token_type_ids", e))?;

        let input_ids = TensorRef::from_array_view(&input_ids)
            .map_err(|e| onnx_err("failed to bind input_ids", e))?;
        let mask_tensor = TensorRef::from_array_view(&mask)
            .map_err(|e| onnx_err("failed to bind attention_mask", e))?;
        let token_type_ids = TensorRef::from_array_view(&token_type_ids)
            .map_err(|e| onnx_err("failed to bind token_type_ids", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| VecmemError::Internal(format!("ONNX session lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => mask_tensor,
                "token_type_ids" => token_type_ids
            ])
            .map_err(|e| onnx_err("ONNX inference failed", e))?;

        // Shape [1, seq_len, hidden].
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| onnx_err("failed to extract output tensor", e))?;
        let hidden = shape
            .last()
            .and_then(|&d| usize::try_from(d).ok())
            .ok_or_else(|| VecmemError::provider("ONNX output has no hidden dimension"))?;

        Ok(l2_normalize(&mean_pool(data, &attention_mask, seq_len, hidden)))
    }
}

/// Mean of the token states whose attention mask is set.
fn mean_pool(states: &[f32], mask: &[i64], seq_len: usize, hidden: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden];
    let mut count = 0.0f32;
    for (token, &m) in mask.iter().enumerate().take(seq_len) {
        if m <= 0 {
            continue;
        }
        let Some(row) = states.get(token * hidden..(token + 1) * hidden) else {
            break;
        };
        for (acc, v) in sum.iter_mut().zip(row) {
            *acc += v;
        }
        count += 1.0;
    }
    if count > 0.0 {
        for v in &mut sum {
            *v /= count;
        }
    }
    sum
}

#[async_trait]
impl EmbeddingProvider for OnnxProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_text(text)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn tier(&self) -> ProviderTier {
        ProviderTier::Onnx
    }
}
