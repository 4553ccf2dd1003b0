// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! First-run download of the local embedding model.

use std::path::{Path, PathBuf};

use tokio::sync::OnceCell;
use tracing::info;
use vecmem_core::{Result, VecmemError};

use crate::onnx::{MODEL_FILE, TOKENIZER_FILE};

const MODEL_URL: &str =
    "https://huggingface.co/onnx-community/all-MiniLM-L6-v2-ONNX/resolve/main/onnx/model_quantized.onnx";
const TOKENIZER_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json";

/// Downloads model files into `<data_dir>/models/<model_id>/` once.
pub struct ModelManager {
    data_dir: PathBuf,
    model_id: String,
    model_url: String,
    tokenizer_url: String,
    ready: OnceCell<PathBuf>,
}

impl ModelManager {
    pub fn new(data_dir: PathBuf, model_id: &str) -> Self {
        Self {
            data_dir,
            model_id: model_id.to_string(),
            model_url: MODEL_URL.to_string(),
            tokenizer_url: TOKENIZER_URL.to_string(),
            ready: OnceCell::new(),
        }
    }

    /// Fetch from other locations, for mirrors and tests.
    pub fn with_urls(mut self, model_url: impl Into<String>, tokenizer_url: impl Into<String>) -> Self {
        self.model_url = model_url.into();
        self.tokenizer_url = tokenizer_url.into();
        self
    }

    /// `<platform data dir>/vecmem`, if the platform has one.
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("vecmem"))
    }

    pub fn model_dir(&self) -> PathBuf {
        self.data_dir.join("models").join(&self.model_id)
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir().join(MODEL_FILE)
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_dir().join(TOKENIZER_FILE)
    }

    pub fn is_model_available(&self) -> bool {
        self.model_path().exists() && self.tokenizer_path().exists()
    }

    /// Download any missing file and return the model path.
    ///
    /// Concurrent callers share one download.
    pub async fn ensure_model(&self) -> Result<PathBuf> {
        self.ready
            .get_or_try_init(|| self.download_missing())
            .await
            .cloned()
    }

    async fn download_missing(&self) -> Result<PathBuf> {
        if self.is_model_available() {
            return Ok(self.model_path());
        }
        let model_dir = self.model_dir();
        info!(model = %self.model_id, dir = %model_dir.display(), "embedding model not found, downloading");
        tokio::fs::create_dir_all(&model_dir).await?;

        let files = [
            (MODEL_FILE, self.model_url.as_str()),
            (TOKENIZER_FILE, self.tokenizer_url.as_str()),
        ];
        for (filename, url) in files {
            let dest = model_dir.join(filename);
            if dest.exists() {
                continue;
            }
            let size = download_file(url, &dest).await?;
            info!(file = filename, size, "downloaded model file");
        }

        info!(dir = %model_dir.display(), "embedding model ready");
        Ok(self.model_path())
    }
}

/// Download `url` to `dest` through a temporary file.
async fn download_file(url: &str, dest: &Path) -> Result<usize> {
    let response = reqwest::get(url).await.map_err(|e| VecmemError::Provider {
        message: format!("failed to download {url}: {e}"),
        source: Some(Box::new(e)),
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(VecmemError::provider(format!(
            "download of {url} failed with status {status}"
        )));
    }
    let bytes = response.bytes().await.map_err(|e| VecmemError::Provider {
        message: format!("failed to read response body from {url}: {e}"),
        source: Some(Box::new(e)),
    })?;

    let partial = dest.with_extension("partial");
    if let Err(e) = tokio::fs::write(&partial, &bytes).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    tokio::fs::rename(&partial, dest).await?;
    Ok(bytes.len())
}
