// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text embedding for vecmem.
//!
//! Providers are tried in tier order (ONNX on disk, downloaded local model,
//! remote API, deterministic mock) and the first one that initializes
//! serves the [`EmbeddingPipeline`]. Every generated vector is memoized in
//! an [`EmbeddingCache`] keyed by `(model id, text)`.

pub mod cache;
pub mod mock;
pub mod model_manager;
pub mod onnx;
pub mod pipeline;
pub mod remote;

pub use cache::{CacheStats, EmbeddingCache};
pub use mock::{mock_embedding, MockProvider};
pub use model_manager::ModelManager;
pub use onnx::OnnxProvider;
pub use pipeline::{EmbeddingPipeline, EmbeddingSettings};
pub use remote::RemoteProvider;
