// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! vecmem: vector memory for agents.
//!
//! [`MemoryEngine`] is the single context object. It is built once from a
//! [`VecmemConfig`] and owns the resolved vector backend (behind an async
//! batching layer), the embedding pipeline, the attention registry and the
//! optional learned query enhancer.
//!
//! ```no_run
//! # async fn run() -> vecmem::Result<()> {
//! let config = vecmem::VecmemConfig::default();
//! let engine = vecmem::MemoryEngine::from_config(&config).await?;
//! engine.remember("m1", "the borrow checker rejects aliasing", None).await?;
//! let hits = engine.recall("aliasing rules", 5).await?;
//! # let _ = hits;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod telemetry;

pub use engine::{EngineStats, MemoryEngine};
pub use vecmem_attention::{AttentionConfig, AttentionOutput, AttentionScore};
pub use vecmem_config::VecmemConfig;
pub use vecmem_core::{Metadata, Result, SearchOptions, SearchResult, VecmemError};
pub use vecmem_enhancer::{TrainOptions, TrainReport};
