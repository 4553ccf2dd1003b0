// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Learned query enhancement for vecmem.
//!
//! [`QueryEnhancer`] owns the lifecycle (initialize, buffer feedback,
//! train, persist) and delegates the numeric work to an [`EnhancerModel`].
//! The graph-attention model ships behind the `gnn` feature.

pub mod enhancer;
#[cfg(feature = "gnn")]
pub mod graph;
pub mod model;

pub use enhancer::{EnhancerSettings, EnhancerStats, QueryEnhancer, TrainOptions, TrainReport};
#[cfg(feature = "gnn")]
pub use graph::GraphAttentionModel;
pub use model::{EnhancerModel, TrainingSample};
