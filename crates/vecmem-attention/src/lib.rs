// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attention-weighted retrieval over an in-process memory registry.
//!
//! The engine scores every memory against a query with scaled dot-product
//! attention and returns two views of the result:
//!
//! - `scores`: memories whose normalized weight is at least `min_score`,
//!   best first, truncated to `top_k`;
//! - `attended`: the weighted sum of **every** memory's embedding under the
//!   full distribution.
//!
//! Filtering only shapes the reported list. Callers explaining a result
//! from `scores` must not assume `attended` was built from the same subset.

pub mod engine;
pub mod types;

pub use engine::AttentionEngine;
pub use types::{AttentionConfig, AttentionMemory, AttentionOutput, AttentionScore};
