// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure numeric kernels used by similarity search and learning.
//!
//! Every function is deterministic and never panics on degenerate input:
//! zero vectors yield zero similarity, empty inputs yield empty outputs,
//! and a softmax that cannot be normalized falls back to uniform.
//! Mismatched slice lengths are processed over the shorter length.

pub mod activation;
pub mod checksum;
pub mod distance;
pub mod optim;

pub use activation::{gelu, layer_norm, relu, sigmoid, softmax};
pub use checksum::crc32c;
pub use distance::{
    cosine_similarity, dot_product, hamming_distance, info_nce_loss, l2_distance, l2_normalize,
};
pub use optim::{adamw_step, AdamWConfig};
