// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits implemented by backends and embedding providers.

pub mod backend;
pub mod embedding;

pub use backend::{AsyncVectorBackend, BackendFactory, VectorBackend};
pub use embedding::{EmbeddingProvider, ProviderTier};
