// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the vecmem vector-memory engine.
//!
//! Provides the shared value types, the error taxonomy, the backend and
//! embedding capability traits, and the validation ceilings enforced at
//! every public boundary.

pub mod error;
pub mod traits;
pub mod types;
pub mod validation;

pub use error::{BackendAttempt, Result, ValidationError, VecmemError};
pub use traits::{AsyncVectorBackend, BackendFactory, EmbeddingProvider, ProviderTier, VectorBackend};
pub use types::{
    BackendDetection, BackendExtensions, BackendSettings, BackendStats, Metadata, Metric,
    SearchOptions, SearchResult, VectorRecord,
};
