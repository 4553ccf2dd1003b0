// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector backends and their resolution for vecmem.
//!
//! - [`NativeBackend`]: contiguous in-memory arena, the top `auto` choice.
//! - [`SqliteBackend`]: single-file store, accelerated by sqlite-vec when
//!   the extension registers, portable otherwise.
//! - [`FlatBackend`]: always-available brute-force fallback.
//! - [`BackendResolver`]: detection and priority-ordered fallback over a
//!   [`BackendRegistry`].
//! - [`BatchingBackend`]: async adapter with micro-batched writes.
//! - [`AssetContainer`]: integrity-checked model asset reader.

pub mod assets;
pub mod batching;
pub mod flat;
pub mod native;
pub mod registry;
pub mod resolver;
mod scan;
mod snapshot;
pub mod sqlite;

pub use assets::{sha256_hex, AssetContainer, AssetInfo, AssetMeta};
pub use batching::{BatchingBackend, BatchingConfig};
pub use flat::FlatBackend;
pub use native::NativeBackend;
pub use registry::BackendRegistry;
pub use resolver::{BackendChoice, BackendResolver, DetectionReport, FallbackTransition, Resolution};
pub use sqlite::SqliteBackend;
