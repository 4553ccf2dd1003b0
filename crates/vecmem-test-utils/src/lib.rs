// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for vecmem crates.
//!
//! - [`MockBackendFactory`]: a backend candidate with scripted availability
//!   and initialization failure, for resolver tests.
//! - [`FailingProvider`] and [`CountingProvider`]: embedding providers that
//!   always fail or count their calls.

pub mod mock_backend;
pub mod mock_provider;

pub use mock_backend::{MockBackend, MockBackendFactory};
pub use mock_provider::{CountingProvider, FailingProvider};
