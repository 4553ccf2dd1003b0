// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracing subscriber and metric descriptions.
//!
//! No exporter is installed; metrics go to whatever recorder the host
//! application registers.

use metrics::{describe_counter, describe_histogram, Unit};
use tracing_subscriber::EnvFilter;

use vecmem_core::{Result, VecmemError};

/// Install a fmt subscriber. `RUST_LOG` overrides `vecmem=<level>,warn`.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init()
        .map_err(|e| VecmemError::Internal(format!("failed to install tracing subscriber: {e}")))
}

fn filter_directive(level: &str) -> String {
    format!("vecmem={level},warn")
}

/// Register descriptions for every metric vecmem emits.
pub fn register_metrics() {
    describe_counter!(
        "vecmem_embed_cache_hits_total",
        "Embedding requests served from the cache"
    );
    describe_counter!(
        "vecmem_embed_cache_misses_total",
        "Embedding requests that reached a provider"
    );
    describe_counter!(
        "vecmem_embed_cache_evictions_total",
        "Embedding cache entries dropped by bounded eviction"
    );
    describe_counter!(
        "vecmem_backend_fallbacks_total",
        "Resolutions that settled on a lower-priority backend"
    );
    describe_histogram!(
        "vecmem_search_latency_seconds",
        Unit::Seconds,
        "End-to-end recall latency including embedding"
    );
}
