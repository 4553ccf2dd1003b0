// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation.
//!
//! Collects every problem instead of stopping at the first one.

use tracing::warn;
use vecmem_core::validation::{self as limits, MAX_PENDING_WRITES};
use vecmem_core::ProviderTier;

use crate::diagnostic::{closest_match, ConfigError};
use crate::model::{VecmemConfig, BACKEND_FAMILIES};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &VecmemConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut push = |message: String| errors.push(ConfigError::Validation { message });

    let kind = config.backend.kind.as_str();
    if kind != "auto" && !BACKEND_FAMILIES.contains(&kind) {
        let mut valid = vec!["auto"];
        valid.extend(BACKEND_FAMILIES);
        let hint = closest_match(kind, &valid)
            .map(|s| format!(" (did you mean `{s}`?)"))
            .unwrap_or_default();
        push(format!(
            "backend.kind `{kind}` is not one of {}{hint}",
            valid.join(", ")
        ));
    }

    if let Some(dim) = config.backend.dimension {
        if limits::validate_dimension(dim).is_err() {
            push(format!(
                "backend.dimension must be in [1, {}], got {dim}",
                limits::MAX_DIMENSION
            ));
        }
    }

    if let Some(path) = &config.backend.path {
        if let Err(e) = limits::validate_path(path) {
            push(format!("backend.path: {e}"));
        }
    }

    if config.backend.max_pending_writes == 0
        || config.backend.max_pending_writes > MAX_PENDING_WRITES
    {
        push(format!(
            "backend.max_pending_writes must be in [1, {MAX_PENDING_WRITES}], got {}",
            config.backend.max_pending_writes
        ));
    }

    if config.backend.flush_batch_size == 0
        || config.backend.flush_batch_size > config.backend.max_pending_writes
    {
        push(format!(
            "backend.flush_batch_size must be in [1, backend.max_pending_writes], got {}",
            config.backend.flush_batch_size
        ));
    }

    if limits::validate_dimension(config.embedding.dimension).is_err() {
        push(format!(
            "embedding.dimension must be in [1, {}], got {}",
            limits::MAX_DIMENSION,
            config.embedding.dimension
        ));
    }

    if config.embedding.model.trim().is_empty() {
        push("embedding.model must not be empty".to_string());
    }

    if config.embedding.cache_evict_count > config.embedding.cache_capacity {
        push(format!(
            "embedding.cache_evict_count ({}) must not exceed embedding.cache_capacity ({})",
            config.embedding.cache_evict_count, config.embedding.cache_capacity
        ));
    }

    if config.embedding.provider == ProviderTier::Remote && config.embedding.api_key.is_none() {
        // Not fatal: the pipeline degrades to the mock tier.
        warn!("embedding.provider is `remote` but embedding.api_key is unset");
    }

    if !(config.attention.temperature > 0.0 && config.attention.temperature.is_finite()) {
        push(format!(
            "attention.temperature must be positive, got {}",
            config.attention.temperature
        ));
    }

    if config.attention.top_k == 0 {
        push("attention.top_k must be at least 1".to_string());
    }

    if config.attention.num_heads == 0 {
        push("attention.num_heads must be at least 1".to_string());
    }

    if let Some(dim) = config.enhancer.dimension {
        if limits::validate_dimension(dim).is_err() {
            push(format!(
                "enhancer.dimension must be in [1, {}], got {dim}",
                limits::MAX_DIMENSION
            ));
        }
    }

    if !(config.enhancer.learning_rate.is_finite() && config.enhancer.learning_rate > 0.0) {
        push(format!(
            "enhancer.learning_rate must be positive, got {}",
            config.enhancer.learning_rate
        ));
    }

    if config.enhancer.weight_decay < 0.0 {
        push(format!(
            "enhancer.weight_decay must be non-negative, got {}",
            config.enhancer.weight_decay
        ));
    }

    if config.enhancer.batch_size == 0 {
        push("enhancer.batch_size must be at least 1".to_string());
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        push(format!(
            "logging.level `{}` is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
