// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the vecmem workspace.
//!
//! Variants are grouped by how a caller is expected to react: configuration
//! problems are fatal and carry remediation text, validation problems are
//! rejected before any mutation, degradation is normally absorbed by a
//! fallback tier, and model-state errors mean "not ready yet".

use std::fmt;

use thiserror::Error;

/// The primary error type returned by every fallible vecmem operation.
#[derive(Debug, Error)]
pub enum VecmemError {
    /// Invalid or inconsistent configuration values.
    #[error("configuration error: {0}")]
    Config(String),

    /// An optional component is not compiled in or cannot be loaded.
    #[error("missing dependency for {component}: {install}")]
    MissingDependency {
        component: String,
        /// What to install or enable to fix it.
        install: String,
    },

    /// Automatic resolution exhausted every candidate backend.
    #[error("no vector backend available; attempted: {}", format_attempts(attempted))]
    NoBackendAvailable { attempted: Vec<BackendAttempt> },

    /// An explicitly requested backend cannot be used.
    #[error("backend `{backend}` unavailable: {reason} (install: {install})")]
    BackendUnavailable {
        backend: String,
        reason: String,
        install: String,
    },

    /// Input rejected at the boundary.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Embedding provider failure.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Backend operation failure.
    #[error("backend `{backend}` error: {message}")]
    Backend { backend: String, message: String },

    /// A lifecycle-managed component was used before `initialize()`.
    #[error("{0} is not initialized")]
    NotInitialized(String),

    /// The learned model has not been trained yet.
    #[error("model has not been trained")]
    NotTrained,

    /// Training requested with too few buffered samples.
    #[error("insufficient samples: need at least {required}, have {available}")]
    InsufficientSamples { required: usize, available: usize },

    /// Too many unflushed writes are outstanding.
    #[error("backpressure: {pending} pending writes exceeds limit of {limit}")]
    Backpressure { pending: usize, limit: usize },

    /// Storage engine errors (SQLite, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Asset checksum mismatch.
    #[error("integrity check failed for `{filename}`: expected {expected}, got {actual}")]
    Integrity {
        filename: String,
        expected: String,
        actual: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VecmemError {
    /// True for errors rejected at the input boundary.
    pub fn is_validation(&self) -> bool {
        matches!(self, VecmemError::Validation(_))
    }

    /// True for "not ready yet" errors from lifecycle-managed components.
    pub fn is_model_state(&self) -> bool {
        matches!(
            self,
            VecmemError::NotInitialized(_)
                | VecmemError::NotTrained
                | VecmemError::InsufficientSamples { .. }
        )
    }

    /// True for fatal configuration and dependency errors.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            VecmemError::Config(_)
                | VecmemError::MissingDependency { .. }
                | VecmemError::NoBackendAvailable { .. }
                | VecmemError::BackendUnavailable { .. }
        )
    }

    /// Wrap any storage-layer error.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        VecmemError::Storage {
            source: Box::new(err),
        }
    }

    /// Build a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        VecmemError::Provider {
            message: message.into(),
            source: None,
        }
    }
}

/// Boundary validation failures. Never partially applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("dimension {0} outside allowed range [1, {max}]", max = crate::validation::MAX_DIMENSION)]
    InvalidDimension(usize),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("metadata is {size} bytes, limit is {limit}")]
    MetadataTooLarge { size: usize, limit: usize },

    #[error("batch of {size} exceeds limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("k = {0} outside allowed range [1, {max}]", max = crate::validation::MAX_K)]
    InvalidK(usize),

    #[error("embedding must not be empty")]
    EmptyEmbedding,

    #[error("vector contains non-finite value at index {0}")]
    NonFiniteVector(usize),

    #[error("{0}")]
    Invalid(String),
}

/// One candidate tried during backend resolution and why it was not used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAttempt {
    pub backend: String,
    pub reason: String,
}

impl fmt::Display for BackendAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.backend, self.reason)
    }
}

fn format_attempts(attempts: &[BackendAttempt]) -> String {
    if attempts.is_empty() {
        return "none registered".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, VecmemError>;
