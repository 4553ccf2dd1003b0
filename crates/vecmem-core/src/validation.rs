// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boundary validation shared by every backend and the engine.
//!
//! All checks run before any state is touched, so a rejected call never
//! leaves a partial write behind.

use std::path::PathBuf;

use tracing::debug;

use crate::error::ValidationError;
use crate::types::{Metadata, VectorRecord};

/// Largest accepted vector width.
pub const MAX_DIMENSION: usize = 4096;
/// Largest accepted batch for `insert_batch` / `embed_batch`.
pub const MAX_BATCH_SIZE: usize = 10_000;
/// Largest accepted search `k`.
pub const MAX_K: usize = 10_000;
/// Longest accepted path, in bytes.
pub const MAX_PATH_LENGTH: usize = 4096;
/// Longest accepted identifier, in bytes.
pub const MAX_ID_LENGTH: usize = 1024;
/// Largest accepted serialized metadata, in bytes.
pub const MAX_METADATA_BYTES: usize = 65_536;
/// Ceiling on unflushed writes held by a batching backend.
pub const MAX_PENDING_WRITES: usize = 10_000;

const SYSTEM_PATH_PREFIXES: [&str; 4] = ["/etc/", "/proc/", "/sys/", "/dev/"];
const FORBIDDEN_METADATA_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Check that a dimension is inside `[1, MAX_DIMENSION]`.
pub fn validate_dimension(dimension: usize) -> Result<(), ValidationError> {
    if dimension == 0 || dimension > MAX_DIMENSION {
        return Err(ValidationError::InvalidDimension(dimension));
    }
    Ok(())
}

/// Check that a vector is non-empty, finite and of an allowed width.
pub fn validate_vector(vector: &[f32]) -> Result<(), ValidationError> {
    if vector.is_empty() {
        return Err(ValidationError::EmptyEmbedding);
    }
    validate_dimension(vector.len())?;
    if let Some(index) = vector.iter().position(|v| !v.is_finite()) {
        return Err(ValidationError::NonFiniteVector(index));
    }
    Ok(())
}

/// Check a vector against an established dimension, if any.
pub fn check_dimension(expected: Option<usize>, actual: usize) -> Result<(), ValidationError> {
    match expected {
        Some(expected) if expected != actual => {
            Err(ValidationError::DimensionMismatch { expected, actual })
        }
        _ => Ok(()),
    }
}

/// Check an identifier: non-empty, at most `MAX_ID_LENGTH` bytes, no NUL.
pub fn validate_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::InvalidId("id must not be empty".into()));
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(ValidationError::InvalidId(format!(
            "id is {} bytes, limit is {MAX_ID_LENGTH}",
            id.len()
        )));
    }
    if id.contains('\0') {
        return Err(ValidationError::InvalidId("id contains a null byte".into()));
    }
    Ok(())
}

/// Validate a filesystem path supplied by a caller.
///
/// Rejects traversal (`..`), system prefixes and NUL bytes.
pub fn validate_path(path: &str) -> Result<PathBuf, ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::InvalidPath("path must not be empty".into()));
    }
    if path.len() > MAX_PATH_LENGTH {
        return Err(ValidationError::InvalidPath(format!(
            "path is {} bytes, limit is {MAX_PATH_LENGTH}",
            path.len()
        )));
    }
    if path.contains('\0') {
        return Err(ValidationError::InvalidPath("path contains a null byte".into()));
    }
    if path.contains("..") {
        return Err(ValidationError::InvalidPath(format!(
            "path `{path}` contains a parent traversal"
        )));
    }
    if let Some(prefix) = SYSTEM_PATH_PREFIXES.iter().find(|p| path.starts_with(**p)) {
        return Err(ValidationError::InvalidPath(format!(
            "path `{path}` is under system directory {prefix}"
        )));
    }
    Ok(PathBuf::from(path))
}

/// Validate a path given as `Path`, requiring UTF-8.
pub fn validate_fs_path(path: &std::path::Path) -> Result<PathBuf, ValidationError> {
    let s = path
        .to_str()
        .ok_or_else(|| ValidationError::InvalidPath("path is not valid UTF-8".into()))?;
    validate_path(s)
}

/// Strip prototype-pollution keys (at any depth) and enforce the size ceiling.
pub fn sanitize_metadata(metadata: &Metadata) -> Result<Metadata, ValidationError> {
    let cleaned = strip_forbidden(metadata);
    let size = serde_json::to_vec(&cleaned)
        .map(|bytes| bytes.len())
        .map_err(|e| ValidationError::Invalid(format!("metadata not serializable: {e}")))?;
    if size > MAX_METADATA_BYTES {
        return Err(ValidationError::MetadataTooLarge {
            size,
            limit: MAX_METADATA_BYTES,
        });
    }
    Ok(cleaned)
}

fn strip_forbidden(metadata: &Metadata) -> Metadata {
    metadata
        .iter()
        .filter(|(key, _)| {
            let reserved = FORBIDDEN_METADATA_KEYS.contains(&key.as_str());
            if reserved {
                debug!(key = %key, "dropped reserved metadata key");
            }
            !reserved
        })
        .map(|(key, value)| (key.clone(), strip_value(value)))
        .collect()
}

fn strip_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(strip_forbidden(map)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(strip_value).collect())
        }
        other => other.clone(),
    }
}

/// Check `k` for a search call.
pub fn validate_k(k: usize) -> Result<(), ValidationError> {
    if k == 0 || k > MAX_K {
        return Err(ValidationError::InvalidK(k));
    }
    Ok(())
}

/// Check a batch length.
pub fn validate_batch_size(size: usize) -> Result<(), ValidationError> {
    if size > MAX_BATCH_SIZE {
        return Err(ValidationError::BatchTooLarge {
            size,
            limit: MAX_BATCH_SIZE,
        });
    }
    Ok(())
}

/// Validate and sanitize a record against an established dimension.
///
/// Returns the record with sanitized metadata.
pub fn validate_record(
    record: &VectorRecord,
    dimension: Option<usize>,
) -> Result<VectorRecord, ValidationError> {
    validate_id(&record.id)?;
    validate_vector(&record.embedding)?;
    check_dimension(dimension, record.embedding.len())?;
    let metadata = record.metadata.as_ref().map(sanitize_metadata).transpose()?;
    Ok(VectorRecord {
        id: record.id.clone(),
        embedding: record.embedding.clone(),
        metadata,
    })
}

/// Validate a whole batch before any record is applied.
///
/// The first record pins the dimension when none is established yet, and
/// every later record must match it.
pub fn validate_batch(
    records: &[VectorRecord],
    dimension: Option<usize>,
) -> Result<Vec<VectorRecord>, ValidationError> {
    validate_batch_size(records.len())?;
    let mut pinned = dimension;
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let clean = validate_record(record, pinned)?;
        pinned.get_or_insert(clean.embedding.len());
        out.push(clean);
    }
    Ok(out)
}
