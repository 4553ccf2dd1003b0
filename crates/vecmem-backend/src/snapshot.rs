// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON snapshot files for the in-memory backends.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vecmem_core::validation::validate_fs_path;
use vecmem_core::{Metric, Result, ValidationError, VecmemError, VectorRecord};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub backend: String,
    pub metric: Metric,
    pub dimension: Option<usize>,
    pub records: Vec<VectorRecord>,
}

/// Write a snapshot through a sibling temp file, then rename over `path`.
pub(crate) fn write(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let path = validate_fs_path(path)?;
    let bytes = serde_json::to_vec(snapshot).map_err(VecmemError::storage)?;
    let tmp = temp_path(&path);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

/// Read a snapshot, checking it against the receiving backend's settings.
pub(crate) fn read(path: &Path, metric: Metric, dimension: Option<usize>) -> Result<Snapshot> {
    let path = validate_fs_path(path)?;
    let bytes = std::fs::read(&path)?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(VecmemError::storage)?;

    if snapshot.metric != metric {
        return Err(VecmemError::Config(format!(
            "snapshot {} uses metric {}, backend is configured for {metric}",
            path.display(),
            snapshot.metric
        )));
    }
    if let (Some(expected), Some(actual)) = (dimension, snapshot.dimension) {
        if expected != actual {
            return Err(ValidationError::DimensionMismatch { expected, actual }.into());
        }
    }
    Ok(snapshot)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
