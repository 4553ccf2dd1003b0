// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reader for single-file model asset containers.
//!
//! A container is a SQLite database with two tables:
//!
//! ```sql
//! model_assets(filename TEXT PRIMARY KEY, content BLOB NOT NULL,
//!              size INTEGER NOT NULL, sha256 TEXT NOT NULL)
//! model_meta(key TEXT PRIMARY KEY, value TEXT NOT NULL)
//! ```
//!
//! Asset bytes are only handed out after their SHA-256 matches the stored
//! digest.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::debug;
use vecmem_core::validation::{validate_dimension, validate_fs_path};
use vecmem_core::{Result, VecmemError};

const REQUIRED_META: [&str; 4] = ["model_id", "dimension", "format_version", "created_at"];

fn storage_err(e: rusqlite::Error) -> VecmemError {
    VecmemError::storage(e)
}

/// Container-level metadata from `model_meta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMeta {
    pub model_id: String,
    pub dimension: usize,
    pub format_version: String,
    pub created_at: String,
    /// Every other key/value pair in `model_meta`.
    pub extra: BTreeMap<String, String>,
}

/// Listing entry for one stored asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    pub filename: String,
    pub size: u64,
    pub sha256: String,
}

/// Read-only handle on an asset container.
pub struct AssetContainer {
    path: PathBuf,
    conn: Connection,
    meta: AssetMeta,
}

impl std::fmt::Debug for AssetContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetContainer")
            .field("path", &self.path)
            .field("meta", &self.meta)
            .finish()
    }
}

impl AssetContainer {
    /// Open a container read-only and parse its metadata.
    pub fn open(path: &Path) -> Result<Self> {
        let path = validate_fs_path(path)?;
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("asset container {} does not exist", path.display()),
            )
            .into());
        }
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(storage_err)?;

        let meta = read_meta(&conn)?;
        debug!(
            path = %path.display(),
            model_id = %meta.model_id,
            dimension = meta.dimension,
            "asset container opened"
        );
        Ok(Self { path, conn, meta })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta(&self) -> &AssetMeta {
        &self.meta
    }

    /// List assets without reading their contents.
    pub fn list(&self) -> Result<Vec<AssetInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT filename, size, sha256 FROM model_assets ORDER BY filename")
            .map_err(storage_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AssetInfo {
                    filename: row.get(0)?,
                    size: row.get::<_, i64>(1)? as u64,
                    sha256: row.get(2)?,
                })
            })
            .map_err(storage_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_err)?;
        Ok(rows)
    }

    pub fn contains(&self, filename: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM model_assets WHERE filename = ?1",
                params![filename],
                |_| Ok(()),
            )
            .optional()
            .map_err(storage_err)?;
        Ok(found.is_some())
    }

    /// Asset bytes, after verifying size and SHA-256.
    ///
    /// Returns `Ok(None)` when no asset has this filename.
    pub fn asset(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        let row = self
            .conn
            .query_row(
                "SELECT content, size, sha256 FROM model_assets WHERE filename = ?1",
                params![filename],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(storage_err)?;

        let Some((content, size, expected)) = row else {
            return Ok(None);
        };
        verify(filename, &content, size, &expected)?;
        Ok(Some(content))
    }

    /// Verify every asset. Returns the number checked.
    pub fn verify_all(&self) -> Result<usize> {
        let mut stmt = self
            .conn
            .prepare("SELECT filename, content, size, sha256 FROM model_assets")
            .map_err(storage_err)?;
        let mut rows = stmt.query([]).map_err(storage_err)?;
        let mut checked = 0;
        while let Some(row) = rows.next().map_err(storage_err)? {
            let filename: String = row.get(0).map_err(storage_err)?;
            let content: Vec<u8> = row.get(1).map_err(storage_err)?;
            let size: i64 = row.get(2).map_err(storage_err)?;
            let expected: String = row.get(3).map_err(storage_err)?;
            verify(&filename, &content, size, &expected)?;
            checked += 1;
        }
        Ok(checked)
    }

    /// CRC32C of each verified asset, for cheap re-checks of extracted copies.
    pub fn checksums(&self) -> Result<BTreeMap<String, u32>> {
        let mut out = BTreeMap::new();
        for info in self.list()? {
            if let Some(bytes) = self.asset(&info.filename)? {
                out.insert(info.filename, vecmem_kernels::crc32c(&bytes));
            }
        }
        Ok(out)
    }
}

/// Lower-case hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn verify(filename: &str, content: &[u8], size: i64, expected: &str) -> Result<()> {
    if size < 0 || content.len() as u64 != size as u64 {
        return Err(VecmemError::Integrity {
            filename: filename.to_string(),
            expected: format!("{size} bytes"),
            actual: format!("{} bytes", content.len()),
        });
    }
    let actual = sha256_hex(content);
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(VecmemError::Integrity {
            filename: filename.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

fn read_meta(conn: &Connection) -> Result<AssetMeta> {
    let mut stmt = conn
        .prepare("SELECT key, value FROM model_meta")
        .map_err(storage_err)?;
    let mut entries: BTreeMap<String, String> = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(storage_err)?
        .collect::<std::result::Result<_, _>>()
        .map_err(storage_err)?;

    let missing: Vec<&str> = REQUIRED_META
        .iter()
        .copied()
        .filter(|key| !entries.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(VecmemError::Config(format!(
            "asset container is missing model_meta keys: {}",
            missing.join(", ")
        )));
    }

    let mut take = |key: &str| entries.remove(key).unwrap_or_default();
    let model_id = take("model_id");
    let raw_dimension = take("dimension");
    let format_version = take("format_version");
    let created_at = take("created_at");

    let dimension = raw_dimension.parse::<usize>().map_err(|_| {
        VecmemError::Config(format!(
            "asset container dimension `{raw_dimension}` is not an integer"
        ))
    })?;
    validate_dimension(dimension)?;

    Ok(AssetMeta {
        model_id,
        dimension,
        format_version,
        created_at,
        extra: entries,
    })
}
