// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-file SQLite backend.
//!
//! Embeddings are stored as little-endian f32 BLOBs. When the `sqlite-vec`
//! extension is registered, cosine and L2 distances are computed in SQL with
//! `vec_distance_*`; otherwise every row is scanned with the kernel distance.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;
use vecmem_core::types::sort_by_similarity;
use vecmem_core::validation::{
    check_dimension, validate_batch, validate_fs_path, validate_k, validate_record, validate_vector,
};
use vecmem_core::{
    BackendSettings, BackendStats, Metadata, Metric, Result, SearchOptions, SearchResult,
    ValidationError, VecmemError, VectorBackend, VectorRecord,
};

use crate::scan::{self, blob_to_vec, vec_to_blob};

pub const SQLITE_BACKEND: &str = "sqlite";
pub const SQLITE_VEC_BACKEND: &str = "sqlite-vec";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS vectors (
    id TEXT PRIMARY KEY,
    embedding BLOB NOT NULL,
    metadata TEXT
);
CREATE TABLE IF NOT EXISTS vecmem_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

fn storage_err(e: rusqlite::Error) -> VecmemError {
    VecmemError::storage(e)
}

/// Register sqlite-vec as an auto extension for every connection opened
/// afterwards in this process.
#[cfg(feature = "sqlite-vec")]
#[allow(clippy::missing_transmute_annotations)]
pub(crate) fn register_vec_extension() {
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        // SAFETY: sqlite3_vec_init has the loadable-extension entry point
        // signature expected by sqlite3_auto_extension.
        unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }
    });
}

/// Version string reported by the sqlite-vec extension, if it is loaded.
#[cfg(feature = "sqlite-vec")]
pub(crate) fn probe_vec_version() -> std::result::Result<String, String> {
    register_vec_extension();
    let conn = Connection::open_in_memory().map_err(|e| e.to_string())?;
    conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
        .map_err(|e| e.to_string())
}

/// SQLite-backed vector store, accelerated or portable.
pub struct SqliteBackend {
    name: &'static str,
    accelerated: bool,
    metric: Metric,
    configured_dimension: Option<usize>,
    dimension: Option<usize>,
    path: Option<PathBuf>,
    conn: Option<Connection>,
}

impl SqliteBackend {
    /// Portable variant: BLOB scan with kernel distances.
    pub fn portable(settings: &BackendSettings) -> Self {
        Self::with_mode(SQLITE_BACKEND, false, settings)
    }

    /// Accelerated variant using sqlite-vec distance functions.
    #[cfg(feature = "sqlite-vec")]
    pub fn accelerated(settings: &BackendSettings) -> Self {
        Self::with_mode(SQLITE_VEC_BACKEND, true, settings)
    }

    fn with_mode(name: &'static str, accelerated: bool, settings: &BackendSettings) -> Self {
        Self {
            name,
            accelerated,
            metric: settings.metric,
            configured_dimension: settings.dimension,
            dimension: settings.dimension,
            path: settings.path.clone(),
            conn: None,
        }
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| VecmemError::NotInitialized(self.name.to_string()))
    }

    /// Open a connection, create the schema and reconcile stored settings.
    ///
    /// Returns the connection with the effective dimension.
    fn open(&self, path: Option<&Path>) -> Result<(Connection, Option<usize>)> {
        #[cfg(feature = "sqlite-vec")]
        if self.accelerated {
            register_vec_extension();
        }

        let conn = match path {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(storage_err)?;

        if self.accelerated {
            conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(|e| VecmemError::Backend {
                    backend: self.name.to_string(),
                    message: format!("sqlite-vec extension is not loaded: {e}"),
                })?;
        }

        conn.execute_batch(SCHEMA).map_err(storage_err)?;

        let stored_metric = read_meta(&conn, "metric")?;
        match stored_metric {
            Some(stored) if stored != self.metric.to_string() => {
                return Err(VecmemError::Config(format!(
                    "database uses metric {stored}, backend is configured for {}",
                    self.metric
                )));
            }
            Some(_) => {}
            None => write_meta(&conn, "metric", &self.metric.to_string())?,
        }

        let stored_dimension = read_meta(&conn, "dimension")?
            .map(|v| {
                v.parse::<usize>().map_err(|_| {
                    VecmemError::Config(format!("database has a malformed dimension `{v}`"))
                })
            })
            .transpose()?;
        let dimension = match (self.configured_dimension, stored_dimension) {
            (Some(expected), Some(actual)) if expected != actual => {
                return Err(ValidationError::DimensionMismatch { expected, actual }.into());
            }
            (configured, stored) => stored.or(configured),
        };
        if stored_dimension.is_none() {
            if let Some(dim) = dimension {
                write_meta(&conn, "dimension", &dim.to_string())?;
            }
        }

        Ok((conn, dimension))
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        let name = self.name;
        self.conn
            .as_mut()
            .ok_or_else(|| VecmemError::NotInitialized(name.to_string()))
    }

    /// Write `records` and pin the dimension in one transaction.
    fn write_records(&mut self, records: &[VectorRecord]) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let dim = first.embedding.len();
        let pin = self.dimension.is_none();

        let tx = self.conn_mut()?.transaction().map_err(storage_err)?;
        {
            let mut stmt = tx.prepare(UPSERT).map_err(storage_err)?;
            for record in records {
                let metadata = encode_metadata(record.metadata.as_ref())?;
                stmt.execute(params![record.id, vec_to_blob(&record.embedding), metadata])
                    .map_err(storage_err)?;
            }
        }
        if pin {
            write_meta(&tx, "dimension", &dim.to_string())?;
        }
        tx.commit().map_err(storage_err)?;

        if pin {
            self.dimension = Some(dim);
        }
        Ok(())
    }

    fn search_accelerated(
        &self,
        function: &str,
        query: &[f32],
        k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.conn()?;
        let blob = vec_to_blob(query);
        // sqlite-vec has no cosine distance to a zero vector and yields NULL.
        // The kernel scores that pair as orthogonal.
        let distance = match self.metric {
            Metric::Cosine => format!("COALESCE({function}(embedding, ?1), 1.0)"),
            _ => format!("{function}(embedding, ?1)"),
        };
        // Without a filter the k nearest rows are the only candidates.
        let limit = if options.filter.is_none() { " LIMIT ?2" } else { "" };
        let sql = format!(
            "SELECT id, {distance} AS distance, metadata FROM vectors \
             ORDER BY distance IS NULL, distance, id{limit}"
        );
        let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
        let rows = if options.filter.is_none() {
            stmt.query_map(params![blob, k as i64], distance_row)
        } else {
            stmt.query_map(params![blob], distance_row)
        }
        .map_err(storage_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(storage_err)?;

        let mut results = Vec::new();
        for (id, distance, metadata) in rows {
            let metadata = parse_metadata(metadata)?;
            if !options.matches(metadata.as_ref()) {
                continue;
            }
            let distance = distance.map_or(f32::NAN, |d| d as f32);
            let similarity = self.metric.similarity(distance);
            if options.accepts(similarity) {
                results.push(SearchResult {
                    id,
                    distance,
                    similarity,
                    metadata,
                });
            }
        }
        sort_by_similarity(&mut results);
        results.truncate(k);
        Ok(results)
    }

    fn search_portable(
        &self,
        query: &[f32],
        k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, embedding, metadata FROM vectors")
            .map_err(storage_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .map_err(storage_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_err)?;

        let mut decoded = Vec::with_capacity(rows.len());
        for (id, blob, metadata) in rows {
            decoded.push((id, blob_to_vec(&blob), parse_metadata(metadata)?));
        }
        let candidates = decoded
            .iter()
            .map(|(id, embedding, metadata)| (id.as_str(), embedding.as_slice(), metadata.as_ref()));
        Ok(scan::rank(query, candidates, self.metric, k, options))
    }
}

type DistanceRow = (String, Option<f64>, Option<String>);

fn distance_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DistanceRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM vecmem_meta WHERE key = ?1",
        params![key],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .map_err(storage_err)
}

fn write_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO vecmem_meta (key, value) VALUES (?1, ?2)",
        params![key, value],
    )
    .map_err(storage_err)?;
    Ok(())
}

fn encode_metadata(metadata: Option<&Metadata>) -> Result<Option<String>> {
    metadata
        .map(serde_json::to_string)
        .transpose()
        .map_err(VecmemError::storage)
}

fn parse_metadata(raw: Option<String>) -> Result<Option<Metadata>> {
    raw.map(|s| serde_json::from_str::<Metadata>(&s))
        .transpose()
        .map_err(VecmemError::storage)
}

const UPSERT: &str = "INSERT INTO vectors (id, embedding, metadata) VALUES (?1, ?2, ?3)
     ON CONFLICT(id) DO UPDATE SET embedding = excluded.embedding, metadata = excluded.metadata";

impl VectorBackend for SqliteBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn initialize(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let path = self.path.as_deref().map(validate_fs_path).transpose()?;
        let (conn, dimension) = self.open(path.as_deref())?;
        self.conn = Some(conn);
        self.dimension = dimension;
        debug!(backend = self.name, path = ?self.path, "sqlite backend opened");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.conn.is_some()
    }

    fn insert(&mut self, id: &str, embedding: &[f32], metadata: Option<Metadata>) -> Result<()> {
        let record = VectorRecord {
            id: id.to_string(),
            embedding: embedding.to_vec(),
            metadata,
        };
        self.conn()?;
        let record = validate_record(&record, self.dimension)?;
        self.write_records(std::slice::from_ref(&record))
    }

    fn insert_batch(&mut self, records: &[VectorRecord]) -> Result<usize> {
        self.conn()?;
        let records = validate_batch(records, self.dimension)?;
        self.write_records(&records)?;
        Ok(records.len())
    }

    fn search(&self, query: &[f32], k: usize, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        self.conn()?;
        validate_k(k)?;
        validate_vector(query)?;
        check_dimension(self.dimension, query.len())?;

        let function = match self.metric {
            Metric::Cosine => Some("vec_distance_cosine"),
            Metric::Euclidean => Some("vec_distance_l2"),
            Metric::Dot => None,
        };
        match function {
            Some(function) if self.accelerated => {
                self.search_accelerated(function, query, k, options)
            }
            _ => self.search_portable(query, k, options),
        }
    }

    fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT embedding, metadata FROM vectors WHERE id = ?1",
                params![id],
                |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()
            .map_err(storage_err)?;

        row.map(|(blob, metadata)| {
            Ok(VectorRecord {
                id: id.to_string(),
                embedding: blob_to_vec(&blob),
                metadata: parse_metadata(metadata)?,
            })
        })
        .transpose()
    }

    fn remove(&mut self, id: &str) -> Result<bool> {
        let changed = self
            .conn()?
            .execute("DELETE FROM vectors WHERE id = ?1", params![id])
            .map_err(storage_err)?;
        Ok(changed > 0)
    }

    fn stats(&self) -> Result<BackendStats> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM vectors", [], |row| row.get(0))
            .map_err(storage_err)?;
        Ok(BackendStats {
            backend: self.name.to_string(),
            count: count as usize,
            dimension: self.dimension,
            metric: self.metric,
            pending_writes: 0,
        })
    }

    /// Copy the database to `path` with `VACUUM INTO`, replacing any file there.
    fn save(&self, path: &Path) -> Result<()> {
        let conn = self.conn()?;
        let path = validate_fs_path(path)?;
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        conn.execute("VACUUM INTO ?1", params![path.to_string_lossy().into_owned()])
            .map_err(storage_err)?;
        Ok(())
    }

    /// Reopen on the database at `path`. It becomes the backing file.
    fn load(&mut self, path: &Path) -> Result<()> {
        self.conn()?;
        let path = validate_fs_path(path)?;
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )
            .into());
        }
        let (conn, dimension) = self.open(Some(&path))?;
        if let Some(old) = self.conn.replace(conn) {
            old.close().map_err(|(_, e)| storage_err(e))?;
        }
        self.dimension = dimension;
        self.path = Some(path);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| storage_err(e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portable() -> SqliteBackend {
        let mut b = SqliteBackend::portable(&BackendSettings::default());
        b.initialize().unwrap();
        b
    }

    #[test]
    fn portable_insert_search_remove() {
        let mut b = portable();
        b.insert("a", &[1.0, 0.0], None).unwrap();
        b.insert("b", &[0.0, 1.0], None).unwrap();

        let hits = b.search(&[0.9, 0.1], 2, &SearchOptions::default()).unwrap();
        assert_eq!(hits[0].id, "a");
        assert!(hits[0].similarity >= hits[1].similarity);

        assert!(b.remove("a").unwrap());
        assert_eq!(b.stats().unwrap().count, 1);
    }

    #[test]
    fn dimension_is_persisted_in_meta() {
        let mut b = portable();
        b.insert("a", &[1.0, 0.0, 0.0], None).unwrap();
        let stored = read_meta(b.conn().unwrap(), "dimension").unwrap();
        assert_eq!(stored.as_deref(), Some("3"));
        assert!(b.insert("b", &[1.0, 0.0], None).is_err());
    }

    #[test]
    fn empty_batch_is_noop() {
        let mut b = portable();
        assert_eq!(b.insert_batch(&[]).unwrap(), 0);
        assert_eq!(b.stats().unwrap().dimension, None);
    }

    #[test]
    fn failed_dimension_pin_rolls_back_the_row() {
        let mut b = portable();
        b.conn().unwrap().execute_batch("DROP TABLE vecmem_meta").unwrap();

        assert!(b.insert("a", &[1.0, 0.0], None).is_err());
        let stats = b.stats().unwrap();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.dimension, None);
        assert!(b.get("a").unwrap().is_none());
    }

    #[test]
    fn rejected_insert_leaves_table_unchanged() {
        let mut b = portable();
        b.insert("a", &[1.0, 0.0], None).unwrap();
        let err = b.insert("b", &[1.0, 0.0, 0.0], None).unwrap_err();
        assert!(matches!(
            err,
            VecmemError::Validation(ValidationError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert_eq!(b.stats().unwrap().count, 1);
        assert!(b.get("b").unwrap().is_none());
    }

    #[cfg(feature = "sqlite-vec")]
    #[test]
    fn accelerated_ranks_zero_vector_as_orthogonal() {
        let mut fast = SqliteBackend::accelerated(&BackendSettings::default());
        fast.initialize().unwrap();
        let mut slow = portable();
        for b in [&mut fast, &mut slow] {
            b.insert("zero", &[0.0, 0.0, 0.0], None).unwrap();
            b.insert("near", &[1.0, 0.0, 0.0], None).unwrap();
        }

        let top = fast.search(&[1.0, 0.0, 0.0], 1, &SearchOptions::default()).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, "near");

        let f = fast.search(&[1.0, 0.0, 0.0], 2, &SearchOptions::default()).unwrap();
        let s = slow.search(&[1.0, 0.0, 0.0], 2, &SearchOptions::default()).unwrap();
        assert_eq!(f[1].id, "zero");
        assert_eq!(f[1].similarity, 0.0);
        assert_eq!(f[1].distance, s[1].distance);
    }

    #[cfg(feature = "sqlite-vec")]
    #[test]
    fn accelerated_matches_portable_ranking() {
        let mut fast = SqliteBackend::accelerated(&BackendSettings::default());
        fast.initialize().unwrap();
        let mut slow = portable();
        let rows = [
            ("a", [1.0, 0.0, 0.0]),
            ("b", [0.5, 0.5, 0.0]),
            ("c", [0.0, 0.0, 1.0]),
        ];
        for (id, v) in rows {
            fast.insert(id, &v, None).unwrap();
            slow.insert(id, &v, None).unwrap();
        }
        let q = [0.8, 0.3, 0.1];
        let f = fast.search(&q, 3, &SearchOptions::default()).unwrap();
        let s = slow.search(&q, 3, &SearchOptions::default()).unwrap();
        let ids = |r: &[SearchResult]| r.iter().map(|h| h.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&f), ids(&s));
        for (x, y) in f.iter().zip(&s) {
            assert!((x.similarity - y.similarity).abs() < 1e-4);
        }
    }
}
