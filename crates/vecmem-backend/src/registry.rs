// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of backend factories and the built-in candidates.
//!
//! Factories are probed through [`BackendFactory::detect`] without building
//! a backend; the resolver constructs only the candidate it tries.

use vecmem_core::{
    BackendDetection, BackendExtensions, BackendFactory, BackendSettings, Result, VectorBackend,
};

use crate::flat::{FlatBackend, FLAT_BACKEND};
use crate::native::{NativeBackend, NATIVE_BACKEND};
use crate::sqlite::{SqliteBackend, SQLITE_BACKEND, SQLITE_VEC_BACKEND};

/// Factories keyed by candidate name, iterated in priority order.
pub struct BackendRegistry {
    factories: Vec<Box<dyn BackendFactory>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Registry holding native, sqlite-vec, sqlite and flat.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(NativeFactory));
        registry.register(Box::new(SqliteVecFactory));
        registry.register(Box::new(SqliteFactory));
        registry.register(Box::new(FlatFactory));
        registry
    }

    /// Add a factory, replacing any factory with the same name.
    pub fn register(&mut self, factory: Box<dyn BackendFactory>) {
        self.factories.retain(|f| f.name() != factory.name());
        self.factories.push(factory);
        self.factories
            .sort_by(|a, b| a.priority().cmp(&b.priority()).then_with(|| a.name().cmp(b.name())));
    }

    pub fn get(&self, name: &str) -> Option<&dyn BackendFactory> {
        self.factories
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.as_ref())
    }

    /// Every factory, highest priority first.
    pub fn candidates(&self) -> Vec<&dyn BackendFactory> {
        self.factories.iter().map(|f| f.as_ref()).collect()
    }

    /// Factories of one family, highest priority first.
    pub fn family(&self, family: &str) -> Vec<&dyn BackendFactory> {
        self.factories
            .iter()
            .filter(|f| f.family() == family)
            .map(|f| f.as_ref())
            .collect()
    }

    /// Distinct family names in priority order.
    pub fn families(&self) -> Vec<&str> {
        let mut families: Vec<&str> = Vec::new();
        for f in &self.factories {
            if !families.contains(&f.family()) {
                families.push(f.family());
            }
        }
        families
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_arch = "x86_64")]
fn simd_detail() -> &'static str {
    if std::arch::is_x86_feature_detected!("avx2") {
        "x86_64 avx2"
    } else {
        "x86_64 sse2"
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn simd_detail() -> &'static str {
    std::env::consts::ARCH
}

struct NativeFactory;

impl BackendFactory for NativeFactory {
    fn name(&self) -> &str {
        NATIVE_BACKEND
    }

    fn family(&self) -> &str {
        "native"
    }

    fn priority(&self) -> u32 {
        10
    }

    fn detect(&self) -> BackendDetection {
        BackendDetection::available(NATIVE_BACKEND, "native", true)
            .with_extensions(BackendExtensions {
                graph: false,
                learning: true,
            })
            .with_detail(simd_detail())
    }

    fn create(&self, settings: &BackendSettings) -> Result<Box<dyn VectorBackend>> {
        Ok(Box::new(NativeBackend::new(settings)))
    }

    fn install_hint(&self) -> &str {
        "built into vecmem-backend"
    }
}

struct SqliteVecFactory;

impl BackendFactory for SqliteVecFactory {
    fn name(&self) -> &str {
        SQLITE_VEC_BACKEND
    }

    fn family(&self) -> &str {
        "sqlite"
    }

    fn priority(&self) -> u32 {
        20
    }

    #[cfg(feature = "sqlite-vec")]
    fn detect(&self) -> BackendDetection {
        match crate::sqlite::probe_vec_version() {
            Ok(version) => BackendDetection::available(SQLITE_VEC_BACKEND, "sqlite", true)
                .with_detail(format!("sqlite-vec {version}")),
            Err(e) => BackendDetection::unavailable(
                SQLITE_VEC_BACKEND,
                "sqlite",
                format!("sqlite-vec failed to load: {e}"),
            ),
        }
    }

    #[cfg(not(feature = "sqlite-vec"))]
    fn detect(&self) -> BackendDetection {
        BackendDetection::unavailable(
            SQLITE_VEC_BACKEND,
            "sqlite",
            "built without the `sqlite-vec` feature",
        )
    }

    #[cfg(feature = "sqlite-vec")]
    fn create(&self, settings: &BackendSettings) -> Result<Box<dyn VectorBackend>> {
        Ok(Box::new(SqliteBackend::accelerated(settings)))
    }

    #[cfg(not(feature = "sqlite-vec"))]
    fn create(&self, _settings: &BackendSettings) -> Result<Box<dyn VectorBackend>> {
        Err(vecmem_core::VecmemError::BackendUnavailable {
            backend: SQLITE_VEC_BACKEND.to_string(),
            reason: "built without the `sqlite-vec` feature".to_string(),
            install: self.install_hint().to_string(),
        })
    }

    fn install_hint(&self) -> &str {
        "enable the `sqlite-vec` feature of vecmem-backend"
    }
}

struct SqliteFactory;

impl BackendFactory for SqliteFactory {
    fn name(&self) -> &str {
        SQLITE_BACKEND
    }

    fn family(&self) -> &str {
        "sqlite"
    }

    fn priority(&self) -> u32 {
        30
    }

    fn detect(&self) -> BackendDetection {
        let version = rusqlite::Connection::open_in_memory().and_then(|conn| {
            conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0))
        });
        match version {
            Ok(version) => BackendDetection::available(SQLITE_BACKEND, "sqlite", false)
                .with_detail(format!("SQLite {version}")),
            Err(e) => BackendDetection::unavailable(SQLITE_BACKEND, "sqlite", e.to_string()),
        }
    }

    fn create(&self, settings: &BackendSettings) -> Result<Box<dyn VectorBackend>> {
        Ok(Box::new(SqliteBackend::portable(settings)))
    }

    fn install_hint(&self) -> &str {
        "rebuild vecmem-backend with its bundled SQLite"
    }
}

struct FlatFactory;

impl BackendFactory for FlatFactory {
    fn name(&self) -> &str {
        FLAT_BACKEND
    }

    fn family(&self) -> &str {
        "flat"
    }

    fn priority(&self) -> u32 {
        40
    }

    fn detect(&self) -> BackendDetection {
        BackendDetection::available(FLAT_BACKEND, "flat", false)
    }

    fn create(&self, settings: &BackendSettings) -> Result<Box<dyn VectorBackend>> {
        Ok(Box::new(FlatBackend::new(settings)))
    }

    fn install_hint(&self) -> &str {
        "built into vecmem-backend"
    }
}
