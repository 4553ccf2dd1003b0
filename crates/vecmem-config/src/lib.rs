// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the vecmem engine.
//!
//! TOML files are merged over compiled defaults, then `VECMEM_*` environment
//! overrides are applied. Unknown keys are rejected and reported as miette
//! diagnostics with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use vecmem_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("backend: {}", config.backend.kind);
//! ```

use std::path::{Path, PathBuf};

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::VecmemConfig;

/// Load configuration from the file hierarchy and validate it.
pub fn load_and_validate() -> Result<VecmemConfig, Vec<ConfigError>> {
    finish(loader::load_config(), hierarchy_sources)
}

/// Load one configuration file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<VecmemConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || read_sources([path.to_path_buf()]))
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<VecmemConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![(diagnostic::INLINE_SOURCE.to_string(), toml_content.to_string())]
    })
}

/// Validate an extracted config, or turn the extraction error into
/// diagnostics. Sources are only read on failure.
fn finish(
    loaded: Result<VecmemConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<VecmemConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::from_figment(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

fn hierarchy_sources() -> Vec<(String, String)> {
    let local = std::env::current_dir()
        .map(|dir| dir.join(loader::LOCAL_CONFIG))
        .unwrap_or_else(|_| PathBuf::from(loader::LOCAL_CONFIG));
    read_sources([
        local,
        loader::user_config_path(),
        PathBuf::from(loader::SYSTEM_CONFIG),
    ])
}

fn read_sources(paths: impl IntoIterator<Item = PathBuf>) -> Vec<(String, String)> {
    paths
        .into_iter()
        .filter_map(|path| {
            let text = std::fs::read_to_string(&path).ok()?;
            Some((path.display().to_string(), text))
        })
        .collect()
}
