// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later wins: compiled defaults, `/etc/vecmem/vecmem.toml`,
//! `$XDG_CONFIG/vecmem/vecmem.toml`, `./vecmem.toml`, `VECMEM_*` env vars.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::VecmemConfig;

/// Config sections, used to map `VECMEM_<SECTION>_<KEY>` to `<section>.<key>`.
const SECTIONS: [&str; 5] = ["backend", "embedding", "attention", "enhancer", "logging"];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/vecmem/vecmem.toml";
pub(crate) const LOCAL_CONFIG: &str = "vecmem.toml";

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("vecmem/vecmem.toml"))
        .unwrap_or_default()
}

/// Build the full layered Figment without extracting it.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(VecmemConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Load configuration from the standard hierarchy with env overrides.
pub fn load_config() -> Result<VecmemConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string only.
pub fn load_config_from_str(toml_content: &str) -> Result<VecmemConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VecmemConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one file, with env overrides.
pub fn load_config_from_path(path: &Path) -> Result<VecmemConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VecmemConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Env provider with explicit section mapping.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `VECMEM_EMBEDDING_API_KEY` maps to `embedding.api_key`.
fn env_provider() -> Env {
    Env::prefixed("VECMEM_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
