// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the vecmem configuration system.

use vecmem_config::diagnostic::ConfigError;
use vecmem_config::model::VecmemConfig;
use vecmem_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};
use vecmem_core::{Metric, ProviderTier};

#[test]
fn valid_toml_deserializes_into_vecmem_config() {
    let toml = r#"
[backend]
kind = "sqlite"
dimension = 128
metric = "euclidean"
path = "/tmp/vectors.db"
max_pending_writes = 500
flush_batch_size = 50

[embedding]
provider = "remote"
model = "text-embedding-3-small"
dimension = 1536
api_key = "sk-test"
cache_capacity = 100
cache_evict_count = 50
allow_download = true

[attention]
top_k = 5
min_score = 0.1
temperature = 0.5
num_heads = 8

[enhancer]
enabled = true
learning_rate = 0.001
min_samples = 20

[logging]
level = "debug"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.backend.kind, "sqlite");
    assert_eq!(config.backend.dimension, Some(128));
    assert_eq!(config.backend.metric, Metric::Euclidean);
    assert_eq!(config.backend.path.as_deref(), Some("/tmp/vectors.db"));
    assert_eq!(config.backend.max_pending_writes, 500);
    assert_eq!(config.backend.flush_batch_size, 50);
    assert_eq!(config.embedding.provider, ProviderTier::Remote);
    assert_eq!(config.embedding.dimension, 1536);
    assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.embedding.cache_capacity, 100);
    assert!(config.embedding.allow_download);
    assert_eq!(config.attention.top_k, 5);
    assert_eq!(config.attention.num_heads, 8);
    assert!(config.enhancer.enabled);
    assert_eq!(config.enhancer.min_samples, 20);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("[logging]\nlevel = \"warn\"\n").unwrap();
    assert_eq!(config.backend.kind, "auto");
    assert_eq!(config.backend.metric, Metric::Cosine);
    assert_eq!(config.embedding.provider, ProviderTier::Onnx);
    assert_eq!(config.embedding.cache_capacity, 10_000);
    assert_eq!(config.embedding.cache_evict_count, 5_000);
    assert!(!config.embedding.allow_download);
    assert_eq!(config.attention.top_k, 10);
    assert!(!config.enhancer.enabled);
    assert_eq!(config.enhancer.min_samples, 10);
}

/// `VECMEM_EMBEDDING_API_KEY` maps to `embedding.api_key`, not `embedding.api.key`.
#[test]
fn dotted_override_sets_underscored_key() {
    use figment::{providers::Serialized, Figment};

    let config: VecmemConfig = Figment::new()
        .merge(Serialized::defaults(VecmemConfig::default()))
        .merge(("embedding.api_key", "from-env"))
        .merge(("backend.kind", "flat"))
        .extract()
        .expect("dot notation should set nested keys");

    assert_eq!(config.embedding.api_key.as_deref(), Some("from-env"));
    assert_eq!(config.backend.kind, "flat");
}

#[test]
fn missing_config_files_silently_skipped() {
    let config = vecmem_config::load_config_from_path(std::path::Path::new(
        "/nonexistent/path/vecmem.toml",
    ))
    .expect("missing file should be skipped");
    assert_eq!(config.backend.kind, "auto");
}

#[test]
fn config_file_on_disk_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vecmem.toml");
    std::fs::write(&path, "[attention]\ntop_k = 3\n").unwrap();

    let config = vecmem_config::load_config_from_path(&path).unwrap();
    assert_eq!(config.attention.top_k, 3);
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let err = load_config_from_str("[storage]\npath = \"x\"\n")
        .expect_err("unknown section should be rejected");
    assert!(err.to_string().contains("unknown field"), "{err}");
}

#[test]
fn unknown_key_error_suggests_correction() {
    let toml = r#"
[attention]
temprature = 0.5
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "temprature"
                && suggestion.as_deref() == Some("temperature")
                && valid_keys.contains("num_heads")
        })
    });
    assert!(found, "expected UnknownKey with suggestion, got: {errors:?}");
}

#[test]
fn invalid_type_is_reported() {
    let toml = r#"
[backend]
dimension = "wide"
"#;
    let err = load_config_from_str(toml).expect_err("should reject invalid type");
    let err_str = err.to_string();
    assert!(
        err_str.contains("invalid type") || err_str.contains("dimension"),
        "got: {err_str}"
    );
}

#[test]
fn unknown_metric_is_rejected() {
    assert!(load_config_from_str("[backend]\nmetric = \"manhattan\"\n").is_err());
}

#[test]
fn misspelled_metric_suggests_variant() {
    let errors = load_and_validate_str("[backend]\nmetric = \"eucldean\"\n").unwrap_err();
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownValue { value, suggestion, .. }
            if value == "eucldean" && suggestion.as_deref() == Some("euclidean"))
    });
    assert!(found, "expected UnknownValue with suggestion, got: {errors:?}");
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "knid".to_string(),
        suggestion: Some("kind".to_string()),
        valid_keys: "kind, dimension, metric".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some());
    let help = error.help().unwrap().to_string();
    assert!(help.contains("did you mean `kind`"), "{help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .unwrap();
    assert!(buf.contains("knid"));
}

#[test]
fn load_and_validate_str_reports_semantic_errors() {
    let toml = r#"
[backend]
kind = "redis"

[attention]
temperature = -1.0
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(errors.iter().all(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn load_and_validate_str_accepts_valid_toml() {
    let config = load_and_validate_str("[backend]\nkind = \"native\"\n").unwrap();
    assert_eq!(config.backend.kind, "native");
}

#[test]
fn file_errors_point_into_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vecmem.toml");
    std::fs::write(&path, "[backend]\nknid = \"flat\"\n").unwrap();

    let errors = load_and_validate_path(&path).unwrap_err();
    let located = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, span: Some(_), src: Some(_), .. } if key == "knid")
    });
    assert!(located, "expected a located UnknownKey, got: {errors:?}");
}

#[test]
fn valid_file_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vecmem.toml");
    std::fs::write(&path, "[attention]\ntop_k = 3\n").unwrap();
    assert_eq!(load_and_validate_path(&path).unwrap().attention.top_k, 3);
}
