// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment errors are turned into [`ConfigError`]s that miette can render
//! against the TOML source, with a typo suggestion for unknown keys and
//! unknown enum values (`metric`, `provider`).

#![allow(unused_assignments)] // emitted by the miette derive

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a candidate must beat to be offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Source name used for configuration passed as a string.
pub const INLINE_SOURCE: &str = "<inline>";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(vecmem::config::unknown_key),
        help("{}", did_you_mean(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a vecmem setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{value}` is not a valid value for `{key}`")]
    #[diagnostic(
        code(vecmem::config::unknown_value),
        help("{}", did_you_mean(suggestion.as_deref(), valid_values))
    )]
    UnknownValue {
        key: String,
        value: String,
        suggestion: Option<String>,
        valid_values: String,
    },

    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(vecmem::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    /// Parsed, but outside its allowed range or set.
    #[error("validation error: {message}")]
    #[diagnostic(code(vecmem::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(vecmem::config::other))]
    Other(String),
}

fn did_you_mean(suggestion: Option<&str>, valid: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Expected one of: {valid}"),
        None => format!("expected one of: {valid}"),
    }
}

/// Split a figment error into one diagnostic per underlying failure.
///
/// `sources` pairs a file name (or [`INLINE_SOURCE`]) with its TOML text
/// and is used to attach a span to unknown keys.
pub fn from_figment(err: figment::Error, sources: &[(String, String)]) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let key = dotted_path(&error);
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = locate(&error, field, sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: closest_match(field, *expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::UnknownVariant(value, expected) => ConfigError::UnknownValue {
                    key,
                    value: value.clone(),
                    suggestion: closest_match(value, *expected),
                    valid_values: expected.join(", "),
                },
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key,
                    detail: format!("found {actual}, expected {expected}"),
                    expected: expected.clone(),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn dotted_path(error: &figment::Error) -> String {
    error.path.join(".")
}

/// Find the TOML text that produced `error` and the span of `field` in it.
fn locate(
    error: &figment::Error,
    field: &str,
    sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(path)) => path.display().to_string(),
        _ => INLINE_SOURCE.to_string(),
    };
    let Some((name, text)) = sources
        .iter()
        .find(|(name, _)| *name == origin)
        .or_else(|| sources.iter().find(|(name, _)| name == INLINE_SOURCE))
    else {
        return (None, None);
    };

    match key_offset(text, error.path.first().map(String::as_str), field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, text.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of the line assigning `field`, looking only inside
/// `[section]` when one is given.
pub fn key_offset(text: &str, section: Option<&str>, field: &str) -> Option<usize> {
    let start = match section {
        Some(section) => {
            let header = format!("[{section}]");
            text.find(&header)? + header.len()
        }
        None => 0,
    };

    let mut offset = start;
    for line in text[start..].split_inclusive('\n') {
        let body = line.trim_start();
        if body.starts_with('[') && section.is_some() {
            // Next table: the key is not in this section.
            return None;
        }
        let assigns = body
            .strip_prefix(field)
            .is_some_and(|rest| rest.starts_with([' ', '\t', '=']));
        if assigns {
            return Some(offset + line.len() - body.len());
        }
        offset += line.len();
    }
    None
}

/// Closest candidate by Jaro-Winkler similarity, if it clears the threshold.
pub fn closest_match<S: AsRef<str>>(input: &str, candidates: &[S]) -> Option<String> {
    candidates
        .iter()
        .map(|c| (strsim::jaro_winkler(input, c.as_ref()), c.as_ref()))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

/// Render every error as a miette report on stderr.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut report = String::new();
        match handler.render_report(&mut report, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{report}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_typo() {
        let valid = ["top_k", "min_score", "temperature", "num_heads"];
        assert_eq!(closest_match("temprature", &valid), Some("temperature".to_string()));
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = ["kind", "dimension", "metric"];
        assert_eq!(closest_match("zzzzzz", &valid), None);
    }

    #[test]
    fn key_offset_in_section() {
        let text = "[backend]\nknid = \"flat\"\n";
        let o = key_offset(text, Some("backend"), "knid").unwrap();
        assert_eq!(&text[o..o + 4], "knid");
    }

    #[test]
    fn key_offset_stays_inside_section() {
        let text = "[attention]\ntop_k = 3\n[enhancer]\n  top_k = 4\n";
        let o = key_offset(text, Some("enhancer"), "top_k").unwrap();
        assert_eq!(&text[o..], "top_k = 4\n");
        assert_eq!(key_offset("[attention]\n[backend]\nkind = 1\n", Some("attention"), "kind"), None);
    }

    #[test]
    fn key_offset_ignores_longer_keys() {
        let text = "dimension_hint = 1\ndimension = 2\n";
        let o = key_offset(text, None, "dimension").unwrap();
        assert_eq!(&text[o..], "dimension = 2\n");
    }
}
