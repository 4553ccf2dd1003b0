// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend resolution: detection, priority ordering and fallback.
//!
//! `auto` walks every registered candidate in priority order. An explicit
//! family only tries that family's candidates and reports the factory's
//! install hint when none can be used. Creation and initialization failures
//! are recorded as attempts and never escape as panics.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info, warn};
use vecmem_core::{
    BackendAttempt, BackendDetection, BackendFactory, BackendSettings, Result, VecmemError,
    VectorBackend,
};

use crate::registry::BackendRegistry;

/// Which backend the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackendChoice {
    #[default]
    Auto,
    /// A backend family such as `sqlite`.
    Named(String),
}

impl FromStr for BackendChoice {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "auto" => BackendChoice::Auto,
            other => BackendChoice::Named(other.to_string()),
        })
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendChoice::Auto => write!(f, "auto"),
            BackendChoice::Named(family) => write!(f, "{family}"),
        }
    }
}

/// Detection results for one resolution, in candidate order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionReport {
    detections: Vec<BackendDetection>,
}

impl DetectionReport {
    pub fn iter(&self) -> impl Iterator<Item = &BackendDetection> {
        self.detections.iter()
    }

    pub fn get(&self, name: &str) -> Option<&BackendDetection> {
        self.detections.iter().find(|d| d.name == name)
    }

    pub fn available(&self) -> impl Iterator<Item = &BackendDetection> {
        self.detections.iter().filter(|d| d.available)
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Record of the resolver settling on a lower-priority candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackTransition {
    /// Top-priority candidate that was passed over.
    pub from: String,
    pub to: String,
    /// Why `from` could not be used.
    pub reason: String,
}

/// Outcome of a successful resolution.
pub struct Resolution {
    /// Initialized backend.
    pub backend: Box<dyn VectorBackend>,
    pub name: String,
    pub detection: DetectionReport,
    /// Candidates tried and rejected before `name`.
    pub attempts: Vec<BackendAttempt>,
    pub fallback: Option<FallbackTransition>,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("name", &self.name)
            .field("detection", &self.detection)
            .field("attempts", &self.attempts)
            .field("fallback", &self.fallback)
            .finish()
    }
}

pub struct BackendResolver {
    registry: BackendRegistry,
    settings: BackendSettings,
}

impl BackendResolver {
    pub fn new(registry: BackendRegistry, settings: BackendSettings) -> Self {
        Self { registry, settings }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Probe every registered candidate without constructing any backend.
    pub fn detect(&self) -> DetectionReport {
        DetectionReport {
            detections: self.registry.candidates().iter().map(|f| f.detect()).collect(),
        }
    }

    pub fn resolve(&self, choice: &BackendChoice) -> Result<Resolution> {
        let candidates = match choice {
            BackendChoice::Auto => self.registry.candidates(),
            BackendChoice::Named(family) => {
                let candidates = self.registry.family(family);
                if candidates.is_empty() {
                    return Err(VecmemError::BackendUnavailable {
                        backend: family.clone(),
                        reason: "no backend family with this name is registered".to_string(),
                        install: format!("choose one of: {}", self.registry.families().join(", ")),
                    });
                }
                candidates
            }
        };

        let detection = DetectionReport {
            detections: candidates.iter().map(|f| f.detect()).collect(),
        };
        let mut attempts = Vec::new();

        for (factory, detected) in candidates.iter().zip(detection.clone().iter()) {
            let name = factory.name();
            if !detected.available {
                let reason = detected
                    .detail
                    .clone()
                    .unwrap_or_else(|| "not available".to_string());
                debug!(backend = name, reason = %reason, "backend candidate unavailable");
                attempts.push(BackendAttempt {
                    backend: name.to_string(),
                    reason,
                });
                continue;
            }

            match build(*factory, &self.settings) {
                Ok(backend) => {
                    let fallback = attempts.first().map(|first: &BackendAttempt| {
                        FallbackTransition {
                            from: first.backend.clone(),
                            to: name.to_string(),
                            reason: first.reason.clone(),
                        }
                    });
                    if let Some(t) = &fallback {
                        warn!(
                            from = %t.from,
                            to = %t.to,
                            reason = %t.reason,
                            "vector backend fallback"
                        );
                        metrics::counter!("vecmem_backend_fallbacks_total").increment(1);
                    }
                    info!(
                        backend = name,
                        native = detected.native,
                        choice = %choice,
                        "vector backend resolved"
                    );
                    return Ok(Resolution {
                        backend,
                        name: name.to_string(),
                        detection,
                        attempts,
                        fallback,
                    });
                }
                Err(e) => {
                    debug!(backend = name, error = %e, "backend candidate failed to initialize");
                    attempts.push(BackendAttempt {
                        backend: name.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        match choice {
            BackendChoice::Auto => Err(VecmemError::NoBackendAvailable {
                attempted: attempts,
            }),
            BackendChoice::Named(family) => Err(VecmemError::BackendUnavailable {
                backend: family.clone(),
                reason: attempts
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
                install: candidates[0].install_hint().to_string(),
            }),
        }
    }
}

fn build(factory: &dyn BackendFactory, settings: &BackendSettings) -> Result<Box<dyn VectorBackend>> {
    let mut backend = factory.create(settings)?;
    backend.initialize()?;
    Ok(backend)
}
