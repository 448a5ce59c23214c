use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::RunPhase;

/// Stage of a report run that produced a fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planning,
    Drafting,
    Aggregation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Planning => "planning",
            Stage::Drafting => "drafting",
            Stage::Aggregation => "aggregation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for ReportFlow.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("planning failed: {reason}")]
    Planning { reason: String },
    #[error("drafting failed for section '{section}': {reason}")]
    Drafting { section: String, reason: String },
    #[error("aggregation failed: {reason}")]
    Aggregation { reason: String },
    #[error("invalid run transition from {from} to {to}")]
    InvalidTransition { from: RunPhase, to: RunPhase },
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("workflow execution failure: {0}")]
    Workflow(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReportError {
    pub fn planning(reason: impl Into<String>) -> Self {
        Self::Planning {
            reason: reason.into(),
        }
    }

    pub fn drafting(section: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Drafting {
            section: section.into(),
            reason: reason.into(),
        }
    }

    pub fn aggregation(reason: impl Into<String>) -> Self {
        Self::Aggregation {
            reason: reason.into(),
        }
    }

    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }

    /// Stage tag for failures raised by one of the run stages.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Planning { .. } => Some(Stage::Planning),
            Self::Drafting { .. } => Some(Stage::Drafting),
            Self::Aggregation { .. } => Some(Stage::Aggregation),
            _ => None,
        }
    }

    /// Name of the offending section, for drafting failures.
    pub fn section(&self) -> Option<&str> {
        match self {
            Self::Drafting { section, .. } => Some(section),
            _ => None,
        }
    }
}

/// Serialisable snapshot of a fatal stage failure.
///
/// Stages record this on the shared state instead of aborting the graph, and
/// the run driver turns it back into a [`ReportError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub stage: Stage,
    pub section: Option<String>,
    pub reason: String,
}

impl FailureRecord {
    pub fn from_error(stage: Stage, err: &ReportError) -> Self {
        let reason = match err {
            ReportError::Planning { reason }
            | ReportError::Drafting { reason, .. }
            | ReportError::Aggregation { reason } => reason.clone(),
            other => other.to_string(),
        };
        Self {
            stage,
            section: err.section().map(str::to_string),
            reason,
        }
    }

    pub fn into_error(self) -> ReportError {
        match self.stage {
            Stage::Planning => ReportError::planning(self.reason),
            Stage::Drafting => ReportError::drafting(
                self.section.unwrap_or_else(|| "<unknown>".to_string()),
                self.reason,
            ),
            Stage::Aggregation => ReportError::aggregation(self.reason),
        }
    }
}
