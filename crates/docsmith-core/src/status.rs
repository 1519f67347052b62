//! Documentation status model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message shown before any generation has been attempted.
pub const NOT_STARTED_MESSAGE: &str = "Documentation generation not started";

/// Message set when a repository's documentation is fully generated.
pub const READY_MESSAGE: &str = "Documentation is ready!";

/// Lifecycle status of a repository's documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocStatus {
    NotStarted,
    Generating,
    Complete,
    Error,
}

impl DocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocStatus::NotStarted => "not_started",
            DocStatus::Generating => "generating",
            DocStatus::Complete => "complete",
            DocStatus::Error => "error",
        }
    }

    /// Parse the stored representation; unknown values map to `Error` so a
    /// corrupt row surfaces as a visible (non-crashing) state.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "not_started" => DocStatus::NotStarted,
            "generating" => DocStatus::Generating,
            "complete" => DocStatus::Complete,
            _ => DocStatus::Error,
        }
    }
}

impl std::fmt::Display for DocStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current generation progress for one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: DocStatus,
    pub progress: u8,
    pub message: String,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

impl StatusRecord {
    pub fn new(status: DocStatus, progress: u8, message: impl Into<String>) -> Self {
        Self {
            status,
            progress: clamp_progress(progress as i64),
            message: message.into(),
            last_updated: Utc::now(),
        }
    }

    /// The value reported for repositories with no stored status.
    pub fn not_started() -> Self {
        Self::new(DocStatus::NotStarted, 0, NOT_STARTED_MESSAGE)
    }

    /// Returned when the store itself cannot be read, so the caller can show
    /// a transient error without crashing.
    pub fn transient_error(message: impl Into<String>) -> Self {
        Self::new(DocStatus::Error, 0, message)
    }

    pub fn complete() -> Self {
        Self::new(DocStatus::Complete, 100, READY_MESSAGE)
    }
}

/// Clamp an arbitrary progress value into `[0, 100]`.
pub fn clamp_progress(progress: i64) -> u8 {
    progress.clamp(0, 100) as u8
}
