//! One CI run as reported by the build provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a CI run.
///
/// The provider reports many intermediate states; only the ones the tracker
/// distinguishes get their own variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BuildStatus {
    Running,
    Queued,
    Success,
    Fixed,
    Failed,
    Canceled,
    /// Any other provider status (`not_run`, `infrastructure_fail`, ...).
    Other(String),
}

impl BuildStatus {
    /// Green statuses count towards the all-green debounce.
    pub fn is_green(&self) -> bool {
        matches!(self, BuildStatus::Success | BuildStatus::Fixed)
    }

    /// Statuses that decide a `BuildFailed` outcome immediately.
    pub fn is_failure(&self) -> bool {
        matches!(self, BuildStatus::Failed | BuildStatus::Canceled)
    }

    pub fn as_str(&self) -> &str {
        match self {
            BuildStatus::Running => "running",
            BuildStatus::Queued => "queued",
            BuildStatus::Success => "success",
            BuildStatus::Fixed => "fixed",
            BuildStatus::Failed => "failed",
            BuildStatus::Canceled => "canceled",
            BuildStatus::Other(s) => s,
        }
    }
}

impl From<String> for BuildStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "running" => BuildStatus::Running,
            "queued" => BuildStatus::Queued,
            "success" => BuildStatus::Success,
            "fixed" => BuildStatus::Fixed,
            "failed" => BuildStatus::Failed,
            "canceled" => BuildStatus::Canceled,
            _ => BuildStatus::Other(s),
        }
    }
}

impl From<&str> for BuildStatus {
    fn from(s: &str) -> Self {
        BuildStatus::from(s.to_string())
    }
}

impl From<BuildStatus> for String {
    fn from(status: BuildStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A CI run matching a tracked revision or tag. Read-only to the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub status: BuildStatus,
    pub revision_or_tag: String,
    pub build_url: String,
    pub started_at: Option<DateTime<Utc>>,
}

impl Build {
    pub fn new(
        status: impl Into<BuildStatus>,
        revision_or_tag: impl Into<String>,
        build_url: impl Into<String>,
    ) -> Self {
        Build {
            status: status.into(),
            revision_or_tag: revision_or_tag.into(),
            build_url: build_url.into(),
            started_at: None,
        }
    }
}
