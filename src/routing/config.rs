//! On-disk format of the routing configuration.
//!
//! ```json
//! {
//!   "slacks": { "eng": { "url": "https://hooks.slack.com/services/..." } },
//!   "branches": [
//!     {
//!       "pattern": "^master$",
//!       "github": {
//!         "pull_request_merged": { "slack": "eng", "message": "{{pr_title}} merged" }
//!       },
//!       "circle_ci": {
//!         "pull_request_merged": {
//!           "success": { "slack": "eng", "room": "#deploys", "message": "{{repo}} is green" }
//!         }
//!       }
//!     }
//!   ],
//!   "tags": []
//! }
//! ```
//!
//! `branches` and `tags` are arrays so that the order entries are written in
//! is the order they are matched in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors loading or compiling a routing configuration.
#[derive(Debug, Error)]
pub enum RoutingConfigError {
    #[error("failed to read routing config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid routing config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("invalid template for {location}: {source}")]
    Template {
        location: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    #[error("unknown outcome {key:?} for {location}")]
    UnknownOutcome { location: String, key: String },

    #[error("{location} refers to undeclared slack {slack:?}")]
    UnknownSlack { location: String, slack: String },
}

/// The whole routing file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RoutingFile {
    /// Named Slack incoming webhooks that templates can be sent through.
    #[serde(default)]
    pub slacks: BTreeMap<String, SlackEntry>,

    /// Matched against the event's branch, first match wins.
    #[serde(default)]
    pub branches: Vec<RouteEntry>,

    /// Matched against the revision or tag when no branch entry matched.
    #[serde(default)]
    pub tags: Vec<RouteEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlackEntry {
    pub url: String,
}

/// Templates configured for one branch or tag pattern.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteEntry {
    pub pattern: String,

    /// Source-control announcements, keyed by event.
    #[serde(default)]
    pub github: BTreeMap<String, TemplateEntry>,

    /// CI verdicts, keyed by event and then by outcome.
    #[serde(default)]
    pub circle_ci: BTreeMap<String, BTreeMap<String, TemplateEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateEntry {
    /// Name of an entry in `slacks`.
    pub slack: String,

    /// Channel override passed to the transport.
    #[serde(default)]
    pub room: Option<String>,

    pub message: String,
}

impl RoutingFile {
    pub fn load(path: &Path) -> Result<Self, RoutingConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RoutingConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, RoutingConfigError> {
        Ok(serde_json::from_str(raw)?)
    }
}
