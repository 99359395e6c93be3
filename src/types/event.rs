//! The normalized event record that flows from the webhook boundary through the
//! tracker and into the notification router.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{PrNumber, RepoId};

/// What happened in source control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A pull request was closed with its changes merged.
    PullRequestMerged,
    /// A release was published.
    Release,
    /// A branch was created.
    BranchCreated,
}

impl EventKind {
    /// The routing key shared by the source-control and CI sections of the
    /// routing configuration.
    pub fn key(&self) -> &'static str {
        match self {
            EventKind::PullRequestMerged => "pull_request_merged",
            EventKind::Release => "release_published",
            EventKind::BranchCreated => "branch_created",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Which stage produced an event instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// The immediate "it happened" announcement.
    SourceControl,
    /// A verdict reached by polling the CI provider.
    Ci,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::SourceControl => "github",
            Source::Ci => "circle_ci",
        })
    }
}

/// The classification a tracked unit reaches.
///
/// `Pending` is only ever carried by the source-control announcement; every
/// CI event carries one of the terminal variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    Pending,
    Success,
    BuildFailed,
    FetchFailed,
    SearchFailed,
    #[serde(rename = "wait_failed", alias = "wait_timed_out")]
    WaitTimedOut,
}

impl BuildOutcome {
    /// Key used in the CI section of the routing configuration.
    pub fn key(&self) -> &'static str {
        match self {
            BuildOutcome::Pending => "pending",
            BuildOutcome::Success => "success",
            BuildOutcome::BuildFailed => "build_failed",
            BuildOutcome::FetchFailed => "fetch_failed",
            BuildOutcome::SearchFailed => "search_failed",
            BuildOutcome::WaitTimedOut => "wait_failed",
        }
    }

    /// Parses a routing-configuration key. Accepts `wait_timed_out` as an alias.
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "pending" => BuildOutcome::Pending,
            "success" => BuildOutcome::Success,
            "build_failed" => BuildOutcome::BuildFailed,
            "fetch_failed" => BuildOutcome::FetchFailed,
            "search_failed" => BuildOutcome::SearchFailed,
            "wait_failed" | "wait_timed_out" => BuildOutcome::WaitTimedOut,
            _ => return None,
        })
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BuildOutcome::Pending)
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Pull request metadata, present only for merge-derived events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrInfo {
    pub title: String,
    pub number: PrNumber,
}

/// The single record passed between the normalizer, tracker and router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub source: Source,
    pub repo: RepoId,

    /// Target branch of a merge, `target_commitish` of a release, or the new branch.
    pub branch_ref: String,

    /// Commit SHA or tag name used to correlate CI builds.
    ///
    /// Empty only for a branch-creation event whose head commit has not been
    /// resolved yet.
    pub revision_or_tag: String,

    pub pr: Option<PrInfo>,

    /// Set on every event the tracker emits.
    pub outcome: Option<BuildOutcome>,

    /// Link to the build that decided a `BuildFailed` outcome.
    pub build_url: Option<String>,
}

impl Event {
    pub fn new(
        kind: EventKind,
        repo: RepoId,
        branch_ref: impl Into<String>,
        revision_or_tag: impl Into<String>,
    ) -> Self {
        Event {
            kind,
            source: Source::SourceControl,
            repo,
            branch_ref: branch_ref.into(),
            revision_or_tag: revision_or_tag.into(),
            pr: None,
            outcome: None,
            build_url: None,
        }
    }

    pub fn with_pr(mut self, title: impl Into<String>, number: PrNumber) -> Self {
        self.pr = Some(PrInfo {
            title: title.into(),
            number,
        });
        self
    }

    /// The immediate notification for the source-control stage.
    pub fn announcement(&self) -> Event {
        Event {
            source: Source::SourceControl,
            outcome: Some(BuildOutcome::Pending),
            build_url: None,
            ..self.clone()
        }
    }

    /// A CI-stage event carrying a terminal outcome.
    pub fn verdict(&self, outcome: BuildOutcome, build_url: Option<String>) -> Event {
        Event {
            source: Source::Ci,
            outcome: Some(outcome),
            build_url,
            ..self.clone()
        }
    }

    pub fn has_revision(&self) -> bool {
        !self.revision_or_tag.trim().is_empty()
    }
}
