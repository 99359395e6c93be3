//! GitHub webhook event types.
//!
//! Typed representations of the three webhook events the monitor reacts to,
//! holding only the fields normalization needs.
//!
//! - `pull_request` - merges into a tracked branch
//! - `release` - published releases (tracked by tag)
//! - `create` - new branches (tags are ignored)

use serde::{Deserialize, Serialize};

use crate::types::{PrNumber, RepoId};

/// A parsed GitHub webhook event.
///
/// Event kinds the monitor does not handle never get this far; the parser
/// returns `None` for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GitHubEvent {
    PullRequest(PullRequestEvent),
    Release(ReleaseEvent),
    Create(CreateEvent),
}

impl GitHubEvent {
    /// Returns the repository this event belongs to.
    pub fn repo_id(&self) -> &RepoId {
        match self {
            GitHubEvent::PullRequest(e) => &e.repo,
            GitHubEvent::Release(e) => &e.repo,
            GitHubEvent::Create(e) => &e.repo,
        }
    }

    /// The `X-GitHub-Event` name this event was delivered under.
    pub fn event_type(&self) -> &'static str {
        match self {
            GitHubEvent::PullRequest(_) => "pull_request",
            GitHubEvent::Release(_) => "release",
            GitHubEvent::Create(_) => "create",
        }
    }
}

/// A pull request event.
///
/// `action` is kept as GitHub's raw string; only `closed` matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub repo: RepoId,
    pub action: String,
    pub pr_number: PrNumber,
    pub title: String,

    /// Whether the PR was merged (only meaningful for `closed` action).
    pub merged: bool,

    /// The merge commit SHA. GitHub sets this on merge; it may be absent on
    /// payloads for unmerged PRs.
    pub merge_commit_sha: Option<String>,

    /// The branch the PR was merged into.
    pub base_branch: String,
}

impl PullRequestEvent {
    pub fn is_merge(&self) -> bool {
        self.action == "closed" && self.merged
    }
}

/// A release event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEvent {
    pub repo: RepoId,

    /// `published`, `created`, `released`, ... Absent on some older payloads.
    pub action: Option<String>,

    pub tag_name: String,

    /// Branch or commit the tag was cut from.
    pub target_commitish: String,
}

impl ReleaseEvent {
    /// A release is tracked once, when it is published.
    pub fn is_publish(&self) -> bool {
        self.action.as_deref().is_none_or(|a| a == "published")
    }
}

/// What kind of ref a `create` event created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    Branch,
    Tag,
    Other(String),
}

impl From<&str> for RefType {
    fn from(s: &str) -> Self {
        match s {
            "branch" => RefType::Branch,
            "tag" => RefType::Tag,
            other => RefType::Other(other.to_string()),
        }
    }
}

/// A ref (branch or tag) creation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEvent {
    pub repo: RepoId,

    /// Short ref name, e.g. `release-2024W03-1`.
    pub ref_name: String,

    pub ref_type: RefType,

    /// The repository's default branch.
    pub master_branch: Option<String>,
}
