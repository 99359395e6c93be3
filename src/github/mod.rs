//! GitHub API access via octocrab.
//!
//! Key features:
//! - Commit resolution for newly created branches, with retry
//! - Tag, branch, compare and history reads for changelogs
//! - Distinguishes transient vs permanent errors

mod client;
mod error;
mod retry;

pub use client::{CommitSummary, MAX_PER_PAGE, NamedRef, OctocrabClient};
pub use error::{GitHubApiError, GitHubErrorKind};
pub use retry::{RetryConfig, retry_transient};
