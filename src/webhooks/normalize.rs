//! Converts typed webhook events into the internal [`Event`] record.
//!
//! Normalization also decides whether an event is worth tracking at all:
//! unmerged pull requests, unpublished releases and tag creations are
//! skipped before anything is announced.

use thiserror::Error;

use crate::types::{Event, EventKind};

use super::events::{CreateEvent, GitHubEvent, PullRequestEvent, RefType, ReleaseEvent};

/// A supported event that cannot be tracked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("{event} payload is missing {field}")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },
}

/// Why a supported event was not tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A pull request event other than a merge.
    NotMerged { action: String },
    /// A release action other than `published`.
    NotPublished { action: String },
    /// A `create` event for a tag or other non-branch ref.
    NotABranch { ref_type: RefType },
}

/// The outcome of normalizing one webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Ready to track.
    Track(Event),
    /// A branch creation: the head commit still has to be resolved and
    /// written to `revision_or_tag` before tracking.
    ResolveRevision(Event),
    Skip(SkipReason),
}

pub fn normalize(hook: &GitHubEvent) -> Result<Normalized, NormalizeError> {
    match hook {
        GitHubEvent::PullRequest(pr) => normalize_pull_request(pr),
        GitHubEvent::Release(release) => Ok(normalize_release(release)),
        GitHubEvent::Create(create) => Ok(normalize_create(create)),
    }
}

fn normalize_pull_request(pr: &PullRequestEvent) -> Result<Normalized, NormalizeError> {
    if !pr.is_merge() {
        return Ok(Normalized::Skip(SkipReason::NotMerged {
            action: pr.action.clone(),
        }));
    }

    let sha = pr
        .merge_commit_sha
        .as_deref()
        .filter(|sha| !sha.trim().is_empty())
        .ok_or(NormalizeError::MissingField {
            event: "pull_request",
            field: "pull_request.merge_commit_sha",
        })?;

    let event = Event::new(
        EventKind::PullRequestMerged,
        pr.repo.clone(),
        pr.base_branch.clone(),
        sha,
    )
    .with_pr(pr.title.clone(), pr.pr_number);

    Ok(Normalized::Track(event))
}

fn normalize_release(release: &ReleaseEvent) -> Normalized {
    if !release.is_publish() {
        return Normalized::Skip(SkipReason::NotPublished {
            action: release.action.clone().unwrap_or_default(),
        });
    }

    Normalized::Track(Event::new(
        EventKind::Release,
        release.repo.clone(),
        release.target_commitish.clone(),
        release.tag_name.clone(),
    ))
}

fn normalize_create(create: &CreateEvent) -> Normalized {
    if create.ref_type != RefType::Branch {
        return Normalized::Skip(SkipReason::NotABranch {
            ref_type: create.ref_type.clone(),
        });
    }

    Normalized::ResolveRevision(Event::new(
        EventKind::BranchCreated,
        create.repo.clone(),
        create.ref_name.clone(),
        String::new(),
    ))
}
