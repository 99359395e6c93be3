//! Seams between the tracker and the outside world.
//!
//! The tracker never talks to a CI provider or to GitHub directly; it goes
//! through these traits so tests can script the responses.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::types::{Build, Event, EventKind, RepoId};

/// What to ask the CI provider for on each poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildQuery {
    pub repo: RepoId,
    /// Restricts the listing to one branch. `None` for releases, whose tag
    /// builds are not filed under a branch.
    pub branch: Option<String>,
    pub revision_or_tag: String,
}

impl BuildQuery {
    pub fn for_event(event: &Event) -> Self {
        let branch = match event.kind {
            EventKind::Release => None,
            EventKind::PullRequestMerged | EventKind::BranchCreated => {
                Some(event.branch_ref.clone())
            }
        };
        BuildQuery {
            repo: event.repo.clone(),
            branch,
            revision_or_tag: event.revision_or_tag.clone(),
        }
    }
}

/// Lists CI builds matching a revision or tag.
///
/// An `Err` is reported by the tracker as `fetch_failed`; an empty `Ok` counts
/// as a round in which no build was found.
pub trait BuildLookup {
    type Error: fmt::Display + Send;

    fn find_builds(
        &self,
        query: &BuildQuery,
    ) -> impl Future<Output = Result<Vec<Build>, Self::Error>> + Send;
}

impl<L: BuildLookup + Send + Sync> BuildLookup for Arc<L> {
    type Error = L::Error;

    fn find_builds(
        &self,
        query: &BuildQuery,
    ) -> impl Future<Output = Result<Vec<Build>, Self::Error>> + Send {
        (**self).find_builds(query)
    }
}

impl<L: BuildLookup + Sync> BuildLookup for &L {
    type Error = L::Error;

    fn find_builds(
        &self,
        query: &BuildQuery,
    ) -> impl Future<Output = Result<Vec<Build>, Self::Error>> + Send {
        (**self).find_builds(query)
    }
}

/// Resolves a branch or ref name to the SHA of its head commit.
///
/// Branch-creation webhooks carry only the ref name; the tracker needs a SHA
/// to correlate builds.
pub trait CommitResolver {
    type Error: fmt::Display + Send;

    fn resolve_commit(
        &self,
        repo: &RepoId,
        reference: &str,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

impl<R: CommitResolver + Send + Sync> CommitResolver for Arc<R> {
    type Error = R::Error;

    fn resolve_commit(
        &self,
        repo: &RepoId,
        reference: &str,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send {
        (**self).resolve_commit(repo, reference)
    }
}
