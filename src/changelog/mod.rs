//! Release changelogs assembled from GitHub history.

mod builder;

use std::fmt::Display;
use std::future::Future;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::github::{CommitSummary, GitHubApiError, NamedRef, OctocrabClient};
use crate::types::RepoId;

pub use builder::{
    Links, NO_RELEASES, PROD_PAGE_SIZE, build_changelog, is_release_branch, is_release_tag,
};

#[derive(Debug, Error)]
pub enum ChangelogError {
    #[error("failed to {operation}: {message}")]
    Upstream {
        operation: &'static str,
        message: String,
    },
}

impl ChangelogError {
    pub fn upstream(operation: &'static str, err: impl Display) -> Self {
        ChangelogError::Upstream {
            operation,
            message: err.to_string(),
        }
    }
}

/// Repository history reads a changelog is built from.
pub trait ChangelogSource {
    type Error: Display + Send;

    fn list_tags(&self, repo: &RepoId)
    -> impl Future<Output = Result<Vec<NamedRef>, Self::Error>> + Send;

    fn list_branches(
        &self,
        repo: &RepoId,
    ) -> impl Future<Output = Result<Vec<NamedRef>, Self::Error>> + Send;

    /// Commits on `head` that are not on `base`, oldest first.
    fn compare(
        &self,
        repo: &RepoId,
        base: &str,
        head: &str,
    ) -> impl Future<Output = Result<Vec<CommitSummary>, Self::Error>> + Send;

    /// History starting at `from`, newest first.
    fn commits(
        &self,
        repo: &RepoId,
        from: &str,
        pages: u32,
        per_page: u32,
    ) -> impl Future<Output = Result<Vec<CommitSummary>, Self::Error>> + Send;
}

impl ChangelogSource for OctocrabClient {
    type Error = GitHubApiError;

    async fn list_tags(&self, repo: &RepoId) -> Result<Vec<NamedRef>, GitHubApiError> {
        OctocrabClient::list_tags(self, repo).await
    }

    async fn list_branches(&self, repo: &RepoId) -> Result<Vec<NamedRef>, GitHubApiError> {
        OctocrabClient::list_branches(self, repo).await
    }

    async fn compare(
        &self,
        repo: &RepoId,
        base: &str,
        head: &str,
    ) -> Result<Vec<CommitSummary>, GitHubApiError> {
        OctocrabClient::compare(self, repo, base, head).await
    }

    async fn commits(
        &self,
        repo: &RepoId,
        from: &str,
        pages: u32,
        per_page: u32,
    ) -> Result<Vec<CommitSummary>, GitHubApiError> {
        OctocrabClient::commits(self, repo, from, pages, per_page).await
    }
}

/// Serves changelogs by repository name. Object safe so the HTTP layer can
/// hold it behind `Arc<dyn ChangelogProvider>`.
pub trait ChangelogProvider: Send + Sync {
    fn changelog(&self, repo: String, pages: u32) -> BoxFuture<'_, Result<String, ChangelogError>>;
}

/// Changelogs for the repositories of one organization.
#[derive(Debug, Clone)]
pub struct Changelog<S> {
    source: S,
    org: String,
    links: Links,
}

impl<S> Changelog<S> {
    pub fn new(source: S, org: impl Into<String>, links: Links) -> Self {
        Self {
            source,
            org: org.into(),
            links,
        }
    }
}

impl<S> ChangelogProvider for Changelog<S>
where
    S: ChangelogSource + Send + Sync,
{
    fn changelog(&self, repo: String, pages: u32) -> BoxFuture<'_, Result<String, ChangelogError>> {
        Box::pin(async move {
            let repo = RepoId::new(self.org.clone(), repo);
            build_changelog(&self.source, &repo, pages, &self.links).await
        })
    }
}
