//! Octocrab client wrapper for the handful of repository reads the monitor
//! needs.
//!
//! Requests go through octocrab's generic `get` with small response structs of
//! our own, so only the fields we use have to be present in a response.

use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tracker::CommitResolver;
use crate::types::RepoId;

use super::error::GitHubApiError;
use super::retry::{RetryConfig, retry_transient};

/// GitHub's maximum page size.
pub const MAX_PER_PAGE: u32 = 100;

/// A commit as shown in a changelog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub sha: String,
    pub message: String,
}

/// A named ref (branch or tag) and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRef {
    pub name: String,
    pub sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    message: String,
}

impl From<CommitResponse> for CommitSummary {
    fn from(c: CommitResponse) -> Self {
        CommitSummary {
            sha: c.sha,
            message: c.commit.message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    name: String,
    commit: RefCommit,
}

#[derive(Debug, Deserialize)]
struct RefCommit {
    sha: String,
}

impl From<RefResponse> for NamedRef {
    fn from(r: RefResponse) -> Self {
        NamedRef {
            name: r.name,
            sha: r.commit.sha,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    #[serde(default)]
    commits: Vec<CommitResponse>,
}

#[derive(Debug, Serialize)]
struct PageParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    per_page: u32,
    page: u32,
}

/// A GitHub API client shared by every repository of the organization.
#[derive(Clone)]
pub struct OctocrabClient {
    client: Octocrab,
    retry: RetryConfig,
}

impl OctocrabClient {
    pub fn new(client: Octocrab) -> Self {
        Self {
            client,
            retry: RetryConfig::DEFAULT,
        }
    }

    /// Creates a client authenticated with a personal token, or an anonymous
    /// one when no token is given.
    pub fn from_token(token: Option<String>) -> Result<Self, octocrab::Error> {
        let builder = Octocrab::builder();
        let client = match token {
            Some(token) => builder.personal_token(token).build()?,
            None => builder.build()?,
        };
        Ok(Self::new(client))
    }

    /// Overrides the retry policy used for commit resolution.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Fetches a single commit by SHA, branch or tag name.
    pub async fn commit(&self, repo: &RepoId, reference: &str) -> Result<CommitSummary, GitHubApiError> {
        let url = format!(
            "/repos/{}/{}/commits/{}",
            repo.org,
            repo.name,
            urlencoding::encode(reference)
        );
        let commit: CommitResponse = self
            .client
            .get(&url, None::<&()>)
            .await
            .map_err(GitHubApiError::from_octocrab)?;
        Ok(commit.into())
    }

    /// Lists every tag, following pagination.
    pub async fn list_tags(&self, repo: &RepoId) -> Result<Vec<NamedRef>, GitHubApiError> {
        self.list_refs(repo, "tags").await
    }

    /// Lists every branch, following pagination.
    pub async fn list_branches(&self, repo: &RepoId) -> Result<Vec<NamedRef>, GitHubApiError> {
        self.list_refs(repo, "branches").await
    }

    async fn list_refs(&self, repo: &RepoId, kind: &str) -> Result<Vec<NamedRef>, GitHubApiError> {
        let url = format!("/repos/{}/{}/{}", repo.org, repo.name, kind);
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let params = PageParams {
                sha: None,
                per_page: MAX_PER_PAGE,
                page,
            };
            let batch: Vec<RefResponse> = self
                .client
                .get(&url, Some(&params))
                .await
                .map_err(GitHubApiError::from_octocrab)?;

            let done = batch.len() < MAX_PER_PAGE as usize;
            all.extend(batch.into_iter().map(NamedRef::from));
            if done {
                break;
            }
            page += 1;
        }
        debug!(repo = %repo, kind, count = all.len(), "listed refs");
        Ok(all)
    }

    /// Commits reachable from `head` but not from `base`, oldest first.
    pub async fn compare(
        &self,
        repo: &RepoId,
        base: &str,
        head: &str,
    ) -> Result<Vec<CommitSummary>, GitHubApiError> {
        let url = format!(
            "/repos/{}/{}/compare/{}...{}",
            repo.org,
            repo.name,
            urlencoding::encode(base),
            urlencoding::encode(head)
        );
        let comparison: CompareResponse = self
            .client
            .get(&url, None::<&()>)
            .await
            .map_err(GitHubApiError::from_octocrab)?;
        Ok(comparison.commits.into_iter().map(CommitSummary::from).collect())
    }

    /// Up to `pages` pages of history starting at `from`, newest first.
    pub async fn commits(
        &self,
        repo: &RepoId,
        from: &str,
        pages: u32,
        per_page: u32,
    ) -> Result<Vec<CommitSummary>, GitHubApiError> {
        let url = format!("/repos/{}/{}/commits", repo.org, repo.name);
        let mut all = Vec::new();
        for page in 1..=pages {
            let params = PageParams {
                sha: Some(from),
                per_page,
                page,
            };
            let batch: Vec<CommitResponse> = self
                .client
                .get(&url, Some(&params))
                .await
                .map_err(GitHubApiError::from_octocrab)?;

            let done = batch.len() < per_page as usize;
            all.extend(batch.into_iter().map(CommitSummary::from));
            if done {
                break;
            }
        }
        Ok(all)
    }
}

impl CommitResolver for OctocrabClient {
    type Error = GitHubApiError;

    async fn resolve_commit(&self, repo: &RepoId, reference: &str) -> Result<String, GitHubApiError> {
        let commit = retry_transient(self.retry, || self.commit(repo, reference)).await?;
        Ok(commit.sha)
    }
}

impl std::fmt::Debug for OctocrabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabClient")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
