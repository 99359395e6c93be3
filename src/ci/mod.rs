//! CircleCI v1.1 build lookup.
//!
//! Lists the 30 most recent builds of a project (optionally of one branch)
//! and keeps those built from the tracked revision or tag.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::tracker::{BuildLookup, BuildQuery};
use crate::types::Build;

pub const DEFAULT_BASE_URL: &str = "https://circleci.com/api/v1.1";

/// Per-request timeout, which also bounds the length of one poll round.
pub const CI_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds requested per lookup.
pub const RECENT_BUILDS: u32 = 30;

const TOKEN_HEADER: &str = "Circle-Token";

#[derive(Debug, Error)]
pub enum CiError {
    #[error("CircleCI request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CircleCI returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Deserialize)]
struct RecentBuild {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    vcs_revision: Option<String>,
    #[serde(default)]
    vcs_tag: Option<String>,
    #[serde(default)]
    build_url: Option<String>,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
}

impl RecentBuild {
    /// The revision or tag this build matched, if any.
    fn matched<'a>(&'a self, wanted: &str) -> Option<&'a str> {
        [self.vcs_revision.as_deref(), self.vcs_tag.as_deref()]
            .into_iter()
            .flatten()
            .find(|value| *value == wanted)
    }

    fn into_build(self, matched: String) -> Build {
        Build {
            status: self.status.unwrap_or_default().into(),
            revision_or_tag: matched,
            build_url: self.build_url.unwrap_or_default(),
            started_at: self.start_time,
        }
    }
}

#[derive(Debug, Serialize)]
struct ListParams {
    limit: u32,
    shallow: bool,
}

#[derive(Clone)]
pub struct CircleCiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl CircleCiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, CiError> {
        let http = reqwest::Client::builder().timeout(CI_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn project_url(&self, query: &BuildQuery) -> String {
        let mut url = format!(
            "{}/project/github/{}/{}",
            self.base_url, query.repo.org, query.repo.name
        );
        if let Some(branch) = query.branch.as_deref().filter(|b| !b.is_empty()) {
            url.push_str("/tree/");
            url.push_str(&urlencoding::encode(branch));
        }
        url
    }
}

impl BuildLookup for CircleCiClient {
    type Error = CiError;

    async fn find_builds(&self, query: &BuildQuery) -> Result<Vec<Build>, CiError> {
        let mut request = self.http.get(self.project_url(query)).query(&ListParams {
            limit: RECENT_BUILDS,
            shallow: true,
        });
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let recent: Vec<RecentBuild> = response.json().await?;
        let listed = recent.len();
        let builds: Vec<Build> = recent
            .into_iter()
            .filter_map(|b| {
                let matched = b.matched(&query.revision_or_tag)?.to_string();
                Some(b.into_build(matched))
            })
            .collect();

        debug!(listed, matched = builds.len(), "listed CircleCI builds");
        Ok(builds)
    }
}

impl std::fmt::Debug for CircleCiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircleCiClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
