//! GitHub webhook payload parser.
//!
//! This module parses raw webhook JSON payloads into typed [`GitHubEvent`] values.
//! Unknown fields are ignored; only the fields normalization needs are
//! required.
//!
//! # Parsing Strategy
//!
//! 1. The event type is determined from the `X-GitHub-Event` header
//! 2. The payload is parsed according to the event type
//! 3. Unsupported event types return `Ok(None)` (ignored, not error)
//! 4. Malformed payloads return `Err` with details
//!
//! # Headers
//!
//! - `X-GitHub-Event` - Event type (e.g., "pull_request")
//! - `X-GitHub-Delivery` - Unique delivery ID
//! - `X-Hub-Signature-256` - HMAC-SHA256 signature (verified elsewhere)

use serde::Deserialize;
use thiserror::Error;

use crate::types::{PrNumber, RepoId};

use super::events::{CreateEvent, GitHubEvent, PullRequestEvent, RefType, ReleaseEvent};

/// Event types the monitor tracks.
pub const SUPPORTED_EVENTS: [&str; 3] = ["pull_request", "release", "create"];

/// Returns whether `event_type` is one the monitor reacts to.
pub fn is_supported(event_type: &str) -> bool {
    SUPPORTED_EVENTS.contains(&event_type)
}

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Field has an unusable value.
    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Parses a webhook payload into a typed event.
///
/// # Returns
///
/// * `Ok(Some(event))` - Successfully parsed a supported event type
/// * `Ok(None)` - Unsupported event type (ignored, not an error)
/// * `Err(e)` - Malformed payload or missing required fields
///
/// # Examples
///
/// ```
/// use deploy_monitor::webhooks::parse_webhook;
///
/// let payload = br#"{
///     "ref": "release-2024W03-1",
///     "ref_type": "branch",
///     "master_branch": "master",
///     "repository": {
///         "owner": { "login": "acme" },
///         "name": "widgets"
///     }
/// }"#;
///
/// let event = parse_webhook("create", payload).unwrap();
/// assert!(event.is_some());
///
/// assert!(parse_webhook("issues", b"{}").unwrap().is_none());
/// ```
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<Option<GitHubEvent>, ParseError> {
    match event_type {
        "pull_request" => parse_pull_request(payload).map(|e| Some(GitHubEvent::PullRequest(e))),
        "release" => parse_release(payload).map(|e| Some(GitHubEvent::Release(e))),
        "create" => parse_create(payload).map(|e| Some(GitHubEvent::Create(e))),
        _ => Ok(None),
    }
}

// ============================================================================
// Raw payload structures for deserialization
// ============================================================================

/// Minimal repository info present in all webhook payloads.
#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawOwner,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

impl RawRepository {
    fn into_repo_id(self) -> RepoId {
        RepoId::new(self.owner.login, self.name)
    }
}

// ============================================================================
// pull_request event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    pull_request: RawPullRequest,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    #[serde(default)]
    title: String,
    merged: Option<bool>,
    merge_commit_sha: Option<String>,
    base: RawRef,
}

#[derive(Debug, Deserialize)]
struct RawRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

fn parse_pull_request(payload: &[u8]) -> Result<PullRequestEvent, ParseError> {
    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;

    Ok(PullRequestEvent {
        repo: raw.repository.into_repo_id(),
        action: raw.action,
        pr_number: PrNumber(raw.pull_request.number),
        title: raw.pull_request.title,
        merged: raw.pull_request.merged.unwrap_or(false),
        merge_commit_sha: raw.pull_request.merge_commit_sha.filter(|s| !s.is_empty()),
        base_branch: raw.pull_request.base.ref_name,
    })
}

// ============================================================================
// release event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawReleasePayload {
    action: Option<String>,
    release: RawRelease,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawRelease {
    tag_name: String,
    target_commitish: String,
}

fn parse_release(payload: &[u8]) -> Result<ReleaseEvent, ParseError> {
    let raw: RawReleasePayload = serde_json::from_slice(payload)?;

    if raw.release.tag_name.trim().is_empty() {
        return Err(ParseError::InvalidField {
            field: "release.tag_name",
            value: raw.release.tag_name,
        });
    }

    Ok(ReleaseEvent {
        repo: raw.repository.into_repo_id(),
        action: raw.action,
        tag_name: raw.release.tag_name,
        target_commitish: raw.release.target_commitish,
    })
}

// ============================================================================
// create event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawCreatePayload {
    #[serde(rename = "ref")]
    ref_name: String,
    ref_type: String,
    master_branch: Option<String>,
    repository: RawRepository,
}

fn parse_create(payload: &[u8]) -> Result<CreateEvent, ParseError> {
    let raw: RawCreatePayload = serde_json::from_slice(payload)?;

    if raw.ref_name.trim().is_empty() {
        return Err(ParseError::InvalidField {
            field: "ref",
            value: raw.ref_name,
        });
    }

    Ok(CreateEvent {
        repo: raw.repository.into_repo_id(),
        ref_type: RefType::from(raw.ref_type.as_str()),
        ref_name: raw.ref_name,
        master_branch: raw.master_branch,
    })
}
