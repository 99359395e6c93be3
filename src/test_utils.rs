//! Shared test fakes and arbitrary generators for property-based testing.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use proptest::prelude::*;

use crate::changelog::ChangelogSource;
use crate::github::{CommitSummary, NamedRef};
use crate::notify::{MessageTransport, TransportError};
use crate::routing::RenderedMessage;
use crate::tracker::{BuildLookup, BuildQuery, CommitResolver};
use crate::types::{Build, BuildStatus, PrNumber, RepoId};

pub fn arb_pr_number() -> impl Strategy<Value = PrNumber> {
    any::<u64>().prop_map(PrNumber)
}

/// Statuses the tracker distinguishes.
pub fn arb_build_status() -> impl Strategy<Value = BuildStatus> {
    prop_oneof![
        Just(BuildStatus::Running),
        Just(BuildStatus::Queued),
        Just(BuildStatus::Success),
        Just(BuildStatus::Fixed),
        Just(BuildStatus::Failed),
        Just(BuildStatus::Canceled),
    ]
}

pub fn arb_branch_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9/-]{0,30}".prop_map(String::from)
}

/// Replays a fixed list of lookup results; once exhausted, reports a running
/// build forever.
pub struct ScriptedLookup {
    rounds: Mutex<VecDeque<Result<Vec<Build>, String>>>,
    calls: Mutex<Vec<(BuildQuery, tokio::time::Instant)>>,
}

impl ScriptedLookup {
    pub fn new(rounds: Vec<Result<Vec<Build>, String>>) -> Self {
        ScriptedLookup {
            rounds: Mutex::new(rounds.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn query_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<BuildQuery> {
        self.calls.lock().unwrap().iter().map(|(q, _)| q.clone()).collect()
    }

    pub fn query_times(&self) -> Vec<tokio::time::Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

impl BuildLookup for ScriptedLookup {
    type Error = String;

    async fn find_builds(&self, query: &BuildQuery) -> Result<Vec<Build>, String> {
        self.calls
            .lock()
            .unwrap()
            .push((query.clone(), tokio::time::Instant::now()));
        self.rounds.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(vec![Build::new(
                "running",
                query.revision_or_tag.clone(),
                "https://ci.example.com/running",
            )])
        })
    }
}

/// Resolves only the refs it was given; anything else is "not found".
#[derive(Debug, Default)]
pub struct FakeResolver {
    heads: HashMap<String, String>,
}

impl FakeResolver {
    pub fn with(reference: &str, sha: &str) -> Self {
        FakeResolver {
            heads: HashMap::from([(reference.to_string(), sha.to_string())]),
        }
    }
}

impl CommitResolver for FakeResolver {
    type Error = String;

    async fn resolve_commit(&self, repo: &RepoId, reference: &str) -> Result<String, String> {
        self.heads
            .get(reference)
            .cloned()
            .ok_or_else(|| format!("{repo}: no commit for {reference}"))
    }
}

/// Records delivered messages. `fail_next(n)` makes the next `n` deliveries
/// fail without being recorded.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<RenderedMessage>>,
    failures: Mutex<u32>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<RenderedMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_next(&self, n: u32) {
        *self.failures.lock().unwrap() = n;
    }
}

impl MessageTransport for RecordingTransport {
    async fn deliver(&self, message: &RenderedMessage) -> Result<(), TransportError> {
        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(TransportError::Status {
                    status: 500,
                    body: "injected failure".into(),
                });
            }
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// In-memory repository history for changelog tests.
#[derive(Debug, Default)]
pub struct FakeChangelogSource {
    pub branches: Vec<NamedRef>,
    pub tags: Vec<NamedRef>,
    /// `(base, head)` to the commits between them, oldest first.
    pub compares: HashMap<(String, String), Vec<CommitSummary>>,
    /// History returned for any `commits` request.
    pub history: Vec<CommitSummary>,
    pub fail_tags: bool,
    /// `(from, pages, per_page)` of each `commits` request.
    pub history_requests: Mutex<Vec<(String, u32, u32)>>,
    pub repos_seen: Mutex<Vec<RepoId>>,
}

impl ChangelogSource for FakeChangelogSource {
    type Error = String;

    async fn list_tags(&self, repo: &RepoId) -> Result<Vec<NamedRef>, String> {
        self.repos_seen.lock().unwrap().push(repo.clone());
        if self.fail_tags {
            return Err("HTTP 502".into());
        }
        Ok(self.tags.clone())
    }

    async fn list_branches(&self, repo: &RepoId) -> Result<Vec<NamedRef>, String> {
        self.repos_seen.lock().unwrap().push(repo.clone());
        Ok(self.branches.clone())
    }

    async fn compare(
        &self,
        _repo: &RepoId,
        base: &str,
        head: &str,
    ) -> Result<Vec<CommitSummary>, String> {
        Ok(self
            .compares
            .get(&(base.to_string(), head.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn commits(
        &self,
        _repo: &RepoId,
        from: &str,
        pages: u32,
        per_page: u32,
    ) -> Result<Vec<CommitSummary>, String> {
        self.history_requests
            .lock()
            .unwrap()
            .push((from.to_string(), pages, per_page));
        Ok(self.history.clone())
    }
}
