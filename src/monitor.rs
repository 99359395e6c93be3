//! Runs tracked units: one per accepted webhook.
//!
//! A unit normalizes the webhook, resolves the head commit of a new branch,
//! tracks the event through CI and delivers whatever the router renders for
//! each event the tracker yields. Units are detached from the HTTP request
//! that started them and share nothing mutable.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, Span, error, info, info_span, warn};

use crate::notify::MessageTransport;
use crate::routing::RoutingTable;
use crate::tracker::{BuildLookup, CommitResolver, TrackerPolicy, track};
use crate::types::{Event, RequestId};
use crate::webhooks::{GitHubEvent, Normalized, normalize};

/// Hands an accepted webhook to a detached tracked unit. Object safe so the
/// HTTP layer can hold it behind `Arc<dyn Dispatcher>`.
pub trait Dispatcher: Send + Sync {
    /// Returns immediately; the unit runs in the background.
    fn dispatch(&self, request_id: RequestId, hook: GitHubEvent);
}

pub struct Monitor<L, R, T> {
    lookup: Arc<L>,
    resolver: Arc<R>,
    transport: Arc<T>,
    routes: Arc<RoutingTable>,
    policy: TrackerPolicy,
    tasks: TaskTracker,
}

impl<L, R, T> Clone for Monitor<L, R, T> {
    fn clone(&self) -> Self {
        Self {
            lookup: Arc::clone(&self.lookup),
            resolver: Arc::clone(&self.resolver),
            transport: Arc::clone(&self.transport),
            routes: Arc::clone(&self.routes),
            policy: self.policy.clone(),
            tasks: self.tasks.clone(),
        }
    }
}

impl<L, R, T> Monitor<L, R, T>
where
    L: BuildLookup + Send + Sync,
    R: CommitResolver + Send + Sync,
    T: MessageTransport + Send + Sync,
{
    pub fn new(
        lookup: Arc<L>,
        resolver: Arc<R>,
        transport: Arc<T>,
        routes: Arc<RoutingTable>,
        policy: TrackerPolicy,
    ) -> Self {
        Self {
            lookup,
            resolver,
            transport,
            routes,
            policy,
            tasks: TaskTracker::new(),
        }
    }

    /// The detached units spawned by [`Dispatcher::dispatch`].
    pub fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Runs one tracked unit to completion inside a `track` span.
    pub async fn run(&self, request_id: RequestId, hook: GitHubEvent) {
        let repo = hook.repo_id();
        let span = info_span!(
            "track",
            request_id = %request_id,
            org = %repo.org,
            repo = %repo.name,
            kind = hook.event_type(),
            branch = tracing::field::Empty,
            revision = tracing::field::Empty,
        );
        self.run_unit(hook).instrument(span).await
    }

    async fn run_unit(&self, hook: GitHubEvent) {
        let event = match normalize(&hook) {
            Ok(Normalized::Track(event)) => event,
            Ok(Normalized::ResolveRevision(event)) => match self.resolve(event).await {
                Some(event) => event,
                None => return,
            },
            Ok(Normalized::Skip(reason)) => {
                info!(reason = ?reason, "event not tracked");
                return;
            }
            Err(e) => {
                warn!(error = %e, "event not tracked");
                return;
            }
        };

        if !event.has_revision() {
            warn!(
                kind = %event.kind,
                branch = %event.branch_ref,
                "event has no revision or tag; not tracked"
            );
            return;
        }

        let span = Span::current();
        span.record("branch", event.branch_ref.as_str());
        span.record("revision", event.revision_or_tag.as_str());
        info!(kind = %event.kind, "tracking started");

        let events = track(event, Arc::clone(&self.lookup), &self.policy);
        futures_util::pin_mut!(events);
        while let Some(event) = events.next().await {
            self.notify(&event).await;
        }
    }

    async fn resolve(&self, mut event: Event) -> Option<Event> {
        match self
            .resolver
            .resolve_commit(&event.repo, &event.branch_ref)
            .await
        {
            Ok(sha) => {
                event.revision_or_tag = sha;
                Some(event)
            }
            Err(e) => {
                error!(branch = %event.branch_ref, error = %e, "could not resolve branch head");
                None
            }
        }
    }

    async fn notify(&self, event: &Event) {
        let Some(message) = self.routes.route(event) else {
            return;
        };
        match self.transport.deliver(&message).await {
            Ok(()) => info!(
                source = %event.source,
                outcome = ?event.outcome,
                transport = %message.transport,
                "message delivered"
            ),
            Err(e) => error!(
                source = %event.source,
                outcome = ?event.outcome,
                transport = %message.transport,
                error = %e,
                "message delivery failed"
            ),
        }
    }
}

impl<L, R, T> Dispatcher for Monitor<L, R, T>
where
    L: BuildLookup + Send + Sync + 'static,
    R: CommitResolver + Send + Sync + 'static,
    T: MessageTransport + Send + Sync + 'static,
{
    fn dispatch(&self, request_id: RequestId, hook: GitHubEvent) {
        let unit = self.clone();
        self.tasks.spawn(async move { unit.run(request_id, hook).await });
    }
}
