//! Drives one tracked unit from announcement to verdict.

use futures_util::Stream;
use futures_util::stream;
use tracing::{debug, info, warn};

use crate::types::{Build, BuildOutcome, Event};

use super::lookup::{BuildLookup, BuildQuery};
use super::policy::TrackerPolicy;
use super::state::{Observation, PollState, Step, Waiting};

enum Phase {
    Announce,
    Polling,
    Done,
}

struct Tracker<L> {
    event: Event,
    query: BuildQuery,
    lookup: L,
    state: PollState,
    interval: std::time::Duration,
    phase: Phase,
    polls: u32,
}

/// Tracks `event` through CI and yields the events to notify about.
///
/// The stream is lazy and finite: the source-control announcement first, then
/// after polling the CI provider every `policy.poll_interval`, exactly one
/// CI event carrying a terminal outcome. Nothing happens until the stream is
/// polled; the first CI lookup happens one full interval after the
/// announcement has been taken.
pub fn track<L>(event: Event, lookup: L, policy: &TrackerPolicy) -> impl Stream<Item = Event> + Send
where
    L: BuildLookup + Send + Sync,
{
    let tracker = Tracker {
        query: BuildQuery::for_event(&event),
        event,
        lookup,
        state: PollState::new(policy),
        interval: policy.poll_interval,
        phase: Phase::Announce,
        polls: 0,
    };

    stream::unfold(tracker, |mut tracker| async move {
        let next = tracker.next_event().await?;
        Some((next, tracker))
    })
}

impl<L: BuildLookup + Send + Sync> Tracker<L> {
    async fn next_event(&mut self) -> Option<Event> {
        match self.phase {
            Phase::Announce => {
                self.phase = Phase::Polling;
                Some(self.event.announcement())
            }
            Phase::Polling => {
                let verdict = self.poll_until_verdict().await;
                self.phase = Phase::Done;
                Some(verdict)
            }
            Phase::Done => None,
        }
    }

    async fn poll_until_verdict(&mut self) -> Event {
        loop {
            tokio::time::sleep(self.interval).await;
            self.polls += 1;

            let result = self.lookup.find_builds(&self.query).await;
            let step = match &result {
                Ok(builds) => {
                    log_builds(builds);
                    self.state.observe(Observation::Builds(builds))
                }
                Err(e) => {
                    warn!(error = %e, "build lookup failed");
                    self.state.observe(Observation::LookupFailed)
                }
            };

            match step {
                Step::Continue(waiting) => log_waiting(self.polls, waiting),
                Step::Finish(verdict) => {
                    debug_assert!(verdict.outcome.is_terminal());
                    match verdict.outcome {
                        BuildOutcome::SearchFailed | BuildOutcome::WaitTimedOut => warn!(
                            outcome = %verdict.outcome,
                            polls = self.polls,
                            "gave up tracking"
                        ),
                        _ => info!(
                            outcome = %verdict.outcome,
                            polls = self.polls,
                            "tracking finished"
                        ),
                    }
                    return self.event.verdict(verdict.outcome, verdict.build_url);
                }
            }
        }
    }
}

fn log_builds(builds: &[Build]) {
    for build in builds.iter().filter(|b| !b.status.is_green()) {
        debug!(status = %build.status, url = %build.build_url, "build not green");
    }
}

fn log_waiting(polls: u32, waiting: Waiting) {
    match waiting {
        Waiting::NoBuilds { skips } => debug!(polls, skips, "no matching builds yet"),
        Waiting::NotGreen { restarts } => debug!(polls, restarts, "builds still running"),
        Waiting::ConfirmingGreen => debug!(polls, "all builds green, confirming"),
    }
}
