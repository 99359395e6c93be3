//! The pure poll state machine behind the outcome tracker.
//!
//! [`PollState::observe`] takes the result of one build lookup and decides
//! whether to keep polling or which terminal outcome to report. It performs no
//! I/O and keeps no clock, so every transition is testable without a runtime.
//!
//! # Order of checks
//!
//! For each observation, in order:
//!
//! 1. lookup failed → `fetch_failed`
//! 2. more empty rounds than the search ceiling → `search_failed`
//! 3. no builds → count an empty round, keep polling
//! 4. any build failed or canceled → `build_failed`
//! 5. more not-green rounds than the green-wait ceiling → `wait_failed`
//! 6. some build not green → count a not-green round, drop the streak
//! 7. all green, no streak yet → start the streak, keep polling
//! 8. all green twice in a row → `success`
//!
//! The ceilings are checked *before* the counters are bumped, so the verdict
//! for an exceeded ceiling arrives on the poll after the one that exceeded it,
//! regardless of what that poll returned.

use crate::types::{Build, BuildOutcome};

use super::policy::{GreenWaitReset, TrackerPolicy};

/// The result of one build lookup, as seen by the state machine.
#[derive(Debug, Clone, Copy)]
pub enum Observation<'a> {
    /// The CI provider could not be queried.
    LookupFailed,
    /// Builds whose revision or tag matched the tracked value.
    Builds(&'a [Build]),
}

/// Why the tracker is still polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waiting {
    /// No matching build yet; `skips` empty rounds so far.
    NoBuilds { skips: u32 },
    /// At least one build is still running; `restarts` not-green rounds so far.
    NotGreen { restarts: u32 },
    /// Everything was green once; waiting for a confirming round.
    ConfirmingGreen,
}

/// A terminal decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub outcome: BuildOutcome,
    /// The build that decided a `build_failed` verdict.
    pub build_url: Option<String>,
}

impl Verdict {
    fn of(outcome: BuildOutcome) -> Self {
        Verdict {
            outcome,
            build_url: None,
        }
    }
}

/// What the tracker should do after an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Continue(Waiting),
    Finish(Verdict),
}

/// Counters carried across polls of one tracked unit.
#[derive(Debug, Clone)]
pub struct PollState {
    max_skips: u32,
    max_not_green_restarts: u32,
    green_wait_reset: GreenWaitReset,

    skips: u32,
    all_green_streak: bool,
    not_green_restarts: u32,
    finished: Option<Verdict>,
}

impl PollState {
    pub fn new(policy: &TrackerPolicy) -> Self {
        PollState {
            max_skips: policy.poll_for_builds_times,
            max_not_green_restarts: policy.poll_for_green_builds_times,
            green_wait_reset: policy.green_wait_reset,
            skips: 0,
            all_green_streak: false,
            not_green_restarts: 0,
            finished: None,
        }
    }

    pub fn skips(&self) -> u32 {
        self.skips
    }

    pub fn not_green_restarts(&self) -> u32 {
        self.not_green_restarts
    }

    pub fn all_green_streak(&self) -> bool {
        self.all_green_streak
    }

    /// The verdict, once one has been reached.
    pub fn verdict(&self) -> Option<&Verdict> {
        self.finished.as_ref()
    }

    /// Applies one lookup result.
    ///
    /// Once a verdict has been reached the state is frozen: further
    /// observations return the same verdict without touching the counters.
    pub fn observe(&mut self, observation: Observation<'_>) -> Step {
        if let Some(verdict) = &self.finished {
            return Step::Finish(verdict.clone());
        }

        match self.advance(observation) {
            Step::Finish(verdict) => {
                self.finished = Some(verdict.clone());
                Step::Finish(verdict)
            }
            step => step,
        }
    }

    fn advance(&mut self, observation: Observation<'_>) -> Step {
        let builds = match observation {
            Observation::LookupFailed => return Step::Finish(Verdict::of(BuildOutcome::FetchFailed)),
            Observation::Builds(builds) => builds,
        };

        if self.skips > self.max_skips {
            return Step::Finish(Verdict::of(BuildOutcome::SearchFailed));
        }

        if builds.is_empty() {
            self.skips += 1;
            return Step::Continue(Waiting::NoBuilds { skips: self.skips });
        }

        if let Some(failed) = builds.iter().find(|b| b.status.is_failure()) {
            return Step::Finish(Verdict {
                outcome: BuildOutcome::BuildFailed,
                build_url: Some(failed.build_url.clone()),
            });
        }

        let all_green = builds.iter().all(|b| b.status.is_green());

        if self.not_green_restarts > self.max_not_green_restarts {
            return Step::Finish(Verdict::of(BuildOutcome::WaitTimedOut));
        }

        if !all_green {
            self.not_green_restarts += 1;
            self.all_green_streak = false;
            return Step::Continue(Waiting::NotGreen {
                restarts: self.not_green_restarts,
            });
        }

        if !self.all_green_streak {
            self.all_green_streak = true;
            if self.green_wait_reset == GreenWaitReset::OnGreenRound {
                self.not_green_restarts = 0;
            }
            return Step::Continue(Waiting::ConfirmingGreen);
        }

        Step::Finish(Verdict::of(BuildOutcome::Success))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::arb_build_status;
    use crate::types::BuildStatus;
    use proptest::prelude::*;

    fn build(status: &str) -> Build {
        Build::new(status, "abc123", format!("https://ci.example.com/{status}"))
    }

    fn policy() -> TrackerPolicy {
        TrackerPolicy::new()
    }

    fn finish(outcome: BuildOutcome) -> Step {
        Step::Finish(Verdict::of(outcome))
    }

    #[test]
    fn lookup_failure_is_fetch_failed() {
        let mut state = PollState::new(&policy());
        assert_eq!(
            state.observe(Observation::LookupFailed),
            finish(BuildOutcome::FetchFailed)
        );
    }

    #[test]
    fn failed_build_decides_first_round() {
        let mut state = PollState::new(&policy());
        let builds = [build("failed")];
        assert_eq!(
            state.observe(Observation::Builds(&builds)),
            Step::Finish(Verdict {
                outcome: BuildOutcome::BuildFailed,
                build_url: Some("https://ci.example.com/failed".into()),
            })
        );
    }

    #[test]
    fn failed_build_wins_over_green_streak() {
        let mut state = PollState::new(&policy());
        let green = [build("success")];
        assert_eq!(
            state.observe(Observation::Builds(&green)),
            Step::Continue(Waiting::ConfirmingGreen)
        );
        assert!(state.all_green_streak());

        let mixed = [build("success"), build("canceled")];
        assert!(matches!(
            state.observe(Observation::Builds(&mixed)),
            Step::Finish(Verdict {
                outcome: BuildOutcome::BuildFailed,
                ..
            })
        ));
    }

    #[test]
    fn two_green_rounds_are_success() {
        let mut state = PollState::new(&policy());
        let green = [build("success"), build("fixed")];
        assert_eq!(
            state.observe(Observation::Builds(&green)),
            Step::Continue(Waiting::ConfirmingGreen)
        );
        assert_eq!(
            state.observe(Observation::Builds(&green)),
            finish(BuildOutcome::Success)
        );
    }

    #[test]
    fn not_green_round_breaks_the_streak() {
        let mut state = PollState::new(&policy());
        let green = [build("success")];
        let running = [build("success"), build("running")];

        assert_eq!(
            state.observe(Observation::Builds(&green)),
            Step::Continue(Waiting::ConfirmingGreen)
        );
        assert_eq!(
            state.observe(Observation::Builds(&running)),
            Step::Continue(Waiting::NotGreen { restarts: 1 })
        );
        assert!(!state.all_green_streak());
        // A single green round after the break must not be enough.
        assert_eq!(
            state.observe(Observation::Builds(&green)),
            Step::Continue(Waiting::ConfirmingGreen)
        );
        assert_eq!(
            state.observe(Observation::Builds(&green)),
            finish(BuildOutcome::Success)
        );
    }

    #[test]
    fn four_empty_rounds_then_search_failed() {
        let mut state = PollState::new(&policy());
        for expected in 1..=4 {
            assert_eq!(
                state.observe(Observation::Builds(&[])),
                Step::Continue(Waiting::NoBuilds { skips: expected })
            );
        }
        assert_eq!(
            state.observe(Observation::Builds(&[])),
            finish(BuildOutcome::SearchFailed)
        );
    }

    #[test]
    fn exceeded_search_ceiling_wins_over_late_builds() {
        let mut state = PollState::new(&policy());
        for _ in 0..4 {
            state.observe(Observation::Builds(&[]));
        }
        let green = [build("success")];
        assert_eq!(
            state.observe(Observation::Builds(&green)),
            finish(BuildOutcome::SearchFailed)
        );
    }

    #[test]
    fn skips_are_not_reset_by_found_builds() {
        let mut state = PollState::new(&policy());
        let running = [build("running")];
        state.observe(Observation::Builds(&[]));
        state.observe(Observation::Builds(&running));
        state.observe(Observation::Builds(&[]));
        assert_eq!(state.skips(), 2);
    }

    #[test]
    fn twenty_one_not_green_rounds_then_wait_failed() {
        let mut state = PollState::new(&policy());
        let running = [build("running")];
        for expected in 1..=21 {
            assert_eq!(
                state.observe(Observation::Builds(&running)),
                Step::Continue(Waiting::NotGreen { restarts: expected })
            );
        }
        assert_eq!(
            state.observe(Observation::Builds(&running)),
            finish(BuildOutcome::WaitTimedOut)
        );
    }

    #[test]
    fn exceeded_green_wait_wins_over_green_round() {
        let mut state = PollState::new(&policy());
        let running = [build("queued")];
        for _ in 0..21 {
            state.observe(Observation::Builds(&running));
        }
        let green = [build("success")];
        assert_eq!(
            state.observe(Observation::Builds(&green)),
            finish(BuildOutcome::WaitTimedOut)
        );
    }

    #[test]
    fn green_round_keeps_restarts_by_default() {
        let mut state = PollState::new(&policy());
        let running = [build("running")];
        let green = [build("success")];
        for _ in 0..5 {
            state.observe(Observation::Builds(&running));
        }
        state.observe(Observation::Builds(&green));
        assert_eq!(state.not_green_restarts(), 5);
    }

    #[test]
    fn green_round_resets_restarts_when_configured() {
        let policy = policy().with_green_wait_reset(GreenWaitReset::OnGreenRound);
        let mut state = PollState::new(&policy);
        let running = [build("running")];
        let green = [build("success")];
        for _ in 0..5 {
            state.observe(Observation::Builds(&running));
        }
        state.observe(Observation::Builds(&green));
        assert_eq!(state.not_green_restarts(), 0);

        // The streak itself is still required before success.
        assert_eq!(
            state.observe(Observation::Builds(&running)),
            Step::Continue(Waiting::NotGreen { restarts: 1 })
        );
    }

    #[test]
    fn flapping_builds_time_out_only_without_reset() {
        let running = [build("running")];
        let green = [build("success")];

        let mut never = PollState::new(&policy());
        let mut on_green =
            PollState::new(&policy().with_green_wait_reset(GreenWaitReset::OnGreenRound));

        let mut never_verdict = None;
        for round in 0..100 {
            let builds: &[Build] = if round % 2 == 0 { &running } else { &green };
            if let Step::Finish(v) = never.observe(Observation::Builds(builds)) {
                never_verdict = Some(v.outcome);
                break;
            }
            assert!(matches!(
                on_green.observe(Observation::Builds(builds)),
                Step::Continue(_)
            ));
        }
        assert_eq!(never_verdict, Some(BuildOutcome::WaitTimedOut));
    }

    #[test]
    fn verdict_is_sticky() {
        let mut state = PollState::new(&policy());
        state.observe(Observation::LookupFailed);
        let green = [build("success")];
        assert_eq!(
            state.observe(Observation::Builds(&green)),
            finish(BuildOutcome::FetchFailed)
        );
        assert_eq!(
            state.verdict().map(|v| v.outcome),
            Some(BuildOutcome::FetchFailed)
        );
    }

    fn arb_round() -> impl Strategy<Value = Option<Vec<BuildStatus>>> {
        prop_oneof![
            1 => Just(None),
            12 => prop::collection::vec(arb_build_status(), 0..4).prop_map(Some),
        ]
    }

    proptest! {
        #[test]
        fn default_policy_always_terminates_within_bound(
            rounds in prop::collection::vec(arb_round(), 0..60)
        ) {
            let policy = policy();
            let bound =
                (policy.poll_for_builds_times + 2 * policy.poll_for_green_builds_times + 5) as usize;
            let mut state = PollState::new(&policy);
            let still_running = Some(vec![BuildStatus::Running]);

            let mut finished_at = None;
            for (i, round) in rounds
                .iter()
                .chain(std::iter::repeat(&still_running))
                .take(bound)
                .enumerate()
            {
                let builds: Vec<Build> = round
                    .iter()
                    .flatten()
                    .map(|s| Build::new(s.clone(), "abc", "https://ci/x"))
                    .collect();
                let observation = match round {
                    None => Observation::LookupFailed,
                    Some(_) => Observation::Builds(&builds),
                };
                if let Step::Finish(_) = state.observe(observation) {
                    finished_at = Some(i);
                    break;
                }
            }
            prop_assert!(finished_at.is_some());
        }

        #[test]
        fn success_needs_two_consecutive_green_rounds(
            rounds in prop::collection::vec(arb_round(), 1..40)
        ) {
            let mut state = PollState::new(&policy());
            let mut previous_all_green = false;
            for round in &rounds {
                let builds: Vec<Build> = round
                    .iter()
                    .flatten()
                    .map(|s| Build::new(s.clone(), "abc", "https://ci/x"))
                    .collect();
                let all_green = round.is_some()
                    && !builds.is_empty()
                    && builds.iter().all(|b| b.status.is_green());
                let observation = match round {
                    None => Observation::LookupFailed,
                    Some(_) => Observation::Builds(&builds),
                };
                match state.observe(observation) {
                    Step::Finish(v) => {
                        if v.outcome == BuildOutcome::Success {
                            prop_assert!(all_green && previous_all_green);
                        }
                        break;
                    }
                    Step::Continue(_) => {}
                }
                // Empty rounds leave the streak alone.
                if !builds.is_empty() {
                    previous_all_green = all_green;
                }
            }
        }
    }
}
