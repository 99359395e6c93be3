//! Polling limits for the outcome tracker.
//!
//! A tracked unit polls the CI provider on a fixed interval and gives up after
//! one of two ceilings is exceeded:
//!
//! - **Search ceiling** (`poll_for_builds_times`, default 3): polls that found
//!   no matching build at all.
//! - **Green-wait ceiling** (`poll_for_green_builds_times`, default 20): polls
//!   where at least one matching build was not green yet.
//!
//! With the defaults and a 10 second interval a unit lives for at most a few
//! minutes.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default interval between polls (10 seconds).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Default number of empty polls tolerated before `search_failed`.
pub const DEFAULT_POLL_FOR_BUILDS_TIMES: u32 = 3;

/// Default number of not-green polls tolerated before `wait_failed`.
pub const DEFAULT_POLL_FOR_GREEN_BUILDS_TIMES: u32 = 20;

/// Whether an unconfirmed all-green round resets the green-wait counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GreenWaitReset {
    /// The counter only grows; it is a total budget of not-green rounds.
    #[default]
    Never,
    /// The first all-green round of a streak sets the counter back to zero.
    OnGreenRound,
}

/// Error returned when parsing an unknown [`GreenWaitReset`] name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown green wait reset policy {0:?} (expected \"never\" or \"on_green\")")]
pub struct UnknownGreenWaitReset(pub String);

impl FromStr for GreenWaitReset {
    type Err = UnknownGreenWaitReset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(GreenWaitReset::Never),
            "on_green" | "on_green_round" => Ok(GreenWaitReset::OnGreenRound),
            _ => Err(UnknownGreenWaitReset(s.to_string())),
        }
    }
}

/// Configuration for one tracker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerPolicy {
    /// Interval between polls. The first poll happens one interval after the
    /// source-control announcement.
    pub poll_interval: Duration,

    /// Empty polls tolerated before `search_failed`.
    pub poll_for_builds_times: u32,

    /// Not-green polls tolerated before `wait_failed`.
    pub poll_for_green_builds_times: u32,

    pub green_wait_reset: GreenWaitReset,
}

impl Default for TrackerPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerPolicy {
    pub fn new() -> Self {
        TrackerPolicy {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            poll_for_builds_times: DEFAULT_POLL_FOR_BUILDS_TIMES,
            poll_for_green_builds_times: DEFAULT_POLL_FOR_GREEN_BUILDS_TIMES,
            green_wait_reset: GreenWaitReset::Never,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_green_wait_reset(mut self, reset: GreenWaitReset) -> Self {
        self.green_wait_reset = reset;
        self
    }
}
