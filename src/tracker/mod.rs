//! The outcome tracker: follows one source-control event through CI.
//!
//! [`track`] turns an [`Event`](crate::types::Event) into a short stream of
//! notifications. The decision logic lives in [`PollState`], which is pure;
//! [`track`] only adds the clock and the lookups.

pub mod lookup;
pub mod policy;
pub mod state;
pub mod stream;

pub use lookup::{BuildLookup, BuildQuery, CommitResolver};
pub use policy::{
    DEFAULT_POLL_FOR_BUILDS_TIMES, DEFAULT_POLL_FOR_GREEN_BUILDS_TIMES, DEFAULT_POLL_INTERVAL_SECS,
    GreenWaitReset, TrackerPolicy, UnknownGreenWaitReset,
};
pub use state::{Observation, PollState, Step, Verdict, Waiting};
pub use stream::track;
