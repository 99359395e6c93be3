//! Core domain types shared by every stage of a tracked unit.

pub mod build;
pub mod event;
pub mod ids;

pub use build::{Build, BuildStatus};
pub use event::{BuildOutcome, Event, EventKind, PrInfo, Source};
pub use ids::{PrNumber, RepoId, RequestId};
