//! Deploy Monitor - follows merges, releases and new branches through CI and
//! reports the outcome to Slack.
//!
//! A GitHub webhook is normalized into an [`Event`](types::Event), announced,
//! then tracked by polling CircleCI until a single terminal outcome is
//! reached. Each event is routed through an ordered table of branch and tag
//! patterns to a message template. A changelog endpoint summarizes what is in
//! development, in QA and in production.

pub mod changelog;
pub mod ci;
pub mod config;
pub mod github;
pub mod monitor;
pub mod notify;
pub mod routing;
pub mod server;
pub mod tracker;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;
