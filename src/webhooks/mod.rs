//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Parsing of `pull_request`, `release` and `create` payloads
//! - Normalization into the internal [`Event`](crate::types::Event) record

pub mod events;
pub mod normalize;
pub mod parser;
pub mod signature;

pub use events::{CreateEvent, GitHubEvent, PullRequestEvent, RefType, ReleaseEvent};
pub use normalize::{NormalizeError, Normalized, SkipReason, normalize};
pub use parser::{ParseError, SUPPORTED_EVENTS, is_supported, parse_webhook};
pub use signature::{SIGNATURE_HEADER, SignatureError, WebhookSecret};
