//! Delivery of rendered messages.

mod slack;

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::routing::RenderedMessage;

pub use slack::{SLACK_TIMEOUT, SlackClient, SlackTransports};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no transport named {0:?}")]
    UnknownTransport(String),
}

/// Sends a rendered message to its destination. Delivery is attempted once;
/// callers log failures and move on.
pub trait MessageTransport {
    fn deliver(
        &self,
        message: &RenderedMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T: MessageTransport + Send + Sync> MessageTransport for Arc<T> {
    fn deliver(
        &self,
        message: &RenderedMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).deliver(message)
    }
}
