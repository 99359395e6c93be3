//! HTTP server for the deploy monitor.
//!
//! # Endpoints
//!
//! - `POST /webhook/github` - Accepts GitHub webhook deliveries and starts tracking
//! - `GET /changelog/{repo}?pages=N` - Dev / QA / PROD changelog as plain text
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

pub mod changelog;
pub mod health;
pub mod webhook;

pub use changelog::changelog_handler;
pub use health::health_handler;
pub use webhook::{UNSUPPORTED_EVENT, WebhookError, webhook_handler};

use crate::changelog::ChangelogProvider;
use crate::monitor::Dispatcher;
use crate::webhooks::WebhookSecret;

/// Shared application state, passed to handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    dispatcher: Arc<dyn Dispatcher>,
    changelog: Arc<dyn ChangelogProvider>,

    /// Signatures are only checked when a secret is configured.
    webhook_secret: Option<WebhookSecret>,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<dyn Dispatcher>,
        changelog: Arc<dyn ChangelogProvider>,
        webhook_secret: Option<WebhookSecret>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                dispatcher,
                changelog,
                webhook_secret,
            }),
        }
    }

    pub fn dispatcher(&self) -> &dyn Dispatcher {
        self.inner.dispatcher.as_ref()
    }

    pub fn changelog(&self) -> &dyn ChangelogProvider {
        self.inner.changelog.as_ref()
    }

    pub fn webhook_secret(&self) -> Option<&WebhookSecret> {
        self.inner.webhook_secret.as_ref()
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook/github", post(webhook_handler))
        .route("/changelog/{repo}", get(changelog_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
