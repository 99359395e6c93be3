//! Webhook endpoint handler.
//!
//! Verifies and parses a GitHub delivery, hands it to the dispatcher and
//! answers right away. Tracking runs detached, so GitHub never waits on CI.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::types::RequestId;
use crate::webhooks::{ParseError, SIGNATURE_HEADER, SignatureError, parse_webhook};

const HEADER_EVENT: &str = "x-github-event";
const HEADER_DELIVERY: &str = "x-github-delivery";
const HEADER_REQUEST_ID: &str = "x-request-id";

/// Body returned for event kinds the monitor does not track.
pub const UNSUPPORTED_EVENT: &str = "unsupported event";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature: {0}")]
    Signature(#[from] SignatureError),

    #[error("invalid payload: {0}")]
    Payload(#[from] ParseError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::Signature(_) => StatusCode::UNAUTHORIZED,
            WebhookError::Payload(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Headers:
///   - `X-GitHub-Event` (required): `pull_request`, `release` or `create`
///   - `X-Hub-Signature-256`: required when a webhook secret is configured
///   - `X-GitHub-Delivery`, `X-Request-Id` (optional): logged for correlation
/// - Body: JSON webhook payload
///
/// # Response
///
/// - 200 `OK`: accepted; tracking continues in the background
/// - 200 `unsupported event`: any other event kind, nothing is tracked
/// - 400 Bad Request: missing event header or malformed payload
/// - 401 Unauthorized: missing or invalid signature
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event_type = header(&headers, HEADER_EVENT).ok_or(WebhookError::MissingHeader(HEADER_EVENT))?;
    let request_id = RequestId::from_header(header(&headers, HEADER_REQUEST_ID));
    let delivery = header(&headers, HEADER_DELIVERY).unwrap_or_default();

    debug!(
        request_id = %request_id,
        delivery,
        event_type,
        "received webhook"
    );

    if let Some(secret) = app_state.webhook_secret() {
        if let Err(e) = secret.verify(&body, header(&headers, SIGNATURE_HEADER)) {
            warn!(request_id = %request_id, delivery, error = %e, "rejected webhook signature");
            return Err(e.into());
        }
    }

    let hook = match parse_webhook(event_type, &body) {
        Ok(Some(hook)) => hook,
        Ok(None) => {
            debug!(request_id = %request_id, event_type, "ignoring unsupported event");
            return Ok((StatusCode::OK, UNSUPPORTED_EVENT));
        }
        Err(e) => {
            warn!(request_id = %request_id, event_type, error = %e, "malformed webhook payload");
            return Err(e.into());
        }
    };

    info!(
        request_id = %request_id,
        delivery,
        event_type,
        repo = %hook.repo_id(),
        "webhook accepted"
    );
    app_state.dispatcher().dispatch(request_id, hook);

    Ok((StatusCode::OK, "OK"))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
