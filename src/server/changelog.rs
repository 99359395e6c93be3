//! Changelog endpoint handler.

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, info};

use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ChangelogParams {
    /// Pages of PROD history. Anything missing or unparsable means one page.
    #[serde(default)]
    pages: Option<String>,
}

impl ChangelogParams {
    fn pages(&self) -> u32 {
        self.pages
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .unwrap_or(1)
    }
}

/// `GET /changelog/{repo}?pages=N`: the Dev / QA / PROD changelog as plain
/// text, or 502 when GitHub could not be read.
pub async fn changelog_handler(
    State(app_state): State<AppState>,
    Path(repo): Path<String>,
    Query(params): Query<ChangelogParams>,
) -> Response {
    let pages = params.pages();
    match app_state.changelog().changelog(repo.clone(), pages).await {
        Ok(text) => {
            info!(repo = %repo, pages, "changelog served");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                text,
            )
                .into_response()
        }
        Err(e) => {
            error!(repo = %repo, pages, error = %e, "changelog failed");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}
