use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deploy_monitor::changelog::{Changelog, Links};
use deploy_monitor::ci::CircleCiClient;
use deploy_monitor::config::Config;
use deploy_monitor::github::OctocrabClient;
use deploy_monitor::monitor::Monitor;
use deploy_monitor::notify::SlackTransports;
use deploy_monitor::routing;
use deploy_monitor::server::{AppState, build_router};

#[tokio::main]
async fn main() -> ExitCode {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deploy_monitor=info,tower_http=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    let routes = Arc::new(
        routing::load(&config.routing_config_path).context("failed to load routing configuration")?,
    );
    let transports = Arc::new(
        SlackTransports::from_urls(routes.transports()).context("failed to build Slack client")?,
    );
    if transports.is_empty() {
        warn!(
            path = %config.routing_config_path.display(),
            "routing configuration names no Slack webhooks; nothing will be delivered"
        );
    } else {
        info!(
            path = %config.routing_config_path.display(),
            transports = transports.len(),
            "routing configuration loaded"
        );
    }
    let circle_ci = Arc::new(
        CircleCiClient::new(
            config.circle_ci_base_url.clone(),
            config.circle_ci_token.clone(),
        )
        .context("failed to build CircleCI client")?,
    );
    let github = OctocrabClient::from_token(config.github_token.clone())
        .context("failed to build GitHub client")?;

    let monitor = Monitor::new(
        circle_ci,
        Arc::new(github.clone()),
        transports,
        routes,
        config.tracker.clone(),
    );
    let changelog = Changelog::new(
        github,
        config.github_org.clone(),
        Links {
            jira_browse_url: config.jira_browse_url.clone(),
        },
    );

    let app_state = AppState::new(
        Arc::new(monitor.clone()),
        Arc::new(changelog),
        config.webhook_secret.clone(),
    );
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        %addr,
        signatures = config.webhook_secret.is_some(),
        poll_interval_secs = config.tracker.poll_interval.as_secs(),
        green_wait_reset = ?config.tracker.green_wait_reset,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    monitor.tasks().close();
    info!(
        abandoned = monitor.tasks().len(),
        "server stopped; in-flight tracked units are abandoned"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
