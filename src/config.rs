//! Process configuration, read from environment variables at startup.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::ci::DEFAULT_BASE_URL;
use crate::tracker::{
    DEFAULT_POLL_FOR_BUILDS_TIMES, DEFAULT_POLL_FOR_GREEN_BUILDS_TIMES, DEFAULT_POLL_INTERVAL_SECS,
    GreenWaitReset, TrackerPolicy,
};
use crate::webhooks::WebhookSecret;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ROUTING_CONFIG_PATH: &str = "routing.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub github_token: Option<String>,
    /// Organization whose repositories the changelog endpoint serves.
    pub github_org: String,
    pub webhook_secret: Option<WebhookSecret>,
    pub circle_ci_token: Option<String>,
    pub circle_ci_base_url: String,
    pub tracker: TrackerPolicy,
    pub routing_config_path: PathBuf,
    pub jira_browse_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds the configuration from any variable source. Blank values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let github_org = get("GITHUB_ORG").ok_or(ConfigError::Missing("GITHUB_ORG"))?;

        let tracker = TrackerPolicy {
            poll_interval: Duration::from_secs(parsed(
                &get,
                "POLL_TIME_INTERVAL_SECONDS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
            poll_for_builds_times: parsed(&get, "POLL_FOR_BUILDS_TIMES", DEFAULT_POLL_FOR_BUILDS_TIMES)?,
            poll_for_green_builds_times: parsed(
                &get,
                "POLL_FOR_GREEN_BUILDS_TIMES",
                DEFAULT_POLL_FOR_GREEN_BUILDS_TIMES,
            )?,
            green_wait_reset: parsed(&get, "GREEN_WAIT_RESET", GreenWaitReset::Never)?,
        };

        Ok(Config {
            port: parsed(&get, "PORT", DEFAULT_PORT)?,
            github_token: get("GITHUB_TOKEN"),
            github_org,
            webhook_secret: get("GITHUB_WEBHOOK_SECRET").map(WebhookSecret::new),
            circle_ci_token: get("CIRCLE_CI_TOKEN"),
            circle_ci_base_url: get("CIRCLE_CI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            tracker,
            routing_config_path: get("ROUTING_CONFIG_PATH")
                .unwrap_or_else(|| DEFAULT_ROUTING_CONFIG_PATH.to_string())
                .into(),
            jira_browse_url: get("JIRA_BROWSE_URL"),
        })
    }
}

fn parsed<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
