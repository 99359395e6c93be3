//! The compiled routing table and the router over it.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::types::{BuildOutcome, Event, Source};

use super::config::{RouteEntry, RoutingConfigError, RoutingFile, TemplateEntry};
use super::template::{RenderError, Templates};

/// A message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub text: String,
    /// Channel override, if the template configured one.
    pub room: Option<String>,
    /// Name of the transport (a `slacks` entry) to deliver through.
    pub transport: String,
}

/// Why an event produced no message.
#[derive(Debug, Error)]
pub enum RouteMiss {
    #[error("no branch or tag match")]
    NoPatternMatch,

    #[error("no action configured under {pattern:?}")]
    NoAction { pattern: String },

    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Debug)]
struct Route {
    template: String,
    transport: String,
    room: Option<String>,
}

#[derive(Debug)]
struct PatternEntry {
    pattern: Regex,
    source_control: HashMap<String, Route>,
    ci: HashMap<String, HashMap<BuildOutcome, Route>>,
}

impl PatternEntry {
    fn lookup(&self, event: &Event) -> Option<&Route> {
        let key = event.kind.key();
        match event.source {
            Source::SourceControl => self.source_control.get(key),
            Source::Ci => self.ci.get(key)?.get(&event.outcome?),
        }
    }
}

/// Ordered branch and tag patterns, each with its templates. Immutable once
/// compiled.
#[derive(Debug)]
pub struct RoutingTable {
    branches: Vec<PatternEntry>,
    tags: Vec<PatternEntry>,
    templates: Templates,
    transports: BTreeMap<String, String>,
}

impl RoutingTable {
    /// Compiles every pattern and template, and checks that every template
    /// names a declared slack and a known outcome.
    pub fn compile(file: RoutingFile) -> Result<Self, RoutingConfigError> {
        let transports: BTreeMap<String, String> = file
            .slacks
            .into_iter()
            .map(|(name, slack)| (name, slack.url))
            .collect();

        let mut compiler = Compiler {
            templates: Templates::new(),
            transports: &transports,
        };

        let branches = file
            .branches
            .iter()
            .enumerate()
            .map(|(i, entry)| compiler.entry(&format!("branches[{i}]"), entry))
            .collect::<Result<Vec<_>, _>>()?;
        let tags = file
            .tags
            .iter()
            .enumerate()
            .map(|(i, entry)| compiler.entry(&format!("tags[{i}]"), entry))
            .collect::<Result<Vec<_>, _>>()?;

        let templates = compiler.templates;
        Ok(RoutingTable {
            branches,
            tags,
            templates,
            transports,
        })
    }

    /// Declared transports, name to webhook URL.
    pub fn transports(&self) -> &BTreeMap<String, String> {
        &self.transports
    }

    /// Picks and renders the message for `event`.
    ///
    /// Branch patterns are tried against the branch in configured order, then
    /// tag patterns against the revision or tag. The first matching entry
    /// decides; later entries are never consulted even if the first one has
    /// nothing configured for this event.
    pub fn resolve(&self, event: &Event) -> Result<RenderedMessage, RouteMiss> {
        let entry = self
            .branches
            .iter()
            .find(|e| e.pattern.is_match(&event.branch_ref))
            .or_else(|| {
                self.tags
                    .iter()
                    .find(|e| e.pattern.is_match(&event.revision_or_tag))
            })
            .ok_or(RouteMiss::NoPatternMatch)?;

        let route = entry.lookup(event).ok_or_else(|| RouteMiss::NoAction {
            pattern: entry.pattern.as_str().to_string(),
        })?;

        let text = self.templates.render(&route.template, event)?;
        Ok(RenderedMessage {
            text,
            room: route.room.clone(),
            transport: route.transport.clone(),
        })
    }

    /// Like [`resolve`](Self::resolve), but logs misses and returns `None`.
    pub fn route(&self, event: &Event) -> Option<RenderedMessage> {
        match self.resolve(event) {
            Ok(message) => Some(message),
            Err(RouteMiss::Render(e)) => {
                error!(error = %e, source = %event.source, "failed to render message");
                None
            }
            Err(miss @ RouteMiss::NoPatternMatch) => {
                warn!(
                    source = %event.source,
                    branch = %event.branch_ref,
                    revision = %event.revision_or_tag,
                    "{miss}"
                );
                None
            }
            Err(miss) => {
                info!(
                    source = %event.source,
                    outcome = ?event.outcome.map(|o| o.key()),
                    "{miss}"
                );
                None
            }
        }
    }
}

struct Compiler<'a> {
    templates: Templates,
    transports: &'a BTreeMap<String, String>,
}

impl Compiler<'_> {
    fn entry(&mut self, location: &str, entry: &RouteEntry) -> Result<PatternEntry, RoutingConfigError> {
        let pattern = Regex::new(&entry.pattern).map_err(|e| RoutingConfigError::Pattern {
            pattern: entry.pattern.clone(),
            source: Box::new(e),
        })?;

        let mut source_control = HashMap::new();
        for (event, template) in &entry.github {
            let route = self.route(&format!("{location}.github.{event}"), template)?;
            source_control.insert(event.clone(), route);
        }

        let mut ci = HashMap::new();
        for (event, outcomes) in &entry.circle_ci {
            let mut by_outcome = HashMap::new();
            for (key, template) in outcomes {
                let location = format!("{location}.circle_ci.{event}.{key}");
                let outcome =
                    BuildOutcome::from_key(key).ok_or_else(|| RoutingConfigError::UnknownOutcome {
                        location: location.clone(),
                        key: key.clone(),
                    })?;
                by_outcome.insert(outcome, self.route(&location, template)?);
            }
            ci.insert(event.clone(), by_outcome);
        }

        Ok(PatternEntry {
            pattern,
            source_control,
            ci,
        })
    }

    fn route(&mut self, location: &str, template: &TemplateEntry) -> Result<Route, RoutingConfigError> {
        if !self.transports.contains_key(&template.slack) {
            return Err(RoutingConfigError::UnknownSlack {
                location: location.to_string(),
                slack: template.slack.clone(),
            });
        }
        self.templates.register(location, &template.message)?;
        Ok(Route {
            template: location.to_string(),
            transport: template.slack.clone(),
            room: template.room.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, PrNumber, RepoId};
    use proptest::prelude::*;

    fn table(json: &str) -> RoutingTable {
        RoutingTable::compile(RoutingFile::from_json(json).unwrap()).unwrap()
    }

    fn compile_err(json: &str) -> RoutingConfigError {
        RoutingTable::compile(RoutingFile::from_json(json).unwrap()).unwrap_err()
    }

    fn merged_on(branch: &str) -> Event {
        Event::new(
            EventKind::PullRequestMerged,
            RepoId::new("acme", "widgets"),
            branch,
            "deadbeef",
        )
        .with_pr("Fix bug", PrNumber(42))
    }

    const ORDERED: &str = r##"{
        "slacks": { "eng": { "url": "https://hooks.example.com/eng" },
                    "rel": { "url": "https://hooks.example.com/rel" } },
        "branches": [
            { "pattern": "^master$",
              "github": { "pull_request_merged": { "slack": "eng", "message": "master: {{pr_title}}" } } },
            { "pattern": "^release-.*$",
              "github": { "pull_request_merged": { "slack": "rel", "room": "#release", "message": "release: {{pr_title}}" } } },
            { "pattern": ".*",
              "github": { "pull_request_merged": { "slack": "eng", "message": "catch-all" } } }
        ]
    }"##;

    #[test]
    fn first_matching_pattern_wins_in_order() {
        let table = table(ORDERED);

        let message = table.resolve(&merged_on("release-42").announcement()).unwrap();
        assert_eq!(message.text, "release: Fix bug");
        assert_eq!(message.transport, "rel");
        assert_eq!(message.room.as_deref(), Some("#release"));

        let message = table.resolve(&merged_on("master").announcement()).unwrap();
        assert_eq!(message.text, "master: Fix bug");

        let message = table.resolve(&merged_on("feature").announcement()).unwrap();
        assert_eq!(message.text, "catch-all");
    }

    #[test]
    fn ci_round_trip_substitutes_every_field() {
        let table = table(
            r##"{
                "slacks": { "eng": { "url": "https://hooks.example.com/eng" } },
                "branches": [{
                    "pattern": "^master$",
                    "circle_ci": { "pull_request_merged": { "success": {
                        "slack": "eng",
                        "message": "{{org}}/{{repo}}: {{pr_title}} (#{{pr_number}}) is {{status}}"
                    } } }
                }]
            }"##,
        );

        let event = merged_on("master").verdict(BuildOutcome::Success, None);
        let message = table.resolve(&event).unwrap();
        assert_eq!(message.text, "acme/widgets: Fix bug (#42) is success");
        assert!(!message.text.contains("{{"));
    }

    #[test]
    fn tags_are_tried_when_no_branch_matches() {
        let table = table(
            r##"{
                "slacks": { "eng": { "url": "https://hooks.example.com/eng" } },
                "branches": [{ "pattern": "^master$" }],
                "tags": [{
                    "pattern": "^release-\\d+W\\d+-\\d+\\.\\d+$",
                    "github": { "release_published": { "slack": "eng", "message": "released {{revision}}" } }
                }]
            }"##,
        );

        let release = Event::new(
            EventKind::Release,
            RepoId::new("acme", "widgets"),
            "release-2024W03-1",
            "release-2024W03-1.0",
        );
        let message = table.resolve(&release.announcement()).unwrap();
        assert_eq!(message.text, "released release-2024W03-1.0");
    }

    #[test]
    fn matched_entry_without_action_is_a_miss() {
        let table = table(
            r##"{
                "slacks": { "eng": { "url": "https://hooks.example.com/eng" } },
                "branches": [
                    { "pattern": "^master$",
                      "circle_ci": { "pull_request_merged": { "success": { "slack": "eng", "message": "ok" } } } },
                    { "pattern": ".*",
                      "circle_ci": { "pull_request_merged": { "fetch_failed": { "slack": "eng", "message": "later entry" } } } }
                ]
            }"##,
        );

        let event = merged_on("master").verdict(BuildOutcome::FetchFailed, None);
        assert!(matches!(
            table.resolve(&event),
            Err(RouteMiss::NoAction { pattern }) if pattern == "^master$"
        ));
        assert_eq!(table.route(&event), None);
    }

    #[test]
    fn no_pattern_match_is_a_miss() {
        let table = table(ORDERED.replace(r#""pattern": ".*""#, r#""pattern": "^x$""#).as_str());
        assert!(matches!(
            table.resolve(&merged_on("feature").announcement()),
            Err(RouteMiss::NoPatternMatch)
        ));
        assert_eq!(table.route(&merged_on("feature").announcement()), None);
    }

    #[test]
    fn render_failure_is_a_miss() {
        let table = table(
            r##"{
                "slacks": { "eng": { "url": "https://hooks.example.com/eng" } },
                "branches": [{
                    "pattern": ".*",
                    "github": { "branch_created": { "slack": "eng", "message": "{{pr_title}}" } }
                }]
            }"##,
        );
        let created = Event::new(
            EventKind::BranchCreated,
            RepoId::new("acme", "widgets"),
            "feature",
            "deadbeef",
        );
        assert!(matches!(
            table.resolve(&created.announcement()),
            Err(RouteMiss::Render(_))
        ));
        assert_eq!(table.route(&created.announcement()), None);
    }

    #[test]
    fn wait_timed_out_alias_is_accepted() {
        let table = table(
            r##"{
                "slacks": { "eng": { "url": "https://hooks.example.com/eng" } },
                "branches": [{
                    "pattern": ".*",
                    "circle_ci": { "pull_request_merged": { "wait_timed_out": { "slack": "eng", "message": "slow" } } }
                }]
            }"##,
        );
        let event = merged_on("master").verdict(BuildOutcome::WaitTimedOut, None);
        assert_eq!(table.resolve(&event).unwrap().text, "slow");
    }

    #[test]
    fn invalid_pattern_fails_compile() {
        let err = compile_err(r#"{ "branches": [{ "pattern": "(" }] }"#);
        assert!(matches!(err, RoutingConfigError::Pattern { .. }));
    }

    #[test]
    fn unknown_outcome_fails_compile() {
        let err = compile_err(
            r#"{
                "slacks": { "eng": { "url": "u" } },
                "branches": [{ "pattern": ".*",
                    "circle_ci": { "pull_request_merged": { "exploded": { "slack": "eng", "message": "m" } } } }]
            }"#,
        );
        assert!(matches!(err, RoutingConfigError::UnknownOutcome { key, .. } if key == "exploded"));
    }

    #[test]
    fn undeclared_slack_fails_compile() {
        let err = compile_err(
            r#"{
                "branches": [{ "pattern": ".*",
                    "github": { "pull_request_merged": { "slack": "nope", "message": "m" } } }]
            }"#,
        );
        assert!(matches!(err, RoutingConfigError::UnknownSlack { slack, .. } if slack == "nope"));
    }

    #[test]
    fn template_syntax_error_fails_compile() {
        let err = compile_err(
            r#"{
                "slacks": { "eng": { "url": "u" } },
                "tags": [{ "pattern": ".*",
                    "github": { "release_published": { "slack": "eng", "message": "{{#if}}{{/each}}" } } }]
            }"#,
        );
        assert!(matches!(err, RoutingConfigError::Template { location, .. } if location == "tags[0].github.release_published"));
    }

    proptest! {
        /// With literal patterns, the entry chosen is always the first one
        /// equal to the branch, however the entries are arranged.
        #[test]
        fn first_literal_match_wins(
            names in prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d"]), 1..8),
            branch in prop::sample::select(vec!["a", "b", "c", "d"]),
        ) {
            let entries: Vec<String> = names
                .iter()
                .enumerate()
                .map(|(i, name)| format!(
                    r#"{{ "pattern": "^{name}$", "github": {{ "pull_request_merged": {{ "slack": "s", "message": "{i}" }} }} }}"#
                ))
                .collect();
            let json = format!(
                r#"{{ "slacks": {{ "s": {{ "url": "u" }} }}, "branches": [{}] }}"#,
                entries.join(",")
            );
            let table = table(&json);

            let expected = names.iter().position(|n| *n == branch);
            let actual = table
                .resolve(&merged_on(branch).announcement())
                .ok()
                .map(|m| m.text.parse::<usize>().unwrap());
            prop_assert_eq!(actual, expected);
        }
    }
}
