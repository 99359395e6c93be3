//! Message templates.
//!
//! Templates are handlebars with HTML escaping off (the output is Slack
//! markdown, not HTML) and strict mode on, so a template that references a
//! field the event does not carry fails to render instead of producing a
//! message with a hole in it.

use std::fmt;

use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;

use crate::types::Event;

use super::config::RoutingConfigError;

#[derive(Debug, Error)]
#[error("failed to render template {name}: {source}")]
pub struct RenderError {
    pub name: String,
    #[source]
    pub source: Box<handlebars::RenderError>,
}

/// The fields a template can reference.
///
/// Optional fields are left out entirely when absent so that strict mode
/// rejects templates that use them.
#[derive(Debug, Serialize)]
pub struct TemplateContext<'a> {
    pub org: &'a str,
    pub repo: &'a str,
    pub branch: &'a str,
    pub revision: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    pub event: &'static str,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_url: Option<&'a str>,
}

impl<'a> TemplateContext<'a> {
    pub fn from_event(event: &'a Event) -> Self {
        TemplateContext {
            org: &event.repo.org,
            repo: &event.repo.name,
            branch: &event.branch_ref,
            revision: &event.revision_or_tag,
            pr_title: event.pr.as_ref().map(|pr| pr.title.as_str()),
            pr_number: event.pr.as_ref().map(|pr| pr.number.0),
            status: event.outcome.map(|o| o.key()),
            event: event.kind.key(),
            source: event.source.to_string(),
            build_url: event.build_url.as_deref(),
        }
    }
}

/// A registry of compiled templates, addressed by name.
pub struct Templates {
    registry: Handlebars<'static>,
}

impl fmt::Debug for Templates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Templates")
            .field("names", &self.registry.get_templates().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::new()
    }
}

impl Templates {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        Templates { registry }
    }

    /// Compiles `source` under `name`. `name` also identifies the template in
    /// error messages, so it should say where the template came from.
    pub fn register(&mut self, name: &str, source: &str) -> Result<(), RoutingConfigError> {
        self.registry
            .register_template_string(name, source)
            .map_err(|e| RoutingConfigError::Template {
                location: name.to_string(),
                source: Box::new(e),
            })
    }

    pub fn render(&self, name: &str, event: &Event) -> Result<String, RenderError> {
        self.registry
            .render(name, &TemplateContext::from_event(event))
            .map_err(|e| RenderError {
                name: name.to_string(),
                source: Box::new(e),
            })
    }
}
