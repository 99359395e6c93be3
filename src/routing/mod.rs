//! The notification router.
//!
//! A [`RoutingTable`] is compiled once at startup from a [`RoutingFile`] and
//! then shared read-only by every tracked unit.

pub mod config;
pub mod table;
pub mod template;

pub use config::{RouteEntry, RoutingConfigError, RoutingFile, SlackEntry, TemplateEntry};
pub use table::{RenderedMessage, RouteMiss, RoutingTable};
pub use template::{RenderError, TemplateContext, Templates};

use std::path::Path;

/// Reads and compiles the routing file at `path`.
pub fn load(path: &Path) -> Result<RoutingTable, RoutingConfigError> {
    RoutingTable::compile(RoutingFile::load(path)?)
}
