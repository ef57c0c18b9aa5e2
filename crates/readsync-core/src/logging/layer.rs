//! Tracing layer that feeds the error handler's breadcrumb trail.
//!
//! Warnings and errors emitted anywhere in the process through `tracing`
//! become breadcrumbs, so a later error report shows what went wrong
//! shortly before it.

use std::fmt::Write as FmtWrite;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::fault::Breadcrumbs;

/// A tracing Layer that pushes events at or above a level into
/// [`Breadcrumbs`].
///
/// ```ignore
/// use tracing_subscriber::prelude::*;
///
/// let layer = BreadcrumbLayer::new(handler.breadcrumb_handle());
/// tracing_subscriber::registry().with(layer).init();
/// ```
pub struct BreadcrumbLayer {
    breadcrumbs: Breadcrumbs,
    level: Level,
}

impl BreadcrumbLayer {
    /// Capture WARN and ERROR events.
    pub fn new(breadcrumbs: Breadcrumbs) -> Self {
        Self {
            breadcrumbs,
            level: Level::WARN,
        }
    }

    /// Capture events at `level` or more severe.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl<S> Layer<S> for BreadcrumbLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // tracing orders levels by verbosity: ERROR is the smallest
        if *metadata.level() > self.level {
            return;
        }

        let mut visitor = CrumbVisitor::default();
        event.record(&mut visitor);

        let mut crumb = format!("[{}] {}", metadata.level(), visitor.message.unwrap_or_default());

        if let Some(scope) = ctx.event_scope(event) {
            let spans: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !spans.is_empty() {
                let _ = write!(crumb, " ({})", spans.join(" > "));
            }
        }
        for (name, value) in visitor.fields {
            let _ = write!(crumb, " {}={}", name, value);
        }

        self.breadcrumbs.push(&crumb);
    }
}

/// Collects the message and remaining fields of an event as text.
#[derive(Default)]
struct CrumbVisitor {
    message: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl CrumbVisitor {
    fn record(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.push((field.name(), value));
        }
    }
}

impl Visit for CrumbVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record(field, value.to_string());
    }
}
