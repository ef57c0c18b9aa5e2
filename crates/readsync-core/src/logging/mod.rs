//! Structured logging for sync clients.
//!
//! [`StructuredLogger`] keeps a bounded in-memory history of [`LogEntry`]
//! records, mirrors each one to `tracing`, times operations and aggregates
//! sync performance metrics. History and metrics can be persisted through a
//! [`LogStore`] (in memory or redb-backed).
//!
//! ## Usage
//!
//! ```ignore
//! use readsync_core::logging::{LogCategory, LogFilter, LogLevel, StructuredLogger};
//!
//! let logger = StructuredLogger::new(LoggerConfig::default());
//! logger.log_sync_start("sync_42");
//! logger.info(LogCategory::Api, "fetched 20 bookmarks");
//!
//! let errors = logger.history(&LogFilter::default().level(LogLevel::Error));
//! ```
//!
//! ## Breadcrumbs
//!
//! [`BreadcrumbLayer`] plugs into a `tracing_subscriber` registry and feeds
//! warnings and errors into the error handler's breadcrumb trail.

pub(crate) mod entry;
pub mod layer;
mod logger;
pub mod report;
pub mod store;

pub use entry::{
    LogCategory, LogContext, LogEntry, LogLevel, PerformanceMetric, SyncEvent, SyncLogEntry,
    SyncPhase,
};
pub use layer::BreadcrumbLayer;
pub use logger::StructuredLogger;
pub use report::{render_text, LogFilter, LogStats, SyncStatistics};
pub use store::{LogStore, MemoryLogStore, RedbLogStore};
