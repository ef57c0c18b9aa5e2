//! Readsync Core Library
//!
//! Sync validation and error sanitization for article-reading clients that
//! sync bookmarks with a remote read-it-later server.
//!
//! ## Overview
//!
//! - **Redaction**: scrub tokens, credentials, emails, URL userinfo and IP
//!   addresses from text, JSON values, stack traces and URLs.
//! - **Error handling**: classify any caught failure, sanitize it, log it
//!   and hand reportable ones to a sink.
//! - **Structured logging**: bounded history, sync-correlated events,
//!   performance timers and metrics, optional persistence.
//! - **Sync validation**: article consistency, database integrity,
//!   conflict-resolution scoring, resume gating and whole-operation checks.
//!
//! ## Core Principles
//!
//! - **Never leak secrets**: everything that leaves the handler is redacted
//! - **Never lose user data silently**: resolutions that drop content or tags
//!   are flagged
//! - **Read only**: the validator never writes to storage
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use readsync_core::{Article, ConsistencyOptions, MemoryStorage, SyncDiagnostics};
//!
//! #[tokio::main]
//! async fn main() {
//!     let diagnostics = SyncDiagnostics::builder(Arc::new(MemoryStorage::new())).build();
//!
//!     let local = Article::new("a1", "https://read.example.com/1", "Title");
//!     let remote = local.clone();
//!     let result = diagnostics
//!         .validator()
//!         .validate_article_consistency(&local, &remote, &ConsistencyOptions::default());
//!     assert!(result.is_consistent);
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod fault;
pub mod logging;
pub mod redact;
pub mod storage;
pub mod validation;

// Re-exports
pub use config::{CoreConfig, ErrorHandlerConfig, LoggerConfig, ValidatorConfig};
pub use engine::{SyncDiagnostics, SyncDiagnosticsBuilder};
pub use error::{CoreError, CoreResult};
pub use fault::{
    AppError, ErrorCategory, ErrorContext, ErrorHandler, ErrorOptions, ErrorReport, NativeFault,
    RawFault, ReportSink, Severity,
};
pub use logging::{
    BreadcrumbLayer, LogCategory, LogEntry, LogFilter, LogLevel, LogStore, MemoryLogStore,
    RedbLogStore, StructuredLogger, SyncPhase,
};
pub use redact::Redactor;
pub use storage::{MemoryStorage, StorageQuery, StoredArticle};
pub use validation::{
    Article, ConflictResolutionResult, ConsistencyOptions, ConsistencyValidationResult,
    DatabaseIntegrityResult, IntegrityOptions, OperationKind, ResolutionStrategy, SyncOperation,
    SyncResumeValidationResult, SyncValidationResult, SyncValidator,
};
