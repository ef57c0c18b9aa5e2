//! Error classification and handling.
//!
//! Caught failures are narrowed into a [`RawFault`], classified into an
//! [`ErrorCategory`] and [`Severity`], sanitized, logged through the
//! [`StructuredLogger`](crate::logging::StructuredLogger) and optionally
//! forwarded to a [`ReportSink`].

mod breadcrumbs;
mod classify;
mod handler;
mod raw;
mod types;

pub use breadcrumbs::Breadcrumbs;
pub use classify::{infer_category, infer_reportable, infer_retryable, infer_severity, user_message};
pub use handler::ErrorHandler;
pub use raw::{NativeFault, RawFault, UNKNOWN_ERROR_MESSAGE};
pub use types::{
    AppError, ErrorCategory, ErrorContext, ErrorOptions, ErrorReport, ReportSink,
    SanitizedContext, Severity,
};
