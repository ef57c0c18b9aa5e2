//! Error handler: classify, sanitize, log and report.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::breadcrumbs::Breadcrumbs;
use super::classify::{
    infer_category, infer_reportable, infer_retryable, infer_severity, user_message,
};
use super::raw::{RawFault, UNKNOWN_ERROR_MESSAGE};
use super::types::{
    AppError, ErrorCategory, ErrorContext, ErrorOptions, ErrorReport, ReportSink, SanitizedContext,
    Severity,
};
use crate::config::ErrorHandlerConfig;
use crate::logging::entry::now_iso;
use crate::logging::{LogCategory, LogLevel, StructuredLogger};
use crate::redact::Redactor;

/// Turns arbitrary failures into sanitized [`AppError`] records.
///
/// One instance per process, held by the composition root. It owns the
/// breadcrumb trail and the session id that tie reports together.
pub struct ErrorHandler {
    logger: Arc<StructuredLogger>,
    redactor: Redactor,
    breadcrumbs: Breadcrumbs,
    session_id: String,
    sink: Option<Arc<dyn ReportSink>>,
}

impl ErrorHandler {
    pub fn new(logger: Arc<StructuredLogger>, config: &ErrorHandlerConfig) -> Self {
        Self {
            logger,
            redactor: Redactor::new(),
            breadcrumbs: Breadcrumbs::new(config.max_breadcrumbs),
            session_id: format!("session_{}", ulid::Ulid::new()),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Record an action for post-failure context.
    pub fn add_breadcrumb(&self, action: &str) {
        self.breadcrumbs.push(action);
    }

    pub fn breadcrumbs(&self) -> Vec<String> {
        self.breadcrumbs.snapshot()
    }

    pub fn clear_breadcrumbs(&self) {
        self.breadcrumbs.clear();
    }

    /// Shared handle to the trail, for
    /// [`BreadcrumbLayer`](crate::logging::BreadcrumbLayer).
    pub fn breadcrumb_handle(&self) -> Breadcrumbs {
        self.breadcrumbs.clone()
    }

    /// Classify and record a failure. Never panics: if building the record
    /// fails, an unknown-category record is returned instead.
    pub fn handle_error(&self, fault: impl Into<RawFault>, options: ErrorOptions) -> AppError {
        let fault = fault.into();

        let error = catch_unwind(AssertUnwindSafe(|| self.build(&fault, &options)))
            .unwrap_or_else(|_| self.fallback(&options));

        if catch_unwind(AssertUnwindSafe(|| self.record(&error))).is_err() {
            tracing::error!(error_id = %error.id, "Failed to record handled error");
        }

        error
    }

    fn build(&self, fault: &RawFault, options: &ErrorOptions) -> AppError {
        let category = options.category.unwrap_or_else(|| infer_category(fault));
        let severity = options
            .severity
            .unwrap_or_else(|| infer_severity(category, fault));
        let retryable = options
            .retryable
            .unwrap_or_else(|| infer_retryable(category, fault));
        let reportable = options
            .reportable
            .unwrap_or_else(|| infer_reportable(category, severity));
        let code = options
            .code
            .clone()
            .or_else(|| fault.code())
            .unwrap_or_else(|| category.default_code().to_string());

        AppError {
            id: new_error_id(),
            category,
            severity,
            code,
            message: fault.message(),
            user_message: user_message(category).to_string(),
            details: options
                .details
                .as_ref()
                .map(|d| self.redactor.redact_value(d)),
            stack: fault.stack().map(|s| self.redactor.redact_stack_trace(&s)),
            timestamp: now_iso(),
            context: self.sanitize_context(&options.context),
            retryable,
            reportable,
        }
    }

    fn fallback(&self, options: &ErrorOptions) -> AppError {
        let category = ErrorCategory::Unknown;
        AppError {
            id: new_error_id(),
            category,
            severity: Severity::Medium,
            code: category.default_code().to_string(),
            message: UNKNOWN_ERROR_MESSAGE.to_string(),
            user_message: user_message(category).to_string(),
            details: None,
            stack: None,
            timestamp: now_iso(),
            context: SanitizedContext {
                has_user: options.context.user_id.is_some(),
                ..SanitizedContext::default()
            },
            retryable: false,
            reportable: true,
        }
    }

    /// Redact every free-form field and collapse the user to a flag.
    pub fn sanitize_context(&self, context: &ErrorContext) -> SanitizedContext {
        SanitizedContext {
            has_user: context.user_id.is_some(),
            server_url: context
                .server_url
                .as_deref()
                .map(|u| self.redactor.sanitize_server_url(u)),
            screen: context.screen.as_deref().map(|s| self.redactor.redact_text(s)),
            action: context.action.as_deref().map(|s| self.redactor.redact_text(s)),
            sync_id: context.sync_id.as_deref().map(|s| self.redactor.redact_text(s)),
            extra: context.extra.as_ref().map(|v| self.redactor.redact_value(v)),
        }
    }

    fn record(&self, error: &AppError) {
        let sanitized = AppError {
            code: self.redactor.redact_text(&error.code),
            message: self.redactor.redact_text(&error.message),
            ..error.clone()
        };
        let level = match error.severity {
            Severity::Low => LogLevel::Debug,
            Severity::Medium => LogLevel::Warn,
            Severity::High | Severity::Critical => LogLevel::Error,
        };

        match error.category {
            ErrorCategory::Network | ErrorCategory::Sync => {
                self.logger.log(
                    level,
                    LogCategory::Error,
                    format!(
                        "[{}] {}: {}",
                        error.category.as_str().to_uppercase(),
                        sanitized.code,
                        sanitized.message
                    ),
                    None,
                );
            }
            _ => {
                self.logger.log(
                    level,
                    LogCategory::Error,
                    format!("{} error: {}", error.category, sanitized.message),
                    serde_json::to_value(&sanitized).ok(),
                );
            }
        }

        if error.reportable && error.severity != Severity::Low {
            if let Some(sink) = &self.sink {
                sink.report(ErrorReport {
                    error_id: error.id.clone(),
                    sanitized_context: sanitized.context.clone(),
                    sanitized_error: sanitized,
                    breadcrumbs: self.breadcrumbs.snapshot(),
                    session_id: self.session_id.clone(),
                });
            }
        }
    }
}

fn new_error_id() -> String {
    format!("err_{}", ulid::Ulid::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggerConfig;
    use crate::fault::raw::NativeFault;
    use crate::logging::LogFilter;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct CapturingSink {
        reports: Mutex<Vec<ErrorReport>>,
    }

    impl ReportSink for CapturingSink {
        fn report(&self, report: ErrorReport) {
            self.reports.lock().push(report);
        }
    }

    fn setup() -> (Arc<StructuredLogger>, Arc<CapturingSink>, ErrorHandler) {
        let logger = Arc::new(StructuredLogger::new(LoggerConfig {
            min_level: LogLevel::Debug,
            debug_mode: true,
            ..LoggerConfig::default()
        }));
        let sink = Arc::new(CapturingSink::default());
        let handler = ErrorHandler::new(logger.clone(), &ErrorHandlerConfig::default())
            .with_sink(sink.clone());
        (logger, sink, handler)
    }

    #[test]
    fn test_auth_error_is_high_and_reported() {
        let (_logger, sink, handler) = setup();
        handler.add_breadcrumb("opened settings");

        let error = handler.handle_error(
            json!({"message": "Unauthorized", "status": 401}),
            ErrorOptions::new(),
        );

        assert_eq!(error.category, ErrorCategory::Authentication);
        assert_eq!(error.severity, Severity::High);
        assert_eq!(error.code, "AUTHENTICATION_ERROR");
        assert!(!error.retryable);
        assert!(error.reportable);
        assert_ne!(error.user_message, error.message);

        let reports = sink.reports.lock();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].error_id, error.id);
        assert_eq!(reports[0].session_id, handler.session_id());
        assert_eq!(reports[0].breadcrumbs.len(), 1);
    }

    #[test]
    fn test_validation_error_is_not_reported() {
        let (logger, sink, handler) = setup();

        let error = handler.handle_error(
            json!({"message": "Bookmark not found", "status": 404}),
            ErrorOptions::new(),
        );

        assert_eq!(error.severity, Severity::Low);
        assert!(!error.reportable);
        assert!(sink.reports.lock().is_empty());

        let debug = logger.history(&LogFilter::default().category(LogCategory::Error));
        assert_eq!(debug.len(), 1);
        assert_eq!(debug[0].level, LogLevel::Debug);
    }

    #[test]
    fn test_network_errors_log_terse_line() {
        let (logger, _sink, handler) = setup();

        handler.handle_error(
            NativeFault::new("Network request failed to 10.0.0.7"),
            ErrorOptions::new(),
        );

        let entries = logger.history(&LogFilter::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Warn);
        assert!(entries[0].data.is_none());
        assert!(entries[0].message.starts_with("[NETWORK] NETWORK_ERROR:"));
        assert!(!entries[0].message.contains("10.0.0.7"));
    }

    #[test]
    fn test_details_and_context_are_sanitized() {
        let (_logger, sink, handler) = setup();

        let error = handler.handle_error(
            NativeFault::new("critical storage failure").with_stack("at /home/alice/app.rs"),
            ErrorOptions::new()
                .details(json!({"password": "hunter2", "articleId": "a1"}))
                .context(ErrorContext {
                    user_id: Some("alice@example.com".into()),
                    server_url: Some(
                        "https://alice:pw@read.example.com/api?token=abc&page=2".into(),
                    ),
                    screen: Some("Reader".into()),
                    ..ErrorContext::default()
                }),
        );

        assert_eq!(error.category, ErrorCategory::Storage);
        assert_eq!(error.severity, Severity::Critical);
        let details = error.details.as_ref().unwrap();
        assert_eq!(details["password"], "[REDACTED]");
        assert_eq!(details["articleId"], "a1");
        assert!(error.context.has_user);
        assert_eq!(
            error.context.server_url.as_deref(),
            Some("https://read.example.com/api?token=%5BREDACTED%5D&page=2")
        );
        assert_eq!(error.stack.as_deref(), Some("at /home/[REDACTED]/app.rs"));

        let serialized = serde_json::to_string(&sink.reports.lock()[0]).unwrap();
        assert!(!serialized.contains("alice"));
        assert!(!serialized.contains("hunter2"));
    }

    #[test]
    fn test_code_and_sync_id_are_redacted() {
        let (logger, sink, handler) = setup();
        let secret = "rk_4f9a8b7c6d5e4f3a2b1c0d9e";

        let error = handler.handle_error(
            NativeFault::new("sync push refused").with_code(format!("REJECTED_{}", secret)),
            ErrorOptions::new().context(ErrorContext {
                sync_id: Some(format!("sync for ops@example.com {}", secret)),
                ..ErrorContext::default()
            }),
        );

        assert_eq!(error.category, ErrorCategory::Sync);
        let report = serde_json::to_string(&sink.reports.lock()[0]).unwrap();
        assert!(!report.contains(secret));
        assert!(!report.contains("ops@example.com"));

        let logged = logger.export(&LogFilter::default());
        assert!(!logged.contains(secret));
        assert!(logged.contains("[SYNC] [REDACTED_TOKEN]: sync push refused"));
    }

    #[test]
    fn test_explicit_options_win() {
        let (_logger, sink, handler) = setup();

        let error = handler.handle_error(
            "sync conflict",
            ErrorOptions::new()
                .category(ErrorCategory::Validation)
                .severity(Severity::Critical)
                .retryable(false)
                .reportable(false)
                .code("E_CUSTOM"),
        );

        assert_eq!(error.category, ErrorCategory::Validation);
        assert_eq!(error.severity, Severity::Critical);
        assert!(!error.retryable);
        assert!(!error.reportable);
        assert_eq!(error.code, "E_CUSTOM");
        assert!(sink.reports.lock().is_empty());
    }

    #[test]
    fn test_unrecognized_input() {
        let (_logger, _sink, handler) = setup();

        let error = handler.handle_error(json!(null), ErrorOptions::new());

        assert_eq!(error.category, ErrorCategory::Unknown);
        assert_eq!(error.message, UNKNOWN_ERROR_MESSAGE);
    }

    #[test]
    fn test_sink_panic_does_not_escape() {
        struct PanickingSink;
        impl ReportSink for PanickingSink {
            fn report(&self, _report: ErrorReport) {
                panic!("transport down");
            }
        }

        let logger = Arc::new(StructuredLogger::new(LoggerConfig::default()));
        let handler = ErrorHandler::new(logger, &ErrorHandlerConfig::default())
            .with_sink(Arc::new(PanickingSink));

        let error = handler.handle_error("unexpected state", ErrorOptions::new());
        assert_eq!(error.category, ErrorCategory::Unknown);
    }
}
