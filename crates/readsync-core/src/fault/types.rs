//! Error taxonomy and the sanitized records the handler produces.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What kind of failure an error represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Network,
    Authentication,
    Validation,
    Storage,
    Sync,
    Runtime,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Sync => "sync",
            ErrorCategory::Runtime => "runtime",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Code used when the failure carried none of its own.
    pub fn default_code(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "NETWORK_ERROR",
            ErrorCategory::Authentication => "AUTHENTICATION_ERROR",
            ErrorCategory::Validation => "VALIDATION_ERROR",
            ErrorCategory::Storage => "STORAGE_ERROR",
            ErrorCategory::Sync => "SYNC_ERROR",
            ErrorCategory::Runtime => "RUNTIME_ERROR",
            ErrorCategory::Unknown => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied context about where a failure happened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    pub user_id: Option<String>,
    pub server_url: Option<String>,
    pub screen: Option<String>,
    pub action: Option<String>,
    pub sync_id: Option<String>,
    pub extra: Option<Value>,
}

/// [`ErrorContext`] after sanitization: the user is reduced to a presence
/// flag and every free-form field is redacted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedContext {
    pub has_user: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Overrides for [`ErrorHandler::handle_error`](super::ErrorHandler::handle_error).
/// Anything left `None` is inferred.
#[derive(Debug, Clone, Default)]
pub struct ErrorOptions {
    pub category: Option<ErrorCategory>,
    pub severity: Option<Severity>,
    pub retryable: Option<bool>,
    pub reportable: Option<bool>,
    pub code: Option<String>,
    pub details: Option<Value>,
    pub context: ErrorContext,
}

impl ErrorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    pub fn reportable(mut self, reportable: bool) -> Self {
        self.reportable = Some(reportable);
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }
}

/// A handled fault. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppError {
    pub id: String,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub code: String,
    /// Raw diagnostic message; not for display
    pub message: String,
    /// Non-technical message safe to show
    pub user_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub timestamp: String,
    pub context: SanitizedContext,
    pub retryable: bool,
    pub reportable: bool,
}

/// Bundle handed to the reporting sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error_id: String,
    pub sanitized_error: AppError,
    pub sanitized_context: SanitizedContext,
    pub breadcrumbs: Vec<String>,
    pub session_id: String,
}

/// External destination for error reports (crash reporter, telemetry).
pub trait ReportSink: Send + Sync {
    fn report(&self, report: ErrorReport);
}
