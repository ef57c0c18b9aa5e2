//! Category, severity, retry and reporting inference.
//!
//! Rules are ordered; the first match wins.

use super::raw::RawFault;
use super::types::{ErrorCategory, Severity};

const NETWORK_CODES: &[&str] = &[
    "NETWORK_ERROR",
    "ECONNREFUSED",
    "ECONNRESET",
    "ENOTFOUND",
    "ENETUNREACH",
    "EAI_AGAIN",
];

const NETWORK_PATTERNS: &[&str] = &[
    "network",
    "fetch",
    "connection refused",
    "connection reset",
    "timed out",
    "offline",
];

const AUTH_CODES: &[&str] = &[
    "UNAUTHORIZED",
    "AUTH_ERROR",
    "AUTHENTICATION_FAILED",
    "INVALID_TOKEN",
    "TOKEN_EXPIRED",
];

const VALIDATION_CODES: &[&str] = &["NOT_FOUND", "VALIDATION_ERROR", "INVALID_INPUT", "BAD_REQUEST"];

const TIMEOUT_CODES: &[&str] = &["TIMEOUT", "ETIMEDOUT", "ECONNABORTED"];

fn has_code(code: Option<&str>, codes: &[&str]) -> bool {
    code.map(|c| codes.iter().any(|k| c.eq_ignore_ascii_case(k)))
        .unwrap_or(false)
}

/// Infer the category from code, status and message.
pub fn infer_category(fault: &RawFault) -> ErrorCategory {
    let code = fault.code();
    let code = code.as_deref();
    let status = fault.status();
    let message = fault.message().to_lowercase();

    if has_code(code, NETWORK_CODES) || NETWORK_PATTERNS.iter().any(|p| message.contains(p)) {
        return ErrorCategory::Network;
    }
    if status == Some(401) || has_code(code, AUTH_CODES) {
        return ErrorCategory::Authentication;
    }
    if matches!(status, Some(400..=499)) || has_code(code, VALIDATION_CODES) {
        return ErrorCategory::Validation;
    }
    if message.contains("storage") || message.contains("database") {
        return ErrorCategory::Storage;
    }
    if message.contains("sync") {
        return ErrorCategory::Sync;
    }
    if fault.is_native() {
        return ErrorCategory::Runtime;
    }
    ErrorCategory::Unknown
}

pub fn infer_severity(category: ErrorCategory, fault: &RawFault) -> Severity {
    match category {
        ErrorCategory::Authentication => Severity::High,
        ErrorCategory::Storage if fault.message().to_lowercase().contains("critical") => {
            Severity::Critical
        }
        ErrorCategory::Network if fault.status().is_some_and(|s| s >= 500) => Severity::Medium,
        ErrorCategory::Validation => Severity::Low,
        _ => Severity::Medium,
    }
}

pub fn infer_retryable(category: ErrorCategory, fault: &RawFault) -> bool {
    if matches!(category, ErrorCategory::Network | ErrorCategory::Sync) {
        return true;
    }
    if matches!(fault.status(), Some(500..=599)) {
        return true;
    }
    has_code(fault.code().as_deref(), TIMEOUT_CODES)
}

/// Low severity is never reported and high/critical always are; in
/// between, validation failures stay local.
pub fn infer_reportable(category: ErrorCategory, severity: Severity) -> bool {
    match severity {
        Severity::Low => false,
        Severity::High | Severity::Critical => true,
        Severity::Medium => category != ErrorCategory::Validation,
    }
}

/// Display text for a category.
pub fn user_message(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Network => {
            "Unable to reach the server. Check your connection and try again."
        }
        ErrorCategory::Authentication => "Your session has expired. Please sign in again.",
        ErrorCategory::Validation => "Some of the information provided is not valid.",
        ErrorCategory::Storage => "There was a problem saving your data on this device.",
        ErrorCategory::Sync => "Sync could not finish. Your changes are kept and will sync later.",
        ErrorCategory::Runtime | ErrorCategory::Unknown => {
            "Something went wrong. Please try again."
        }
    }
}
