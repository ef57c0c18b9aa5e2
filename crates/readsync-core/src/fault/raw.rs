//! Narrowing of arbitrary caught failures into a closed set of shapes.
//!
//! Everything downstream (classification, sanitization) matches on
//! [`RawFault`] instead of probing ad hoc for fields.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::redact::UNREADABLE_MARKER;

/// Message used when nothing usable can be extracted.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// A native error value (anything implementing `std::error::Error`).
#[derive(Debug, Clone, PartialEq)]
pub struct NativeFault {
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
    /// Source chain, one cause per line
    pub stack: Option<String>,
}

impl NativeFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
            stack: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// Caught failure, narrowed once at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFault {
    Native(NativeFault),
    Text(String),
    Structured(Map<String, Value>),
    Unrecognized,
}

impl RawFault {
    /// Narrow a native error. A panicking `Display` impl yields the unknown
    /// message (or [`UNREADABLE_MARKER`] for a cause) instead of unwinding
    /// into the caller.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let message = render(err).unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string());

        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            let cause_message = render(cause).unwrap_or_else(|| UNREADABLE_MARKER.to_string());
            causes.push(format!("caused by: {}", cause_message));
            source = cause.source();
        }

        let mut fault = NativeFault::new(message);
        if !causes.is_empty() {
            fault.stack = Some(causes.join("\n"));
        }
        RawFault::Native(fault)
    }

    /// Diagnostic message.
    pub fn message(&self) -> String {
        match self {
            RawFault::Native(native) => native.message.clone(),
            RawFault::Text(text) => text.clone(),
            RawFault::Structured(map) => match map.get("message") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => UNKNOWN_ERROR_MESSAGE.to_string(),
                Some(other) => other.to_string(),
            },
            RawFault::Unrecognized => UNKNOWN_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn code(&self) -> Option<String> {
        match self {
            RawFault::Native(native) => native.code.clone(),
            RawFault::Structured(map) => match map.get("code") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            },
            _ => None,
        }
    }

    /// HTTP status, looked up as `status`, `statusCode` or `response.status`.
    pub fn status(&self) -> Option<u16> {
        match self {
            RawFault::Native(native) => native.status,
            RawFault::Structured(map) => map
                .get("status")
                .or_else(|| map.get("statusCode"))
                .or_else(|| map.get("response").and_then(|r| r.get("status")))
                .and_then(as_status),
            _ => None,
        }
    }

    pub fn stack(&self) -> Option<String> {
        match self {
            RawFault::Native(native) => native.stack.clone(),
            RawFault::Structured(map) => map.get("stack").and_then(Value::as_str).map(str::to_owned),
            _ => None,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, RawFault::Native(_))
    }
}

fn render(err: &dyn std::error::Error) -> Option<String> {
    catch_unwind(AssertUnwindSafe(|| err.to_string())).ok()
}

fn as_status(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl From<NativeFault> for RawFault {
    fn from(native: NativeFault) -> Self {
        RawFault::Native(native)
    }
}

impl From<&str> for RawFault {
    fn from(text: &str) -> Self {
        RawFault::Text(text.to_string())
    }
}

impl From<String> for RawFault {
    fn from(text: String) -> Self {
        RawFault::Text(text)
    }
}

impl From<Value> for RawFault {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => RawFault::Text(s),
            Value::Object(map) => RawFault::Structured(map),
            _ => RawFault::Unrecognized,
        }
    }
}

impl From<CoreError> for RawFault {
    fn from(err: CoreError) -> Self {
        match RawFault::from_error(&err) {
            RawFault::Native(native) => RawFault::Native(native.with_code(err.code())),
            other => other,
        }
    }
}

impl From<&CoreError> for RawFault {
    fn from(err: &CoreError) -> Self {
        match RawFault::from_error(err) {
            RawFault::Native(native) => RawFault::Native(native.with_code(err.code())),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fmt;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "load failed")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[derive(Debug)]
    struct Exploding;

    impl fmt::Display for Exploding {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            panic!("display exploded")
        }
    }

    impl std::error::Error for Exploding {}

    #[derive(Debug)]
    struct Wrapping(Exploding);

    impl fmt::Display for Wrapping {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "upload failed")
        }
    }

    impl std::error::Error for Wrapping {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_native_message_and_chain() {
        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let fault = RawFault::from_error(&err);

        assert!(fault.is_native());
        assert_eq!(fault.message(), "load failed");
        assert_eq!(fault.stack().as_deref(), Some("caused by: disk gone"));
    }

    #[test]
    fn test_panicking_display_is_contained() {
        let fault = RawFault::from_error(&Exploding);
        assert_eq!(fault.message(), UNKNOWN_ERROR_MESSAGE);
    }

    #[test]
    fn test_panicking_cause_is_marked_unreadable() {
        let fault = RawFault::from_error(&Wrapping(Exploding));

        assert_eq!(fault.message(), "upload failed");
        assert_eq!(
            fault.stack().as_deref(),
            Some(format!("caused by: {}", UNREADABLE_MARKER).as_str())
        );
    }

    #[test]
    fn test_value_narrowing() {
        assert_eq!(RawFault::from(json!("plain")), RawFault::Text("plain".into()));
        assert_eq!(RawFault::from(json!(null)), RawFault::Unrecognized);
        assert_eq!(RawFault::from(json!(42)), RawFault::Unrecognized);

        let structured = RawFault::from(json!({
            "message": {"detail": "nested"},
            "code": 7,
            "response": {"status": "503"}
        }));
        assert_eq!(structured.message(), r#"{"detail":"nested"}"#);
        assert_eq!(structured.code().as_deref(), Some("7"));
        assert_eq!(structured.status(), Some(503));
    }

    #[test]
    fn test_structured_without_message() {
        let fault = RawFault::from(json!({"status": 404}));
        assert_eq!(fault.message(), UNKNOWN_ERROR_MESSAGE);
        assert_eq!(fault.status(), Some(404));
    }

    #[test]
    fn test_core_error_carries_code() {
        let fault = RawFault::from(CoreError::Storage("locked".into()));
        assert_eq!(fault.code().as_deref(), Some("STORAGE_ERROR"));
        assert_eq!(fault.message(), "Storage error: locked");
    }
}
