//! Log entry types for the structured logger.
//!
//! Entries are immutable once created and serialize to self-contained JSON
//! objects so the history can be persisted as a single array.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current time as an ISO 8601 string (e.g., "2026-01-21T14:30:45.123Z").
pub(crate) fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Severity of a log entry, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subsystem an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Sync,
    Api,
    Db,
    Ui,
    Network,
    Performance,
    Error,
    General,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Sync => "sync",
            LogCategory::Api => "api",
            LogCategory::Db => "db",
            LogCategory::Ui => "ui",
            LogCategory::Network => "network",
            LogCategory::Performance => "performance",
            LogCategory::Error => "error",
            LogCategory::General => "general",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ambient process state stamped on every entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogContext {
    /// Operating system (e.g., "android", "ios", "linux")
    pub platform: String,

    pub app_version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Only whether a user is signed in, never who
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_user: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_state: Option<String>,
}

impl LogContext {
    pub fn new(app_version: impl Into<String>) -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            app_version: app_version.into(),
            session_id: None,
            has_user: None,
            screen: None,
            network_state: None,
        }
    }
}

/// A single structured log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,

    pub level: LogLevel,

    pub category: LogCategory,

    pub message: String,

    /// Optional structured fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// ISO 8601 timestamp
    pub timestamp: String,

    pub context: LogContext,
}

impl LogEntry {
    /// Create a new entry with a fresh id and the current timestamp.
    pub fn new(
        level: LogLevel,
        category: LogCategory,
        message: impl Into<String>,
        data: Option<Value>,
        context: LogContext,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            level,
            category,
            message: message.into(),
            data,
            timestamp: now_iso(),
            context,
        }
    }

    /// One human-readable line (no trailing newline).
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{} [{}] [{}] {}",
            self.timestamp,
            self.level.as_str().to_uppercase(),
            self.category,
            self.message
        );
        if let Some(data) = &self.data {
            line.push(' ');
            line.push_str(&data.to_string());
        }
        line
    }
}

/// Ordered stages of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Initializing,
    UploadingChanges,
    DownloadingUpdates,
    ResolvingConflicts,
    Finalizing,
}

impl SyncPhase {
    pub const ALL: [SyncPhase; 5] = [
        SyncPhase::Initializing,
        SyncPhase::UploadingChanges,
        SyncPhase::DownloadingUpdates,
        SyncPhase::ResolvingConflicts,
        SyncPhase::Finalizing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Initializing => "initializing",
            SyncPhase::UploadingChanges => "uploading_changes",
            SyncPhase::DownloadingUpdates => "downloading_updates",
            SyncPhase::ResolvingConflicts => "resolving_conflicts",
            SyncPhase::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncPhase {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyncPhase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| crate::error::CoreError::UnknownPhase(s.to_string()))
    }
}

/// Sync-run fields attached to a log call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    pub sync_id: String,
    pub phase: SyncPhase,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u64>,
}

impl SyncEvent {
    pub fn new(sync_id: impl Into<String>, phase: SyncPhase, operation: impl Into<String>) -> Self {
        Self {
            sync_id: sync_id.into(),
            phase,
            operation: operation.into(),
            item_count: None,
            error_count: None,
            duration_ms: None,
            network_type: None,
            batch_size: None,
        }
    }

    pub fn with_items(mut self, count: u64) -> Self {
        self.item_count = Some(count);
        self
    }

    pub fn with_errors(mut self, count: u64) -> Self {
        self.error_count = Some(count);
        self
    }

    pub fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_network(mut self, network_type: impl Into<String>) -> Self {
        self.network_type = Some(network_type.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}

/// A log entry correlated with a sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    #[serde(flatten)]
    pub entry: LogEntry,
    #[serde(flatten)]
    pub sync: SyncEvent,
}

/// Timing of one sync operation, keyed by `syncId_operation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetric {
    pub sync_id: String,
    pub operation: String,
    pub duration_ms: f64,
    pub timestamp: String,
    pub success: bool,
    pub item_count: u64,
    pub error_count: u64,
}

impl PerformanceMetric {
    pub fn key(&self) -> String {
        format!("{}_{}", self.sync_id, self.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[test]
    fn test_entry_serialization() {
        let entry = LogEntry::new(
            LogLevel::Info,
            LogCategory::Sync,
            "Sync started",
            Some(serde_json::json!({"items": 3})),
            LogContext::new("1.2.0"),
        );

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"level\":\"info\""));
        assert!(json.contains("\"category\":\"sync\""));
        assert!(json.contains("\"appVersion\":\"1.2.0\""));

        let parsed: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_entry_line() {
        let mut entry = LogEntry::new(
            LogLevel::Warn,
            LogCategory::Network,
            "Slow response",
            None,
            LogContext::new("1.2.0"),
        );
        entry.timestamp = "2026-01-21T14:30:45.123Z".to_string();

        assert_eq!(
            entry.to_line(),
            "2026-01-21T14:30:45.123Z [WARN] [network] Slow response"
        );
    }

    #[test]
    fn test_phase_parsing() {
        assert_eq!(
            "resolving_conflicts".parse::<SyncPhase>().unwrap(),
            SyncPhase::ResolvingConflicts
        );
        assert!("rewinding".parse::<SyncPhase>().is_err());
        assert!(SyncPhase::Initializing < SyncPhase::Finalizing);
    }

    #[test]
    fn test_sync_log_entry_flattens() {
        let entry = SyncLogEntry {
            entry: LogEntry::new(
                LogLevel::Info,
                LogCategory::Sync,
                "Uploaded",
                None,
                LogContext::new("1.2.0"),
            ),
            sync: SyncEvent::new("sync-1", SyncPhase::UploadingChanges, "upload").with_items(4),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["syncId"], "sync-1");
        assert_eq!(json["phase"], "uploading_changes");
        assert_eq!(json["itemCount"], 4);
        assert_eq!(json["message"], "Uploaded");
    }
}
