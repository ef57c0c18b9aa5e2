//! Configuration for the diagnostics core.
//!
//! # Example
//!
//! ```
//! use readsync_core::config::CoreConfig;
//!
//! // Minimal config (uses defaults)
//! let config = CoreConfig::default();
//! assert_eq!(config.logger.max_history, 1000);
//!
//! // Partial JSON, everything else defaulted
//! let config = CoreConfig::from_json_str(r#"{ "logger": { "debug_mode": true } }"#).unwrap();
//! assert!(config.logger.debug_mode);
//! assert_eq!(config.errors.max_breadcrumbs, 50);
//! ```

use serde::Deserialize;

use crate::error::{CoreError, CoreResult};
use crate::logging::LogLevel;
use crate::validation::OperationKind;

/// Top-level configuration, one section per component.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub logger: LoggerConfig,

    #[serde(default)]
    pub errors: ErrorHandlerConfig,

    #[serde(default)]
    pub validator: ValidatorConfig,
}

impl CoreConfig {
    /// Parse a (possibly partial) JSON document.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        serde_json::from_str(json).map_err(|e| CoreError::InvalidConfig(e.to_string()))
    }
}

/// Structured logger settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggerConfig {
    /// Entries below this level are dropped (default: info)
    #[serde(default = "default_min_level")]
    pub min_level: LogLevel,

    /// Debug entries are only recorded when this is on
    #[serde(default)]
    pub debug_mode: bool,

    /// History ring capacity (default: 1000)
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Version stamped on every entry's context
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Persisted store key for the log history
    #[serde(default = "default_logs_key")]
    pub logs_key: String,

    /// Persisted store key for performance metrics
    #[serde(default = "default_metrics_key")]
    pub metrics_key: String,
}

fn default_min_level() -> LogLevel { LogLevel::Info }
fn default_max_history() -> usize { 1000 }
fn default_app_version() -> String { env!("CARGO_PKG_VERSION").to_string() }
fn default_logs_key() -> String { "readsync.logs".to_string() }
fn default_metrics_key() -> String { "readsync.performance_metrics".to_string() }

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: default_min_level(),
            debug_mode: false,
            max_history: default_max_history(),
            app_version: default_app_version(),
            logs_key: default_logs_key(),
            metrics_key: default_metrics_key(),
        }
    }
}

/// Error handler settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorHandlerConfig {
    /// Breadcrumb ring capacity (default: 50)
    #[serde(default = "default_max_breadcrumbs")]
    pub max_breadcrumbs: usize,
}

fn default_max_breadcrumbs() -> usize { 50 }

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        Self {
            max_breadcrumbs: default_max_breadcrumbs(),
        }
    }
}

/// Sync validator thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    /// Content token overlap below this is reported (default: 0.9)
    #[serde(default = "default_similarity_threshold")]
    pub content_similarity_threshold: f64,

    /// Update timestamp differences under this are clock skew (default: 60 s)
    #[serde(default = "default_timestamp_tolerance_secs")]
    pub timestamp_tolerance_secs: i64,

    /// Modified rows older than this with no sync timestamp are stale (default: 1 h)
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: i64,

    /// Fewer indexes than this is a performance issue
    #[serde(default = "default_min_index_count")]
    pub min_index_count: u64,

    /// Soft-deleted / total above this is reported as fragmentation
    #[serde(default = "default_fragmentation_ratio")]
    pub fragmentation_ratio: f64,

    /// Absolute soft-deleted row ceiling
    #[serde(default = "default_max_deleted_rows")]
    pub max_deleted_rows: u64,

    /// Article count above which archiving is recommended
    #[serde(default = "default_large_library_threshold")]
    pub large_library_threshold: u64,

    /// Pending sync rows above which a backlog is reported
    #[serde(default = "default_pending_backlog_threshold")]
    pub pending_backlog_threshold: u64,

    #[serde(default)]
    pub thresholds: PerformanceThresholds,
}

fn default_similarity_threshold() -> f64 { 0.9 }
fn default_timestamp_tolerance_secs() -> i64 { 60 }
fn default_stale_after_secs() -> i64 { 3600 }
fn default_min_index_count() -> u64 { 5 }
fn default_fragmentation_ratio() -> f64 { 0.3 }
fn default_max_deleted_rows() -> u64 { 1000 }
fn default_large_library_threshold() -> u64 { 10_000 }
fn default_pending_backlog_threshold() -> u64 { 100 }

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            content_similarity_threshold: default_similarity_threshold(),
            timestamp_tolerance_secs: default_timestamp_tolerance_secs(),
            stale_after_secs: default_stale_after_secs(),
            min_index_count: default_min_index_count(),
            fragmentation_ratio: default_fragmentation_ratio(),
            max_deleted_rows: default_max_deleted_rows(),
            large_library_threshold: default_large_library_threshold(),
            pending_backlog_threshold: default_pending_backlog_threshold(),
            thresholds: PerformanceThresholds::default(),
        }
    }
}

/// Per-operation-type duration ceilings in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceThresholds {
    #[serde(default = "default_single_create_ms")]
    pub single_create_ms: u64,
    #[serde(default = "default_single_update_ms")]
    pub single_update_ms: u64,
    #[serde(default = "default_single_delete_ms")]
    pub single_delete_ms: u64,
    #[serde(default = "default_batch_create_ms")]
    pub batch_create_ms: u64,
    #[serde(default = "default_batch_update_ms")]
    pub batch_update_ms: u64,
    #[serde(default = "default_query_ms")]
    pub query_ms: u64,
    #[serde(default = "default_full_sync_ms")]
    pub full_sync_ms: u64,
}

fn default_single_create_ms() -> u64 { 50 }
fn default_single_update_ms() -> u64 { 50 }
fn default_single_delete_ms() -> u64 { 30 }
fn default_batch_create_ms() -> u64 { 500 }
fn default_batch_update_ms() -> u64 { 500 }
fn default_query_ms() -> u64 { 100 }
fn default_full_sync_ms() -> u64 { 2000 }

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            single_create_ms: default_single_create_ms(),
            single_update_ms: default_single_update_ms(),
            single_delete_ms: default_single_delete_ms(),
            batch_create_ms: default_batch_create_ms(),
            batch_update_ms: default_batch_update_ms(),
            query_ms: default_query_ms(),
            full_sync_ms: default_full_sync_ms(),
        }
    }
}

impl PerformanceThresholds {
    /// Ceiling for one kind of operation.
    pub fn for_kind(&self, kind: OperationKind) -> u64 {
        match kind {
            OperationKind::SingleCreate => self.single_create_ms,
            OperationKind::SingleUpdate => self.single_update_ms,
            OperationKind::SingleDelete => self.single_delete_ms,
            OperationKind::BatchCreate => self.batch_create_ms,
            OperationKind::BatchUpdate => self.batch_update_ms,
            OperationKind::Query => self.query_ms,
            OperationKind::FullSync => self.full_sync_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.logger.min_level, LogLevel::Info);
        assert!(!config.logger.debug_mode);
        assert_eq!(config.validator.timestamp_tolerance_secs, 60);
        assert_eq!(config.validator.thresholds.for_kind(OperationKind::FullSync), 2000);
        assert_eq!(config.validator.thresholds.for_kind(OperationKind::SingleCreate), 50);
        assert_eq!(config.validator.thresholds.for_kind(OperationKind::BatchCreate), 500);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = CoreConfig::from_json_str(
            r#"{ "validator": { "thresholds": { "full_sync_ms": 5000 } }, "logger": { "min_level": "warn" } }"#,
        )
        .unwrap();
        assert_eq!(config.validator.thresholds.full_sync_ms, 5000);
        assert_eq!(config.validator.thresholds.query_ms, 100);
        assert_eq!(config.logger.min_level, LogLevel::Warn);
        assert_eq!(config.logger.max_history, 1000);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = CoreConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }
}
