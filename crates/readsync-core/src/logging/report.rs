//! Text export and aggregate statistics over the log history.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::entry::{LogCategory, LogEntry, LogLevel, PerformanceMetric};

/// Selects a subset of the history.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Only entries at or above this level
    pub min_level: Option<LogLevel>,

    pub category: Option<LogCategory>,

    /// Only entries at or after this instant
    pub since: Option<DateTime<Utc>>,

    /// Keep only the newest `limit` matches
    pub limit: Option<usize>,
}

impl LogFilter {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.min_level = Some(level);
        self
    }

    pub fn category(mut self, category: LogCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(level) = self.min_level {
            if entry.level < level {
                return false;
            }
        }
        if let Some(category) = self.category {
            if entry.category != category {
                return false;
            }
        }
        if let Some(since) = self.since {
            match parse_ts(&entry.timestamp) {
                Some(ts) if ts >= since => {}
                _ => return false,
            }
        }
        true
    }

    /// Apply to a chronologically ordered slice.
    pub fn apply<'a>(&self, entries: impl IntoIterator<Item = &'a LogEntry>) -> Vec<LogEntry> {
        let mut selected: Vec<LogEntry> = entries
            .into_iter()
            .filter(|e| self.matches(e))
            .cloned()
            .collect();
        if let Some(limit) = self.limit {
            if selected.len() > limit {
                selected.drain(..selected.len() - limit);
            }
        }
        selected
    }
}

pub(crate) fn parse_ts(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Per-level counts over a set of entries.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LogStats {
    pub total: usize,
    pub debug: usize,
    pub info: usize,
    pub warn: usize,
    pub error: usize,
    pub fatal: usize,
}

impl LogStats {
    pub fn from_entries(entries: &[LogEntry]) -> Self {
        let mut stats = Self {
            total: entries.len(),
            ..Self::default()
        };
        for entry in entries {
            match entry.level {
                LogLevel::Debug => stats.debug += 1,
                LogLevel::Info => stats.info += 1,
                LogLevel::Warn => stats.warn += 1,
                LogLevel::Error => stats.error += 1,
                LogLevel::Fatal => stats.fatal += 1,
            }
        }
        stats
    }
}

/// Render entries as one line each, in the order given.
pub fn render_text(entries: &[LogEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{}", entry.to_line());
    }
    out
}

/// Aggregate sync performance over a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatistics {
    pub total_operations: usize,
    pub successful_operations: usize,
    /// Fraction in [0, 1]; 0 when there were no operations
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub total_items: u64,
    pub total_errors: u64,
    pub operations_by_type: BTreeMap<String, usize>,
}

impl SyncStatistics {
    /// Statistics over metrics recorded at or after `since`.
    pub fn from_metrics<'a>(
        metrics: impl IntoIterator<Item = &'a PerformanceMetric>,
        since: DateTime<Utc>,
    ) -> Self {
        let mut stats = Self::default();
        let mut total_duration = 0.0;

        for metric in metrics {
            match parse_ts(&metric.timestamp) {
                Some(ts) if ts >= since => {}
                _ => continue,
            }
            stats.total_operations += 1;
            if metric.success {
                stats.successful_operations += 1;
            }
            total_duration += metric.duration_ms;
            stats.total_items += metric.item_count;
            stats.total_errors += metric.error_count;
            *stats
                .operations_by_type
                .entry(metric.operation.clone())
                .or_default() += 1;
        }

        if stats.total_operations > 0 {
            let n = stats.total_operations as f64;
            stats.success_rate = stats.successful_operations as f64 / n;
            stats.average_duration_ms = total_duration / n;
        }
        stats
    }
}
