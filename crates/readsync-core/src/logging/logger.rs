//! In-memory, size-bounded structured logger.
//!
//! Every accepted entry is appended to a FIFO history (oldest evicted first)
//! and mirrored to `tracing` at the matching level. Performance timers and
//! sync performance metrics live alongside the history and can be persisted
//! through a [`LogStore`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::{json, Value};

use super::entry::{
    now_iso, LogCategory, LogContext, LogEntry, LogLevel, PerformanceMetric, SyncEvent,
    SyncLogEntry, SyncPhase,
};
use super::report::{render_text, LogFilter, LogStats, SyncStatistics};
use super::store::LogStore;
use crate::config::LoggerConfig;
use crate::error::CoreResult;

struct Timer {
    started: Instant,
    data: Option<Value>,
}

struct LoggerState {
    history: VecDeque<LogEntry>,
    timers: HashMap<String, Timer>,
    metrics: HashMap<String, PerformanceMetric>,
    context: LogContext,
    min_level: LogLevel,
    debug_mode: bool,
}

/// Structured logger shared by the error handler and the sync validator.
pub struct StructuredLogger {
    config: LoggerConfig,
    state: Mutex<LoggerState>,
    store: Option<Arc<dyn LogStore>>,
}

impl StructuredLogger {
    pub fn new(config: LoggerConfig) -> Self {
        let state = LoggerState {
            history: VecDeque::with_capacity(config.max_history.min(1024)),
            timers: HashMap::new(),
            metrics: HashMap::new(),
            context: LogContext::new(config.app_version.clone()),
            min_level: config.min_level,
            debug_mode: config.debug_mode,
        };
        Self {
            config,
            state: Mutex::new(state),
            store: None,
        }
    }

    /// Attach a persisted store used by [`persist`](Self::persist) and
    /// [`restore`](Self::restore).
    pub fn with_store(mut self, store: Arc<dyn LogStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn set_min_level(&self, level: LogLevel) {
        self.state.lock().min_level = level;
    }

    pub fn set_debug_mode(&self, enabled: bool) {
        self.state.lock().debug_mode = enabled;
    }

    /// Update the context stamped on subsequent entries.
    pub fn set_context(&self, update: impl FnOnce(&mut LogContext)) {
        update(&mut self.state.lock().context);
    }

    pub fn context(&self) -> LogContext {
        self.state.lock().context.clone()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Recording
    // ═══════════════════════════════════════════════════════════════════════

    /// Record an entry. Returns `None` when the level filter drops it.
    pub fn log(
        &self,
        level: LogLevel,
        category: LogCategory,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Option<LogEntry> {
        let entry = {
            let mut state = self.state.lock();
            if level < state.min_level || (level == LogLevel::Debug && !state.debug_mode) {
                return None;
            }
            let entry = LogEntry::new(level, category, message, data, state.context.clone());
            state.history.push_back(entry.clone());
            while state.history.len() > self.config.max_history {
                state.history.pop_front();
            }
            entry
        };

        mirror(&entry);
        Some(entry)
    }

    pub fn debug(&self, category: LogCategory, message: impl Into<String>) -> Option<LogEntry> {
        self.log(LogLevel::Debug, category, message, None)
    }

    pub fn info(&self, category: LogCategory, message: impl Into<String>) -> Option<LogEntry> {
        self.log(LogLevel::Info, category, message, None)
    }

    pub fn warn(&self, category: LogCategory, message: impl Into<String>) -> Option<LogEntry> {
        self.log(LogLevel::Warn, category, message, None)
    }

    pub fn error(&self, category: LogCategory, message: impl Into<String>) -> Option<LogEntry> {
        self.log(LogLevel::Error, category, message, None)
    }

    pub fn fatal(&self, category: LogCategory, message: impl Into<String>) -> Option<LogEntry> {
        self.log(LogLevel::Fatal, category, message, None)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Performance timers
    // ═══════════════════════════════════════════════════════════════════════

    /// Start (or restart) a named timer. Reusing an id overwrites its start.
    pub fn start_performance_timer(&self, id: impl Into<String>, data: Option<Value>) {
        self.state.lock().timers.insert(
            id.into(),
            Timer {
                started: Instant::now(),
                data,
            },
        );
    }

    /// Milliseconds since the timer started; timers are one-shot.
    ///
    /// Returns 0 and logs a warning if `id` was never started or has
    /// already been ended.
    pub fn end_performance_timer(&self, id: &str) -> f64 {
        let timer = self.state.lock().timers.remove(id);

        match timer {
            Some(timer) => {
                let duration_ms = timer.started.elapsed().as_secs_f64() * 1000.0;
                self.log(
                    LogLevel::Info,
                    LogCategory::Performance,
                    format!("Performance: {} completed in {:.2}ms", id, duration_ms),
                    Some(json!({
                        "timerId": id,
                        "durationMs": duration_ms,
                        "data": timer.data,
                    })),
                );
                duration_ms
            }
            None => {
                self.log(
                    LogLevel::Warn,
                    LogCategory::Performance,
                    format!("Performance timer '{}' was not started", id),
                    None,
                );
                0.0
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Sync logging
    // ═══════════════════════════════════════════════════════════════════════

    /// Record a sync-correlated entry. A supplied duration also records a
    /// performance metric keyed by `syncId_operation`.
    pub fn log_sync_event(
        &self,
        level: LogLevel,
        event: SyncEvent,
        message: impl Into<String>,
    ) -> Option<SyncLogEntry> {
        if let Some(duration_ms) = event.duration_ms {
            let error_count = event.error_count.unwrap_or(0);
            let metric = PerformanceMetric {
                sync_id: event.sync_id.clone(),
                operation: event.operation.clone(),
                duration_ms,
                timestamp: now_iso(),
                success: error_count == 0,
                item_count: event.item_count.unwrap_or(0),
                error_count,
            };
            self.state.lock().metrics.insert(metric.key(), metric);
        }

        let data = serde_json::to_value(&event).ok();
        let entry = self.log(level, LogCategory::Sync, message, data)?;
        Some(SyncLogEntry { entry, sync: event })
    }

    pub fn log_sync_start(&self, sync_id: &str) -> Option<SyncLogEntry> {
        self.log_sync_event(
            LogLevel::Info,
            SyncEvent::new(sync_id, SyncPhase::Initializing, "sync_start"),
            format!("Sync {} started", sync_id),
        )
    }

    pub fn log_sync_phase(
        &self,
        sync_id: &str,
        phase: SyncPhase,
        operation: &str,
        item_count: u64,
    ) -> Option<SyncLogEntry> {
        self.log_sync_event(
            LogLevel::Info,
            SyncEvent::new(sync_id, phase, operation).with_items(item_count),
            format!("Sync {} entered {} ({} items)", sync_id, phase, item_count),
        )
    }

    pub fn log_sync_complete(
        &self,
        sync_id: &str,
        duration_ms: f64,
        item_count: u64,
        error_count: u64,
    ) -> Option<SyncLogEntry> {
        let level = if error_count == 0 {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };
        self.log_sync_event(
            level,
            SyncEvent::new(sync_id, SyncPhase::Finalizing, "sync_complete")
                .with_items(item_count)
                .with_errors(error_count)
                .with_duration(duration_ms),
            format!(
                "Sync {} completed in {:.0}ms: {} items, {} errors",
                sync_id, duration_ms, item_count, error_count
            ),
        )
    }

    pub fn log_sync_error(
        &self,
        sync_id: &str,
        phase: SyncPhase,
        message: &str,
        error_count: u64,
    ) -> Option<SyncLogEntry> {
        self.log_sync_event(
            LogLevel::Error,
            SyncEvent::new(sync_id, phase, "sync_error").with_errors(error_count),
            format!("Sync {} failed during {}: {}", sync_id, phase, message),
        )
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Chronological history matching `filter`.
    pub fn history(&self, filter: &LogFilter) -> Vec<LogEntry> {
        filter.apply(self.state.lock().history.iter())
    }

    /// Per-level counts over the history matching `filter`.
    pub fn stats(&self, filter: &LogFilter) -> LogStats {
        LogStats::from_entries(&self.history(filter))
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    pub fn clear_history(&self) {
        self.state.lock().history.clear();
    }

    pub fn metrics(&self) -> Vec<PerformanceMetric> {
        let mut metrics: Vec<_> = self.state.lock().metrics.values().cloned().collect();
        metrics.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        metrics
    }

    pub fn clear_metrics(&self) {
        self.state.lock().metrics.clear();
    }

    /// Aggregate sync statistics over the trailing `window`.
    pub fn sync_statistics(&self, window: chrono::Duration) -> SyncStatistics {
        let since = chrono::Utc::now() - window;
        let state = self.state.lock();
        SyncStatistics::from_metrics(state.metrics.values(), since)
    }

    /// History as text, one line per entry.
    pub fn export(&self, filter: &LogFilter) -> String {
        render_text(&self.history(filter))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Persistence
    // ═══════════════════════════════════════════════════════════════════════

    /// Write history (rotated to capacity) and metrics to the store.
    /// A logger without a store does nothing.
    pub fn persist(&self) -> CoreResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let (logs, metrics) = {
            let state = self.state.lock();
            let skip = state.history.len().saturating_sub(self.config.max_history);
            let logs: Vec<&LogEntry> = state.history.iter().skip(skip).collect();
            let metrics: Vec<&PerformanceMetric> = state.metrics.values().collect();
            (serde_json::to_string(&logs)?, serde_json::to_string(&metrics)?)
        };

        store.set(&self.config.logs_key, logs)?;
        store.set(&self.config.metrics_key, metrics)?;
        Ok(())
    }

    /// Load persisted entries ahead of the in-memory history and merge
    /// persisted metrics. Missing or undecodable payloads count as empty.
    /// Returns the number of entries restored.
    pub fn restore(&self) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };

        let logs: Vec<LogEntry> = read_array(store.as_ref(), &self.config.logs_key);
        let metrics: Vec<PerformanceMetric> = read_array(store.as_ref(), &self.config.metrics_key);
        let restored = logs.len();

        let mut state = self.state.lock();
        let current = std::mem::take(&mut state.history);
        state.history = logs.into_iter().chain(current).collect();
        while state.history.len() > self.config.max_history {
            state.history.pop_front();
        }
        for metric in metrics {
            state.metrics.entry(metric.key()).or_insert(metric);
        }
        restored
    }

    /// Remove both persisted collections.
    pub fn clear_persisted(&self) -> CoreResult<()> {
        if let Some(store) = &self.store {
            store.remove(&self.config.logs_key)?;
            store.remove(&self.config.metrics_key)?;
        }
        Ok(())
    }
}

fn read_array<T: serde::de::DeserializeOwned>(store: &dyn LogStore, key: &str) -> Vec<T> {
    match store.get(key) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "Discarding undecodable persisted log data");
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read persisted log data");
            Vec::new()
        }
    }
}

/// Console mirror: one tracing level per log level.
fn mirror(entry: &LogEntry) {
    let category = entry.category.as_str();
    match entry.level {
        LogLevel::Debug => tracing::debug!(category, "{}", entry.message),
        LogLevel::Info => tracing::info!(category, "{}", entry.message),
        LogLevel::Warn => tracing::warn!(category, "{}", entry.message),
        LogLevel::Error => tracing::error!(category, "{}", entry.message),
        LogLevel::Fatal => tracing::error!(category, fatal = true, "{}", entry.message),
    }
}
