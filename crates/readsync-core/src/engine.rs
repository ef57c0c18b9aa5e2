//! Composition root: one logger, one error handler, one validator.

use std::path::Path;
use std::sync::Arc;

use crate::config::CoreConfig;
use crate::error::CoreResult;
use crate::fault::{ErrorHandler, ReportSink};
use crate::logging::{BreadcrumbLayer, LogStore, RedbLogStore, StructuredLogger};
use crate::storage::StorageQuery;
use crate::validation::SyncValidator;

/// The diagnostics services of a sync client, built once at startup and
/// shared by reference.
///
/// ```ignore
/// use std::sync::Arc;
/// use readsync_core::{CoreConfig, MemoryStorage, SyncDiagnostics};
/// use tracing_subscriber::prelude::*;
///
/// let diagnostics = SyncDiagnostics::builder(Arc::new(MemoryStorage::new()))
///     .config(CoreConfig::default())
///     .persist_to("./data/logs.redb")?
///     .build();
///
/// tracing_subscriber::registry()
///     .with(diagnostics.breadcrumb_layer())
///     .with(tracing_subscriber::fmt::layer())
///     .init();
///
/// let report = diagnostics.validator().validate_database_integrity(&Default::default()).await;
/// ```
pub struct SyncDiagnostics {
    logger: Arc<StructuredLogger>,
    errors: Arc<ErrorHandler>,
    validator: Arc<SyncValidator>,
}

impl SyncDiagnostics {
    pub fn builder(storage: Arc<dyn StorageQuery>) -> SyncDiagnosticsBuilder {
        SyncDiagnosticsBuilder {
            storage,
            config: CoreConfig::default(),
            log_store: None,
            sink: None,
        }
    }

    pub fn logger(&self) -> &Arc<StructuredLogger> {
        &self.logger
    }

    pub fn errors(&self) -> &Arc<ErrorHandler> {
        &self.errors
    }

    pub fn validator(&self) -> &Arc<SyncValidator> {
        &self.validator
    }

    /// Layer feeding WARN/ERROR `tracing` events into the breadcrumb trail.
    pub fn breadcrumb_layer(&self) -> BreadcrumbLayer {
        BreadcrumbLayer::new(self.errors.breadcrumb_handle())
    }

    /// Persist log history and metrics, if a store is attached.
    pub fn flush(&self) -> CoreResult<()> {
        self.logger.persist()
    }
}

pub struct SyncDiagnosticsBuilder {
    storage: Arc<dyn StorageQuery>,
    config: CoreConfig,
    log_store: Option<Arc<dyn LogStore>>,
    sink: Option<Arc<dyn ReportSink>>,
}

impl SyncDiagnosticsBuilder {
    pub fn config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn log_store(mut self, store: Arc<dyn LogStore>) -> Self {
        self.log_store = Some(store);
        self
    }

    /// Persist logs to a redb file at `path`.
    pub fn persist_to(self, path: impl AsRef<Path>) -> CoreResult<Self> {
        let store = RedbLogStore::open(path)?;
        Ok(self.log_store(Arc::new(store)))
    }

    pub fn report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Wire the components together. With a log store attached, previously
    /// persisted history is restored first.
    pub fn build(self) -> SyncDiagnostics {
        let mut logger = StructuredLogger::new(self.config.logger.clone());
        if let Some(store) = self.log_store {
            logger = logger.with_store(store);
        }
        let restored = logger.restore();
        let logger = Arc::new(logger);

        let mut errors = ErrorHandler::new(logger.clone(), &self.config.errors);
        if let Some(sink) = self.sink {
            errors = errors.with_sink(sink);
        }
        let session_id = errors.session_id().to_string();
        logger.set_context(|context| context.session_id = Some(session_id));
        let errors = Arc::new(errors);

        let validator = Arc::new(SyncValidator::new(
            self.storage,
            logger.clone(),
            errors.clone(),
            self.config.validator,
        ));

        tracing::debug!(restored, "Sync diagnostics ready");

        SyncDiagnostics {
            logger,
            errors,
            validator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogCategory, LogFilter, MemoryLogStore};
    use crate::storage::MemoryStorage;

    #[test]
    fn test_session_id_is_stamped_on_entries() {
        let diagnostics = SyncDiagnostics::builder(Arc::new(MemoryStorage::new())).build();

        let entry = diagnostics
            .logger()
            .info(LogCategory::General, "started")
            .unwrap();

        assert_eq!(
            entry.context.session_id.as_deref(),
            Some(diagnostics.errors().session_id())
        );
    }

    #[test]
    fn test_history_survives_rebuild() {
        let store: Arc<dyn LogStore> = Arc::new(MemoryLogStore::new());

        let first = SyncDiagnostics::builder(Arc::new(MemoryStorage::new()))
            .log_store(store.clone())
            .build();
        first.logger().warn(LogCategory::Sync, "upload retried");
        first.flush().unwrap();

        let second = SyncDiagnostics::builder(Arc::new(MemoryStorage::new()))
            .log_store(store)
            .build();
        let history = second.logger().history(&LogFilter::default());
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "upload retried");
    }
}
