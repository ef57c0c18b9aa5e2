//! The sync validator: storage-backed entry points with logging and
//! failure conversion.

use std::sync::Arc;

use serde_json::json;

use super::article::{compare_articles, Article, ConsistencyOptions, ConsistencyValidationResult};
use super::clamp_score;
use super::conflict::{score_resolution, ConflictResolutionResult, ResolutionStrategy};
use super::integrity::{audit_database, DatabaseIntegrityResult, IntegrityOptions};
use super::operation::{SyncOperation, SyncResumeValidationResult, SyncValidationResult};
use crate::config::ValidatorConfig;
use crate::error::{CoreError, CoreResult};
use crate::fault::{AppError, ErrorContext, ErrorHandler, ErrorOptions};
use crate::logging::{LogCategory, LogLevel, StructuredLogger, SyncEvent, SyncPhase};
use crate::storage::{StorageQuery, SyncMetadataFilter, SyncStatus};

/// Read-only validator over a [`StorageQuery`] surface.
///
/// Every public method returns a result record; collaborator failures are
/// routed through the [`ErrorHandler`] and turned into a failed record.
pub struct SyncValidator {
    storage: Arc<dyn StorageQuery>,
    logger: Arc<StructuredLogger>,
    errors: Arc<ErrorHandler>,
    config: ValidatorConfig,
}

impl SyncValidator {
    pub fn new(
        storage: Arc<dyn StorageQuery>,
        logger: Arc<StructuredLogger>,
        errors: Arc<ErrorHandler>,
        config: ValidatorConfig,
    ) -> Self {
        Self {
            storage,
            logger,
            errors,
            config,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Article consistency
    // ═══════════════════════════════════════════════════════════════════════

    pub fn validate_article_consistency(
        &self,
        local: &Article,
        remote: &Article,
        options: &ConsistencyOptions,
    ) -> ConsistencyValidationResult {
        match compare_articles(local, remote, options, &self.config) {
            Ok(result) => {
                let level = if result.is_consistent {
                    LogLevel::Debug
                } else {
                    LogLevel::Warn
                };
                self.logger.log(
                    level,
                    LogCategory::Sync,
                    format!("Article {} consistency score {}", local.id, result.score),
                    Some(json!({
                        "articleId": local.id,
                        "differences": result.differences.len(),
                        "criticalDifferences": result.critical_differences.len(),
                    })),
                );
                result
            }
            Err(err) => {
                let reason = err.to_string();
                self.report(err, "validate_article_consistency", None);
                ConsistencyValidationResult::failed(&reason)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Database integrity
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn validate_database_integrity(
        &self,
        options: &IntegrityOptions,
    ) -> DatabaseIntegrityResult {
        let timer_id = format!("integrity_audit_{}", ulid::Ulid::new());
        self.logger.start_performance_timer(&timer_id, None);
        let outcome = audit_database(self.storage.as_ref(), options, &self.config).await;
        self.logger.end_performance_timer(&timer_id);

        match outcome {
            Ok(result) => {
                if result.is_integral {
                    self.logger.log(
                        LogLevel::Info,
                        LogCategory::Db,
                        format!("Integrity audit passed with score {}", result.score),
                        None,
                    );
                } else {
                    self.logger.log(
                        LogLevel::Warn,
                        LogCategory::Db,
                        format!(
                            "Integrity audit found {} issue(s), score {}",
                            result.issues.len(),
                            result.score
                        ),
                        serde_json::to_value(&result.issues).ok(),
                    );
                }
                result
            }
            Err(err) => {
                let reason = err.to_string();
                self.report(err, "validate_database_integrity", None);
                DatabaseIntegrityResult::failed(&reason)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Conflict resolution
    // ═══════════════════════════════════════════════════════════════════════

    pub fn validate_conflict_resolution(
        &self,
        local: &Article,
        remote: &Article,
        resolved: &Article,
        strategy: ResolutionStrategy,
    ) -> ConflictResolutionResult {
        match score_resolution(local, remote, resolved, strategy) {
            Ok(result) => {
                let level = if result.data_loss {
                    LogLevel::Warn
                } else {
                    LogLevel::Info
                };
                self.logger.log(
                    level,
                    LogCategory::Sync,
                    format!(
                        "Conflict on {} resolved with {} (confidence {})",
                        resolved.id, strategy, result.confidence
                    ),
                    Some(json!({
                        "appliedChanges": result.applied_changes,
                        "dataLoss": result.data_loss,
                    })),
                );
                result
            }
            Err(err) => {
                let reason = err.to_string();
                self.report(err, "validate_conflict_resolution", None);
                ConflictResolutionResult::failed(strategy, &reason)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Resume
    // ═══════════════════════════════════════════════════════════════════════

    /// Decide whether an interrupted sync can continue from `resume_point`.
    ///
    /// The running-sync check is advisory; it does not lock anything.
    pub async fn validate_sync_resume(
        &self,
        resume_point: &str,
        expected_operations: Option<u64>,
    ) -> SyncResumeValidationResult {
        match self.check_resume(resume_point, expected_operations).await {
            Ok(result) => {
                let level = if result.can_resume {
                    LogLevel::Info
                } else {
                    LogLevel::Warn
                };
                self.logger.log(
                    level,
                    LogCategory::Sync,
                    format!(
                        "Resume at '{}' {}",
                        resume_point,
                        if result.can_resume { "allowed" } else { "blocked" }
                    ),
                    Some(json!({
                        "blockers": result.blockers,
                        "pendingOperations": result.pending_operations,
                    })),
                );
                result
            }
            Err(err) => {
                let reason = err.to_string();
                self.report(err, "validate_sync_resume", None);
                SyncResumeValidationResult::failed(&reason)
            }
        }
    }

    async fn check_resume(
        &self,
        resume_point: &str,
        expected_operations: Option<u64>,
    ) -> CoreResult<SyncResumeValidationResult> {
        let mut blockers = Vec::new();
        let mut recommendations = Vec::new();

        let running = self.count_metadata(SyncStatus::Syncing).await?;
        if running > 0 {
            blockers.push(format!(
                "A sync is already running ({} items in progress)",
                running
            ));
        }

        let resume_phase = match resume_point.parse::<SyncPhase>() {
            Ok(phase) => Some(phase),
            Err(err) => {
                blockers.push(err.to_string());
                None
            }
        };

        let integrity =
            audit_database(self.storage.as_ref(), &IntegrityOptions::resume_gate(), &self.config)
                .await?;
        if !integrity.is_integral {
            recommendations.push(format!(
                "Integrity audit found {} issue(s); repair before resuming",
                integrity.issues.len()
            ));
            recommendations.extend(integrity.recommendations);
        }

        let pending = self.count_metadata(SyncStatus::Pending).await?;
        if let Some(expected) = expected_operations {
            if expected != pending {
                recommendations.push(format!(
                    "Expected {} pending operations but storage has {}; rebuild the queue before resuming",
                    expected, pending
                ));
            }
        }

        if resume_phase == Some(SyncPhase::ResolvingConflicts)
            && self.count_metadata(SyncStatus::Conflict).await? == 0
        {
            recommendations
                .push("No conflicts are recorded; skip the resolving_conflicts phase".to_string());
        }

        Ok(SyncResumeValidationResult {
            can_resume: blockers.is_empty(),
            resume_phase,
            pending_operations: pending,
            blockers,
            recommendations,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Whole operation
    // ═══════════════════════════════════════════════════════════════════════

    /// Performance, integrity, pending-row and sampled-consistency checks
    /// for one finished operation. Valid iff no check produced an error.
    pub async fn validate_sync_operation(&self, operation: &SyncOperation) -> SyncValidationResult {
        match self.check_operation(operation).await {
            Ok(result) => {
                let level = if result.is_valid {
                    LogLevel::Info
                } else {
                    LogLevel::Error
                };
                self.logger.log_sync_event(
                    level,
                    SyncEvent::new(
                        &operation.sync_id,
                        SyncPhase::Finalizing,
                        operation.kind.as_str(),
                    )
                    .with_items(operation.record_count)
                    .with_errors(result.errors.len() as u64)
                    .with_duration(result.duration_ms.max(0) as f64),
                    format!(
                        "Sync {} validation {}",
                        operation.sync_id,
                        if result.is_valid { "passed" } else { "failed" }
                    ),
                );
                result
            }
            Err(err) => {
                let reason = err.to_string();
                self.report(err, "validate_sync_operation", Some(&operation.sync_id));
                SyncValidationResult::failed(operation, &reason)
            }
        }
    }

    async fn check_operation(&self, operation: &SyncOperation) -> CoreResult<SyncValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let duration_ms = operation.duration_ms();
        let threshold_ms = self.config.thresholds.for_kind(operation.kind);
        if duration_ms < 0 {
            errors.push("Operation ended before it started".to_string());
        }
        let slow_operation = duration_ms > threshold_ms as i64;
        if slow_operation {
            let message = format!(
                "Slow operation: {} took {}ms (threshold {}ms)",
                operation.kind.as_str(),
                duration_ms,
                threshold_ms
            );
            self.logger.log(
                LogLevel::Warn,
                LogCategory::Performance,
                message.clone(),
                Some(json!({
                    "syncId": operation.sync_id,
                    "recordCount": operation.record_count,
                })),
            );
            warnings.push(message);
        }

        let mut scores = Vec::with_capacity(operation.sampled_pairs.len());
        for (local, remote) in &operation.sampled_pairs {
            match compare_articles(local, remote, &ConsistencyOptions::default(), &self.config) {
                Ok(result) => {
                    if !result.is_consistent {
                        errors.push(format!("Article {} is inconsistent after sync", local.id));
                    }
                    scores.push(f64::from(result.score));
                }
                // An uncomparable pair counts as fully inconsistent.
                Err(err) => {
                    errors.push(format!("Article {} could not be compared: {}", local.id, err));
                    self.report(err, "validate_sync_operation", Some(&operation.sync_id));
                    scores.push(0.0);
                }
            }
        }
        let consistency_score = if scores.is_empty() {
            100
        } else {
            clamp_score(scores.iter().sum::<f64>() / scores.len() as f64)
        };

        let integrity =
            audit_database(self.storage.as_ref(), &IntegrityOptions::default(), &self.config)
                .await?;
        errors.extend(integrity.issues.iter().map(|issue| issue.description.clone()));

        let pending_items = self.count_metadata(SyncStatus::Pending).await?;
        if pending_items > 0 {
            errors.push(format!("{} sync metadata rows are still pending", pending_items));
        }

        Ok(SyncValidationResult {
            sync_id: operation.sync_id.clone(),
            is_valid: errors.is_empty(),
            errors,
            warnings,
            duration_ms,
            threshold_ms,
            slow_operation,
            record_count: operation.record_count,
            consistency_score,
            pending_items,
            integrity: Some(integrity),
        })
    }

    async fn count_metadata(&self, status: SyncStatus) -> CoreResult<u64> {
        Ok(self
            .storage
            .sync_metadata(&SyncMetadataFilter::status(status))
            .await?
            .total_count)
    }

    fn report(&self, err: CoreError, action: &str, sync_id: Option<&str>) -> AppError {
        self.errors.handle_error(
            err,
            ErrorOptions::new().context(ErrorContext {
                action: Some(action.to_string()),
                sync_id: sync_id.map(str::to_owned),
                ..ErrorContext::default()
            }),
        )
    }
}
