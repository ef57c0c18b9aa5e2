//! Whole-operation and resume validation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::article::Article;
use super::integrity::DatabaseIntegrityResult;
use crate::logging::SyncPhase;

/// Operation types with their own duration ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    SingleCreate,
    SingleUpdate,
    SingleDelete,
    BatchCreate,
    BatchUpdate,
    Query,
    FullSync,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::SingleCreate => "single_create",
            OperationKind::SingleUpdate => "single_update",
            OperationKind::SingleDelete => "single_delete",
            OperationKind::BatchCreate => "batch_create",
            OperationKind::BatchUpdate => "batch_update",
            OperationKind::Query => "query",
            OperationKind::FullSync => "full_sync",
        }
    }
}

/// A finished sync operation to validate.
#[derive(Debug, Clone)]
pub struct SyncOperation {
    pub sync_id: String,
    pub kind: OperationKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub record_count: u64,
    /// Local/remote pairs sampled after the operation; their mean
    /// consistency score becomes the operation's consistency score
    pub sampled_pairs: Vec<(Article, Article)>,
}

impl SyncOperation {
    pub fn new(
        sync_id: impl Into<String>,
        kind: OperationKind,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        record_count: u64,
    ) -> Self {
        Self {
            sync_id: sync_id.into(),
            kind,
            started_at,
            ended_at,
            record_count,
            sampled_pairs: Vec::new(),
        }
    }

    pub fn with_samples(mut self, pairs: Vec<(Article, Article)>) -> Self {
        self.sampled_pairs = pairs;
        self
    }

    /// Elapsed milliseconds; negative if the clock ran backwards.
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncValidationResult {
    pub sync_id: String,
    /// True iff `errors` is empty
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub duration_ms: i64,
    pub threshold_ms: u64,
    pub slow_operation: bool,
    pub record_count: u64,
    /// Mean over sampled pairs; 100 when nothing was sampled
    pub consistency_score: u8,
    pub pending_items: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<DatabaseIntegrityResult>,
}

impl SyncValidationResult {
    pub fn failed(operation: &SyncOperation, reason: &str) -> Self {
        Self {
            sync_id: operation.sync_id.clone(),
            is_valid: false,
            errors: vec![format!("Sync validation failed: {}", reason)],
            warnings: Vec::new(),
            duration_ms: operation.duration_ms(),
            threshold_ms: 0,
            slow_operation: false,
            record_count: operation.record_count,
            consistency_score: 0,
            pending_items: 0,
            integrity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResumeValidationResult {
    /// True iff `blockers` is empty
    pub can_resume: bool,
    /// Parsed resume point, if it named a known phase
    pub resume_phase: Option<SyncPhase>,
    pub pending_operations: u64,
    pub blockers: Vec<String>,
    pub recommendations: Vec<String>,
}

impl SyncResumeValidationResult {
    pub fn failed(reason: &str) -> Self {
        Self {
            can_resume: false,
            resume_phase: None,
            pending_operations: 0,
            blockers: vec![format!("Resume validation failed: {}", reason)],
            recommendations: vec!["Restart the sync from the beginning".to_string()],
        }
    }
}
