//! Sync consistency and integrity validation.
//!
//! Pure checks live in the submodules ([`compare_articles`],
//! [`audit_database`], [`score_resolution`]); [`SyncValidator`] wires them
//! to storage, the structured logger and the error handler, and never lets
//! a collaborator failure escape as an `Err`.
//!
//! All scores are integers clamped to 0..=100.

mod article;
mod conflict;
mod integrity;
mod operation;
mod validator;

pub use article::{
    compare_articles, consistency_score, content_similarity, Article, ConsistencyOptions,
    ConsistencyValidationResult, FieldDifference,
};
pub use conflict::{score_resolution, ConflictResolutionResult, ResolutionStrategy};
pub use integrity::{
    audit_database, integrity_score, DatabaseIntegrityResult, IntegrityIssue, IntegrityIssueKind,
    IntegrityOptions, PerformanceIssue, PerformanceIssueKind,
};
pub use operation::{
    OperationKind, SyncOperation, SyncResumeValidationResult, SyncValidationResult,
};
pub use validator::SyncValidator;

/// Round and clamp a raw score into 0..=100.
pub(crate) fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}
