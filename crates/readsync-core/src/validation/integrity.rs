//! Stored-data integrity audit.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::clamp_score;
use crate::config::ValidatorConfig;
use crate::error::CoreResult;
use crate::storage::{column_u64, query_count, AggregateStats, Query, StorageQuery};

/// Checks counted in the score denominator.
const CHECKS: f64 = 8.0;

/// Which audit checks to run. All on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityOptions {
    pub orphans: bool,
    pub sync_state: bool,
    pub required_fields: bool,
    pub duplicates: bool,
    pub performance: bool,
}

impl Default for IntegrityOptions {
    fn default() -> Self {
        Self {
            orphans: true,
            sync_state: true,
            required_fields: true,
            duplicates: true,
            performance: true,
        }
    }
}

impl IntegrityOptions {
    /// The subset checked before resuming a sync.
    pub fn resume_gate() -> Self {
        Self {
            orphans: true,
            sync_state: true,
            required_fields: false,
            duplicates: false,
            performance: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityIssueKind {
    OrphanedRelationships,
    SyncedAfterUpdate,
    StaleModification,
    MissingRequiredFields,
    DuplicateUrls,
    /// The audit itself could not complete
    AuditFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceIssueKind {
    MissingIndexes,
    Fragmentation,
    ExcessDeletedRows,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityIssue {
    pub kind: IntegrityIssueKind,
    pub description: String,
    pub affected_rows: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceIssue {
    pub kind: PerformanceIssueKind,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseIntegrityResult {
    /// True iff `issues` is empty; performance issues do not count
    pub is_integral: bool,
    pub issues: Vec<IntegrityIssue>,
    pub performance_issues: Vec<PerformanceIssue>,
    /// 0 to 100
    pub score: u8,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<AggregateStats>,
}

impl DatabaseIntegrityResult {
    pub fn failed(reason: &str) -> Self {
        Self {
            is_integral: false,
            issues: vec![IntegrityIssue {
                kind: IntegrityIssueKind::AuditFailed,
                description: format!("Integrity audit failed: {}", reason),
                affected_rows: 0,
            }],
            performance_issues: Vec::new(),
            score: 0,
            recommendations: vec!["Retry the integrity audit once storage is available".to_string()],
            stats: None,
        }
    }
}

/// `max(0, round((8 - (issues + 0.5 * performance_issues)) / 8 * 100))`
pub fn integrity_score(issues: usize, performance_issues: usize) -> u8 {
    let penalty = issues as f64 + 0.5 * performance_issues as f64;
    clamp_score((CHECKS - penalty) / CHECKS * 100.0)
}

/// Run the selected checks against `storage`.
pub async fn audit_database(
    storage: &dyn StorageQuery,
    options: &IntegrityOptions,
    config: &ValidatorConfig,
) -> CoreResult<DatabaseIntegrityResult> {
    let mut issues = Vec::new();
    let mut performance_issues = Vec::new();
    let mut recommendations = Vec::new();

    if options.orphans {
        let orphaned_articles = query_count(storage, &Query::OrphanedArticleLabels).await?;
        let orphaned_labels = query_count(storage, &Query::OrphanedLabelLinks).await?;
        let total = orphaned_articles + orphaned_labels;
        if total > 0 {
            issues.push(IntegrityIssue {
                kind: IntegrityIssueKind::OrphanedRelationships,
                description: format!(
                    "{} orphaned article-label relationships ({} missing article, {} missing label)",
                    total, orphaned_articles, orphaned_labels
                ),
                affected_rows: total,
            });
            recommendations.push("Remove orphaned article-label rows".to_string());
        }
    }

    if options.sync_state {
        let ahead = query_count(storage, &Query::SyncedAfterUpdate).await?;
        if ahead > 0 {
            issues.push(IntegrityIssue {
                kind: IntegrityIssueKind::SyncedAfterUpdate,
                description: format!(
                    "{} modified articles have a sync timestamp later than their update timestamp",
                    ahead
                ),
                affected_rows: ahead,
            });
            recommendations.push("Reset the modified flag on already-synced articles".to_string());
        }

        let cutoff = Utc::now() - Duration::seconds(config.stale_after_secs);
        let stale = query_count(storage, &Query::StaleModified { cutoff }).await?;
        if stale > 0 {
            issues.push(IntegrityIssue {
                kind: IntegrityIssueKind::StaleModification,
                description: format!(
                    "{} articles modified over {}s ago were never synced",
                    stale, config.stale_after_secs
                ),
                affected_rows: stale,
            });
            recommendations.push("Run a full sync to push stale local changes".to_string());
        }
    }

    if options.required_fields {
        let missing = query_count(storage, &Query::MissingRequiredFields).await?;
        if missing > 0 {
            issues.push(IntegrityIssue {
                kind: IntegrityIssueKind::MissingRequiredFields,
                description: format!("{} articles are missing a title or URL", missing),
                affected_rows: missing,
            });
            recommendations.push("Refetch articles with missing fields from the server".to_string());
        }
    }

    if options.duplicates {
        let rows = storage.execute_query(&Query::DuplicateUrls).await?;
        if !rows.is_empty() {
            let mut affected = 0;
            for row in &rows {
                affected += column_u64(row, "count")?;
            }
            issues.push(IntegrityIssue {
                kind: IntegrityIssueKind::DuplicateUrls,
                description: format!(
                    "{} URLs are shared by {} live articles",
                    rows.len(),
                    affected
                ),
                affected_rows: affected,
            });
            recommendations.push("Merge duplicate articles".to_string());
        }
    }

    if options.performance {
        audit_performance(storage, config, &mut performance_issues, &mut recommendations).await?;
    }

    let stats = storage.aggregate_stats().await?;
    if stats.total_articles > config.large_library_threshold {
        recommendations.push(format!(
            "Large library ({} articles); consider archiving or paginated sync",
            stats.total_articles
        ));
    }
    if stats.pending_sync_items > config.pending_backlog_threshold {
        recommendations.push(format!(
            "{} items pending sync; sync more often or in larger batches",
            stats.pending_sync_items
        ));
    }

    Ok(DatabaseIntegrityResult {
        is_integral: issues.is_empty(),
        score: integrity_score(issues.len(), performance_issues.len()),
        issues,
        performance_issues,
        recommendations,
        stats: Some(stats),
    })
}

async fn audit_performance(
    storage: &dyn StorageQuery,
    config: &ValidatorConfig,
    issues: &mut Vec<PerformanceIssue>,
    recommendations: &mut Vec<String>,
) -> CoreResult<()> {
    let indexes = query_count(storage, &Query::IndexCount).await?;
    if indexes < config.min_index_count {
        issues.push(PerformanceIssue {
            kind: PerformanceIssueKind::MissingIndexes,
            description: format!(
                "Only {} indexes declared, expected at least {}",
                indexes, config.min_index_count
            ),
        });
        recommendations.push("Recreate the article indexes".to_string());
    }

    let rows = storage.execute_query(&Query::DeletedArticleStats).await?;
    let (total, deleted) = match rows.first() {
        Some(row) => (column_u64(row, "total")?, column_u64(row, "deleted")?),
        None => (0, 0),
    };
    if total > 0 && deleted as f64 / total as f64 > config.fragmentation_ratio {
        issues.push(PerformanceIssue {
            kind: PerformanceIssueKind::Fragmentation,
            description: format!("{} of {} article rows are soft-deleted", deleted, total),
        });
        recommendations.push("Purge soft-deleted articles and compact the database".to_string());
    }
    if deleted > config.max_deleted_rows {
        issues.push(PerformanceIssue {
            kind: PerformanceIssueKind::ExcessDeletedRows,
            description: format!(
                "{} soft-deleted rows exceed the ceiling of {}",
                deleted, config.max_deleted_rows
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, StoredArticle};

    fn healthy() -> MemoryStorage {
        let storage = MemoryStorage::new().with_default_indexes();
        storage.insert_article(StoredArticle::new("a1", "https://x.test/1", "One"));
        storage.insert_article(StoredArticle::new("a2", "https://x.test/2", "Two"));
        storage.insert_label("l1", "rust");
        storage.link("a1", "l1");
        storage
    }

    #[test]
    fn test_score_formula() {
        assert_eq!(integrity_score(0, 0), 100);
        assert_eq!(integrity_score(1, 0), 88);
        assert_eq!(integrity_score(1, 1), 81);
        assert_eq!(integrity_score(9, 0), 0);
    }

    #[tokio::test]
    async fn test_healthy_store() {
        let storage = healthy();
        let result = audit_database(&storage, &IntegrityOptions::default(), &ValidatorConfig::default())
            .await
            .unwrap();

        assert!(result.is_integral);
        assert!(result.issues.is_empty());
        assert!(result.performance_issues.is_empty());
        assert_eq!(result.score, 100);
        assert_eq!(result.stats.unwrap().total_articles, 2);
    }

    #[tokio::test]
    async fn test_performance_issues_do_not_break_integrity() {
        let storage = MemoryStorage::new();
        storage.insert_article(StoredArticle::new("a1", "https://x.test/1", "One"));
        storage.insert_article(StoredArticle::new("a2", "https://x.test/2", "Two").deleted(Utc::now()));

        let result = audit_database(&storage, &IntegrityOptions::default(), &ValidatorConfig::default())
            .await
            .unwrap();

        assert!(result.is_integral);
        let kinds: Vec<_> = result.performance_issues.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![PerformanceIssueKind::MissingIndexes, PerformanceIssueKind::Fragmentation]
        );
        assert_eq!(result.score, 88);
    }

    #[tokio::test]
    async fn test_disabled_checks_are_skipped() {
        let storage = healthy();
        storage.insert_article(StoredArticle::new("a3", "https://x.test/1", ""));

        let result = audit_database(
            &storage,
            &IntegrityOptions::resume_gate(),
            &ValidatorConfig::default(),
        )
        .await
        .unwrap();
        assert!(result.is_integral);

        let full = audit_database(&storage, &IntegrityOptions::default(), &ValidatorConfig::default())
            .await
            .unwrap();
        let kinds: Vec<_> = full.issues.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![IntegrityIssueKind::MissingRequiredFields, IntegrityIssueKind::DuplicateUrls]
        );
    }

    #[tokio::test]
    async fn test_capacity_recommendations_are_not_issues() {
        let storage = healthy();
        let config = ValidatorConfig {
            large_library_threshold: 1,
            ..ValidatorConfig::default()
        };

        let result = audit_database(&storage, &IntegrityOptions::default(), &config)
            .await
            .unwrap();

        assert!(result.is_integral);
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.starts_with("Large library")));
    }
}
