//! Read-only query surface over the article store.
//!
//! The validator never writes: it asks the store a fixed set of audit
//! questions ([`Query`]) plus aggregate and sync-metadata lookups. The
//! relational engine behind it belongs to the application; [`MemoryStorage`]
//! is an in-process implementation for embedders and tests.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

mod memory;

pub use memory::{MemoryStorage, StoredArticle};

/// One result row, column name to value.
pub type Row = serde_json::Map<String, Value>;

/// Audit queries the validator issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Article-label rows whose article no longer exists. One row: `{count}`.
    OrphanedArticleLabels,
    /// Article-label rows whose label no longer exists. One row: `{count}`.
    OrphanedLabelLinks,
    /// Modified articles whose sync timestamp postdates their update
    /// timestamp. One row: `{count}`.
    SyncedAfterUpdate,
    /// Modified articles last updated before `cutoff` and never synced.
    /// One row: `{count}`.
    StaleModified { cutoff: DateTime<Utc> },
    /// Live articles with an empty title or URL. One row: `{count}`.
    MissingRequiredFields,
    /// URLs shared by more than one live article. Rows: `{url, count}`.
    DuplicateUrls,
    /// Declared indexes on the article tables. One row: `{count}`.
    IndexCount,
    /// One row: `{total, deleted}`.
    DeletedArticleStats,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Query::OrphanedArticleLabels => "orphaned_article_labels",
            Query::OrphanedLabelLinks => "orphaned_label_links",
            Query::SyncedAfterUpdate => "synced_after_update",
            Query::StaleModified { .. } => "stale_modified",
            Query::MissingRequiredFields => "missing_required_fields",
            Query::DuplicateUrls => "duplicate_urls",
            Query::IndexCount => "index_count",
            Query::DeletedArticleStats => "deleted_article_stats",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_articles: u64,
    pub pending_sync_items: u64,
    pub total_labels: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Synced,
    Failed,
    Conflict,
}

/// Sync bookkeeping row for one local entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadataItem {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub sync_status: SyncStatus,
    pub operation: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncMetadataFilter {
    pub entity_type: Option<String>,
    pub sync_status: Option<SyncStatus>,
}

impl SyncMetadataFilter {
    pub fn status(status: SyncStatus) -> Self {
        Self {
            entity_type: None,
            sync_status: Some(status),
        }
    }

    pub fn matches(&self, item: &SyncMetadataItem) -> bool {
        self.entity_type
            .as_deref()
            .map_or(true, |t| t == item.entity_type)
            && self.sync_status.map_or(true, |s| s == item.sync_status)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncMetadataPage {
    pub total_count: u64,
    pub items: Vec<SyncMetadataItem>,
}

/// The store as the validator sees it.
#[async_trait]
pub trait StorageQuery: Send + Sync {
    async fn execute_query(&self, query: &Query) -> CoreResult<Vec<Row>>;

    async fn aggregate_stats(&self) -> CoreResult<AggregateStats>;

    async fn sync_metadata(&self, filter: &SyncMetadataFilter) -> CoreResult<SyncMetadataPage>;
}

/// Read an unsigned integer column from a row.
pub fn column_u64(row: &Row, column: &str) -> CoreResult<u64> {
    match row.get(column) {
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| CoreError::Query(format!("column '{}' is not a count: {}", column, n))),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| CoreError::Query(format!("column '{}' is not a count: {}", column, s))),
        Some(other) => Err(CoreError::Query(format!(
            "column '{}' is not a count: {}",
            column, other
        ))),
        None => Err(CoreError::Query(format!("missing column '{}'", column))),
    }
}

/// `count` from a single-row count query; no rows counts as zero.
pub async fn query_count(storage: &dyn StorageQuery, query: &Query) -> CoreResult<u64> {
    let rows = storage.execute_query(query).await?;
    match rows.first() {
        Some(row) => column_u64(row, "count"),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_column_u64() {
        assert_eq!(column_u64(&row(json!({"count": 3})), "count").unwrap(), 3);
        assert_eq!(column_u64(&row(json!({"count": "12"})), "count").unwrap(), 12);
        assert!(matches!(
            column_u64(&row(json!({"count": -1})), "count"),
            Err(CoreError::Query(_))
        ));
        assert!(matches!(
            column_u64(&row(json!({})), "count"),
            Err(CoreError::Query(_))
        ));
    }

    #[test]
    fn test_metadata_filter() {
        let item = SyncMetadataItem {
            id: "m1".into(),
            entity_type: "article".into(),
            entity_id: "a1".into(),
            sync_status: SyncStatus::Pending,
            operation: "update".into(),
            updated_at: Utc::now(),
        };

        assert!(SyncMetadataFilter::default().matches(&item));
        assert!(SyncMetadataFilter::status(SyncStatus::Pending).matches(&item));
        assert!(!SyncMetadataFilter::status(SyncStatus::Conflict).matches(&item));

        let other_type = SyncMetadataFilter {
            entity_type: Some("label".into()),
            sync_status: None,
        };
        assert!(!other_type.matches(&item));
    }
}
