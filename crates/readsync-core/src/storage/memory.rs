//! In-process [`StorageQuery`] implementation.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::json;

use super::{
    AggregateStats, Query, Row, StorageQuery, SyncMetadataFilter, SyncMetadataItem,
    SyncMetadataPage, SyncStatus,
};
use crate::error::CoreResult;

/// Article row as the store keeps it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredArticle {
    pub id: String,
    pub url: String,
    pub title: String,
    /// Local changes not yet pushed
    pub is_modified: bool,
    pub updated_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StoredArticle {
    pub fn new(id: impl Into<String>, url: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            url: url.into(),
            title: title.into(),
            is_modified: false,
            updated_at: now,
            synced_at: Some(now),
            deleted_at: None,
        }
    }

    pub fn modified(mut self, updated_at: DateTime<Utc>, synced_at: Option<DateTime<Utc>>) -> Self {
        self.is_modified = true;
        self.updated_at = updated_at;
        self.synced_at = synced_at;
        self
    }

    pub fn deleted(mut self, at: DateTime<Utc>) -> Self {
        self.deleted_at = Some(at);
        self
    }

    fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[derive(Default)]
struct MemoryState {
    articles: BTreeMap<String, StoredArticle>,
    labels: BTreeMap<String, String>,
    article_labels: Vec<(String, String)>,
    metadata: Vec<SyncMetadataItem>,
    indexes: HashSet<String>,
}

/// Articles, labels, join rows, sync metadata and declared indexes held in
/// memory. Rows are not cross-checked on insert, so orphans can be staged.
#[derive(Default)]
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_article(&self, article: StoredArticle) {
        self.state
            .write()
            .articles
            .insert(article.id.clone(), article);
    }

    pub fn remove_article(&self, id: &str) -> Option<StoredArticle> {
        self.state.write().articles.remove(id)
    }

    pub fn insert_label(&self, id: impl Into<String>, name: impl Into<String>) {
        self.state.write().labels.insert(id.into(), name.into());
    }

    pub fn remove_label(&self, id: &str) -> Option<String> {
        self.state.write().labels.remove(id)
    }

    pub fn link(&self, article_id: impl Into<String>, label_id: impl Into<String>) {
        self.state
            .write()
            .article_labels
            .push((article_id.into(), label_id.into()));
    }

    pub fn insert_metadata(&self, item: SyncMetadataItem) {
        self.state.write().metadata.push(item);
    }

    /// Set the status of every metadata row for `entity_id`.
    pub fn set_sync_status(&self, entity_id: &str, status: SyncStatus) {
        for item in self
            .state
            .write()
            .metadata
            .iter_mut()
            .filter(|m| m.entity_id == entity_id)
        {
            item.sync_status = status;
            item.updated_at = Utc::now();
        }
    }

    pub fn add_index(&self, name: impl Into<String>) {
        self.state.write().indexes.insert(name.into());
    }

    /// Indexes a production article schema declares.
    pub fn with_default_indexes(self) -> Self {
        for name in [
            "idx_articles_url",
            "idx_articles_updated_at",
            "idx_articles_is_modified",
            "idx_articles_deleted_at",
            "idx_article_labels_article",
            "idx_article_labels_label",
            "idx_sync_metadata_status",
        ] {
            self.add_index(name);
        }
        self
    }
}

fn count_row(count: usize) -> Row {
    let mut row = Row::new();
    row.insert("count".to_string(), json!(count));
    row
}

impl MemoryState {
    fn run(&self, query: &Query) -> Vec<Row> {
        match query {
            Query::OrphanedArticleLabels => vec![count_row(
                self.article_labels
                    .iter()
                    .filter(|(article, _)| !self.articles.contains_key(article))
                    .count(),
            )],
            Query::OrphanedLabelLinks => vec![count_row(
                self.article_labels
                    .iter()
                    .filter(|(_, label)| !self.labels.contains_key(label))
                    .count(),
            )],
            Query::SyncedAfterUpdate => vec![count_row(
                self.articles
                    .values()
                    .filter(|a| a.is_modified)
                    .filter(|a| a.synced_at.is_some_and(|s| s > a.updated_at))
                    .count(),
            )],
            Query::StaleModified { cutoff } => vec![count_row(
                self.articles
                    .values()
                    .filter(|a| a.is_modified && a.synced_at.is_none() && a.updated_at < *cutoff)
                    .count(),
            )],
            Query::MissingRequiredFields => vec![count_row(
                self.articles
                    .values()
                    .filter(|a| a.is_live())
                    .filter(|a| a.title.trim().is_empty() || a.url.trim().is_empty())
                    .count(),
            )],
            Query::DuplicateUrls => {
                let mut by_url: BTreeMap<&str, usize> = BTreeMap::new();
                for article in self.articles.values().filter(|a| a.is_live()) {
                    *by_url.entry(article.url.as_str()).or_default() += 1;
                }
                by_url
                    .into_iter()
                    .filter(|(_, count)| *count > 1)
                    .map(|(url, count)| {
                        let mut row = Row::new();
                        row.insert("url".to_string(), json!(url));
                        row.insert("count".to_string(), json!(count));
                        row
                    })
                    .collect()
            }
            Query::IndexCount => vec![count_row(self.indexes.len())],
            Query::DeletedArticleStats => {
                let deleted = self.articles.values().filter(|a| !a.is_live()).count();
                let mut row = Row::new();
                row.insert("total".to_string(), json!(self.articles.len()));
                row.insert("deleted".to_string(), json!(deleted));
                vec![row]
            }
        }
    }
}

#[async_trait]
impl StorageQuery for MemoryStorage {
    async fn execute_query(&self, query: &Query) -> CoreResult<Vec<Row>> {
        Ok(self.state.read().run(query))
    }

    async fn aggregate_stats(&self) -> CoreResult<AggregateStats> {
        let state = self.state.read();
        Ok(AggregateStats {
            total_articles: state.articles.values().filter(|a| a.is_live()).count() as u64,
            pending_sync_items: state
                .metadata
                .iter()
                .filter(|m| m.sync_status == SyncStatus::Pending)
                .count() as u64,
            total_labels: state.labels.len() as u64,
        })
    }

    async fn sync_metadata(&self, filter: &SyncMetadataFilter) -> CoreResult<SyncMetadataPage> {
        let items: Vec<SyncMetadataItem> = self
            .state
            .read()
            .metadata
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        Ok(SyncMetadataPage {
            total_count: items.len() as u64,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{column_u64, query_count};
    use chrono::Duration;

    fn metadata(entity_id: &str, status: SyncStatus) -> SyncMetadataItem {
        SyncMetadataItem {
            id: format!("meta_{}", entity_id),
            entity_type: "article".to_string(),
            entity_id: entity_id.to_string(),
            sync_status: status,
            operation: "update".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_orphan_queries() {
        let storage = MemoryStorage::new();
        storage.insert_article(StoredArticle::new("a1", "https://x.test/1", "One"));
        storage.insert_label("l1", "rust");
        storage.link("a1", "l1");
        storage.link("gone", "l1");
        storage.link("a1", "missing");

        assert_eq!(query_count(&storage, &Query::OrphanedArticleLabels).await.unwrap(), 1);
        assert_eq!(query_count(&storage, &Query::OrphanedLabelLinks).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_removals_leave_links_orphaned() {
        let storage = MemoryStorage::new();
        storage.insert_article(StoredArticle::new("a1", "https://x.test/1", "One"));
        storage.insert_article(StoredArticle::new("a2", "https://x.test/2", "Two"));
        storage.insert_label("l1", "rust");
        storage.link("a1", "l1");
        storage.link("a2", "l1");

        assert!(storage.remove_article("a2").is_some());
        assert!(storage.remove_article("a2").is_none());
        assert_eq!(query_count(&storage, &Query::OrphanedArticleLabels).await.unwrap(), 1);

        assert_eq!(storage.remove_label("l1").as_deref(), Some("rust"));
        assert_eq!(query_count(&storage, &Query::OrphanedLabelLinks).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sync_state_queries() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        storage.insert_article(
            StoredArticle::new("ahead", "https://x.test/1", "Ahead")
                .modified(now - Duration::minutes(5), Some(now)),
        );
        storage.insert_article(
            StoredArticle::new("stale", "https://x.test/2", "Stale")
                .modified(now - Duration::hours(3), None),
        );
        storage.insert_article(
            StoredArticle::new("fresh", "https://x.test/3", "Fresh")
                .modified(now - Duration::minutes(1), None),
        );

        assert_eq!(query_count(&storage, &Query::SyncedAfterUpdate).await.unwrap(), 1);
        let cutoff = now - Duration::hours(1);
        assert_eq!(
            query_count(&storage, &Query::StaleModified { cutoff }).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_duplicates_ignore_deleted_rows() {
        let storage = MemoryStorage::new();
        storage.insert_article(StoredArticle::new("a1", "https://x.test/dup", "One"));
        storage.insert_article(StoredArticle::new("a2", "https://x.test/dup", "Two"));
        storage.insert_article(
            StoredArticle::new("a3", "https://x.test/gone", "Three").deleted(Utc::now()),
        );
        storage.insert_article(StoredArticle::new("a4", "https://x.test/gone", "Four"));

        let rows = storage.execute_query(&Query::DuplicateUrls).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["url"], "https://x.test/dup");
        assert_eq!(column_u64(&rows[0], "count").unwrap(), 2);

        let stats = storage
            .execute_query(&Query::DeletedArticleStats)
            .await
            .unwrap();
        assert_eq!(column_u64(&stats[0], "total").unwrap(), 4);
        assert_eq!(column_u64(&stats[0], "deleted").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_metadata_and_stats() {
        let storage = MemoryStorage::new().with_default_indexes();
        storage.insert_article(StoredArticle::new("a1", "https://x.test/1", ""));
        storage.insert_metadata(metadata("a1", SyncStatus::Pending));
        storage.insert_metadata(metadata("a2", SyncStatus::Conflict));

        let stats = storage.aggregate_stats().await.unwrap();
        assert_eq!(stats.total_articles, 1);
        assert_eq!(stats.pending_sync_items, 1);

        let page = storage
            .sync_metadata(&SyncMetadataFilter::status(SyncStatus::Conflict))
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.items[0].entity_id, "a2");

        storage.set_sync_status("a1", SyncStatus::Synced);
        assert_eq!(storage.aggregate_stats().await.unwrap().pending_sync_items, 0);

        assert_eq!(query_count(&storage, &Query::MissingRequiredFields).await.unwrap(), 1);
        assert_eq!(query_count(&storage, &Query::IndexCount).await.unwrap(), 7);
    }
}
