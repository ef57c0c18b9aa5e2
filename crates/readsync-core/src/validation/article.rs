//! Local/remote article comparison.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::clamp_score;
use crate::config::ValidatorConfig;
use crate::error::{CoreError, CoreResult};

/// Checks counted in the score denominator.
const CHECKS: u32 = 8;
const STRICT_CHECKS: u32 = 10;

/// An article as seen by one side of a sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    /// RFC 3339
    pub updated_at: String,
}

impl Article {
    pub fn new(id: impl Into<String>, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: title.into(),
            content: None,
            is_archived: false,
            is_favorite: false,
            is_read: false,
            tags: Vec::new(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn updated(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = at.to_rfc3339();
        self
    }

    pub fn updated_at(&self) -> CoreResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                CoreError::InvalidTimestamp(format!("article {}: {} ({})", self.id, self.updated_at, e))
            })
    }

    /// Content, with absent and empty treated alike.
    pub fn content_text(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }

    pub fn tag_set(&self) -> BTreeSet<&str> {
        self.tags.iter().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsistencyOptions {
    /// Adds title-change guidance and two extra checks to the denominator
    pub strict: bool,
    pub ignore_content: bool,
    pub ignore_timestamps: bool,
}

impl ConsistencyOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }
}

/// One mismatched field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDifference {
    pub field: String,
    pub local: Value,
    pub remote: Value,
    pub description: String,
}

impl FieldDifference {
    fn new(field: &str, local: Value, remote: Value, description: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            local,
            remote,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyValidationResult {
    /// True iff there are no critical differences
    pub is_consistent: bool,
    pub differences: Vec<FieldDifference>,
    pub critical_differences: Vec<FieldDifference>,
    /// 0 to 100
    pub score: u8,
    pub recommendations: Vec<String>,
}

impl ConsistencyValidationResult {
    /// Result for a comparison that could not be carried out.
    pub fn failed(reason: &str) -> Self {
        Self {
            is_consistent: false,
            differences: Vec::new(),
            critical_differences: vec![FieldDifference::new(
                "validation",
                Value::Null,
                Value::Null,
                format!("Consistency validation failed: {}", reason),
            )],
            score: 0,
            recommendations: vec![
                "Retry the consistency check".to_string(),
                "Check that both article records are well formed".to_string(),
            ],
        }
    }
}

/// Token-set overlap of two texts: |A ∩ B| / |A ∪ B| over lower-cased
/// whitespace tokens. Two empty texts are identical.
pub fn content_similarity(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let left: HashSet<&str> = a_lower.split_whitespace().collect();
    let right: HashSet<&str> = b_lower.split_whitespace().collect();

    let union = left.union(&right).count();
    if union == 0 {
        return 1.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// `max(0, round((total - penalty) / total * 100))`, with critical
/// differences weighing double.
pub fn consistency_score(non_critical: usize, critical: usize, strict: bool) -> u8 {
    let total = f64::from(if strict { STRICT_CHECKS } else { CHECKS });
    let penalty = non_critical as f64 + 2.0 * critical as f64;
    clamp_score((total - penalty) / total * 100.0)
}

/// Compare one article pair. Errors only on unparseable timestamps.
pub fn compare_articles(
    local: &Article,
    remote: &Article,
    options: &ConsistencyOptions,
    config: &ValidatorConfig,
) -> CoreResult<ConsistencyValidationResult> {
    let mut differences = Vec::new();
    let mut critical = Vec::new();
    let mut recommendations = Vec::new();

    if local.id != remote.id {
        critical.push(FieldDifference::new(
            "id",
            json!(local.id),
            json!(remote.id),
            "Article identifiers differ",
        ));
    }
    if local.url != remote.url {
        critical.push(FieldDifference::new(
            "url",
            json!(local.url),
            json!(remote.url),
            "Article URLs differ",
        ));
    }
    if !critical.is_empty() {
        recommendations
            .push("Identity mismatch cannot be auto-resolved; re-link the article manually".to_string());
    }

    if local.title != remote.title {
        differences.push(FieldDifference::new(
            "title",
            json!(local.title),
            json!(remote.title),
            "Titles differ",
        ));
        if options.strict {
            recommendations.push(
                "Title changed on one side; confirm the edit was intentional before syncing"
                    .to_string(),
            );
        }
    }

    for (field, l, r) in [
        ("isArchived", local.is_archived, remote.is_archived),
        ("isFavorite", local.is_favorite, remote.is_favorite),
        ("isRead", local.is_read, remote.is_read),
    ] {
        if l != r {
            differences.push(FieldDifference::new(
                field,
                json!(l),
                json!(r),
                format!("{} flag differs", field),
            ));
        }
    }

    let local_tags = local.tag_set();
    let remote_tags = remote.tag_set();
    if local_tags != remote_tags {
        differences.push(FieldDifference::new(
            "tags",
            json!(local_tags),
            json!(remote_tags),
            "Tag sets differ",
        ));
    }

    if !options.ignore_content {
        let similarity = content_similarity(
            local.content_text().unwrap_or(""),
            remote.content_text().unwrap_or(""),
        );
        if similarity < config.content_similarity_threshold {
            differences.push(FieldDifference::new(
                "content",
                json!(local.content_text().map(str::len)),
                json!(remote.content_text().map(str::len)),
                format!("Content similarity {:.2} is below threshold", similarity),
            ));
            recommendations.push("Content diverged; manual review recommended".to_string());
        }
    }

    if !options.ignore_timestamps {
        let local_ts = local.updated_at()?;
        let remote_ts = remote.updated_at()?;
        let skew = (local_ts - remote_ts).num_seconds().abs();
        if skew >= config.timestamp_tolerance_secs {
            differences.push(FieldDifference::new(
                "updatedAt",
                json!(local.updated_at),
                json!(remote.updated_at),
                format!("Update timestamps differ by {}s", skew),
            ));
        }
    }

    if !differences.is_empty() && critical.is_empty() {
        recommendations.push(format!(
            "Run conflict resolution for {} differing field(s)",
            differences.len()
        ));
    }

    Ok(ConsistencyValidationResult {
        is_consistent: critical.is_empty(),
        score: consistency_score(differences.len(), critical.len(), options.strict),
        differences,
        critical_differences: critical,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn article() -> Article {
        Article::new("a1", "https://read.example.com/posts/1", "Ownership in practice")
            .with_content("Borrowing rules keep aliasing and mutation apart")
            .with_tags(["rust", "memory"])
    }

    fn compare(local: &Article, remote: &Article, options: ConsistencyOptions) -> ConsistencyValidationResult {
        compare_articles(local, remote, &options, &ValidatorConfig::default()).unwrap()
    }

    #[test]
    fn test_identical_articles() {
        let a = article();
        let result = compare(&a, &a, ConsistencyOptions::default());

        assert!(result.is_consistent);
        assert!(result.differences.is_empty());
        assert!(result.critical_differences.is_empty());
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_id_difference_is_critical() {
        let local = article();
        let mut remote = local.clone();
        remote.id = "a2".to_string();

        let result = compare(&local, &remote, ConsistencyOptions::default());

        assert!(!result.is_consistent);
        assert_eq!(result.critical_differences.len(), 1);
        assert_eq!(result.critical_differences[0].field, "id");
        assert_eq!(result.score, 75);
    }

    #[test]
    fn test_non_critical_differences() {
        let local = article();
        let mut remote = local.clone();
        remote.title = "Ownership, revisited".to_string();
        remote.is_read = true;
        remote.tags = vec!["memory".to_string(), "rust".to_string()];

        let result = compare(&local, &remote, ConsistencyOptions::default());

        assert!(result.is_consistent);
        let fields: Vec<&str> = result.differences.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "isRead"]);
        assert_eq!(result.score, 75);
    }

    #[test]
    fn test_strict_mode_changes_denominator_and_guidance() {
        let local = article();
        let mut remote = local.clone();
        remote.title = "Different".to_string();

        let lenient = compare(&local, &remote, ConsistencyOptions::default());
        let strict = compare(&local, &remote, ConsistencyOptions::strict());

        assert_eq!(lenient.score, 88);
        assert_eq!(strict.score, 90);
        assert_eq!(strict.differences, lenient.differences);
        assert!(strict.recommendations.len() > lenient.recommendations.len());
    }

    #[test]
    fn test_content_similarity_threshold() {
        let local = article();
        let remote = local.clone().with_content("A completely different body of text");

        let result = compare(&local, &remote, ConsistencyOptions::default());
        assert_eq!(result.differences[0].field, "content");
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.contains("manual review")));

        let ignored = compare(
            &local,
            &remote,
            ConsistencyOptions {
                ignore_content: true,
                ..ConsistencyOptions::default()
            },
        );
        assert!(ignored.differences.is_empty());
    }

    #[test]
    fn test_small_clock_skew_is_ignored() {
        let now = Utc::now();
        let local = article().updated(now);
        let remote = local.clone().updated(now + Duration::seconds(59));
        assert!(compare(&local, &remote, ConsistencyOptions::default())
            .differences
            .is_empty());

        let remote = local.clone().updated(now + Duration::seconds(90));
        let result = compare(&local, &remote, ConsistencyOptions::default());
        assert_eq!(result.differences[0].field, "updatedAt");
    }

    #[test]
    fn test_bad_timestamp_is_an_error() {
        let local = article();
        let mut remote = local.clone();
        remote.updated_at = "yesterday".to_string();

        let err = compare_articles(
            &local,
            &remote,
            &ConsistencyOptions::default(),
            &ValidatorConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_similarity() {
        assert_eq!(content_similarity("", ""), 1.0);
        assert_eq!(content_similarity("a b", "A B"), 1.0);
        assert_eq!(content_similarity("a b c", "a b d"), 0.5);
        assert_eq!(content_similarity("a", ""), 0.0);
    }

    #[test]
    fn test_score_floor() {
        assert_eq!(consistency_score(0, 5, false), 0);
        assert_eq!(consistency_score(9, 0, false), 0);
        assert_eq!(consistency_score(1, 0, false), 88);
    }
}
