//! Scoring of conflict-resolution outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::article::Article;
use crate::error::CoreResult;

const TITLE_PENALTY: i32 = 10;
const FLAG_PENALTY: i32 = 5;
const CONTENT_LOSS_PENALTY: i32 = 30;
const TAG_LOSS_PENALTY: i32 = 10;
const WRONG_WINNER_PENALTY: i32 = 20;
/// Below this the outcome needs a human.
const REVIEW_THRESHOLD: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    LastWriteWins,
    LocalWins,
    RemoteWins,
    Merge,
    Manual,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionStrategy::LastWriteWins => "last_write_wins",
            ResolutionStrategy::LocalWins => "local_wins",
            ResolutionStrategy::RemoteWins => "remote_wins",
            ResolutionStrategy::Merge => "merge",
            ResolutionStrategy::Manual => "manual",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolutionResult {
    /// No data lost and confidence at or above the review threshold
    pub is_valid: bool,
    pub strategy: ResolutionStrategy,
    /// 0 to 100
    pub confidence: u8,
    pub data_loss: bool,
    /// Per-field audit trail
    pub applied_changes: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ConflictResolutionResult {
    pub fn failed(strategy: ResolutionStrategy, reason: &str) -> Self {
        Self {
            is_valid: false,
            strategy,
            confidence: 0,
            data_loss: false,
            applied_changes: Vec::new(),
            recommendations: vec![
                format!("Conflict resolution could not be validated: {}", reason),
                "Manual review recommended".to_string(),
            ],
        }
    }
}

enum Source {
    Unchanged,
    Local,
    Remote,
    Custom,
}

fn source_of<T: PartialEq>(local: &T, remote: &T, resolved: &T) -> Source {
    match (resolved == local, resolved == remote) {
        (true, true) => Source::Unchanged,
        (true, false) => Source::Local,
        (false, true) => Source::Remote,
        (false, false) => Source::Custom,
    }
}

/// Score how faithfully `resolved` reflects `local` and `remote`.
///
/// Errors only when last-write-wins needs timestamps that do not parse.
pub fn score_resolution(
    local: &Article,
    remote: &Article,
    resolved: &Article,
    strategy: ResolutionStrategy,
) -> CoreResult<ConflictResolutionResult> {
    let mut confidence: i32 = 100;
    let mut applied_changes = Vec::new();
    let mut recommendations = Vec::new();
    let mut data_loss = false;

    let fields: [(&str, Source, i32); 4] = [
        ("title", source_of(&local.title, &remote.title, &resolved.title), TITLE_PENALTY),
        (
            "isArchived",
            source_of(&local.is_archived, &remote.is_archived, &resolved.is_archived),
            FLAG_PENALTY,
        ),
        (
            "isFavorite",
            source_of(&local.is_favorite, &remote.is_favorite, &resolved.is_favorite),
            FLAG_PENALTY,
        ),
        (
            "isRead",
            source_of(&local.is_read, &remote.is_read, &resolved.is_read),
            FLAG_PENALTY,
        ),
    ];
    for (field, source, penalty) in fields {
        match source {
            Source::Unchanged => {}
            Source::Local => applied_changes.push(format!("{}: kept local value", field)),
            Source::Remote => applied_changes.push(format!("{}: took remote value", field)),
            Source::Custom => {
                applied_changes.push(format!("{}: custom value", field));
                confidence -= penalty;
            }
        }
    }

    let resolved_has_content = resolved.content_text().is_some();
    for (side, article) in [("local", local), ("remote", remote)] {
        if article.content_text().is_some() && !resolved_has_content {
            data_loss = true;
            confidence -= CONTENT_LOSS_PENALTY;
            recommendations.push(format!("Resolved article dropped the {} content", side));
        }
    }

    let resolved_tags = resolved.tag_set();
    for (side, article) in [("local", local), ("remote", remote)] {
        let lost: Vec<&str> = article
            .tag_set()
            .difference(&resolved_tags)
            .copied()
            .collect();
        if !lost.is_empty() {
            data_loss = true;
            confidence -= TAG_LOSS_PENALTY;
            recommendations.push(format!("Tags lost from {}: {}", side, lost.join(", ")));
        }
    }

    if strategy == ResolutionStrategy::LastWriteWins {
        let winner = if local.updated_at()? >= remote.updated_at()? {
            local
        } else {
            remote
        };
        if resolved.id != winner.id {
            confidence -= WRONG_WINNER_PENALTY;
            recommendations.push(format!(
                "Last-write-wins should keep article {} (latest update) but resolved to {}",
                winner.id, resolved.id
            ));
        }
    }

    let confidence = confidence.clamp(0, 100) as u8;
    if confidence < REVIEW_THRESHOLD {
        recommendations.push("Manual review recommended".to_string());
    }

    Ok(ConflictResolutionResult {
        is_valid: !data_loss && confidence >= REVIEW_THRESHOLD,
        strategy,
        confidence,
        data_loss,
        applied_changes,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn pair() -> (Article, Article) {
        let now = Utc::now();
        let local = Article::new("a1", "https://x.test/1", "Local title")
            .with_content("local body")
            .with_tags(["rust"])
            .updated(now);
        let mut remote = Article::new("a1", "https://x.test/1", "Remote title")
            .with_content("remote body")
            .with_tags(["rust", "async"])
            .updated(now - Duration::minutes(10));
        remote.is_read = true;
        (local, remote)
    }

    #[test]
    fn test_clean_resolution() {
        let (local, remote) = pair();
        let mut resolved = local.clone().with_tags(["rust", "async"]);
        resolved.is_read = true;

        let result =
            score_resolution(&local, &remote, &resolved, ResolutionStrategy::LastWriteWins).unwrap();

        assert!(result.is_valid);
        assert_eq!(result.confidence, 100);
        assert!(!result.data_loss);
        assert_eq!(
            result.applied_changes,
            vec!["title: kept local value", "isRead: took remote value"]
        );
    }

    #[test]
    fn test_custom_values_cost_confidence() {
        let (local, remote) = pair();
        let mut resolved = local.clone().with_tags(["rust", "async"]);
        resolved.title = "Merged title".to_string();
        resolved.is_favorite = true;

        let result = score_resolution(&local, &remote, &resolved, ResolutionStrategy::Merge).unwrap();

        assert_eq!(result.confidence, 85);
        assert!(result.applied_changes.contains(&"title: custom value".to_string()));
        assert!(result.applied_changes.contains(&"isFavorite: custom value".to_string()));
    }

    #[test]
    fn test_content_loss_on_both_sides() {
        let (local, remote) = pair();
        let mut resolved = local.clone().with_tags(["rust", "async"]);
        resolved.content = None;

        let result = score_resolution(&local, &remote, &resolved, ResolutionStrategy::Merge).unwrap();

        assert!(result.data_loss);
        assert!(!result.is_valid);
        assert_eq!(result.confidence, 40);
        assert!(result
            .recommendations
            .contains(&"Manual review recommended".to_string()));
    }

    #[test]
    fn test_lost_tags_are_enumerated() {
        let (local, remote) = pair();
        let resolved = local.clone();

        let result = score_resolution(&local, &remote, &resolved, ResolutionStrategy::LocalWins).unwrap();

        assert!(result.data_loss);
        assert_eq!(result.confidence, 90);
        assert!(result
            .recommendations
            .contains(&"Tags lost from remote: async".to_string()));
    }

    #[test]
    fn test_last_write_wins_checks_winner() {
        let (local, mut remote) = pair();
        remote.id = "a1-remote".to_string();
        let mut resolved = remote.clone().with_tags(["rust", "async"]);
        resolved.title = local.title.clone();

        let result =
            score_resolution(&local, &remote, &resolved, ResolutionStrategy::LastWriteWins).unwrap();

        assert_eq!(result.confidence, 80);
        assert!(result.recommendations[0].starts_with("Last-write-wins should keep article a1"));
    }

    #[test]
    fn test_confidence_floor() {
        let (local, remote) = pair();
        let mut resolved = Article::new("zz", "https://x.test/1", "Other");
        resolved.is_archived = true;
        resolved.is_favorite = true;
        resolved.is_read = false;
        resolved.updated_at = local.updated_at.clone();

        let result =
            score_resolution(&local, &remote, &resolved, ResolutionStrategy::LastWriteWins).unwrap();

        assert_eq!(result.confidence, 0);
        assert!(result.data_loss);
    }
}
