use std::collections::HashSet;
use std::time::Duration;

use crate::ai::{DiscoveredSource, Summarizer};
use crate::models::{NewSource, Topic};
use crate::scraper::{host_of, validate_url};
use crate::storage::{Database, SourceRepository};
use crate::{Error, Result};

/// Outcome of one discovery run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Candidates returned by the model
    pub proposed: usize,
    /// Sources now stored for the topic
    pub inserted: usize,
    /// Candidates dropped as invalid or duplicate
    pub skipped: usize,
}

/// Ask the model for sources and replace the topic's AI-sourced rows.
///
/// Transport and JSON errors are returned without touching storage.
pub async fn discover_and_replace(
    db: &Database,
    summarizer: &Summarizer,
    topic: &Topic,
    instructions: &str,
    timeout: Duration,
) -> Result<DiscoveryReport> {
    tracing::info!(topic_id = topic.id, topic = %topic.name, "Discovering sources");

    let candidates = tokio::time::timeout(timeout, summarizer.discover_sources(topic, instructions))
        .await
        .map_err(|_| Error::Timeout(timeout.as_secs(), format!("source discovery for topic {}", topic.id)))??;

    let repo = SourceRepository::new(db);
    let manual_urls: Vec<String> = repo
        .list_for_topic(topic.id)
        .await?
        .into_iter()
        .filter(|s| s.is_manual)
        .map(|s| s.url)
        .collect();

    let proposed = candidates.len();
    let accepted = select_candidates(topic.id, candidates, &manual_urls);
    let skipped = proposed - accepted.len();

    let inserted = repo.replace_ai_sources(topic.id, &accepted).await?;

    tracing::info!(
        topic_id = topic.id,
        proposed,
        inserted,
        skipped,
        "Replaced discovered sources"
    );

    Ok(DiscoveryReport {
        proposed,
        inserted,
        skipped,
    })
}

/// Validate candidates and drop duplicates of earlier candidates or of
/// the topic's manual sources
fn select_candidates(
    topic_id: i64,
    candidates: Vec<DiscoveredSource>,
    manual_urls: &[String],
) -> Vec<NewSource> {
    let mut seen: HashSet<String> = manual_urls.iter().map(|u| normalize(u)).collect();
    let mut accepted = Vec::new();

    for candidate in candidates {
        let url = match validate_url(&candidate.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(topic_id, url = %candidate.url, error = %e, "Skipping invalid discovered source");
                continue;
            }
        };

        if !seen.insert(normalize(url.as_str())) {
            tracing::debug!(topic_id, url = %url, "Skipping duplicate discovered source");
            continue;
        }

        let name = Some(candidate.name.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| host_of(url.as_str()))
            .unwrap_or_else(|| url.to_string());
        let description = Some(candidate.description.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        accepted.push(NewSource {
            topic_id,
            url: url.to_string(),
            name,
            description,
            is_manual: false,
        });
    }

    accepted
}

fn normalize(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: &str, name: &str) -> DiscoveredSource {
        DiscoveredSource {
            url: url.to_string(),
            name: name.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_select_candidates() {
        let accepted = select_candidates(
            1,
            vec![
                candidate("https://a.example/feed", "A"),
                candidate("ftp://b.example", "B"),
                candidate("https://A.example/feed/", "A again"),
                candidate("https://manual.example", "Manual"),
                candidate("https://www.c.example", ""),
            ],
            &["https://manual.example/".to_string()],
        );

        let urls: Vec<_> = accepted.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example/feed", "https://www.c.example/"]);
        assert_eq!(accepted[1].name, "c.example");
        assert!(accepted.iter().all(|s| !s.is_manual));
    }
}
