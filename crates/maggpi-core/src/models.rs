use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sources are deactivated once their failure counter reaches this value
pub const SOURCE_FAILURE_THRESHOLD: i64 = 3;

/// Stored error messages (source and refresh status) are capped to this many chars
pub const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// A user-defined subject whose sources are scraped and summarized
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    /// Free-text description, drives AI source discovery
    pub description: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A URL feeding content into a topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub topic_id: i64,
    pub url: String,
    pub name: String,
    pub description: Option<String>,
    /// Added by the user; discovery never replaces these
    pub is_manual: bool,
    pub is_active: bool,
    pub failure_count: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Data required to create a new source
#[derive(Debug, Clone)]
pub struct NewSource {
    pub topic_id: i64,
    pub url: String,
    pub name: String,
    pub description: Option<String>,
    pub is_manual: bool,
}

impl Source {
    /// Counter and active flag after one more failed fetch
    pub fn after_failure(&self) -> (i64, bool) {
        let failures = self.failure_count + 1;
        (failures, failures < SOURCE_FAILURE_THRESHOLD)
    }

    /// Whether a successful fetch needs to be written back
    pub fn needs_reset(&self) -> bool {
        self.failure_count > 0 || !self.is_active
    }
}

/// A summarized story attributed to a topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    pub topic_id: i64,
    /// Weak link, nulled when the source is deleted
    pub source_id: Option<i64>,
    pub title: String,
    pub summary: String,
    pub source_url: String,
    pub source_title: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Data required to create a new story
#[derive(Debug, Clone)]
pub struct NewStory {
    pub topic_id: i64,
    pub source_id: Option<i64>,
    pub title: String,
    pub summary: String,
    pub source_url: String,
    pub source_title: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Global, user-editable settings (a single row)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub refresh_interval_minutes: i64,
    pub stories_per_topic: i64,
    pub global_sourcing_prompt: String,
    pub global_summarizing_prompt: String,
    pub ai_api_key: String,
    pub primary_color: String,
    pub secondary_color: String,
    pub dark_mode: bool,
    pub dashboard_title: String,
    pub dashboard_subtitle: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: 120,
            stories_per_topic: 5,
            global_sourcing_prompt: "Find reliable, reputable news sources that provide regular updates. \
Prefer sources with RSS feeds or well-structured HTML. Avoid paywalled content when possible."
                .to_string(),
            global_summarizing_prompt: "Summarize the news story in a clear, informative tone. \
Focus on the key facts and why this story matters. Keep the summary between 75-150 words."
                .to_string(),
            ai_api_key: String::new(),
            primary_color: "#2563eb".to_string(),
            secondary_color: "#1e40af".to_string(),
            dark_mode: false,
            dashboard_title: "Dashboard".to_string(),
            dashboard_subtitle: "Your personalized news feed".to_string(),
        }
    }
}

impl Settings {
    pub fn has_api_key(&self) -> bool {
        !self.ai_api_key.trim().is_empty()
    }

    /// Stories kept per topic after pruning
    pub fn retained_stories(&self) -> i64 {
        self.stories_per_topic.max(1) * 3
    }

    /// API key with everything but the last four characters hidden
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.ai_api_key.chars().collect();
        if chars.is_empty() {
            return String::new();
        }
        let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        format!("********{}", tail)
    }
}

/// State of a topic's refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl RefreshState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshState::Pending => "pending",
            RefreshState::InProgress => "in_progress",
            RefreshState::Completed => "completed",
            RefreshState::Failed => "failed",
        }
    }
}

impl fmt::Display for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshState {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RefreshState::Pending),
            "in_progress" => Ok(RefreshState::InProgress),
            "completed" => Ok(RefreshState::Completed),
            "failed" => Ok(RefreshState::Failed),
            other => Err(crate::Error::Other(format!("Unknown refresh state: {}", other))),
        }
    }
}

/// Per-topic refresh bookkeeping (one row per topic)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshStatus {
    pub topic_id: i64,
    pub last_refresh: Option<DateTime<Utc>>,
    pub next_refresh: Option<DateTime<Utc>>,
    pub status: RefreshState,
    pub error_message: Option<String>,
}

/// Cut a string to at most `max_chars` characters on a char boundary
pub fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(failure_count: i64, is_active: bool) -> Source {
        Source {
            id: 1,
            topic_id: 1,
            url: "https://example.com".to_string(),
            name: "Example".to_string(),
            description: None,
            is_manual: false,
            is_active,
            failure_count,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_failure_threshold() {
        assert_eq!(source(0, true).after_failure(), (1, true));
        assert_eq!(source(1, true).after_failure(), (2, true));
        assert_eq!(source(2, true).after_failure(), (3, false));
    }

    #[test]
    fn test_needs_reset() {
        assert!(!source(0, true).needs_reset());
        assert!(source(2, true).needs_reset());
        assert!(source(0, false).needs_reset());
    }

    #[test]
    fn test_refresh_state_round_trip() {
        for state in [
            RefreshState::Pending,
            RefreshState::InProgress,
            RefreshState::Completed,
            RefreshState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<RefreshState>().unwrap(), state);
        }
        assert!("running".parse::<RefreshState>().is_err());
    }

    #[test]
    fn test_masked_api_key() {
        let mut settings = Settings::default();
        assert_eq!(settings.masked_api_key(), "");
        settings.ai_api_key = "abcdefgh1234".to_string();
        assert_eq!(settings.masked_api_key(), "********1234");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
