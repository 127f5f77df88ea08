mod gemini_api;

pub use gemini_api::GeminiApiProvider;

use serde::{Deserialize, Serialize};

use crate::scraper::ScrapedContent;
use crate::Result;

/// Input for source discovery
#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub topic_name: String,
    pub topic_description: String,
    /// Global sourcing prompt from settings
    pub instructions: String,
}

/// Input for summarization
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub topic_name: String,
    pub contents: Vec<ScrapedContent>,
    /// Global summarizing prompt from settings
    pub instructions: String,
    pub max_stories: usize,
}

/// A source candidate proposed by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredSource {
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A story written by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizedStory {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub source_title: String,
}

/// Trait for AI providers answering with a JSON contract
#[async_trait::async_trait]
pub trait AiProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Ask for 4-8 sources matching a topic
    async fn discover_sources(&self, request: &DiscoveryRequest) -> Result<Vec<DiscoveredSource>>;

    /// Turn scraped text into at most `max_stories` stories
    async fn summarize_content(&self, request: &SummaryRequest) -> Result<Vec<SummarizedStory>>;
}
