use std::sync::Arc;

use super::providers::{
    AiProvider, DiscoveredSource, DiscoveryRequest, GeminiApiProvider, SummarizedStory,
    SummaryRequest,
};
use crate::config::AiConfig;
use crate::models::Topic;
use crate::scraper::ScrapedContent;
use crate::{Error, Result};

/// Builds a provider for an API key. The scheduler calls it once per
/// refresh, since the key is read from settings each time.
pub type ProviderFactory = Arc<dyn Fn(&str) -> Result<Arc<dyn AiProvider>> + Send + Sync>;

/// Factory for the provider named in the config
pub fn provider_factory(config: &AiConfig) -> ProviderFactory {
    let config = config.clone();
    Arc::new(move |api_key: &str| -> Result<Arc<dyn AiProvider>> {
        match config.provider.as_str() {
            "gemini_api" => Ok(Arc::new(GeminiApiProvider::new(api_key, &config)?)),
            other => Err(Error::Config(format!("Unknown AI provider: {}", other))),
        }
    })
}

/// AI adapter that wraps the configured provider
pub struct Summarizer {
    provider: Arc<dyn AiProvider>,
}

impl Summarizer {
    /// Build a summarizer for an API key; an empty key is `MissingApiKey`
    pub fn new(factory: &ProviderFactory, api_key: &str) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(Error::MissingApiKey);
        }
        Ok(Self::with_provider(factory(api_key)?))
    }

    pub fn with_provider(provider: Arc<dyn AiProvider>) -> Self {
        Self { provider }
    }

    /// Ask the provider for sources matching a topic
    pub async fn discover_sources(
        &self,
        topic: &Topic,
        instructions: &str,
    ) -> Result<Vec<DiscoveredSource>> {
        let request = DiscoveryRequest {
            topic_name: topic.name.clone(),
            topic_description: topic.description.clone(),
            instructions: instructions.to_string(),
        };

        tracing::debug!(topic_id = topic.id, provider = self.provider.name(), "Requesting sources");
        self.provider.discover_sources(&request).await
    }

    /// Summarize scraped content into stories. Nothing to summarize means
    /// no provider call.
    pub async fn summarize_content(
        &self,
        topic_name: &str,
        contents: Vec<ScrapedContent>,
        instructions: &str,
        max_stories: usize,
    ) -> Result<Vec<SummarizedStory>> {
        if contents.is_empty() {
            return Ok(Vec::new());
        }

        let request = SummaryRequest {
            topic_name: topic_name.to_string(),
            contents,
            instructions: instructions.to_string(),
            max_stories: max_stories.max(1),
        };

        let mut stories = self.provider.summarize_content(&request).await?;
        stories.retain(|s| !s.title.trim().is_empty() && !s.summary.trim().is_empty());
        if stories.len() > request.max_stories {
            tracing::debug!(
                returned = stories.len(),
                max = request.max_stories,
                "Model returned more stories than asked, truncating"
            );
            stories.truncate(request.max_stories);
        }
        Ok(stories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AiProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn discover_sources(&self, _: &DiscoveryRequest) -> Result<Vec<DiscoveredSource>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn summarize_content(&self, request: &SummaryRequest) -> Result<Vec<SummarizedStory>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                SummarizedStory {
                    title: format!("{} story", request.topic_name),
                    summary: "text".to_string(),
                    source_url: String::new(),
                    source_title: String::new(),
                },
                SummarizedStory {
                    title: " ".to_string(),
                    summary: "untitled".to_string(),
                    source_url: String::new(),
                    source_title: String::new(),
                },
            ])
        }
    }

    #[tokio::test]
    async fn test_empty_input_skips_provider() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let summarizer = Summarizer::with_provider(provider.clone());

        let stories = summarizer
            .summarize_content("Tech", Vec::new(), "", 5)
            .await
            .unwrap();
        assert!(stories.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        let content = ScrapedContent {
            url: "https://a.example".to_string(),
            source_name: "A".to_string(),
            content: "text".to_string(),
        };
        let stories = summarizer
            .summarize_content("Tech", vec![content], "", 5)
            .await
            .unwrap();
        assert_eq!(stories.len(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    struct VerboseProvider;

    #[async_trait::async_trait]
    impl AiProvider for VerboseProvider {
        fn name(&self) -> &str {
            "verbose"
        }

        async fn discover_sources(&self, _: &DiscoveryRequest) -> Result<Vec<DiscoveredSource>> {
            Ok(Vec::new())
        }

        async fn summarize_content(&self, _: &SummaryRequest) -> Result<Vec<SummarizedStory>> {
            Ok((1..=12)
                .map(|i| SummarizedStory {
                    title: format!("Story {i}"),
                    summary: "text".to_string(),
                    source_url: String::new(),
                    source_title: String::new(),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_stories_capped_at_max_stories() {
        let summarizer = Summarizer::with_provider(Arc::new(VerboseProvider));
        let content = ScrapedContent {
            url: "https://a.example".to_string(),
            source_name: "A".to_string(),
            content: "text".to_string(),
        };

        let stories = summarizer
            .summarize_content("Tech", vec![content], "", 3)
            .await
            .unwrap();
        let titles: Vec<_> = stories.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Story 1", "Story 2", "Story 3"]);
    }

    #[test]
    fn test_missing_key_and_unknown_provider() {
        let factory = provider_factory(&AiConfig::default());
        assert!(matches!(
            Summarizer::new(&factory, "  "),
            Err(Error::MissingApiKey)
        ));

        let config = AiConfig {
            provider: "nope".to_string(),
            ..AiConfig::default()
        };
        let factory = provider_factory(&config);
        assert!(matches!(Summarizer::new(&factory, "key"), Err(Error::Config(_))));
    }
}
