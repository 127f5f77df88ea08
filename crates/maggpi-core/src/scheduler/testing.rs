//! Fakes shared by the scheduler tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::Scheduler;
use crate::ai::{
    AiProvider, DiscoveredSource, DiscoveryRequest, ProviderFactory, SummarizedStory,
    SummaryRequest,
};
use crate::config::{AppConfig, SchedulerConfig};
use crate::scraper::{ContentFetcher, Page, PageLoader};
use crate::storage::{Database, SettingsRepository};
use crate::{Error, Result};

/// Provider proposing `sources` valid URLs plus one invalid candidate, and
/// writing one story per scraped source
#[derive(Clone, Default)]
pub struct FakeProvider {
    sources: usize,
    panics: bool,
    discovery_fails: bool,
    summarize_calls: Arc<AtomicUsize>,
    last_content_count: Arc<AtomicUsize>,
}

impl FakeProvider {
    pub fn with_sources(sources: usize) -> Self {
        Self {
            sources,
            ..Self::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::default()
        }
    }

    pub fn failing_discovery() -> Self {
        Self {
            discovery_fails: true,
            ..Self::default()
        }
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    pub fn last_content_count(&self) -> usize {
        self.last_content_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AiProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn discover_sources(&self, request: &DiscoveryRequest) -> Result<Vec<DiscoveredSource>> {
        if self.discovery_fails {
            return Err(Error::AiResponse("model returned prose".to_string()));
        }
        let slug = request.topic_name.to_lowercase().replace(' ', "-");
        let mut sources: Vec<_> = (1..=self.sources)
            .map(|i| DiscoveredSource {
                url: format!("https://{slug}-{i}.example/news"),
                name: format!("{} source {i}", request.topic_name),
                description: "Fake source".to_string(),
            })
            .collect();
        sources.push(DiscoveredSource {
            url: "ftp://invalid.example".to_string(),
            name: "Invalid".to_string(),
            description: String::new(),
        });
        Ok(sources)
    }

    async fn summarize_content(&self, request: &SummaryRequest) -> Result<Vec<SummarizedStory>> {
        if self.panics {
            panic!("provider exploded");
        }
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        self.last_content_count
            .store(request.contents.len(), Ordering::SeqCst);

        Ok(request
            .contents
            .iter()
            .map(|c| SummarizedStory {
                title: format!("News from {}", c.source_name),
                summary: "Something happened.".to_string(),
                source_url: format!("{}/story", c.url.trim_end_matches('/')),
                source_title: c.source_name.clone(),
            })
            .collect())
    }
}

/// Page loader: URLs containing `fail` error out, `slow` ones outlive the
/// request timeout, everything else serves a valid article page
#[derive(Clone, Default)]
pub struct FakeWeb {
    requests: Arc<AtomicUsize>,
}

impl FakeWeb {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PageLoader for FakeWeb {
    async fn load(&self, url: &str) -> Result<Page> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if url.contains("fail") {
            return Err(Error::Other(format!("HTTP 503 for URL: {}", url)));
        }
        if url.contains("slow") {
            tokio::time::sleep(Duration::from_secs(3)).await;
        }

        let body = format!(
            "<html><head><title>Page at {url}</title></head><body><article>{}</article></body></html>",
            "<p>Enough words about the news of the day to count as real content.</p>".repeat(3)
        );
        Ok(Page {
            body: Bytes::from(body),
            content_type: Some("text/html".to_string()),
        })
    }
}

/// Scheduler over fakes, with a one-second request timeout
pub fn scheduler_with(
    db: Arc<Database>,
    provider: FakeProvider,
    web: FakeWeb,
    tune: impl FnOnce(&mut SchedulerConfig),
) -> Scheduler {
    let mut config = AppConfig::default();
    config.scraper.request_timeout_secs = 1;
    tune(&mut config.scheduler);

    let fetcher = ContentFetcher::with_loader(Arc::new(web), &config.scraper);
    let provider: Arc<dyn AiProvider> = Arc::new(provider);
    let providers: ProviderFactory =
        Arc::new(move |_key: &str| -> Result<Arc<dyn AiProvider>> { Ok(Arc::clone(&provider)) });

    Scheduler::with_parts(db, Arc::new(config), fetcher, providers)
}

pub async fn set_api_key(db: &Database, key: &str) {
    let repo = SettingsRepository::new(db);
    let mut settings = repo.get().await.unwrap();
    settings.ai_api_key = key.to_string();
    repo.update(&settings).await.unwrap();
}
