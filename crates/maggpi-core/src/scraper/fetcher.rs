use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Proxy};
use tokio::task::JoinSet;

use super::extract::extract_text;
use super::validate::{host_of, validate_url};
use crate::config::ScraperConfig;
use crate::error::panic_message;
use crate::models::Source;
use crate::{Error, Result};

const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Raw response of a page load
#[derive(Debug, Clone)]
pub struct Page {
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// Loads a page body; the HTTP implementation is [`HttpLoader`]
#[async_trait::async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<Page>;
}

/// reqwest-backed page loader
pub struct HttpLoader {
    client: Client,
}

impl HttpLoader {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/rss+xml,application/atom+xml,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        if let Ok(ua) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(USER_AGENT, ua);
        }

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(ref proxy) = config.proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for scraping");
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait::async_trait]
impl PageLoader for HttpLoader {
    async fn load(&self, url: &str) -> Result<Page> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Other(format!("HTTP {} for URL: {}", status, url)));
        }

        if let Some(len) = response.content_length() {
            if len as usize > MAX_BODY_BYTES {
                return Err(Error::ContentTooLarge(len as usize, url.to_string()));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await?;
        if body.len() > MAX_BODY_BYTES {
            return Err(Error::ContentTooLarge(body.len(), url.to_string()));
        }

        Ok(Page { body, content_type })
    }
}

/// Text scraped from one source, ready for summarization
#[derive(Debug, Clone)]
pub struct ScrapedContent {
    pub url: String,
    pub source_name: String,
    pub content: String,
}

/// Outcome of fetching a topic's sources
#[derive(Debug, Default)]
pub struct FetchBatch {
    pub succeeded: Vec<(Source, ScrapedContent)>,
    pub failed: Vec<(Source, Error)>,
    /// Still running (or never started) when the batch deadline hit
    pub unfinished: Vec<Source>,
}

/// Concurrent, bounded source fetcher
#[derive(Clone)]
pub struct ContentFetcher {
    loader: Arc<dyn PageLoader>,
    request_timeout: Duration,
    concurrency: usize,
    max_chars: usize,
    min_chars: usize,
}

impl ContentFetcher {
    /// Fetcher backed by a real HTTP client
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let loader = HttpLoader::new(config)?;
        Ok(Self::with_loader(Arc::new(loader), config))
    }

    pub fn with_loader(loader: Arc<dyn PageLoader>, config: &ScraperConfig) -> Self {
        Self {
            loader,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            concurrency: config.concurrency.max(1),
            max_chars: config.max_content_chars,
            min_chars: config.min_content_chars,
        }
    }

    /// Fetch and extract a single source
    pub async fn fetch_source(&self, source: &Source) -> Result<ScrapedContent> {
        validate_url(&source.url)?;

        let page = tokio::time::timeout(self.request_timeout, self.loader.load(&source.url))
            .await
            .map_err(|_| Error::Timeout(self.request_timeout.as_secs(), source.url.clone()))??;

        let extracted = extract_text(&page.body, page.content_type.as_deref());

        if extracted.text.chars().count() < self.min_chars {
            return Err(Error::InsufficientContent(source.url.clone()));
        }

        let content = match extracted.text.char_indices().nth(self.max_chars) {
            Some((idx, _)) => format!("{}...", &extracted.text[..idx]),
            None => extracted.text,
        };

        let source_name = Some(source.name.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or(extracted.title)
            .or_else(|| host_of(&source.url))
            .unwrap_or_else(|| source.url.clone());

        Ok(ScrapedContent {
            url: source.url.clone(),
            source_name,
            content,
        })
    }

    /// Fetch all sources, at most `concurrency` at a time, within `deadline`.
    ///
    /// One failing source never cancels the others. At the deadline the
    /// remaining tasks are aborted and reported as unfinished.
    pub async fn fetch_all(&self, sources: Vec<Source>, deadline: Duration) -> FetchBatch {
        let mut batch = FetchBatch::default();
        let mut queue: VecDeque<(usize, Source)> = sources.into_iter().enumerate().collect();
        let mut in_flight: HashMap<usize, Source> = HashMap::new();
        let mut join_set: JoinSet<(usize, Result<ScrapedContent>)> = JoinSet::new();

        let timer = tokio::time::sleep(deadline);
        tokio::pin!(timer);

        loop {
            while join_set.len() < self.concurrency {
                let Some((idx, source)) = queue.pop_front() else {
                    break;
                };
                let fetcher = self.clone();
                let task_source = source.clone();
                in_flight.insert(idx, source);

                join_set.spawn(async move {
                    let result = AssertUnwindSafe(fetcher.fetch_source(&task_source))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|payload| {
                            Err(Error::Other(format!(
                                "panic: {}",
                                panic_message(payload.as_ref())
                            )))
                        });
                    (idx, result)
                });
            }

            if join_set.is_empty() {
                break;
            }

            tokio::select! {
                _ = &mut timer => {
                    join_set.abort_all();
                    tracing::warn!(
                        running = in_flight.len(),
                        queued = queue.len(),
                        "Fetch batch deadline reached, aborting remaining sources"
                    );
                    break;
                }
                joined = join_set.join_next() => {
                    let Some(joined) = joined else { break };
                    let (idx, result) = match joined {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::warn!(error = %e, "Fetch task did not complete");
                            continue;
                        }
                    };
                    let Some(source) = in_flight.remove(&idx) else {
                        continue;
                    };
                    match result {
                        Ok(content) => {
                            tracing::debug!(url = %source.url, chars = content.content.len(), "Fetched source");
                            batch.succeeded.push((source, content));
                        }
                        Err(e) => {
                            tracing::warn!(url = %source.url, error = %e, "Failed to fetch source");
                            batch.failed.push((source, e));
                        }
                    }
                }
            }
        }

        let mut unfinished: Vec<(usize, Source)> = in_flight.into_iter().collect();
        unfinished.extend(queue);
        unfinished.sort_by_key(|(idx, _)| *idx);
        batch.unfinished = unfinished.into_iter().map(|(_, source)| source).collect();

        batch
    }
}
