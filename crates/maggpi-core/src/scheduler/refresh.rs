use std::panic::AssertUnwindSafe;

use chrono::{Duration as ChronoDuration, Utc};
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use super::discovery::{discover_and_replace, DiscoveryReport};
use super::leases::TopicLease;
use super::service::{Scheduler, SchedulerEvent};
use crate::ai::Summarizer;
use crate::error::panic_message;
use crate::models::{NewStory, Settings, Source, Topic};
use crate::scraper::{host_of, FetchBatch, ScrapedContent};
use crate::storage::{SettingsRepository, SourceRepository, StatusRepository, StoryRepository, TopicRepository};
use crate::{Error, Result};

/// Outcome of one successful topic refresh
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub topic_id: i64,
    /// Set when the topic had no active sources and discovery ran first
    pub discovery: Option<DiscoveryReport>,
    pub sources_fetched: usize,
    pub sources_failed: usize,
    /// Sources cut off by the batch deadline, counters untouched
    pub sources_unfinished: usize,
    pub stories_created: usize,
    pub stories_pruned: u64,
}

impl Scheduler {
    /// Refresh a topic whose lease is held, recording the outcome as its status.
    ///
    /// The caller keeps `_lease` until this returns, so the final status is
    /// written before another refresh of the topic can start. A panic
    /// anywhere in the attempt becomes a failed status.
    pub(super) async fn refresh_leased(&self, topic_id: i64, _lease: &TopicLease) -> Result<RefreshReport> {
        let outcome = AssertUnwindSafe(self.attempt_refresh(topic_id))
            .catch_unwind()
            .await;

        let result = outcome.unwrap_or_else(|payload| {
            Err(Error::Other(format!("panic: {}", panic_message(payload.as_ref()))))
        });

        let statuses = StatusRepository::new(&self.db);
        let now = Utc::now();

        match &result {
            Ok(report) => {
                let next = now + to_chrono(self.interval());
                if let Err(e) = statuses.mark_completed(topic_id, now, next).await {
                    error!(topic_id, error = %e, "Failed to record completed status");
                }
                info!(
                    topic_id,
                    fetched = report.sources_fetched,
                    failed = report.sources_failed,
                    stories = report.stories_created,
                    "Topic refreshed"
                );
                self.send_event(SchedulerEvent::TopicRefreshed {
                    topic_id,
                    stories: report.stories_created as u32,
                });
            }
            // Nothing to record for a topic that does not exist
            Err(Error::TopicNotFound(_)) => {}
            Err(e) => {
                let message = e.to_string();
                let retry_at = now + to_chrono(self.config.scheduler.retry_backoff());
                if let Err(write_err) = statuses.mark_failed(topic_id, retry_at, &message).await {
                    error!(topic_id, error = %write_err, "Failed to record failed status");
                }
                warn!(topic_id, error = %message, "Topic refresh failed");
                self.send_event(SchedulerEvent::TopicFailed { topic_id, message });
            }
        }

        result
    }

    async fn attempt_refresh(&self, topic_id: i64) -> Result<RefreshReport> {
        let topic = TopicRepository::new(&self.db)
            .find_by_id(topic_id)
            .await?
            .ok_or(Error::TopicNotFound(topic_id))?;
        let settings = SettingsRepository::new(&self.db).get().await?;
        let summarizer = Summarizer::new(&self.providers, &settings.ai_api_key)?;

        if let Err(e) = StatusRepository::new(&self.db).mark_in_progress(topic_id).await {
            warn!(topic_id, error = %e, "Failed to record in-progress status");
        }

        let mut report = RefreshReport {
            topic_id,
            ..RefreshReport::default()
        };

        let sources = SourceRepository::new(&self.db);
        let mut active = sources.list_active_for_topic(topic_id).await?;
        if active.is_empty() {
            info!(topic_id, "No active sources, running discovery");
            let discovery = self
                .discover_for(&topic, &settings, &summarizer)
                .await
                .map_err(|e| Error::Other(format!("failed to discover sources: {}", e)))?;
            report.discovery = Some(discovery);
            active = sources.list_active_for_topic(topic_id).await?;
        }
        if active.is_empty() {
            return Err(Error::NoSources);
        }

        let batch = self
            .fetcher
            .fetch_all(active.clone(), self.config.scheduler.batch_timeout())
            .await;
        self.record_source_outcomes(&batch).await;

        report.sources_fetched = batch.succeeded.len();
        report.sources_failed = batch.failed.len();
        report.sources_unfinished = batch.unfinished.len();

        if batch.succeeded.is_empty() {
            return Err(Error::NoContent);
        }

        let contents: Vec<ScrapedContent> = batch.succeeded.into_iter().map(|(_, c)| c).collect();
        let stories = summarizer
            .summarize_content(
                &topic.name,
                contents,
                &settings.global_summarizing_prompt,
                settings.stories_per_topic.max(1) as usize,
            )
            .await?;

        let story_repo = StoryRepository::new(&self.db);
        let now = Utc::now();
        for story in stories {
            let new_story = NewStory {
                topic_id,
                source_id: match_source(&active, &story.source_url),
                title: story.title.trim().to_string(),
                summary: story.summary.trim().to_string(),
                source_url: story.source_url,
                source_title: Some(story.source_title).filter(|t| !t.trim().is_empty()),
                image_url: None,
                published_at: Some(now),
            };
            match story_repo.create(&new_story).await {
                Ok(_) => report.stories_created += 1,
                Err(e) => error!(topic_id, title = %new_story.title, error = %e, "Failed to store story"),
            }
        }

        report.stories_pruned = story_repo
            .prune(topic_id, settings.retained_stories())
            .await?;
        if report.stories_pruned > 0 {
            debug!(topic_id, pruned = report.stories_pruned, "Pruned old stories");
        }

        Ok(report)
    }

    /// Apply failure counters and resets; write errors are logged only
    async fn record_source_outcomes(&self, batch: &FetchBatch) {
        let repo = SourceRepository::new(&self.db);

        for (source, err) in &batch.failed {
            let (failure_count, is_active) = source.after_failure();
            if !is_active {
                warn!(source_id = source.id, url = %source.url, "Deactivating source after repeated failures");
            }
            if let Err(e) = repo
                .record_failure(source.id, failure_count, is_active, &err.to_string())
                .await
            {
                error!(source_id = source.id, error = %e, "Failed to record source failure");
            }
        }

        for (source, _) in &batch.succeeded {
            if !source.needs_reset() {
                continue;
            }
            if let Err(e) = repo.record_success(source.id).await {
                error!(source_id = source.id, error = %e, "Failed to reset source failures");
            }
        }

        for source in &batch.unfinished {
            debug!(source_id = source.id, url = %source.url, "Source not fetched before batch deadline");
        }
    }

    /// Rediscover a topic whose lease is held
    pub(super) async fn discover_leased(&self, topic_id: i64) -> Result<DiscoveryReport> {
        let topic = TopicRepository::new(&self.db)
            .find_by_id(topic_id)
            .await?
            .ok_or(Error::TopicNotFound(topic_id))?;
        let settings = SettingsRepository::new(&self.db).get().await?;
        let summarizer = Summarizer::new(&self.providers, &settings.ai_api_key)?;

        self.discover_for(&topic, &settings, &summarizer).await
    }

    async fn discover_for(
        &self,
        topic: &Topic,
        settings: &Settings,
        summarizer: &Summarizer,
    ) -> Result<DiscoveryReport> {
        let report = discover_and_replace(
            &self.db,
            summarizer,
            topic,
            &settings.global_sourcing_prompt,
            self.config.scheduler.discovery_timeout(),
        )
        .await?;

        self.send_event(SchedulerEvent::SourcesDiscovered {
            topic_id: topic.id,
            inserted: report.inserted as u32,
        });
        Ok(report)
    }
}

/// Source of the topic whose host matches a story's URL
fn match_source(sources: &[Source], story_url: &str) -> Option<i64> {
    let host = host_of(story_url)?;
    sources
        .iter()
        .find(|s| host_of(&s.url).as_deref() == Some(host.as_str()))
        .map(|s| s.id)
}

fn to_chrono(duration: std::time::Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or_else(|_| ChronoDuration::minutes(5))
}
