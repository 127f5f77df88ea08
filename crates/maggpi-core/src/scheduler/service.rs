use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::discovery::DiscoveryReport;
use super::leases::TopicLeases;
use super::refresh::RefreshReport;
use super::status::is_due;
use crate::ai::{provider_factory, ProviderFactory};
use crate::config::AppConfig;
use crate::error::panic_message;
use crate::models::RefreshState;
use crate::scraper::ContentFetcher;
use crate::storage::{Database, SettingsRepository, SourceRepository, StatusRepository, TopicRepository};
use crate::{Error, Result};

const DEFAULT_INTERVAL_MINUTES: u64 = 120;

/// Events emitted by the scheduler
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A topic refresh completed
    TopicRefreshed { topic_id: i64, stories: u32 },
    /// A topic refresh failed and was recorded as such
    TopicFailed { topic_id: i64, message: String },
    /// Discovery replaced a topic's AI-sourced rows
    SourcesDiscovered { topic_id: i64, inserted: u32 },
    /// The loop exited; `error` is set when it died on a panic
    LoopStopped { error: Option<String> },
}

/// Mutable scheduler state, only touched through [`Scheduler`] methods
pub(super) struct SchedulerState {
    running: bool,
    interval: Duration,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
    /// Bumped on every start so a dying loop never clears a newer one
    generation: u64,
}

/// Background refresh scheduler.
///
/// Cheap to clone; clones share the loop state, leases and storage.
#[derive(Clone)]
pub struct Scheduler {
    pub(super) db: Arc<Database>,
    pub(super) config: Arc<AppConfig>,
    pub(super) fetcher: ContentFetcher,
    pub(super) providers: ProviderFactory,
    pub(super) leases: TopicLeases,
    state: Arc<Mutex<SchedulerState>>,
    event_tx: Option<mpsc::UnboundedSender<SchedulerEvent>>,
}

impl Scheduler {
    /// Create a scheduler with the HTTP fetcher and the configured AI provider
    pub fn new(db: Arc<Database>, config: Arc<AppConfig>) -> Result<Self> {
        let fetcher = ContentFetcher::new(&config.scraper)?;
        let providers = provider_factory(&config.ai);
        Ok(Self::with_parts(db, config, fetcher, providers))
    }

    /// Create a scheduler from explicit collaborators
    pub fn with_parts(
        db: Arc<Database>,
        config: Arc<AppConfig>,
        fetcher: ContentFetcher,
        providers: ProviderFactory,
    ) -> Self {
        Self {
            db,
            config,
            fetcher,
            providers,
            leases: TopicLeases::new(),
            state: Arc::new(Mutex::new(SchedulerState {
                running: false,
                interval: Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60),
                shutdown: None,
                handle: None,
                generation: 0,
            })),
            event_tx: None,
        }
    }

    /// Set the event sender for front-end notifications
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub(super) fn send_event(&self, event: SchedulerEvent) {
        if let Some(ref tx) = self.event_tx {
            if tx.send(event).is_err() {
                debug!("Failed to send scheduler event: receiver dropped");
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start the loop. Returns false when one is already running.
    pub fn start(&self) -> bool {
        let mut state = self.lock_state();
        if state.running {
            debug!("Scheduler already running");
            return false;
        }

        state.generation += 1;
        let generation = state.generation;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            scheduler.run_loop(shutdown_rx, generation).await;
        });

        state.running = true;
        state.shutdown = Some(shutdown_tx);
        state.handle = Some(handle);

        info!(generation, "Scheduler started");
        true
    }

    /// Signal the loop to stop and wait for it to exit.
    ///
    /// In-flight network calls are not cancelled; they run to their own
    /// timeout before the loop notices.
    pub async fn stop(&self) {
        let (shutdown, handle, generation) = {
            let mut state = self.lock_state();
            (state.shutdown.take(), state.handle.take(), state.generation)
        };

        if let Some(tx) = shutdown {
            let _ = tx.send(true);
        }

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Scheduler loop did not exit cleanly");
            }
        }

        // A start() that ran while we waited owns the flag now
        let mut state = self.lock_state();
        if state.generation == generation {
            state.running = false;
        }
        drop(state);
        info!("Scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().running
    }

    /// Change the refresh interval; 0 is clamped to 1 minute
    pub fn update_interval(&self, minutes: u64) {
        let minutes = minutes.max(1);
        self.lock_state().interval = Duration::from_secs(minutes * 60);
        debug!(minutes, "Refresh interval updated");
    }

    pub fn interval(&self) -> Duration {
        self.lock_state().interval
    }

    /// Refresh a topic now and wait for the outcome
    pub async fn refresh_topic(&self, topic_id: i64) -> Result<RefreshReport> {
        let lease = self
            .leases
            .try_acquire(topic_id)
            .ok_or(Error::RefreshInProgress(topic_id))?;
        self.refresh_leased(topic_id, &lease).await
    }

    /// Refresh a topic in the background
    pub fn spawn_refresh(&self, topic_id: i64) -> JoinHandle<Result<RefreshReport>> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.refresh_topic(topic_id).await })
    }

    /// Rediscover a topic's sources now
    pub async fn discover_sources(&self, topic_id: i64) -> Result<DiscoveryReport> {
        let _lease = self
            .leases
            .try_acquire(topic_id)
            .ok_or(Error::RefreshInProgress(topic_id))?;
        self.discover_leased(topic_id).await
    }

    /// Rediscover a topic's sources in the background
    pub fn spawn_discovery(&self, topic_id: i64) -> JoinHandle<Result<DiscoveryReport>> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let result = scheduler.discover_sources(topic_id).await;
            if let Err(ref e) = result {
                warn!(topic_id, error = %e, "Background discovery failed");
            }
            result
        })
    }

    async fn run_loop(self, mut shutdown: watch::Receiver<bool>, generation: u64) {
        let outcome = AssertUnwindSafe(self.loop_body(&mut shutdown))
            .catch_unwind()
            .await;

        let fault = outcome.err().map(|payload| panic_message(payload.as_ref()));
        if let Some(ref message) = fault {
            error!(panic = %message, "Scheduler loop panicked, marking it stopped");
        }

        {
            let mut state = self.lock_state();
            if state.generation == generation {
                state.running = false;
                state.shutdown = None;
                if fault.is_some() {
                    // Nobody will join this task anymore
                    state.handle = None;
                }
            }
        }

        self.send_event(SchedulerEvent::LoopStopped { error: fault });
    }

    async fn loop_body(&self, shutdown: &mut watch::Receiver<bool>) {
        let timings = &self.config.scheduler;

        self.reset_stale_statuses().await;

        if sleep_or_shutdown(timings.warmup(), shutdown).await {
            return;
        }

        if self.initialize_sources(shutdown).await {
            return;
        }

        loop {
            if *shutdown.borrow() {
                return;
            }

            self.reload_interval().await;

            let topics = match TopicRepository::new(&self.db).list_all().await {
                Ok(topics) => topics,
                Err(e) => {
                    error!(error = %e, "Failed to list topics");
                    if sleep_or_shutdown(timings.list_retry(), shutdown).await {
                        return;
                    }
                    continue;
                }
            };

            let statuses: HashMap<i64, _> = match StatusRepository::new(&self.db).list_all().await {
                Ok(rows) => rows.into_iter().map(|s| (s.topic_id, s)).collect(),
                Err(e) => {
                    error!(error = %e, "Failed to load refresh statuses");
                    if sleep_or_shutdown(timings.list_retry(), shutdown).await {
                        return;
                    }
                    continue;
                }
            };

            let now = Utc::now();
            let due: Vec<_> = topics
                .into_iter()
                .filter(|t| is_due(statuses.get(&t.id), now))
                .collect();

            if !due.is_empty() {
                info!(count = due.len(), "Refreshing due topics");
            }

            for topic in due {
                if *shutdown.borrow() {
                    return;
                }

                match self.leases.try_acquire(topic.id) {
                    Some(lease) => {
                        // Failures are recorded as status rows inside
                        let _ = self.refresh_leased(topic.id, &lease).await;
                    }
                    None => {
                        debug!(topic_id = topic.id, "Topic already being refreshed, skipping");
                        continue;
                    }
                }

                if sleep_or_shutdown(timings.topic_delay(), shutdown).await {
                    return;
                }
            }

            if sleep_or_shutdown(timings.pass_delay(), shutdown).await {
                return;
            }
        }
    }

    /// Rows left `in_progress` by a previous process would never be due again
    async fn reset_stale_statuses(&self) {
        let repo = StatusRepository::new(&self.db);
        let rows = match repo.list_all().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Failed to load refresh statuses for stale reset");
                return;
            }
        };

        for row in rows {
            if row.status != RefreshState::InProgress || self.leases.is_held(row.topic_id) {
                continue;
            }
            match repo.reset_if_in_progress(row.topic_id).await {
                Ok(true) => info!(topic_id = row.topic_id, "Reset stale in-progress status"),
                Ok(false) => {}
                Err(e) => warn!(topic_id = row.topic_id, error = %e, "Failed to reset stale status"),
            }
        }
    }

    /// Discover sources for every topic without any. Returns true on shutdown.
    async fn initialize_sources(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let settings = match SettingsRepository::new(&self.db).get().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Failed to load settings, skipping source initialization");
                return false;
            }
        };
        if !settings.has_api_key() {
            info!("No AI API key configured, skipping source initialization");
            return false;
        }

        let topics = match TopicRepository::new(&self.db).list_all().await {
            Ok(topics) => topics,
            Err(e) => {
                warn!(error = %e, "Failed to list topics, skipping source initialization");
                return false;
            }
        };

        let sources = SourceRepository::new(&self.db);
        for topic in topics {
            if *shutdown.borrow() {
                return true;
            }

            match sources.count_for_topic(topic.id).await {
                Ok(0) => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!(topic_id = topic.id, error = %e, "Failed to count sources");
                    continue;
                }
            }

            let Some(_lease) = self.leases.try_acquire(topic.id) else {
                continue;
            };
            if let Err(e) = self.discover_leased(topic.id).await {
                warn!(topic_id = topic.id, error = %e, "Initial source discovery failed");
            }

            if sleep_or_shutdown(self.config.scheduler.init_topic_delay(), shutdown).await {
                return true;
            }
        }

        false
    }

    /// Pick up the interval from settings, keeping the current one on error
    async fn reload_interval(&self) {
        match SettingsRepository::new(&self.db).get().await {
            Ok(settings) => self.update_interval(settings.refresh_interval_minutes.max(0) as u64),
            Err(e) => warn!(error = %e, "Failed to reload settings, keeping current interval"),
        }
    }
}

/// Sleep unless shutdown is signalled first. Returns true on shutdown.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
