use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::info;

use maggpi_core::{
    storage::{Database, SettingsRepository},
    AppConfig, Scheduler, SchedulerEvent,
};

/// Run the scheduler in the foreground until Ctrl+C
pub async fn run(db: Arc<Database>, config: Arc<AppConfig>) -> Result<()> {
    let settings = SettingsRepository::new(&db).get().await?;
    if !settings.has_api_key() {
        println!("No AI API key configured; topics will fail until one is set:");
        println!("  maggpi settings set api_key <key>");
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let scheduler = Scheduler::new(db, config)?.with_event_sender(event_tx);
    scheduler.update_interval(settings.refresh_interval_minutes.max(1) as u64);

    scheduler.start();
    println!(
        "maggpi scheduler started (interval: {} minutes). Press Ctrl+C to stop.",
        scheduler.interval().as_secs() / 60
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            Some(event) = event_rx.recv() => match event {
                SchedulerEvent::TopicRefreshed { topic_id, stories } => {
                    println!("Topic {} refreshed: {} new stories", topic_id, stories);
                }
                SchedulerEvent::TopicFailed { topic_id, message } => {
                    println!("Topic {} failed: {}", topic_id, message);
                }
                SchedulerEvent::SourcesDiscovered { topic_id, inserted } => {
                    println!("Topic {}: {} sources discovered", topic_id, inserted);
                }
                SchedulerEvent::LoopStopped { error } => {
                    if let Some(error) = error {
                        println!("Scheduler loop stopped: {}", error);
                    }
                    break;
                }
            },
        }
    }

    scheduler.stop().await;
    println!("Scheduler stopped.");

    Ok(())
}
