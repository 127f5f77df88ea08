use std::sync::Arc;

use anyhow::Result;

use maggpi_core::{storage::Database, AppConfig, Scheduler};

use super::resolve_topic;

pub async fn refresh(db: Arc<Database>, config: Arc<AppConfig>, key: &str) -> Result<()> {
    let topic = resolve_topic(&db, key).await?;
    println!("Refreshing {}...\n", topic.name);

    let scheduler = Scheduler::new(db, config)?;
    let report = scheduler.refresh_topic(topic.id).await?;

    if let Some(discovery) = &report.discovery {
        println!("  Discovered {} sources", discovery.inserted);
    }
    println!(
        "  Sources: {} fetched, {} failed, {} unfinished",
        report.sources_fetched, report.sources_failed, report.sources_unfinished
    );
    println!(
        "\nRefresh complete. {} new stories ({} old stories pruned).",
        report.stories_created, report.stories_pruned
    );

    Ok(())
}

pub async fn discover(db: Arc<Database>, config: Arc<AppConfig>, key: &str) -> Result<()> {
    let topic = resolve_topic(&db, key).await?;
    println!("Discovering sources for {}...", topic.name);

    let scheduler = Scheduler::new(db, config)?;
    let report = scheduler.discover_sources(topic.id).await?;

    println!(
        "Discovered {} sources ({} proposed, {} skipped).",
        report.inserted, report.proposed, report.skipped
    );

    Ok(())
}
