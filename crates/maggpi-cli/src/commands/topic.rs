use std::sync::Arc;

use anyhow::{bail, Result};

use maggpi_core::{
    storage::{Database, SourceRepository, StatusRepository, TopicRepository},
    AppConfig, Scheduler,
};

use super::resolve_topic;

pub async fn list(db: &Database) -> Result<()> {
    let topics = TopicRepository::new(db).list_all().await?;

    if topics.is_empty() {
        println!("No topics yet.");
        println!("\nTo create one, run:");
        println!("  maggpi topic add <name> -d <description>");
        return Ok(());
    }

    let sources = SourceRepository::new(db);
    let statuses = StatusRepository::new(db);

    println!("Topics ({}):\n", topics.len());
    for topic in &topics {
        let source_count = sources.count_for_topic(topic.id).await?;
        let state = statuses
            .get(topic.id)
            .await?
            .map(|s| s.status.to_string())
            .unwrap_or_else(|| "never refreshed".to_string());

        println!("  [{}] {} ({} sources, {})", topic.id, topic.name, source_count, state);
        if !topic.description.is_empty() {
            println!("    {}", topic.description);
        }
    }

    Ok(())
}

pub async fn add(db: &Database, name: &str, description: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Topic name must not be empty");
    }

    let topic = TopicRepository::new(db).create(name, description.trim()).await?;
    println!("Created topic: {} ({})", topic.name, topic.id);
    println!("Sources are discovered on the first refresh, or now with:");
    println!("  maggpi discover {}", topic.id);

    Ok(())
}

/// Update a topic; a changed description re-runs source discovery
pub async fn edit(
    db: Arc<Database>,
    config: Arc<AppConfig>,
    key: &str,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    let topic = resolve_topic(&db, key).await?;

    let new_name = name.map(str::trim).unwrap_or(&topic.name);
    let new_description = description.map(str::trim).unwrap_or(&topic.description);
    if new_name.is_empty() {
        bail!("Topic name must not be empty");
    }

    let description_changed = TopicRepository::new(&db)
        .update(topic.id, new_name, new_description)
        .await?;
    println!("Updated topic: {} ({})", new_name, topic.id);

    if description_changed {
        println!("Description changed, rediscovering sources...");
        let scheduler = Scheduler::new(db, config)?;
        match scheduler.discover_sources(topic.id).await {
            Ok(report) => println!(
                "Discovered {} sources ({} proposed, {} skipped).",
                report.inserted, report.proposed, report.skipped
            ),
            Err(e) => println!("Source discovery failed: {}", e),
        }
    }

    Ok(())
}

pub async fn remove(db: &Database, key: &str) -> Result<()> {
    let topic = resolve_topic(db, key).await?;

    if TopicRepository::new(db).delete(topic.id).await? {
        println!("Deleted topic: {}", topic.name);
    } else {
        println!("Topic '{}' was already gone.", topic.name);
    }

    Ok(())
}

pub async fn reorder(db: &Database, ids: &[i64]) -> Result<()> {
    let repo = TopicRepository::new(db);
    for id in ids {
        if repo.find_by_id(*id).await?.is_none() {
            bail!("Topic {} not found", id);
        }
    }

    repo.reorder(ids).await?;
    println!("Topic order updated.");

    Ok(())
}
