use anyhow::Result;
use chrono::Local;

use maggpi_core::storage::{Database, SettingsRepository, StoryRepository};

use super::resolve_topic;

pub async fn run(db: &Database, key: &str, limit: Option<u32>) -> Result<()> {
    let topic = resolve_topic(db, key).await?;
    let limit = match limit {
        Some(limit) => limit,
        None => SettingsRepository::new(db).get().await?.stories_per_topic.max(1) as u32,
    };

    let stories = StoryRepository::new(db).list_for_topic(topic.id, limit).await?;
    if stories.is_empty() {
        println!("No stories for {} yet.", topic.name);
        println!("\nTo fetch some now, run:");
        println!("  maggpi refresh {}", topic.id);
        return Ok(());
    }

    println!("{} ({} stories):\n", topic.name, stories.len());
    for story in &stories {
        println!("  {}", story.title);
        let source = story.source_title.as_deref().unwrap_or(&story.source_url);
        let published = story
            .published_at
            .unwrap_or(story.created_at)
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M");
        println!("    {} | {}", source, published);
        println!("    {}", story.summary);
        println!("    {}", story.source_url);
        println!();
    }

    Ok(())
}
