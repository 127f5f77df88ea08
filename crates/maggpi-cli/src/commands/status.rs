use anyhow::Result;
use chrono::{DateTime, Local, Utc};

use maggpi_core::storage::{Database, StatusRepository, TopicRepository};

pub async fn run(db: &Database) -> Result<()> {
    let topics = TopicRepository::new(db).list_all().await?;
    let statuses = StatusRepository::new(db);

    if topics.is_empty() {
        println!("No topics yet.");
        return Ok(());
    }

    println!("Refresh status:\n");
    for topic in &topics {
        let Some(status) = statuses.get(topic.id).await? else {
            println!("  [{}] {}: pending (never refreshed)", topic.id, topic.name);
            continue;
        };

        println!("  [{}] {}: {}", topic.id, topic.name, status.status);
        println!("    Last refresh: {}", format_time(status.last_refresh));
        println!("    Next refresh: {}", format_time(status.next_refresh));
        if let Some(error) = &status.error_message {
            println!("    [ERROR: {}]", error);
        }
    }

    Ok(())
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(t) => t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => "never".to_string(),
    }
}
