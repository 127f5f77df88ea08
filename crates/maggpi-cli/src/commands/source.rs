use anyhow::Result;

use maggpi_core::{
    models::NewSource,
    scraper::{host_of, validate_url},
    storage::{Database, SourceRepository},
};

use super::resolve_topic;

pub async fn list(db: &Database, key: &str) -> Result<()> {
    let topic = resolve_topic(db, key).await?;
    let sources = SourceRepository::new(db).list_for_topic(topic.id).await?;

    if sources.is_empty() {
        println!("No sources for {} yet.", topic.name);
        return Ok(());
    }

    println!("Sources for {} ({}):\n", topic.name, sources.len());
    for source in &sources {
        let origin = if source.is_manual { "manual" } else { "ai" };
        let state = if source.is_active { "active" } else { "inactive" };

        println!("  [{}] {} ({}, {})", source.id, source.name, origin, state);
        println!("    URL: {}", source.url);
        if source.failure_count > 0 {
            let error = source.last_error.as_deref().unwrap_or("unknown error");
            println!("    Failures: {} [ERROR: {}]", source.failure_count, error);
        }
    }

    Ok(())
}

/// Add a manual source after checking the URL is absolute http(s)
pub async fn add(db: &Database, key: &str, url: &str, name: Option<&str>) -> Result<()> {
    let topic = resolve_topic(db, key).await?;
    let url = validate_url(url.trim())?;

    let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => host_of(url.as_str()).unwrap_or_else(|| url.to_string()),
    };

    let source = SourceRepository::new(db)
        .create(&NewSource {
            topic_id: topic.id,
            url: url.to_string(),
            name,
            description: None,
            is_manual: true,
        })
        .await?;

    println!("Added source to {}: {} ({})", topic.name, source.name, source.id);

    Ok(())
}

pub async fn remove(db: &Database, id: i64) -> Result<()> {
    if SourceRepository::new(db).delete(id).await? {
        println!("Deleted source {}", id);
    } else {
        println!("Source {} not found.", id);
    }

    Ok(())
}
