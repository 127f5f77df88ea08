use crate::storage::{Database, TopicRepository};
use crate::Result;

/// Topics created on a fresh database
pub const DEFAULT_TOPICS: &[(&str, &str)] = &[
    (
        "World News",
        "Major international news and current events from around the globe. Focus on significant political developments, international relations, and major world events.",
    ),
    (
        "Formula 1",
        "Formula 1 racing news including race results, driver standings, team updates, technical regulations, and breaking news from the F1 paddock.",
    ),
    (
        "Science News",
        "Latest scientific discoveries and research breakthroughs across all fields including physics, biology, astronomy, climate science, and medical research.",
    ),
    (
        "Tech News",
        "Technology industry news including product launches, company updates, software releases, AI developments, and emerging tech trends.",
    ),
];

/// Create the default topics when no topic exists yet; returns how many were added
pub async fn seed_default_topics(db: &Database) -> Result<usize> {
    let repo = TopicRepository::new(db);
    if repo.count().await? > 0 {
        return Ok(0);
    }

    for (name, description) in DEFAULT_TOPICS {
        repo.create(name, description).await?;
        tracing::info!(topic = %name, "Created default topic");
    }

    Ok(DEFAULT_TOPICS.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_only_empty_database() {
        let db = Database::new_in_memory().await.unwrap();

        assert_eq!(seed_default_topics(&db).await.unwrap(), 4);
        assert_eq!(seed_default_topics(&db).await.unwrap(), 0);

        let names: Vec<_> = TopicRepository::new(&db)
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["World News", "Formula 1", "Science News", "Tech News"]);
    }
}
