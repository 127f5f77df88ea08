use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::retry::with_retry;
use super::Database;
use crate::models::{NewStory, Story};
use crate::Result;

/// Repository for summarized stories
pub struct StoryRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct StoryRow {
    id: i64,
    topic_id: i64,
    source_id: Option<i64>,
    title: String,
    summary: String,
    source_url: String,
    source_title: Option<String>,
    image_url: Option<String>,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<StoryRow> for Story {
    fn from(row: StoryRow) -> Self {
        Story {
            id: row.id,
            topic_id: row.topic_id,
            source_id: row.source_id,
            title: row.title,
            summary: row.summary,
            source_url: row.source_url,
            source_title: row.source_title,
            image_url: row.image_url,
            published_at: row.published_at,
            created_at: row.created_at,
        }
    }
}

impl<'a> StoryRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert a story, returning its ID
    pub async fn create(&self, story: &NewStory) -> Result<i64> {
        let pool = self.db.pool();
        let now = Utc::now();

        let id = with_retry("insert_story", || async move {
            sqlx::query(
                r#"
                INSERT INTO stories (topic_id, source_id, title, summary, source_url, source_title,
                                     image_url, published_at, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(story.topic_id)
            .bind(story.source_id)
            .bind(&story.title)
            .bind(&story.summary)
            .bind(&story.source_url)
            .bind(&story.source_title)
            .bind(&story.image_url)
            .bind(story.published_at)
            .bind(now)
            .execute(pool)
            .await
            .map(|result| result.last_insert_rowid())
        })
        .await?;

        Ok(id)
    }

    /// Most recent stories of a topic, newest first
    pub async fn list_for_topic(&self, topic_id: i64, limit: u32) -> Result<Vec<Story>> {
        let rows: Vec<StoryRow> = sqlx::query_as(
            r#"
            SELECT id, topic_id, source_id, title, summary, source_url, source_title,
                   image_url, published_at, created_at
            FROM stories
            WHERE topic_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(topic_id)
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Story::from).collect())
    }

    /// Delete everything beyond the `keep` most recent stories of a topic
    pub async fn prune(&self, topic_id: i64, keep: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM stories
            WHERE topic_id = ?
              AND id NOT IN (
                  SELECT id FROM stories
                  WHERE topic_id = ?
                  ORDER BY created_at DESC, id DESC
                  LIMIT ?
              )
            "#,
        )
        .bind(topic_id)
        .bind(topic_id)
        .bind(keep.max(0))
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Number of stories stored for a topic
    pub async fn count_for_topic(&self, topic_id: i64) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stories WHERE topic_id = ?")
            .bind(topic_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::NewSource;
    use crate::storage::{SourceRepository, StatusRepository, TopicRepository};

    fn story(topic_id: i64, source_id: Option<i64>, title: &str) -> NewStory {
        NewStory {
            topic_id,
            source_id,
            title: title.to_string(),
            summary: "summary".to_string(),
            source_url: "https://example.com/a".to_string(),
            source_title: None,
            image_url: None,
            published_at: None,
        }
    }

    #[tokio::test]
    async fn test_prune_keeps_most_recent() {
        let db = Database::new_in_memory().await.unwrap();
        let topic = TopicRepository::new(&db).create("T", "d").await.unwrap();
        let repo = StoryRepository::new(&db);

        for i in 0..20 {
            repo.create(&story(topic.id, None, &format!("story {i}"))).await.unwrap();
        }

        // stories_per_topic = 5 keeps 15
        let deleted = repo.prune(topic.id, 15).await.unwrap();
        assert_eq!(deleted, 5);
        assert_eq!(repo.count_for_topic(topic.id).await.unwrap(), 15);

        let newest = repo.list_for_topic(topic.id, 1).await.unwrap();
        assert_eq!(newest[0].title, "story 19");

        let all = repo.list_for_topic(topic.id, 100).await.unwrap();
        assert_eq!(all.last().unwrap().title, "story 5");

        assert_eq!(repo.prune(topic.id, 15).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.general.data_dir = dir.path().to_path_buf();
        let db = Database::new(&config).await.unwrap();

        let topic = TopicRepository::new(&db).create("T", "d").await.unwrap();
        let statuses = StatusRepository::new(&db);
        statuses.mark_in_progress(topic.id).await.unwrap();

        let repo = StoryRepository::new(&db);
        let inserts = (0..25).map(|i| {
            let new_story = story(topic.id, None, &format!("story {i}"));
            let repo = &repo;
            async move { repo.create(&new_story).await }
        });
        let (ids, reset) = tokio::join!(
            futures::future::join_all(inserts),
            statuses.reset_if_in_progress(topic.id)
        );

        let mut ids: Vec<i64> = ids.into_iter().map(|r| r.unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 25);
        assert!(reset.unwrap());
        assert_eq!(repo.count_for_topic(topic.id).await.unwrap(), 25);
    }

    #[tokio::test]
    async fn test_prune_is_scoped_to_topic() {
        let db = Database::new_in_memory().await.unwrap();
        let topics = TopicRepository::new(&db);
        let a = topics.create("A", "a").await.unwrap();
        let b = topics.create("B", "b").await.unwrap();
        let repo = StoryRepository::new(&db);

        for _ in 0..4 {
            repo.create(&story(a.id, None, "a")).await.unwrap();
            repo.create(&story(b.id, None, "b")).await.unwrap();
        }

        assert_eq!(repo.prune(a.id, 1).await.unwrap(), 3);
        assert_eq!(repo.count_for_topic(b.id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_deleting_source_unlinks_story() {
        let db = Database::new_in_memory().await.unwrap();
        let topic = TopicRepository::new(&db).create("T", "d").await.unwrap();
        let sources = SourceRepository::new(&db);
        let source = sources
            .create(&NewSource {
                topic_id: topic.id,
                url: "https://example.com".to_string(),
                name: "Example".to_string(),
                description: None,
                is_manual: true,
            })
            .await
            .unwrap();

        let repo = StoryRepository::new(&db);
        repo.create(&story(topic.id, Some(source.id), "linked")).await.unwrap();
        sources.delete(source.id).await.unwrap();

        let stories = repo.list_for_topic(topic.id, 10).await.unwrap();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].source_id, None);
    }
}
