use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::retry::with_retry;
use super::Database;
use crate::models::{truncate_chars, NewSource, Source, MAX_ERROR_MESSAGE_CHARS};
use crate::{Error, Result};

/// Repository for topic sources
pub struct SourceRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct SourceRow {
    id: i64,
    topic_id: i64,
    url: String,
    name: String,
    description: Option<String>,
    is_manual: i32,
    is_active: i32,
    failure_count: i64,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<SourceRow> for Source {
    fn from(row: SourceRow) -> Self {
        Source {
            id: row.id,
            topic_id: row.topic_id,
            url: row.url,
            name: row.name,
            description: row.description,
            is_manual: row.is_manual != 0,
            is_active: row.is_active != 0,
            failure_count: row.failure_count,
            last_error: row.last_error,
            created_at: row.created_at,
        }
    }
}

const SELECT_SOURCE: &str = r#"
    SELECT id, topic_id, url, name, description, is_manual, is_active,
           failure_count, last_error, created_at
    FROM sources
"#;

impl<'a> SourceRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Add a source to a topic
    pub async fn create(&self, new_source: &NewSource) -> Result<Source> {
        let result = sqlx::query(
            r#"
            INSERT INTO sources (topic_id, url, name, description, is_manual, is_active, failure_count, created_at)
            VALUES (?, ?, ?, ?, ?, 1, 0, ?)
            "#,
        )
        .bind(new_source.topic_id)
        .bind(&new_source.url)
        .bind(&new_source.name)
        .bind(&new_source.description)
        .bind(new_source.is_manual as i32)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;

        let id = result.last_insert_rowid();
        self.find_by_id(id).await?.ok_or(Error::SourceNotFound(id))
    }

    /// Find a source by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Source>> {
        let row: Option<SourceRow> = sqlx::query_as(&format!("{SELECT_SOURCE} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(Source::from))
    }

    /// All sources of a topic, active or not
    pub async fn list_for_topic(&self, topic_id: i64) -> Result<Vec<Source>> {
        let rows: Vec<SourceRow> =
            sqlx::query_as(&format!("{SELECT_SOURCE} WHERE topic_id = ? ORDER BY id ASC"))
                .bind(topic_id)
                .fetch_all(self.db.pool())
                .await?;

        Ok(rows.into_iter().map(Source::from).collect())
    }

    /// Sources that are still scraped on refresh
    pub async fn list_active_for_topic(&self, topic_id: i64) -> Result<Vec<Source>> {
        let rows: Vec<SourceRow> = sqlx::query_as(&format!(
            "{SELECT_SOURCE} WHERE topic_id = ? AND is_active = 1 ORDER BY id ASC"
        ))
        .bind(topic_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Source::from).collect())
    }

    /// Number of sources (active or not) attached to a topic
    pub async fn count_for_topic(&self, topic_id: i64) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sources WHERE topic_id = ?")
            .bind(topic_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }

    /// Persist the outcome of a failed fetch
    pub async fn record_failure(
        &self,
        id: i64,
        failure_count: i64,
        is_active: bool,
        error: &str,
    ) -> Result<()> {
        let error = truncate_chars(error, MAX_ERROR_MESSAGE_CHARS);
        let pool = self.db.pool();

        with_retry("record_source_failure", || async move {
            sqlx::query(
                "UPDATE sources SET failure_count = ?, is_active = ?, last_error = ? WHERE id = ?",
            )
            .bind(failure_count)
            .bind(is_active as i32)
            .bind(error)
            .bind(id)
            .execute(pool)
            .await
            .map(|_| ())
        })
        .await?;

        Ok(())
    }

    /// Reset the failure counter and reactivate after a successful fetch
    pub async fn record_success(&self, id: i64) -> Result<()> {
        let pool = self.db.pool();

        with_retry("record_source_success", || async move {
            sqlx::query(
                "UPDATE sources SET failure_count = 0, is_active = 1, last_error = NULL WHERE id = ?",
            )
            .bind(id)
            .execute(pool)
            .await
            .map(|_| ())
        })
        .await?;

        Ok(())
    }

    /// Replace every AI-discovered source of a topic with `sources`.
    ///
    /// Delete and insert run in one transaction, so a failed insert leaves
    /// the previous set in place. Manual sources are never touched.
    pub async fn replace_ai_sources(&self, topic_id: i64, sources: &[NewSource]) -> Result<usize> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM sources WHERE topic_id = ? AND is_manual = 0")
            .bind(topic_id)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        for source in sources {
            sqlx::query(
                r#"
                INSERT INTO sources (topic_id, url, name, description, is_manual, is_active, failure_count, created_at)
                VALUES (?, ?, ?, ?, 0, 1, 0, ?)
                "#,
            )
            .bind(topic_id)
            .bind(&source.url)
            .bind(&source.name)
            .bind(&source.description)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(sources.len())
    }

    /// Delete a source; stories pointing at it keep living with a null link
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TopicRepository;

    fn new_source(topic_id: i64, url: &str, is_manual: bool) -> NewSource {
        NewSource {
            topic_id,
            url: url.to_string(),
            name: url.trim_start_matches("https://").to_string(),
            description: None,
            is_manual,
        }
    }

    #[tokio::test]
    async fn test_three_failures_deactivate_and_success_restores() {
        let db = Database::new_in_memory().await.unwrap();
        let topic = TopicRepository::new(&db).create("T", "d").await.unwrap();
        let repo = SourceRepository::new(&db);
        let mut source = repo.create(&new_source(topic.id, "https://a.example", false)).await.unwrap();

        for expected in 1..=3 {
            let (count, active) = source.after_failure();
            repo.record_failure(source.id, count, active, "boom").await.unwrap();
            source = repo.find_by_id(source.id).await.unwrap().unwrap();
            assert_eq!(source.failure_count, expected);
            assert_eq!(source.is_active, expected < 3);
        }
        assert!(repo.list_active_for_topic(topic.id).await.unwrap().is_empty());

        repo.record_success(source.id).await.unwrap();
        let source = repo.find_by_id(source.id).await.unwrap().unwrap();
        assert_eq!(source.failure_count, 0);
        assert!(source.is_active);
        assert!(source.last_error.is_none());
    }

    #[tokio::test]
    async fn test_failure_message_is_truncated() {
        let db = Database::new_in_memory().await.unwrap();
        let topic = TopicRepository::new(&db).create("T", "d").await.unwrap();
        let repo = SourceRepository::new(&db);
        let source = repo.create(&new_source(topic.id, "https://a.example", true)).await.unwrap();

        repo.record_failure(source.id, 1, true, &"x".repeat(2000)).await.unwrap();
        let source = repo.find_by_id(source.id).await.unwrap().unwrap();
        assert_eq!(source.last_error.unwrap().chars().count(), MAX_ERROR_MESSAGE_CHARS);
    }

    #[tokio::test]
    async fn test_replace_ai_sources_keeps_manual() {
        let db = Database::new_in_memory().await.unwrap();
        let topic = TopicRepository::new(&db).create("T", "d").await.unwrap();
        let repo = SourceRepository::new(&db);

        repo.create(&new_source(topic.id, "https://manual.example", true)).await.unwrap();
        repo.create(&new_source(topic.id, "https://old.example", false)).await.unwrap();

        let replaced = repo
            .replace_ai_sources(
                topic.id,
                &[
                    new_source(topic.id, "https://new1.example", false),
                    new_source(topic.id, "https://new2.example", false),
                ],
            )
            .await
            .unwrap();
        assert_eq!(replaced, 2);

        let urls: Vec<_> = repo
            .list_for_topic(topic.id)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.url)
            .collect();
        assert_eq!(
            urls,
            vec!["https://manual.example", "https://new1.example", "https://new2.example"]
        );
    }
}
