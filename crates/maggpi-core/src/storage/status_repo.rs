use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::retry::with_retry;
use super::Database;
use crate::models::{truncate_chars, RefreshState, RefreshStatus, MAX_ERROR_MESSAGE_CHARS};
use crate::Result;

/// Repository for per-topic refresh status rows
pub struct StatusRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct StatusRow {
    topic_id: i64,
    last_refresh: Option<DateTime<Utc>>,
    next_refresh: Option<DateTime<Utc>>,
    status: String,
    error_message: Option<String>,
}

impl From<StatusRow> for RefreshStatus {
    fn from(row: StatusRow) -> Self {
        let status = row.status.parse().unwrap_or_else(|_| {
            tracing::warn!(topic_id = row.topic_id, status = %row.status, "Unknown refresh state, treating as pending");
            RefreshState::Pending
        });
        RefreshStatus {
            topic_id: row.topic_id,
            last_refresh: row.last_refresh,
            next_refresh: row.next_refresh,
            status,
            error_message: row.error_message,
        }
    }
}

impl<'a> StatusRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Status of one topic; `None` means it was never refreshed
    pub async fn get(&self, topic_id: i64) -> Result<Option<RefreshStatus>> {
        let row: Option<StatusRow> = sqlx::query_as(
            r#"
            SELECT topic_id, last_refresh, next_refresh, status, error_message
            FROM refresh_status
            WHERE topic_id = ?
            "#,
        )
        .bind(topic_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(RefreshStatus::from))
    }

    pub async fn list_all(&self) -> Result<Vec<RefreshStatus>> {
        let rows: Vec<StatusRow> = sqlx::query_as(
            r#"
            SELECT topic_id, last_refresh, next_refresh, status, error_message
            FROM refresh_status
            ORDER BY topic_id ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(RefreshStatus::from).collect())
    }

    /// Insert or replace the status row of a topic
    pub async fn upsert(&self, status: &RefreshStatus) -> Result<()> {
        let pool = self.db.pool();
        let error_message = status
            .error_message
            .as_deref()
            .map(|msg| truncate_chars(msg, MAX_ERROR_MESSAGE_CHARS));

        with_retry("upsert_refresh_status", || async move {
            sqlx::query(
                r#"
                INSERT INTO refresh_status (topic_id, last_refresh, next_refresh, status, error_message)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(topic_id) DO UPDATE SET
                    last_refresh = excluded.last_refresh,
                    next_refresh = excluded.next_refresh,
                    status = excluded.status,
                    error_message = excluded.error_message
                "#,
            )
            .bind(status.topic_id)
            .bind(status.last_refresh)
            .bind(status.next_refresh)
            .bind(status.status.as_str())
            .bind(error_message)
            .execute(pool)
            .await
            .map(|_| ())
        })
        .await?;

        Ok(())
    }

    /// Enter an attempt: keep the timestamps, clear the error
    pub async fn mark_in_progress(&self, topic_id: i64) -> Result<()> {
        let previous = self.get(topic_id).await?;
        self.upsert(&RefreshStatus {
            topic_id,
            last_refresh: previous.as_ref().and_then(|s| s.last_refresh),
            next_refresh: previous.as_ref().and_then(|s| s.next_refresh),
            status: RefreshState::InProgress,
            error_message: None,
        })
        .await
    }

    pub async fn mark_completed(
        &self,
        topic_id: i64,
        now: DateTime<Utc>,
        next_refresh: DateTime<Utc>,
    ) -> Result<()> {
        self.upsert(&RefreshStatus {
            topic_id,
            last_refresh: Some(now),
            next_refresh: Some(next_refresh),
            status: RefreshState::Completed,
            error_message: None,
        })
        .await
    }

    /// Record a failure; `last_refresh` keeps the time of the last success
    pub async fn mark_failed(
        &self,
        topic_id: i64,
        next_refresh: DateTime<Utc>,
        error: &str,
    ) -> Result<()> {
        let previous = self.get(topic_id).await?;
        self.upsert(&RefreshStatus {
            topic_id,
            last_refresh: previous.and_then(|s| s.last_refresh),
            next_refresh: Some(next_refresh),
            status: RefreshState::Failed,
            error_message: Some(error.to_string()),
        })
        .await
    }

    /// Put a row left in `in_progress` back to `pending`; other states are kept
    pub async fn reset_if_in_progress(&self, topic_id: i64) -> Result<bool> {
        let pool = self.db.pool();

        let reset = with_retry("reset_stale_status", || async move {
            sqlx::query(
                "UPDATE refresh_status SET status = 'pending' WHERE topic_id = ? AND status = 'in_progress'",
            )
            .bind(topic_id)
            .execute(pool)
            .await
            .map(|result| result.rows_affected() > 0)
        })
        .await?;

        Ok(reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TopicRepository;
    use chrono::Duration;

    #[tokio::test]
    async fn test_status_transitions() {
        let db = Database::new_in_memory().await.unwrap();
        let topic = TopicRepository::new(&db).create("T", "d").await.unwrap();
        let repo = StatusRepository::new(&db);

        assert!(repo.get(topic.id).await.unwrap().is_none());

        repo.mark_in_progress(topic.id).await.unwrap();
        let status = repo.get(topic.id).await.unwrap().unwrap();
        assert_eq!(status.status, RefreshState::InProgress);
        assert!(status.last_refresh.is_none());

        let now = Utc::now();
        repo.mark_completed(topic.id, now, now + Duration::minutes(120))
            .await
            .unwrap();
        let completed = repo.get(topic.id).await.unwrap().unwrap();
        assert_eq!(completed.status, RefreshState::Completed);
        assert!(completed.error_message.is_none());

        repo.mark_in_progress(topic.id).await.unwrap();
        let in_progress = repo.get(topic.id).await.unwrap().unwrap();
        assert_eq!(in_progress.last_refresh, completed.last_refresh);
        assert_eq!(in_progress.next_refresh, completed.next_refresh);

        let retry_at = now + Duration::minutes(5);
        repo.mark_failed(topic.id, retry_at, &"e".repeat(800)).await.unwrap();
        let failed = repo.get(topic.id).await.unwrap().unwrap();
        assert_eq!(failed.status, RefreshState::Failed);
        assert_eq!(failed.last_refresh, completed.last_refresh);
        assert_eq!(failed.next_refresh, Some(retry_at));
        assert_eq!(
            failed.error_message.unwrap().chars().count(),
            MAX_ERROR_MESSAGE_CHARS
        );
    }

    #[tokio::test]
    async fn test_reset_if_in_progress() {
        let db = Database::new_in_memory().await.unwrap();
        let topics = TopicRepository::new(&db);
        let a = topics.create("A", "a").await.unwrap();
        let b = topics.create("B", "b").await.unwrap();
        let repo = StatusRepository::new(&db);

        repo.mark_in_progress(a.id).await.unwrap();
        let now = Utc::now();
        repo.mark_completed(b.id, now, now).await.unwrap();

        assert!(repo.reset_if_in_progress(a.id).await.unwrap());
        assert!(!repo.reset_if_in_progress(b.id).await.unwrap());
        let states: Vec<_> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.status)
            .collect();
        assert_eq!(states, vec![RefreshState::Pending, RefreshState::Completed]);
    }
}
