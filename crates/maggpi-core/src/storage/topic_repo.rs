use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::Database;
use crate::models::Topic;
use crate::{Error, Result};

/// Repository for topic CRUD operations
pub struct TopicRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct TopicRow {
    id: i64,
    name: String,
    description: String,
    position: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TopicRow> for Topic {
    fn from(row: TopicRow) -> Self {
        Topic {
            id: row.id,
            name: row.name,
            description: row.description,
            position: row.position,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'a> TopicRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a topic at the end of the current ordering
    pub async fn create(&self, name: &str, description: &str) -> Result<Topic> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO topics (name, description, position, created_at, updated_at)
            VALUES (?, ?, (SELECT COALESCE(MAX(position) + 1, 0) FROM topics), ?, ?)
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        let id = result.last_insert_rowid();
        self.find_by_id(id).await?.ok_or(Error::TopicNotFound(id))
    }

    /// Find a topic by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Topic>> {
        let row: Option<TopicRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, position, created_at, updated_at
            FROM topics
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Topic::from))
    }

    /// Get all topics in display order
    pub async fn list_all(&self) -> Result<Vec<Topic>> {
        let rows: Vec<TopicRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, position, created_at, updated_at
            FROM topics
            ORDER BY position ASC, id ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Topic::from).collect())
    }

    /// Update name and description.
    ///
    /// A changed description invalidates the AI-discovered sources, which are
    /// deleted in the same transaction; manual sources stay. Returns whether
    /// the description changed, so the caller can trigger re-discovery.
    pub async fn update(&self, id: i64, name: &str, description: &str) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;

        let current: Option<(String,)> =
            sqlx::query_as("SELECT description FROM topics WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((old_description,)) = current else {
            return Err(Error::TopicNotFound(id));
        };

        sqlx::query("UPDATE topics SET name = ?, description = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(description)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let changed = old_description != description;
        if changed {
            sqlx::query("DELETE FROM sources WHERE topic_id = ? AND is_manual = 0")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(changed)
    }

    /// Delete a topic with its sources, stories and status
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM topics WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Assign positions following the given ID order
    pub async fn reorder(&self, topic_ids: &[i64]) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        for (position, id) in topic_ids.iter().enumerate() {
            sqlx::query("UPDATE topics SET position = ? WHERE id = ?")
                .bind(position as i64)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get total topic count
    pub async fn count(&self) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM topics")
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }
}
