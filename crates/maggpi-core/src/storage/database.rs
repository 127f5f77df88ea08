use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

use crate::config::AppConfig;
use crate::Result;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection and run migrations
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let db_path = config.database_path();

        // Ensure the data directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite:{}", db_path.display());

        tracing::info!("Connecting to database: {}", db_path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Create an in-memory database for testing
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        for migration in [
            MIGRATION_001_TOPICS,
            MIGRATION_002_SOURCES,
            MIGRATION_003_STORIES,
            MIGRATION_004_SETTINGS,
            MIGRATION_005_REFRESH_STATUS,
        ] {
            sqlx::query(migration).execute(&self.pool).await?;
        }

        // Source health tracking and display settings were added after the
        // first schema; older databases get the columns appended.
        for migration in MIGRATION_006_ADD_COLUMNS {
            if let Err(err) = sqlx::query(migration).execute(&self.pool).await {
                if !is_duplicate_column_error(&err) {
                    return Err(err.into());
                }
            }
        }

        sqlx::query(MIGRATION_INDEXES).execute(&self.pool).await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_duplicate_column_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_lowercase();
            message.contains("duplicate column")
        }
        _ => false,
    }
}

const MIGRATION_001_TOPICS: &str = r#"
CREATE TABLE IF NOT EXISTS topics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

const MIGRATION_002_SOURCES: &str = r#"
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    topic_id INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    name TEXT NOT NULL,
    is_manual INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

const MIGRATION_003_STORIES: &str = r#"
CREATE TABLE IF NOT EXISTS stories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    topic_id INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
    source_id INTEGER REFERENCES sources(id) ON DELETE SET NULL,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    source_url TEXT NOT NULL,
    source_title TEXT,
    image_url TEXT,
    published_at DATETIME,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

const MIGRATION_004_SETTINGS: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    refresh_interval_minutes INTEGER NOT NULL DEFAULT 120,
    stories_per_topic INTEGER NOT NULL DEFAULT 5,
    global_sourcing_prompt TEXT,
    global_summarizing_prompt TEXT,
    primary_color TEXT NOT NULL DEFAULT '#2563eb',
    secondary_color TEXT NOT NULL DEFAULT '#1e40af',
    dark_mode INTEGER NOT NULL DEFAULT 0,
    ai_api_key TEXT
)
"#;

const MIGRATION_005_REFRESH_STATUS: &str = r#"
CREATE TABLE IF NOT EXISTS refresh_status (
    topic_id INTEGER PRIMARY KEY REFERENCES topics(id) ON DELETE CASCADE,
    last_refresh DATETIME,
    next_refresh DATETIME,
    status TEXT NOT NULL DEFAULT 'pending',
    error_message TEXT
)
"#;

const MIGRATION_006_ADD_COLUMNS: [&str; 6] = [
    "ALTER TABLE sources ADD COLUMN description TEXT",
    "ALTER TABLE sources ADD COLUMN is_active INTEGER NOT NULL DEFAULT 1",
    "ALTER TABLE sources ADD COLUMN failure_count INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE sources ADD COLUMN last_error TEXT",
    "ALTER TABLE settings ADD COLUMN dashboard_title TEXT NOT NULL DEFAULT 'Dashboard'",
    "ALTER TABLE settings ADD COLUMN dashboard_subtitle TEXT NOT NULL DEFAULT 'Your personalized news feed'",
];

const MIGRATION_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_sources_topic_id ON sources(topic_id);
CREATE INDEX IF NOT EXISTS idx_stories_topic_id ON stories(topic_id);
CREATE INDEX IF NOT EXISTS idx_stories_created_at ON stories(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_topics_position ON topics(position)
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::new_in_memory().await.unwrap();
        db.run_migrations().await.unwrap();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM pragma_table_info('sources') WHERE name = 'failure_count'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(count, 1);
    }
}
