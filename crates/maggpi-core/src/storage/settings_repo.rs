use sqlx::FromRow;

use super::Database;
use crate::models::Settings;
use crate::Result;

/// Repository for the single settings row
pub struct SettingsRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct SettingsRow {
    refresh_interval_minutes: i64,
    stories_per_topic: i64,
    global_sourcing_prompt: Option<String>,
    global_summarizing_prompt: Option<String>,
    ai_api_key: Option<String>,
    primary_color: String,
    secondary_color: String,
    dark_mode: i32,
    dashboard_title: String,
    dashboard_subtitle: String,
}

impl From<SettingsRow> for Settings {
    fn from(row: SettingsRow) -> Self {
        let defaults = Settings::default();
        Settings {
            refresh_interval_minutes: row.refresh_interval_minutes,
            stories_per_topic: row.stories_per_topic,
            global_sourcing_prompt: row
                .global_sourcing_prompt
                .unwrap_or(defaults.global_sourcing_prompt),
            global_summarizing_prompt: row
                .global_summarizing_prompt
                .unwrap_or(defaults.global_summarizing_prompt),
            ai_api_key: row.ai_api_key.unwrap_or_default(),
            primary_color: row.primary_color,
            secondary_color: row.secondary_color,
            dark_mode: row.dark_mode != 0,
            dashboard_title: row.dashboard_title,
            dashboard_subtitle: row.dashboard_subtitle,
        }
    }
}

impl<'a> SettingsRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Read the settings, creating the default row on first access
    pub async fn get(&self) -> Result<Settings> {
        let row: Option<SettingsRow> = sqlx::query_as(
            r#"
            SELECT refresh_interval_minutes, stories_per_topic, global_sourcing_prompt,
                   global_summarizing_prompt, ai_api_key, primary_color, secondary_color,
                   dark_mode, dashboard_title, dashboard_subtitle
            FROM settings
            WHERE id = 1
            "#,
        )
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                let defaults = Settings::default();
                self.update(&defaults).await?;
                tracing::debug!("Created default settings row");
                Ok(defaults)
            }
        }
    }

    /// Write every field of the settings row
    pub async fn update(&self, settings: &Settings) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (id, refresh_interval_minutes, stories_per_topic,
                                  global_sourcing_prompt, global_summarizing_prompt, ai_api_key,
                                  primary_color, secondary_color, dark_mode,
                                  dashboard_title, dashboard_subtitle)
            VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                refresh_interval_minutes = excluded.refresh_interval_minutes,
                stories_per_topic = excluded.stories_per_topic,
                global_sourcing_prompt = excluded.global_sourcing_prompt,
                global_summarizing_prompt = excluded.global_summarizing_prompt,
                ai_api_key = excluded.ai_api_key,
                primary_color = excluded.primary_color,
                secondary_color = excluded.secondary_color,
                dark_mode = excluded.dark_mode,
                dashboard_title = excluded.dashboard_title,
                dashboard_subtitle = excluded.dashboard_subtitle
            "#,
        )
        .bind(settings.refresh_interval_minutes)
        .bind(settings.stories_per_topic)
        .bind(&settings.global_sourcing_prompt)
        .bind(&settings.global_summarizing_prompt)
        .bind(&settings.ai_api_key)
        .bind(&settings.primary_color)
        .bind(&settings.secondary_color)
        .bind(settings.dark_mode as i32)
        .bind(&settings.dashboard_title)
        .bind(&settings.dashboard_subtitle)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_inserts_defaults() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = SettingsRepository::new(&db);

        let settings = repo.get().await.unwrap();
        assert_eq!(settings.refresh_interval_minutes, 120);
        assert_eq!(settings.stories_per_topic, 5);
        assert!(!settings.has_api_key());

        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM settings")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_update_overwrites_row() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = SettingsRepository::new(&db);

        let mut settings = repo.get().await.unwrap();
        settings.ai_api_key = "key-1234".to_string();
        settings.stories_per_topic = 8;
        settings.dark_mode = true;
        repo.update(&settings).await.unwrap();

        let reloaded = repo.get().await.unwrap();
        assert_eq!(reloaded.ai_api_key, "key-1234");
        assert_eq!(reloaded.stories_per_topic, 8);
        assert!(reloaded.dark_mode);
    }
}
