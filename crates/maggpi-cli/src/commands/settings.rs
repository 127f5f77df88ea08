use anyhow::{bail, Context, Result};

use maggpi_core::{
    models::Settings,
    storage::{Database, SettingsRepository},
};

use crate::SettingsAction;

pub async fn run(db: &Database, action: SettingsAction) -> Result<()> {
    let repo = SettingsRepository::new(db);
    let mut settings = repo.get().await?;

    match action {
        SettingsAction::Show => show(&settings),
        SettingsAction::Set { key, value } => {
            apply(&mut settings, &key, &value)?;
            repo.update(&settings).await?;
            println!("Updated {}.", key);
            if key == "refresh_interval_minutes" {
                println!("A running scheduler picks the new interval up on its next pass.");
            }
        }
    }

    Ok(())
}

fn show(settings: &Settings) {
    let api_key = if settings.has_api_key() {
        settings.masked_api_key()
    } else {
        "(not set)".to_string()
    };

    println!("refresh_interval_minutes: {}", settings.refresh_interval_minutes);
    println!("stories_per_topic:        {}", settings.stories_per_topic);
    println!("api_key:                  {}", api_key);
    println!("dashboard_title:          {}", settings.dashboard_title);
    println!("dashboard_subtitle:       {}", settings.dashboard_subtitle);
    println!("sourcing_prompt:\n  {}", settings.global_sourcing_prompt);
    println!("summarizing_prompt:\n  {}", settings.global_summarizing_prompt);
}

fn apply(settings: &mut Settings, key: &str, value: &str) -> Result<()> {
    match key {
        "refresh_interval_minutes" => {
            let minutes: i64 = value.parse().context("refresh_interval_minutes must be a number")?;
            settings.refresh_interval_minutes = minutes.max(1);
        }
        "stories_per_topic" => {
            let count: i64 = value.parse().context("stories_per_topic must be a number")?;
            if count < 1 {
                bail!("stories_per_topic must be at least 1");
            }
            settings.stories_per_topic = count;
        }
        "sourcing_prompt" => settings.global_sourcing_prompt = value.to_string(),
        "summarizing_prompt" => settings.global_summarizing_prompt = value.to_string(),
        "api_key" => settings.ai_api_key = value.trim().to_string(),
        "dashboard_title" => settings.dashboard_title = value.to_string(),
        "dashboard_subtitle" => settings.dashboard_subtitle = value.to_string(),
        other => bail!("Unknown setting: {}", other),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_settings() {
        let mut settings = Settings::default();

        apply(&mut settings, "refresh_interval_minutes", "0").unwrap();
        assert_eq!(settings.refresh_interval_minutes, 1);

        apply(&mut settings, "api_key", "  secret-key  ").unwrap();
        assert_eq!(settings.ai_api_key, "secret-key");

        assert!(apply(&mut settings, "stories_per_topic", "0").is_err());
        assert!(apply(&mut settings, "stories_per_topic", "many").is_err());
        assert!(apply(&mut settings, "primary_color", "#fff").is_err());
    }
}
