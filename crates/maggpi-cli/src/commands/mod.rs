pub mod refresh;
pub mod run;
pub mod settings;
pub mod source;
pub mod status;
pub mod stories;
pub mod topic;

use anyhow::{bail, Result};

use maggpi_core::{
    models::Topic,
    storage::{Database, TopicRepository},
};

/// Find a topic by numeric id or, failing that, by case-insensitive name
pub async fn resolve_topic(db: &Database, key: &str) -> Result<Topic> {
    let repo = TopicRepository::new(db);

    if let Ok(id) = key.parse::<i64>() {
        if let Some(topic) = repo.find_by_id(id).await? {
            return Ok(topic);
        }
    }

    let topics = repo.list_all().await?;
    match topics.into_iter().find(|t| t.name.eq_ignore_ascii_case(key)) {
        Some(topic) => Ok(topic),
        None => bail!("Topic '{}' not found. Run 'maggpi topic list' to see topics.", key),
    }
}
