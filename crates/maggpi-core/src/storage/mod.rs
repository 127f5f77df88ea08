mod database;
pub mod retry;
mod settings_repo;
mod source_repo;
mod status_repo;
mod story_repo;
mod topic_repo;

pub use database::Database;
pub use settings_repo::SettingsRepository;
pub use source_repo::SourceRepository;
pub use status_repo::StatusRepository;
pub use story_repo::StoryRepository;
pub use topic_repo::TopicRepository;
