use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use maggpi_core::{seed::seed_default_topics, storage::Database, AppConfig};

mod commands;

#[derive(Parser)]
#[command(name = "maggpi")]
#[command(author, version, about = "Topic news digests from AI-discovered sources")]
struct Cli {
    /// Path to config.toml (defaults to ~/.config/maggpi/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the refresh scheduler until Ctrl+C
    Run,
    /// Manage topics
    Topic {
        #[command(subcommand)]
        action: TopicAction,
    },
    /// Manage a topic's sources
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },
    /// Refresh one topic now
    Refresh {
        /// Topic id or name
        topic: String,
    },
    /// Replace a topic's AI-discovered sources
    Discover {
        /// Topic id or name
        topic: String,
    },
    /// Show the refresh status of every topic
    Status,
    /// Show the latest stories of a topic
    Stories {
        /// Topic id or name
        topic: String,
        /// Number of stories to show (defaults to stories_per_topic)
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum TopicAction {
    /// List all topics
    List,
    /// Create a topic
    Add {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Rename a topic or change its description
    Edit {
        /// Topic id or name
        topic: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a topic with its sources and stories
    Remove {
        /// Topic id or name
        topic: String,
    },
    /// Set the display order, first to last
    Reorder {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[derive(Subcommand)]
enum SourceAction {
    /// List a topic's sources
    List {
        /// Topic id or name
        topic: String,
    },
    /// Add a manual source
    Add {
        /// Topic id or name
        topic: String,
        url: String,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Delete a source
    Remove { id: i64 },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print current settings
    Show,
    /// Change one setting
    Set {
        /// refresh_interval_minutes, stories_per_topic, sourcing_prompt,
        /// summarizing_prompt, api_key, dashboard_title, dashboard_subtitle
        key: String,
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    let config = Arc::new(config);

    // Initialize logging; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Initialize database
    let db = Arc::new(Database::new(&config).await?);
    seed_default_topics(&db).await?;

    match cli.command {
        Commands::Run => commands::run::run(db, config).await,
        Commands::Topic { action } => match action {
            TopicAction::List => commands::topic::list(&db).await,
            TopicAction::Add { name, description } => {
                commands::topic::add(&db, &name, &description).await
            }
            TopicAction::Edit {
                topic,
                name,
                description,
            } => {
                commands::topic::edit(db, config, &topic, name.as_deref(), description.as_deref())
                    .await
            }
            TopicAction::Remove { topic } => commands::topic::remove(&db, &topic).await,
            TopicAction::Reorder { ids } => commands::topic::reorder(&db, &ids).await,
        },
        Commands::Source { action } => match action {
            SourceAction::List { topic } => commands::source::list(&db, &topic).await,
            SourceAction::Add { topic, url, name } => {
                commands::source::add(&db, &topic, &url, name.as_deref()).await
            }
            SourceAction::Remove { id } => commands::source::remove(&db, id).await,
        },
        Commands::Refresh { topic } => commands::refresh::refresh(db, config, &topic).await,
        Commands::Discover { topic } => commands::refresh::discover(db, config, &topic).await,
        Commands::Status => commands::status::run(&db).await,
        Commands::Stories { topic, limit } => commands::stories::run(&db, &topic, limit).await,
        Commands::Settings { action } => commands::settings::run(&db, action).await,
    }
}
