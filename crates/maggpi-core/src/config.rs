use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Process-level configuration, loaded from `~/.config/maggpi/config.toml`.
///
/// User-editable runtime settings (refresh interval, prompts, API key) live
/// in the database instead, see [`crate::models::Settings`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum sources fetched at once within a refresh
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Extracted text is truncated to this many characters
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Extractions shorter than this are treated as failures
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// HTTP proxy URL (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            concurrency: default_concurrency(),
            max_content_chars: default_max_content_chars(),
            min_content_chars: default_min_content_chars(),
            user_agent: default_user_agent(),
            proxy_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay before the first pass, lets the front end come up first
    #[serde(default = "default_warmup")]
    pub warmup_secs: u64,
    /// Pause between topics during the startup discovery pass
    #[serde(default = "default_init_topic_delay")]
    pub init_topic_delay_secs: u64,
    /// Courtesy delay between two topic refreshes
    #[serde(default = "default_topic_delay")]
    pub topic_delay_secs: u64,
    /// Sleep between two full passes
    #[serde(default = "default_pass_delay")]
    pub pass_delay_secs: u64,
    /// Wait before retrying a pass whose topic listing failed
    #[serde(default = "default_list_retry")]
    pub list_retry_secs: u64,
    /// Retry delay after a failed refresh, independent of the refresh interval
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
    /// Wall-clock limit for one topic's fetch batch
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            warmup_secs: default_warmup(),
            init_topic_delay_secs: default_init_topic_delay(),
            topic_delay_secs: default_topic_delay(),
            pass_delay_secs: default_pass_delay(),
            list_retry_secs: default_list_retry(),
            retry_backoff_secs: default_retry_backoff(),
            batch_timeout_secs: default_batch_timeout(),
            discovery_timeout_secs: default_discovery_timeout(),
        }
    }
}

impl SchedulerConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    pub fn init_topic_delay(&self) -> Duration {
        Duration::from_secs(self.init_topic_delay_secs)
    }

    pub fn topic_delay(&self) -> Duration {
        Duration::from_secs(self.topic_delay_secs)
    }

    pub fn pass_delay(&self) -> Duration {
        Duration::from_secs(self.pass_delay_secs)
    }

    pub fn list_retry(&self) -> Duration {
        Duration::from_secs(self.list_retry_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// AI provider: "gemini_api"
    #[serde(default = "default_ai_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// API base URL, overridable for proxies and tests
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_ai_provider(),
            model: default_model(),
            base_url: default_base_url(),
            request_timeout_secs: default_ai_timeout(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("maggpi")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_concurrency() -> usize {
    2 // Keep low for small boards like a Raspberry Pi
}

fn default_max_content_chars() -> usize {
    10_000
}

fn default_min_content_chars() -> usize {
    100
}

fn default_user_agent() -> String {
    "MaggPi/1.0 (News Aggregator; +https://github.com/thinkscotty/maggpi_go)".to_string()
}

fn default_warmup() -> u64 {
    10
}

fn default_init_topic_delay() -> u64 {
    5
}

fn default_topic_delay() -> u64 {
    30
}

fn default_pass_delay() -> u64 {
    60
}

fn default_list_retry() -> u64 {
    60
}

fn default_retry_backoff() -> u64 {
    300 // 5 minutes
}

fn default_batch_timeout() -> u64 {
    300 // 5 minutes
}

fn default_discovery_timeout() -> u64 {
    120
}

fn default_ai_provider() -> String {
    "gemini_api".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_ai_timeout() -> u64 {
    120
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from the default location or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let path = expand_tilde(path);

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/maggpi/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("maggpi")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("maggpi.db")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}
