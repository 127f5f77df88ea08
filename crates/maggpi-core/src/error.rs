use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("AI API key not configured")]
    MissingApiKey,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("Malformed AI response: {0}")]
    AiResponse(String),

    #[error("Timed out after {0}s: {1}")]
    Timeout(u64, String),

    #[error("Insufficient content scraped from {0}")]
    InsufficientContent(String),

    #[error("Response too large ({0} bytes) for URL: {1}")]
    ContentTooLarge(usize, String),

    #[error("Topic not found: {0}")]
    TopicNotFound(i64),

    #[error("Source not found: {0}")]
    SourceNotFound(i64),

    #[error("Refresh already in progress for topic {0}")]
    RefreshInProgress(i64),

    #[error("no sources available for topic")]
    NoSources,

    #[error("failed to scrape any content from active sources")]
    NoContent,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Readable text of a caught panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 7");

        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }
}
