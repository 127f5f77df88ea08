use url::Url;

use crate::{Error, Result};

/// Check that a URL can be stored as a source: absolute, http(s), with a host.
///
/// Pure parsing, no network access.
pub fn validate_url(input: &str) -> Result<Url> {
    let trimmed = input.trim();
    let parsed =
        Url::parse(trimmed).map_err(|e| Error::InvalidUrl(format!("{}: {}", trimmed, e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(Error::InvalidUrl(format!(
            "{}: URL must use http or https scheme",
            trimmed
        )));
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(Error::InvalidUrl(format!("{}: URL must have a host", trimmed))),
    }
}

/// Host of a URL without a leading `www.`, used to match stories to sources
pub fn host_of(input: &str) -> Option<String> {
    let parsed = Url::parse(input).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_urls() {
        for input in ["ftp://x.com", "", "http://", "not a url", "/relative/path"] {
            let err = validate_url(input).unwrap_err();
            assert!(matches!(err, Error::InvalidUrl(_)), "{input:?} should be rejected");
        }
    }

    #[test]
    fn test_accepts_http_urls() {
        let url = validate_url("https://example.com/feed").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert!(validate_url("  http://news.example.org  ").is_ok());
    }

    #[test]
    fn test_host_of_strips_www() {
        assert_eq!(host_of("https://www.BBC.co.uk/news").as_deref(), Some("bbc.co.uk"));
        assert_eq!(host_of("https://bbc.co.uk").as_deref(), Some("bbc.co.uk"));
        assert_eq!(host_of("nope"), None);
    }
}
