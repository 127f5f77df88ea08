use serde::de::DeserializeOwned;

use crate::models::truncate_chars;
use crate::{Error, Result};

/// Strip surrounding whitespace and a markdown code fence from model output
pub fn clean_json_response(response: &str) -> &str {
    let mut cleaned = response.trim();

    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }

    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }

    cleaned.trim()
}

/// Parse a JSON array out of model output, as `AiResponse` on failure
pub fn parse_json_array<T: DeserializeOwned>(response: &str, what: &str) -> Result<Vec<T>> {
    let cleaned = clean_json_response(response);
    if cleaned.is_empty() {
        return Err(Error::AiResponse(format!("empty {} response", what)));
    }

    serde_json::from_str(cleaned).map_err(|e| {
        Error::AiResponse(format!(
            "failed to parse {} JSON: {} (response: {})",
            what,
            e,
            truncate_chars(cleaned, 200)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Item {
        url: String,
    }

    #[test]
    fn test_clean_json_response() {
        assert_eq!(clean_json_response("  [1, 2]  "), "[1, 2]");
        assert_eq!(clean_json_response("```json\n[1]\n```"), "[1]");
        assert_eq!(clean_json_response("```\n[]\n```\n"), "[]");
        assert_eq!(clean_json_response("[\"```\"]"), "[\"```\"]");
    }

    #[test]
    fn test_parse_fenced_array() {
        let items: Vec<Item> =
            parse_json_array("```json\n[{\"url\": \"https://a.example\"}]\n```", "sources").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://a.example");
    }

    #[test]
    fn test_malformed_json_is_ai_response_error() {
        let err = parse_json_array::<Item>("Sure! Here are some sources:", "sources").unwrap_err();
        assert!(matches!(err, Error::AiResponse(_)));

        let err = parse_json_array::<Item>("```json\n```", "sources").unwrap_err();
        assert!(matches!(err, Error::AiResponse(_)));
    }
}
