use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AiProvider, DiscoveredSource, DiscoveryRequest, SummarizedStory, SummaryRequest};
use crate::ai::json::parse_json_array;
use crate::ai::prompts::{discovery_prompt, summary_prompt};
use crate::config::AiConfig;
use crate::{Error, Result};

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
}

/// Gemini API provider
pub struct GeminiApiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiApiProvider {
    pub fn new(api_key: &str, config: &AiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn chat(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: max_tokens,
                temperature: 0.7,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::AiProvider(format!("Gemini API request failed: {}", e)))?;

        let status = response.status();
        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            Error::AiProvider(format!("Failed to parse Gemini response ({}): {}", status, e))
        })?;

        if let Some(error) = gemini_response.error {
            return Err(Error::AiProvider(format!("Gemini API error: {}", error.message)));
        }

        // Concatenate every text part of every candidate
        let text: String = gemini_response
            .candidates
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(Error::AiResponse("empty response from Gemini".to_string()));
        }

        Ok(text)
    }
}

#[async_trait::async_trait]
impl AiProvider for GeminiApiProvider {
    fn name(&self) -> &str {
        "gemini_api"
    }

    async fn discover_sources(&self, request: &DiscoveryRequest) -> Result<Vec<DiscoveredSource>> {
        let prompt = discovery_prompt(request);
        let response = self.chat(&prompt, 2048).await?;
        parse_json_array(&response, "sources")
    }

    async fn summarize_content(&self, request: &SummaryRequest) -> Result<Vec<SummarizedStory>> {
        let prompt = summary_prompt(request);
        let response = self.chat(&prompt, 8192).await?;
        parse_json_array(&response, "stories")
    }
}
