use std::fmt::Write;

use super::providers::{DiscoveryRequest, SummaryRequest};

pub fn discovery_prompt(request: &DiscoveryRequest) -> String {
    format!(
        r#"You are a helpful assistant that discovers reliable web sources for news topics.

Topic: {name}
Description: {description}

{instructions}

Find 4-8 reliable web sources (websites, RSS feeds, or APIs) that provide ongoing news and updates related to this topic. For each source, provide:
1. The URL (must be a real, working URL)
2. A short name for the source
3. A brief description of what content it provides

IMPORTANT: Return ONLY a valid JSON array with no additional text, markdown, or explanation. The response must be parseable JSON.

Format your response as a JSON array like this:
[
  {{"url": "https://example.com/feed", "name": "Example News", "description": "Daily updates on topic"}},
  {{"url": "https://another.com", "name": "Another Source", "description": "Breaking news coverage"}}
]"#,
        name = request.topic_name,
        description = request.topic_description,
        instructions = request.instructions,
    )
}

pub fn summary_prompt(request: &SummaryRequest) -> String {
    let mut scraped = String::new();
    for (i, content) in request.contents.iter().enumerate() {
        let _ = write!(
            scraped,
            "\n--- Source {}: {} ---\nURL: {}\n{}\n",
            i + 1,
            content.source_name,
            content.url,
            content.content
        );
    }

    format!(
        r#"You are a news summarization assistant. Your task is to analyze the following scraped content and create clear, informative news summaries.

Topic: {name}

{instructions}

Scraped Content:
{scraped}

From the content above, identify the {max_stories} most interesting and relevant news stories. For each story:
1. Create a compelling headline (title)
2. Write a summary of 75-150 words focusing on key facts and why this story matters
3. Include the source URL where the story was found
4. Include the source name/title

IMPORTANT: Return ONLY a valid JSON array with no additional text, markdown, or explanation. The response must be parseable JSON.

Format your response as a JSON array like this:
[
  {{"title": "Headline Here", "summary": "Summary text here...", "source_url": "https://source.com/article", "source_title": "Source Name"}}
]"#,
        name = request.topic_name,
        instructions = request.instructions,
        max_stories = request.max_stories,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::ScrapedContent;

    #[test]
    fn test_summary_prompt_lists_sources() {
        let request = SummaryRequest {
            topic_name: "Formula 1".to_string(),
            instructions: "Be brief.".to_string(),
            max_stories: 3,
            contents: vec![
                ScrapedContent {
                    url: "https://a.example".to_string(),
                    source_name: "A".to_string(),
                    content: "alpha".to_string(),
                },
                ScrapedContent {
                    url: "https://b.example".to_string(),
                    source_name: "B".to_string(),
                    content: "beta".to_string(),
                },
            ],
        };

        let prompt = summary_prompt(&request);
        assert!(prompt.contains("Topic: Formula 1"));
        assert!(prompt.contains("--- Source 2: B ---\nURL: https://b.example\nbeta"));
        assert!(prompt.contains("identify the 3 most interesting"));
    }
}
