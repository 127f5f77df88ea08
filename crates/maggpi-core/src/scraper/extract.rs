//! Text extraction from fetched pages.
//!
//! Feeds are read entry by entry with feed-rs. HTML pages go through a
//! list of common content containers first, then fall back to headlines
//! and paragraphs when no container carries enough text.

use std::collections::HashSet;

use feed_rs::parser;
use ::scraper::{ElementRef, Html, Selector};

const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    ".content",
    ".post",
    ".article",
    ".entry-content",
    "#content",
    "#main",
];

const MIN_CONTAINER_CHARS: usize = 100;
const HEADLINE_CHARS: (usize, usize) = (10, 200);
const PARAGRAPH_CHARS: (usize, usize) = (50, 2000);

/// Text pulled out of a page, before length checks
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    /// `<title>` of an HTML page or the feed title
    pub title: Option<String>,
    pub text: String,
}

/// Extract readable text from a response body
pub fn extract_text(body: &[u8], content_type: Option<&str>) -> Extracted {
    if looks_like_feed(body, content_type) {
        match extract_feed(body) {
            Some(extracted) => return extracted,
            None => tracing::debug!("Body looked like a feed but did not parse, reading as HTML"),
        }
    }

    extract_html(&String::from_utf8_lossy(body))
}

fn looks_like_feed(body: &[u8], content_type: Option<&str>) -> bool {
    if let Some(ct) = content_type {
        let ct = ct.to_ascii_lowercase();
        if ct.contains("rss") || ct.contains("atom") {
            return true;
        }
        if ct.contains("html") {
            return false;
        }
    }

    let head_len = body.len().min(1024);
    let head = String::from_utf8_lossy(&body[..head_len]).to_ascii_lowercase();
    head.contains("<rss") || head.contains("<feed") || head.contains("<rdf:rdf")
}

fn extract_feed(body: &[u8]) -> Option<Extracted> {
    let feed = parser::parse(body).ok()?;

    let mut text = String::new();
    for entry in feed.entries {
        let Some(title) = entry.title.map(|t| clean_text(&t.content)) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        text.push_str("ARTICLE: ");
        text.push_str(&title);
        text.push('\n');

        if let Some(link) = entry.links.first() {
            text.push_str("LINK: ");
            text.push_str(&link.href);
            text.push('\n');
        }

        let description = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body));
        if let Some(description) = description {
            let description = clean_text(&html_to_text(&description));
            if !description.is_empty() {
                text.push_str(&description);
                text.push('\n');
            }
        }
        text.push('\n');
    }

    Some(Extracted {
        title: feed.title.map(|t| clean_text(&t.content)),
        text,
    })
}

fn extract_html(html: &str) -> Extracted {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|s| document.select(&s).next().map(element_text))
        .filter(|t| !t.is_empty());

    let mut text = container_text(&document);
    if text.is_empty() {
        text = headline_and_paragraph_text(&document);
    }

    Extracted { title, text }
}

/// Text of every qualifying content container. A container nested in (or
/// wrapping) one already taken is skipped so no text is counted twice.
fn container_text(document: &Html) -> String {
    let mut taken = HashSet::new();
    let mut text = String::new();

    for selector in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&selector) {
            if element.descendants().any(|d| taken.contains(&d.id()))
                || element.ancestors().any(|a| taken.contains(&a.id()))
            {
                continue;
            }
            let chunk = element_text(element);
            if chunk.chars().count() > MIN_CONTAINER_CHARS {
                taken.insert(element.id());
                text.push_str(&chunk);
                text.push_str("\n\n");
            }
        }
    }

    text
}

fn headline_and_paragraph_text(document: &Html) -> String {
    let mut text = String::new();
    let Ok(selector) = Selector::parse("h1, h2, h3, p") else {
        return text;
    };

    for element in document.select(&selector) {
        let chunk = element_text(element);
        let len = chunk.chars().count();
        if element.value().name() == "p" {
            if len > PARAGRAPH_CHARS.0 && len < PARAGRAPH_CHARS.1 {
                text.push_str(&chunk);
                text.push('\n');
            }
        } else if len > HEADLINE_CHARS.0 && len < HEADLINE_CHARS.1 {
            text.push_str("HEADLINE: ");
            text.push_str(&chunk);
            text.push('\n');
        }
    }

    text
}

fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Collapse runs of whitespace into single spaces
pub fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 120).unwrap_or_else(|_| html.to_string())
}
