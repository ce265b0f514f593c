use feed_rs::model::{Entry, Link};
use serde::Deserialize;

use super::types::{FeedFormat, ParsedEntry, ParsedFeed};

#[derive(Debug, thiserror::Error)]
pub enum FeedParseError {
    #[error("feed payload is empty")]
    EmptyPayload,
    #[error("xml feed parse error: {0}")]
    Xml(#[from] feed_rs::parser::ParseFeedError),
    #[error("json feed parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
struct JsonFeed {
    title: Option<String>,
    #[serde(default)]
    items: Vec<JsonFeedItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonFeedItem {
    title: Option<String>,
    url: Option<String>,
    summary: Option<String>,
    content_text: Option<String>,
    content_html: Option<String>,
    date_published: Option<String>,
}

/// Parses RSS, Atom or JSON Feed. JSON is detected by a leading `{`.
pub fn parse_feed_bytes(raw: &[u8]) -> Result<ParsedFeed, FeedParseError> {
    let trimmed = raw.trim_ascii_start();
    if trimmed.is_empty() {
        return Err(FeedParseError::EmptyPayload);
    }
    if trimmed[0] == b'{' {
        return parse_json_feed(trimmed);
    }
    parse_xml_feed(trimmed)
}

fn parse_xml_feed(raw: &[u8]) -> Result<ParsedFeed, FeedParseError> {
    let feed = feed_rs::parser::parse(raw)?;
    let title = feed
        .title
        .as_ref()
        .map(|text| text.content.clone())
        .unwrap_or_else(|| "Untitled Feed".to_string());
    let entries = feed.entries.iter().map(entry_from_xml).collect();

    Ok(ParsedFeed {
        format: FeedFormat::XmlFeed,
        title,
        entries,
    })
}

fn parse_json_feed(raw: &[u8]) -> Result<ParsedFeed, FeedParseError> {
    let feed: JsonFeed = serde_json::from_slice(raw)?;
    let title = feed.title.unwrap_or_else(|| "Untitled Feed".to_string());
    let entries = feed
        .items
        .into_iter()
        .map(|item| ParsedEntry {
            title: item.title.unwrap_or_default(),
            link: item.url.unwrap_or_default(),
            summary: item.summary,
            content: item.content_html.or(item.content_text),
            published_at: item.date_published,
        })
        .collect();

    Ok(ParsedFeed {
        format: FeedFormat::JsonFeed,
        title,
        entries,
    })
}

// feed-rs already decoded the date; an unparsable one arrives here as `None`.
fn entry_from_xml(entry: &Entry) -> ParsedEntry {
    let link = article_link(&entry.links)
        .map(|entry_link| entry_link.href.clone())
        .unwrap_or_default();
    let title = entry
        .title
        .as_ref()
        .map(|text| text.content.clone())
        .unwrap_or_default();
    let summary = entry.summary.as_ref().map(|text| text.content.clone());
    let content = entry
        .content
        .as_ref()
        .and_then(|content| content.body.clone());
    let published_at = entry
        .published
        .or(entry.updated)
        .map(|timestamp| timestamp.to_rfc3339());

    ParsedEntry {
        title,
        link,
        summary,
        content,
        published_at,
    }
}

/// The `alternate` (or unlabelled) link, not `self`, `enclosure` and the like.
fn article_link(links: &[Link]) -> Option<&Link> {
    links
        .iter()
        .find(|link| matches!(link.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
}
