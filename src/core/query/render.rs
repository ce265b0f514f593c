use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::storage::models::EntryRecord;

const TEXT_WIDTH: usize = 100;
const DISPLAY_DATE_FORMAT: &str = "%B %-d, %Y %H:%M:%S";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    #[default]
    Html,
    Json,
    Text,
}

/// Wire shape of one entry in JSON responses.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    #[serde(rename = "pubDate")]
    pub pub_date: DateTime<Utc>,
    pub link: String,
}

impl From<EntryRecord> for NewsItem {
    fn from(record: EntryRecord) -> Self {
        Self {
            title: record.title,
            description: record.description,
            pub_date: record.pub_date,
            link: record.link,
        }
    }
}

pub fn render_html(entries: &[EntryRecord]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Latest News</title></head>\n<body>\n<h1>Latest News</h1>\n<ul>\n",
    );
    for entry in entries {
        html.push_str(&format!(
            "<li><strong>{}</strong><br>{}<br>{}<br><a href=\"{}\" target=\"_blank\">Read more</a></li>\n",
            escape_html(&entry.title),
            entry.pub_date.format(DISPLAY_DATE_FORMAT),
            escape_html(&description_text(&entry.description)),
            escape_html(&entry.link),
        ));
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

pub fn render_text(entries: &[EntryRecord]) -> String {
    let mut text = String::new();
    for entry in entries {
        text.push_str(&format!(
            "{}\n{}\n{}\n{}\n\n",
            entry.title,
            entry.pub_date.format(DISPLAY_DATE_FORMAT),
            description_text(&entry.description),
            entry.link,
        ));
    }
    text
}

/// Feed descriptions are usually HTML fragments.
pub fn description_text(description: &str) -> String {
    if description.trim().is_empty() {
        return String::new();
    }
    html2text::from_read(description.as_bytes(), TEXT_WIDTH)
        .trim()
        .to_string()
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
