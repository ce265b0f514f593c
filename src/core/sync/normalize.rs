use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::core::feed::types::ParsedEntry;
use crate::core::storage::models::Entry;

/// Timestamp stored when an item's date is missing or unparsable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFallback {
    /// 1970-01-01T00:00:00Z. Sorts below every dated entry.
    #[default]
    Epoch,
    /// The instant the cycle started fetching.
    FetchTime,
}

impl DateFallback {
    pub fn resolve(self, fetched_at: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            DateFallback::Epoch => DateTime::<Utc>::UNIX_EPOCH,
            DateFallback::FetchTime => fetched_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub entry: Entry,
    pub used_fallback: bool,
}

pub fn normalize_entry(
    parsed: &ParsedEntry,
    fallback: DateFallback,
    fetched_at: DateTime<Utc>,
) -> Normalized {
    let published = parsed.published_at.as_deref().and_then(parse_published);
    let used_fallback = published.is_none();
    let description = parsed
        .summary
        .as_ref()
        .or(parsed.content.as_ref())
        .cloned()
        .unwrap_or_default();

    Normalized {
        entry: Entry {
            title: parsed.title.clone(),
            description,
            published_at: published.unwrap_or_else(|| fallback.resolve(fetched_at)),
            link: parsed.link.clone(),
        },
        used_fallback,
    }
}

/// Accepts RFC 3339 (Atom, JSON Feed) and RFC 2822 (RSS `pubDate`).
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}
