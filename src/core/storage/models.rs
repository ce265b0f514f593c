use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A normalized news item, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EntryRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub pub_date: DateTime<Utc>,
    pub link: String,
}
