use std::future::Future;

use super::fetcher::fetch_feed;
use super::parser::parse_feed_bytes;
use super::types::ParsedFeed;
use super::FeedError;

/// Turns a feed URL into parsed entries. Fetch cycles only see this trait.
pub trait FeedReader: Send + Sync + 'static {
    fn read_feed(&self, url: &str) -> impl Future<Output = Result<ParsedFeed, FeedError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpFeedReader {
    client: reqwest::Client,
}

impl HttpFeedReader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl FeedReader for HttpFeedReader {
    async fn read_feed(&self, url: &str) -> Result<ParsedFeed, FeedError> {
        let fetched = fetch_feed(&self.client, url).await?;
        tracing::debug!(
            source = url,
            bytes = fetched.body.len(),
            content_type = fetched.content_type.as_deref().unwrap_or("unknown"),
            "fetched feed"
        );
        let parsed = parse_feed_bytes(&fetched.body)?;
        Ok(parsed)
    }
}
