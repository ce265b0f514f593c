pub mod fetcher;
pub mod parser;
pub mod reader;
pub mod types;

use fetcher::FetchError;
use parser::FeedParseError;

/// Anything that keeps a source from yielding entries in one cycle.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("parse failed: {0}")]
    Parse(#[from] FeedParseError),
}
