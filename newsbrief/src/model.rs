use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One discovered news item.
///
/// `link` is the identity of an article: the store never holds two rows with
/// the same link, and it is the only key used to decide whether a crawled
/// candidate has been seen before.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Search term that produced this item. Assigned by the orchestrator at
    /// ingestion time, not by the fetcher.
    pub keyword: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    /// Stamped when the item is first ingested.
    pub discovered_at: DateTime<Utc>,
    /// False at creation; flipped only after a successful dispatch.
    pub sent: bool,
}

/// Operator settings read once per operation. Never cached across calls, so
/// an edit takes effect on the next crawl or dispatch without a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Region codes crawled for each keyword, in order.
    pub regions: Vec<String>,
    /// Language code passed to the feed source.
    pub language: String,
    /// Maximum articles per keyword in a single briefing.
    pub limit: usize,
}
