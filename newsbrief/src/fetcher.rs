use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use feed_rs::parser;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::model::Article;

/// Returns candidate articles for one (keyword, region, language) triple.
/// A failure here is recoverable at the crawl level: the loop logs it and
/// moves on to the next pair.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, keyword: &str, region: &str, language: &str) -> Result<Vec<Article>>;
}

pub const DEFAULT_FEED_BASE_URL: &str = "https://news.google.com";

/// `FeedFetcher` backed by the Google News search feed.
///
/// The base URL is injectable so tests can point it at a local mock server.
pub struct GoogleNewsFetcher {
    client: Client,
    base_url: String,
}

impl GoogleNewsFetcher {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("newsbrief/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn feed_url(&self, keyword: &str, region: &str, language: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/rss/search", self.base_url))
            .context("invalid feed base URL")?;
        url.query_pairs_mut()
            .append_pair("q", keyword)
            .append_pair("hl", language)
            .append_pair("gl", region)
            .append_pair("ceid", &format!("{}:{}", region, language));
        Ok(url)
    }
}

/// Best-effort human-readable source for an entry: the host of its link.
fn source_from_link(link: &str) -> String {
    Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| "News".to_string())
}

#[async_trait]
impl FeedFetcher for GoogleNewsFetcher {
    async fn fetch(&self, keyword: &str, region: &str, language: &str) -> Result<Vec<Article>> {
        let url = self.feed_url(keyword, region, language)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("network error fetching feed for '{}' ({})", keyword, region))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!(
                "feed fetch for '{}' ({}) failed with status {}",
                keyword,
                region,
                status
            );
        }

        let bytes = response.bytes().await.context("failed to read feed body")?;
        let feed = parser::parse(bytes.as_ref()).context("failed to parse feed")?;

        let now = Utc::now();
        let mut articles = Vec::new();
        for entry in feed.entries {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            if link.is_empty() {
                debug!(
                    "skipping entry without link: {:?}",
                    entry.title.as_ref().map(|t| &t.content)
                );
                continue;
            }

            articles.push(Article {
                // Stamped by the orchestrator once the dedup check passes.
                keyword: String::new(),
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                source: source_from_link(&link),
                summary: entry.summary.map(|s| s.content).unwrap_or_default(),
                published_at: entry.published.unwrap_or(now),
                discovered_at: now,
                sent: false,
                link,
            });
        }

        debug!(
            "fetched {} entries for '{}' ({}/{})",
            articles.len(),
            keyword,
            region,
            language
        );
        Ok(articles)
    }
}
