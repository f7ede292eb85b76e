use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::model::{Article, Settings};

/// Bucket used for articles that carry no keyword of their own.
pub const FALLBACK_KEYWORD: &str = "uncategorized";

/// Articles grouped by keyword for a single delivery, each bucket capped at
/// the configured per-keyword limit.
///
/// Buckets keep the order keywords were first seen in, and articles keep the
/// order they were pushed in, so a rendered briefing is deterministic. This is
/// intentionally not a hash map.
#[derive(Debug)]
pub struct Briefing {
    limit: usize,
    groups: Vec<(String, Vec<Article>)>,
    dropped: usize,
}

impl Briefing {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            groups: Vec::new(),
            dropped: 0,
        }
    }

    /// Place one article into its keyword bucket. Returns false when the
    /// bucket is already full; the article is then only counted, not kept.
    pub fn push(&mut self, article: Article) -> bool {
        let key = if article.keyword.is_empty() {
            FALLBACK_KEYWORD
        } else {
            article.keyword.as_str()
        };

        let idx = match self.groups.iter().position(|(k, _)| k == key) {
            Some(i) => i,
            None => {
                self.groups.push((key.to_string(), Vec::new()));
                self.groups.len() - 1
            }
        };

        let bucket = &mut self.groups[idx].1;
        if bucket.len() < self.limit {
            bucket.push(article);
            true
        } else {
            self.dropped += 1;
            false
        }
    }

    pub fn groups(&self) -> &[(String, Vec<Article>)] {
        &self.groups
    }

    /// Keywords in delivery order.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(k, _)| k.as_str())
    }

    /// Articles that actually made it into a bucket, in delivery order.
    pub fn included(&self) -> impl Iterator<Item = &Article> {
        self.groups.iter().flat_map(|(_, arts)| arts.iter())
    }

    /// Total articles included across all buckets.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, arts)| arts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Articles dropped by the per-keyword cap.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

/// Render the briefing as the text body of a delivery payload.
pub fn render_briefing(briefing: &Briefing) -> String {
    let mut out = String::new();
    out.push_str("*Daily News Digest*\n");
    for (keyword, articles) in briefing.groups() {
        out.push_str(&format!("\n# {}\n", keyword));
        for a in articles {
            out.push_str(&format!("- <{}|{}> ({})\n", a.link, a.title, a.source));
        }
    }
    out
}

/// Delivers one composed briefing. Success or failure is binary; the
/// orchestrator never marks articles sent unless this succeeds.
#[async_trait]
pub trait BriefingDispatcher: Send + Sync {
    async fn send_briefing(&self, briefing: &Briefing, settings: &Settings) -> Result<()>;
}

/// Posts the rendered briefing as JSON to a Slack-compatible incoming webhook.
pub struct WebhookDispatcher {
    client: Client,
    webhook_url: String,
}

impl WebhookDispatcher {
    pub fn new(webhook_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("newsbrief/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
        })
    }
}

#[async_trait]
impl BriefingDispatcher for WebhookDispatcher {
    async fn send_briefing(&self, briefing: &Briefing, _settings: &Settings) -> Result<()> {
        let subject: Vec<&str> = briefing.keywords().take(3).collect();
        let payload = json!({
            "text": format!("[News] {}", subject.join(", ")),
            "blocks": [
                {
                    "type": "header",
                    "text": { "type": "plain_text", "text": "Daily News Digest", "emoji": true }
                },
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": render_briefing(briefing) }
                }
            ]
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .context("failed to post briefing to webhook")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("webhook rejected briefing with status {}", status);
        }

        debug!(
            "briefing delivered: {} articles in {} groups, {} dropped by cap",
            briefing.len(),
            briefing.groups().len(),
            briefing.dropped()
        );
        Ok(())
    }
}

/// Stand-in used when no webhook is configured. Delivery always fails, which
/// keeps articles unsent instead of marking them without a briefing going out.
pub struct UnconfiguredDispatcher;

#[async_trait]
impl BriefingDispatcher for UnconfiguredDispatcher {
    async fn send_briefing(&self, _briefing: &Briefing, _settings: &Settings) -> Result<()> {
        anyhow::bail!("no briefing webhook configured (set [briefing].webhook_url)")
    }
}
