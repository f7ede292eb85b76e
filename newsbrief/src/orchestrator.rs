use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::briefing::{Briefing, BriefingDispatcher};
use crate::fetcher::FeedFetcher;
use crate::model::Article;
use crate::settings::SettingsSource;
use crate::storage::ArticleStore;

/// Delay applied before every feed fetch, including the very first. The
/// upstream feed source is rate limited; this is a courtesy throttle, not a
/// correctness mechanism.
pub const DEFAULT_FETCH_DELAY: Duration = Duration::from_millis(500);

/// The orchestration core: sequences the injected collaborators for the two
/// entry procedures, `crawl` and `dispatch_unsent`. Fully sequential; the
/// inter-fetch delay is the only backpressure mechanism.
pub struct NewsApp {
    settings: Arc<dyn SettingsSource>,
    store: Arc<dyn ArticleStore>,
    fetcher: Arc<dyn FeedFetcher>,
    dispatcher: Arc<dyn BriefingDispatcher>,
    fetch_delay: Duration,
    mark_capped_as_sent: bool,
}

impl NewsApp {
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        store: Arc<dyn ArticleStore>,
        fetcher: Arc<dyn FeedFetcher>,
        dispatcher: Arc<dyn BriefingDispatcher>,
    ) -> Self {
        Self {
            settings,
            store,
            fetcher,
            dispatcher,
            fetch_delay: DEFAULT_FETCH_DELAY,
            mark_capped_as_sent: true,
        }
    }

    /// Override the inter-fetch delay. Tests run with `Duration::ZERO`.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// When disabled, only articles that actually made it into the briefing
    /// are marked sent; capped-out articles stay unsent and are reconsidered
    /// on the next dispatch. The default (enabled) keeps the historical
    /// behavior of marking the whole retrieved set, which permanently drops
    /// capped-out articles from notification.
    pub fn with_mark_capped_as_sent(mut self, value: bool) -> Self {
        self.mark_capped_as_sent = value;
        self
    }

    /// One crawl pass: fetch candidates for every keyword/region pair and
    /// persist the ones whose link the store has not seen before. Returns the
    /// number of newly stored articles.
    pub async fn crawl(&self) -> Result<usize> {
        let settings = self.settings.load().await.context("failed to load settings")?;
        let keywords = self
            .settings
            .keywords()
            .await
            .context("failed to load keywords")?;

        let mut new_items: Vec<Article> = Vec::new();
        for keyword in &keywords {
            for region in &settings.regions {
                tokio::time::sleep(self.fetch_delay).await;

                let candidates = match self
                    .fetcher
                    .fetch(keyword, region, &settings.language)
                    .await
                {
                    Ok(items) => items,
                    Err(e) => {
                        // One failing source must not abort the whole pass.
                        warn!(keyword = %keyword, region = %region, "fetch failed: {e:#}");
                        continue;
                    }
                };

                for mut item in candidates {
                    // The store is the sole dedup authority. Items discovered
                    // earlier in this same pass are not checked against each
                    // other here; the store's unique link index reconciles
                    // them at save time.
                    if self.store.url_exists(&item.link).await? {
                        continue;
                    }
                    item.keyword = keyword.clone();
                    new_items.push(item);
                }
            }
        }

        if !new_items.is_empty() {
            self.store
                .save_articles(&new_items)
                .await
                .context("failed to save crawled articles")?;
        }

        info!("crawl finished: {} new articles", new_items.len());
        Ok(new_items.len())
    }

    /// Group unsent articles into a capped briefing, deliver it, then flip
    /// the sent flags. Returns the number of articles marked sent.
    ///
    /// Delivery happens before marking, so a failed send leaves everything
    /// unsent and a re-invocation re-delivers: at-least-once semantics, with
    /// possible duplicate delivery on retry but never silent loss.
    pub async fn dispatch_unsent(&self) -> Result<usize> {
        let unsent = self
            .store
            .get_unsent_articles()
            .await
            .context("failed to load unsent articles")?;
        if unsent.is_empty() {
            info!("dispatch: nothing unsent");
            return Ok(0);
        }

        let settings = self.settings.load().await.context("failed to load settings")?;

        let mut briefing = Briefing::new(settings.limit);
        for article in &unsent {
            briefing.push(article.clone());
        }
        if briefing.dropped() > 0 {
            info!(
                "dispatch: {} articles over the per-keyword cap of {}",
                briefing.dropped(),
                settings.limit
            );
        }

        self.dispatcher
            .send_briefing(&briefing, &settings)
            .await
            .context("failed to deliver briefing")?;

        let marked: Vec<Article> = if self.mark_capped_as_sent {
            unsent
        } else {
            briefing.included().cloned().collect()
        };
        self.store
            .mark_as_sent(&marked)
            .await
            .context("failed to mark articles sent")?;

        info!("dispatch finished: {} articles marked sent", marked.len());
        Ok(marked.len())
    }
}
