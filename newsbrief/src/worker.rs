use anyhow::Result;
use chrono::{Local, NaiveTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::orchestrator::NewsApp;

const TICK: Duration = Duration::from_secs(30);
const DEFAULT_CRAWL_INTERVAL_MINUTES: u64 = 60;

/// Top-level background worker entrypoint. Runs crawl passes on a fixed
/// interval and dispatches a briefing whenever a configured wall-clock time
/// is crossed, until `shutdown_notify` is signalled.
///
/// A failed pass is logged and the schedule keeps going; re-invocation on the
/// next tick is the retry policy.
pub async fn run_worker(
    app: Arc<NewsApp>,
    config: common::Config,
    shutdown_notify: Arc<Notify>,
) -> Result<()> {
    let crawl_interval = Duration::from_secs(
        config
            .scheduler
            .crawl_interval_minutes
            .unwrap_or(DEFAULT_CRAWL_INTERVAL_MINUTES)
            * 60,
    );
    let dispatch_times = parse_times(&config.scheduler.dispatch_times);
    info!(
        "worker starting: crawl every {:?}, dispatch at {:?}",
        crawl_interval, dispatch_times
    );

    let mut next_crawl = Instant::now();
    let mut last_tick = Local::now().time();

    loop {
        if Instant::now() >= next_crawl {
            match app.crawl().await {
                Ok(count) => info!("worker: crawl stored {} new articles", count),
                Err(e) => error!("worker: crawl failed: {e:#}"),
            }
            next_crawl = Instant::now() + crawl_interval;
        }

        let now = Local::now().time();
        if dispatch_times.iter().any(|t| crossed(last_tick, now, *t)) {
            match app.dispatch_unsent().await {
                Ok(count) => info!("worker: dispatched {} articles", count),
                Err(e) => error!("worker: dispatch failed: {e:#}"),
            }
        }
        last_tick = now;

        select! {
            _ = tokio::time::sleep(TICK) => {
                // Loop again
            },
            _ = shutdown_notify.notified() => {
                info!("worker: shutdown requested, exiting loop");
                break;
            }
        }
    }

    info!("worker: cleanup complete");
    Ok(())
}

/// Parse "HH:MM" entries, skipping malformed ones with a warning.
fn parse_times(raw: &[String]) -> Vec<NaiveTime> {
    raw.iter()
        .filter_map(|s| match NaiveTime::parse_from_str(s, "%H:%M") {
            Ok(t) => Some(t),
            Err(e) => {
                warn!("ignoring malformed dispatch time '{}': {}", s, e);
                None
            }
        })
        .collect()
}

/// True when `target` lies in the half-open window (prev, now]. Handles the
/// midnight wrap where `now` is earlier in the day than `prev`.
fn crossed(prev: NaiveTime, now: NaiveTime, target: NaiveTime) -> bool {
    if prev <= now {
        prev < target && target <= now
    } else {
        target > prev || target <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    #[test]
    fn parse_times_keeps_valid_and_skips_malformed() {
        let raw = vec!["07:00".to_string(), "25:99".to_string(), "19:30".to_string()];
        let times = parse_times(&raw);
        assert_eq!(times, vec![t(7, 0), t(19, 30)]);
    }

    #[test]
    fn crossed_detects_target_inside_window() {
        assert!(crossed(t(6, 59), t(7, 1), t(7, 0)));
        assert!(!crossed(t(7, 1), t(7, 2), t(7, 0)));
        assert!(!crossed(t(6, 50), t(6, 59), t(7, 0)));
    }

    #[test]
    fn crossed_handles_midnight_wrap() {
        assert!(crossed(t(23, 59), t(0, 1), t(0, 0)));
        assert!(!crossed(t(23, 59), t(0, 1), t(12, 0)));
    }
}
