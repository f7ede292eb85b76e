/*
newsbrief - single-binary main.rs
This binary wires the concrete collaborators (config file, SQLite store,
Google News fetcher, webhook dispatcher) into the orchestration core and
exposes one-shot commands plus a periodic worker mode.
*/

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use common::{init_db_pool, Config};

use newsbrief::briefing::{BriefingDispatcher, UnconfiguredDispatcher, WebhookDispatcher};
use newsbrief::fetcher::{FeedFetcher, GoogleNewsFetcher, DEFAULT_FEED_BASE_URL};
use newsbrief::orchestrator::NewsApp;
use newsbrief::settings::FileSettings;
use newsbrief::storage::{ensure_schema, SqliteArticleStore};
use newsbrief::worker::run_worker;

#[derive(Parser, Debug)]
#[command(name = "newsbrief", about = "News crawler and briefing dispatcher")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one crawl pass and exit
    Crawl,
    /// Deliver one briefing of unsent articles and exit
    Dispatch,
    /// Run the periodic crawl + dispatch worker until interrupted
    Run,
    /// Probe the feed source with a single test fetch
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    // Load configuration with defaults
    let default_opt = if default_path.exists() {
        Some(default_path.clone())
    } else {
        None
    };
    let config = match Config::load_with_defaults(
        default_opt.as_deref(),
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_opt, override_file = ?override_path, "configuration loaded");

    let fetcher = build_fetcher(&config)?;

    // `check` needs no database or webhook; handle it before any wiring.
    if let Command::Check = args.command {
        return check_feed(&config, fetcher.as_ref()).await;
    }

    // Initialize DB pool
    let db_pool = match init_db_pool(&config.database.path).await {
        Ok(p) => p,
        Err(e) => {
            error!(%e, db_path = %config.database.path, "failed to initialize database pool");
            return Err(e);
        }
    };
    ensure_schema(&db_pool).await?;

    let app = Arc::new(build_app(&config, default_opt, override_path, db_pool, fetcher)?);

    match args.command {
        Command::Crawl => {
            let count = app.crawl().await?;
            println!("crawl complete: {} new articles stored", count);
        }
        Command::Dispatch => {
            let count = app.dispatch_unsent().await?;
            println!("dispatch complete: {} articles marked sent", count);
        }
        Command::Run => {
            let shutdown_notify = Arc::new(Notify::new());
            let worker = run_worker(app.clone(), config.clone(), shutdown_notify.clone());

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("ctrl-c received, notifying worker to shutdown");
                    shutdown_notify.notify_waiters();
                    // give worker a small grace period
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
                res = worker => {
                    if let Err(e) = res {
                        error!(%e, "worker encountered an error");
                    }
                }
            }
            info!("shutdown complete");
        }
        Command::Check => unreachable!("handled above"),
    }

    Ok(())
}

fn build_fetcher(config: &Config) -> Result<Arc<dyn FeedFetcher>> {
    let base_url = config
        .feed
        .as_ref()
        .and_then(|f| f.base_url.clone())
        .unwrap_or_else(|| DEFAULT_FEED_BASE_URL.to_string());
    let timeout = config
        .politeness
        .as_ref()
        .and_then(|p| p.fetch_timeout_seconds)
        .unwrap_or(10);
    Ok(Arc::new(GoogleNewsFetcher::new(base_url, timeout)?))
}

fn build_app(
    config: &Config,
    default_path: Option<PathBuf>,
    override_path: Option<PathBuf>,
    db_pool: sqlx::SqlitePool,
    fetcher: Arc<dyn FeedFetcher>,
) -> Result<NewsApp> {
    // The settings source re-reads the config files on every call, so
    // keyword/region/limit edits apply on the next run without a restart.
    let settings = Arc::new(FileSettings::new(default_path, override_path));
    let store = Arc::new(SqliteArticleStore::new(db_pool));

    let briefing_cfg = config.briefing.as_ref();
    let dispatcher: Arc<dyn BriefingDispatcher> =
        match briefing_cfg.and_then(|b| b.webhook_url.clone()) {
            Some(url) => {
                let timeout = briefing_cfg.and_then(|b| b.timeout_seconds).unwrap_or(10);
                Arc::new(WebhookDispatcher::new(url, timeout)?)
            }
            None => {
                info!("no briefing webhook configured; dispatch will fail until one is set");
                Arc::new(UnconfiguredDispatcher)
            }
        };

    let fetch_delay = Duration::from_millis(
        config
            .politeness
            .as_ref()
            .and_then(|p| p.fetch_delay_millis)
            .unwrap_or(500),
    );
    let mark_capped = briefing_cfg
        .and_then(|b| b.mark_capped_as_sent)
        .unwrap_or(true);

    Ok(NewsApp::new(settings, store, fetcher, dispatcher)
        .with_fetch_delay(fetch_delay)
        .with_mark_capped_as_sent(mark_capped))
}

/// Single probe fetch against the feed source, reported on stdout.
async fn check_feed(config: &Config, fetcher: &dyn FeedFetcher) -> Result<()> {
    let keyword = config
        .curation
        .keywords
        .first()
        .map(String::as_str)
        .unwrap_or("news");
    let region = config
        .curation
        .regions
        .first()
        .map(String::as_str)
        .unwrap_or("US");

    match fetcher.fetch(keyword, region, &config.curation.language).await {
        Ok(items) => {
            println!(
                "feed check ok: {} items for '{}' ({})",
                items.len(),
                keyword,
                region
            );
            Ok(())
        }
        Err(e) => {
            println!("feed check failed: {e:#}");
            Err(e)
        }
    }
}
