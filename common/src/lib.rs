/*!
common/src/lib.rs

Shared configuration types and DB helper functions for newsbrief.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default + override merging
- A helper to initialize an SQLite connection pool
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/newsbrief.db")
    pub path: String,
}

/// Scheduler configuration for the background worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minutes between crawl passes when running in worker mode
    pub crawl_interval_minutes: Option<u64>,
    /// Wall-clock times in "HH:MM" 24h format when a briefing should go out
    #[serde(default)]
    pub dispatch_times: Vec<String>,
}

/// Politeness / fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolitenessConfig {
    /// Delay applied before every feed fetch (defaults to 500)
    pub fetch_delay_millis: Option<u64>,
    pub fetch_timeout_seconds: Option<u64>,
}

/// Operator-facing curation settings: what to crawl and how briefings are
/// bounded. Re-read from disk on every crawl/dispatch so edits take effect
/// without a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationConfig {
    /// Region codes crawled for each keyword, in order
    #[serde(default)]
    pub regions: Vec<String>,
    /// Language code passed to the feed source
    pub language: String,
    /// Maximum articles per keyword in a single briefing
    pub limit: usize,
    /// Search terms to crawl, in order
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Feed source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSourceConfig {
    /// Override the feed base URL (mainly for testing against a local server)
    pub base_url: Option<String>,
}

/// Briefing delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefingConfig {
    /// Incoming-webhook URL the rendered briefing is posted to
    pub webhook_url: Option<String>,
    /// When true (the default), articles dropped by the per-keyword cap are
    /// still marked sent after a successful delivery
    pub mark_capped_as_sent: Option<bool>,
    pub timeout_seconds: Option<u64>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub politeness: Option<PolitenessConfig>,
    pub curation: CurationConfig,
    pub feed: Option<FeedSourceConfig>,
    pub briefing: Option<BriefingConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value
            .try_into()
            .context("Failed to parse merged configuration")?;
        Ok(cfg)
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Initialize an SQLite connection pool.
///
/// This function will create the parent directory if necessary, ensure the DB file exists
/// (attempting to create it if missing), and return a configured `SqlitePool`. Defaults are
/// conservative for resource-constrained platforms:
/// - max_connections: 5
/// - connection timeout default provided by `sqlx`
///
/// Example:
///   let pool = init_db_pool("data/newsbrief.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = Path::new(path).parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create DB parent directory: {}", parent.display())
        })?;
    }

    // Try to create the DB file if it does not already exist. This gives a clearer error
    // earlier (filesystem permission or path issues) instead of only surfacing it via the
    // SQLite connection attempt.
    tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to create or open DB file: {}", path))?;

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}
