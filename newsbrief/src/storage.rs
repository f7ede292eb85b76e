use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::model::Article;

/// Persistence surface the orchestrator depends on. The store is the sole
/// deduplication authority: `url_exists` answers against whatever is already
/// persisted, and the unique link index reconciles anything that slips past.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn url_exists(&self, link: &str) -> Result<bool>;
    /// Bulk insert. Called at most once per crawl pass, and only when there
    /// is at least one new article.
    async fn save_articles(&self, articles: &[Article]) -> Result<()>;
    /// All persisted articles with `sent = false`, in insertion order.
    async fn get_unsent_articles(&self) -> Result<Vec<Article>>;
    /// Bulk flag flip; the only mutation ever applied to a stored article.
    async fn mark_as_sent(&self, articles: &[Article]) -> Result<()>;
}

/// `ArticleStore` backed by SQLite via sqlx.
pub struct SqliteArticleStore {
    pool: SqlitePool,
}

impl SqliteArticleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Create the articles table if it does not exist yet.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            keyword TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL DEFAULT '',
            link TEXT NOT NULL UNIQUE,
            summary TEXT NOT NULL DEFAULT '',
            source TEXT NOT NULL DEFAULT '',
            published_at TEXT NOT NULL,
            discovered_at TEXT NOT NULL,
            sent INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create articles table")?;
    Ok(())
}

fn row_to_article(row: sqlx::sqlite::SqliteRow) -> Article {
    Article {
        keyword: row.get("keyword"),
        title: row.get("title"),
        link: row.get("link"),
        summary: row.get("summary"),
        source: row.get("source"),
        published_at: row.get("published_at"),
        discovered_at: row.get("discovered_at"),
        sent: row.get("sent"),
    }
}

#[async_trait]
impl ArticleStore for SqliteArticleStore {
    async fn url_exists(&self, link: &str) -> Result<bool> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM articles WHERE link = ?")
            .bind(link)
            .fetch_optional(&self.pool)
            .await
            .context("failed to check existing article")?;
        Ok(id.is_some())
    }

    async fn save_articles(&self, articles: &[Article]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin save transaction")?;

        for art in articles {
            // A single crawl pass can legitimately carry the same link twice
            // (two regions returning the same story); the unique index on
            // `link` settles it, so duplicates are ignored rather than
            // rejected.
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO articles
                    (keyword, title, link, summary, source, published_at, discovered_at, sent)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&art.keyword)
            .bind(&art.title)
            .bind(&art.link)
            .bind(&art.summary)
            .bind(&art.source)
            .bind(art.published_at)
            .bind(art.discovered_at)
            .bind(art.sent)
            .execute(&mut tx)
            .await
            .with_context(|| format!("failed to insert article {}", art.link))?;
        }

        tx.commit().await.context("failed to commit article save")?;
        debug!("saved {} articles", articles.len());
        Ok(())
    }

    async fn get_unsent_articles(&self) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT keyword, title, link, summary, source, published_at, discovered_at, sent
            FROM articles
            WHERE sent = 0
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to load unsent articles")?;

        Ok(rows.into_iter().map(row_to_article).collect())
    }

    async fn mark_as_sent(&self, articles: &[Article]) -> Result<()> {
        if articles.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin mark-sent transaction")?;

        for art in articles {
            sqlx::query("UPDATE articles SET sent = 1 WHERE link = ?")
                .bind(&art.link)
                .execute(&mut tx)
                .await
                .with_context(|| format!("failed to mark article sent: {}", art.link))?;
        }

        tx.commit()
            .await
            .context("failed to commit mark-sent update")?;
        debug!("marked {} articles as sent", articles.len());
        Ok(())
    }
}
