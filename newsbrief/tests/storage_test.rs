use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use newsbrief::model::Article;
use newsbrief::storage::{ensure_schema, ArticleStore, SqliteArticleStore};

// A single connection keeps the in-memory database alive and shared across
// all queries in a test.
async fn setup_store() -> SqliteArticleStore {
    let pool: SqlitePool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");
    ensure_schema(&pool).await.expect("ensure schema");
    SqliteArticleStore::new(pool)
}

fn article(keyword: &str, link: &str) -> Article {
    Article {
        keyword: keyword.to_string(),
        title: format!("title for {}", link),
        link: link.to_string(),
        summary: "a summary".to_string(),
        source: "example.com".to_string(),
        published_at: Utc::now(),
        discovered_at: Utc::now(),
        sent: false,
    }
}

#[tokio::test]
async fn saved_articles_are_visible_to_url_exists() {
    let store = setup_store().await;

    assert!(!store.url_exists("https://x/1").await.unwrap());
    store
        .save_articles(&[article("rust", "https://x/1")])
        .await
        .unwrap();
    assert!(store.url_exists("https://x/1").await.unwrap());
}

#[tokio::test]
async fn duplicate_links_collapse_to_one_row() {
    let store = setup_store().await;

    // Same link twice in one bulk save (two regions returning the same
    // story), then again in a later save.
    store
        .save_articles(&[
            article("rust", "https://x/dup"),
            article("sqlite", "https://x/dup"),
        ])
        .await
        .unwrap();
    store
        .save_articles(&[article("rust", "https://x/dup")])
        .await
        .unwrap();

    let unsent = store.get_unsent_articles().await.unwrap();
    assert_eq!(unsent.len(), 1);
    // First writer wins.
    assert_eq!(unsent[0].keyword, "rust");
}

#[tokio::test]
async fn unsent_retrieval_keeps_insertion_order_and_skips_sent() {
    let store = setup_store().await;

    let first = article("a", "https://x/1");
    let second = article("b", "https://x/2");
    let third = article("a", "https://x/3");
    store
        .save_articles(&[first.clone(), second.clone(), third.clone()])
        .await
        .unwrap();

    store.mark_as_sent(&[second]).await.unwrap();

    let unsent = store.get_unsent_articles().await.unwrap();
    let links: Vec<&str> = unsent.iter().map(|a| a.link.as_str()).collect();
    assert_eq!(links, vec!["https://x/1", "https://x/3"]);
    assert!(unsent.iter().all(|a| !a.sent));
}

#[tokio::test]
async fn mark_as_sent_flips_only_the_given_articles() {
    let store = setup_store().await;

    let keep = article("a", "https://x/keep");
    let flip = article("a", "https://x/flip");
    store
        .save_articles(&[keep.clone(), flip.clone()])
        .await
        .unwrap();

    store.mark_as_sent(&[flip]).await.unwrap();

    let unsent = store.get_unsent_articles().await.unwrap();
    assert_eq!(unsent.len(), 1);
    assert_eq!(unsent[0].link, "https://x/keep");

    // Marking nothing is a no-op, not an error.
    store.mark_as_sent(&[]).await.unwrap();
}

#[tokio::test]
async fn timestamps_round_trip_through_sqlite() {
    let store = setup_store().await;

    let art = article("a", "https://x/ts");
    store.save_articles(&[art.clone()]).await.unwrap();

    let unsent = store.get_unsent_articles().await.unwrap();
    assert_eq!(unsent[0].published_at.timestamp(), art.published_at.timestamp());
    assert_eq!(unsent[0].discovered_at.timestamp(), art.discovered_at.timestamp());
}
