use mockito::Matcher;

use newsbrief::fetcher::{FeedFetcher, GoogleNewsFetcher};

const RSS_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>"rust" - News</title>
    <link>https://news.example.com/search?q=rust</link>
    <description>Search results</description>
    <item>
      <title>Borrow checker gets friendlier</title>
      <link>https://blog.example.com/borrowck</link>
      <pubDate>Mon, 24 Aug 2026 08:00:00 GMT</pubDate>
      <description>Summary one</description>
    </item>
    <item>
      <title>Async traits stabilized</title>
      <link>https://weekly.example.org/async-traits</link>
      <pubDate>Mon, 24 Aug 2026 09:30:00 GMT</pubDate>
      <description>Summary two</description>
    </item>
    <item>
      <title>Entry with no link is skipped</title>
      <description>No link here</description>
    </item>
  </channel>
</rss>"#;

#[tokio::test]
async fn fetch_builds_search_url_and_maps_entries() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/rss/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "rust".into()),
            Matcher::UrlEncoded("hl".into(), "en".into()),
            Matcher::UrlEncoded("gl".into(), "US".into()),
            Matcher::UrlEncoded("ceid".into(), "US:en".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(RSS_BODY)
        .create_async()
        .await;

    let fetcher = GoogleNewsFetcher::new(server.url(), 5).expect("build fetcher");
    let items = fetcher.fetch("rust", "US", "en").await.expect("fetch");

    mock.assert_async().await;
    assert_eq!(items.len(), 2);

    assert_eq!(items[0].title, "Borrow checker gets friendlier");
    assert_eq!(items[0].link, "https://blog.example.com/borrowck");
    assert_eq!(items[0].summary, "Summary one");
    assert_eq!(items[0].source, "blog.example.com");
    // The fetcher leaves keyword assignment to the orchestrator.
    assert!(items[0].keyword.is_empty());
    assert!(!items[0].sent);

    assert_eq!(items[1].link, "https://weekly.example.org/async-traits");
}

#[tokio::test]
async fn fetch_reports_http_errors() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/rss/search")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let fetcher = GoogleNewsFetcher::new(server.url(), 5).expect("build fetcher");
    let err = fetcher.fetch("rust", "US", "en").await.unwrap_err();
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn fetch_reports_unparseable_bodies() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/rss/search")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("this is not xml")
        .create_async()
        .await;

    let fetcher = GoogleNewsFetcher::new(server.url(), 5).expect("build fetcher");
    assert!(fetcher.fetch("rust", "US", "en").await.is_err());
}
