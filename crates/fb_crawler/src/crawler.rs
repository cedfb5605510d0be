use chrono::{DateTime, Utc};
use fb_core::text::truncate_chars;
use fb_core::{Article, ContentStore, FeedFetcher, FeedSource, RawFeed, RawItem, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::logging::Logger;

/// Upper bound for a single feed download, so one slow feed cannot stall a cycle.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub const UNTITLED: &str = "Untitled";
pub const UNKNOWN_AUTHOR: &str = "Unknown";
const CONTENT_SUMMARY_CHARS: usize = 200;

pub struct ContentCrawler {
    fetcher: Arc<dyn FeedFetcher>,
    store: Arc<dyn ContentStore>,
    fetch_timeout: Duration,
    logger: Logger,
}

impl ContentCrawler {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, store: Arc<dyn ContentStore>) -> Self {
        Self {
            fetcher,
            store,
            fetch_timeout: FETCH_TIMEOUT,
            logger: Logger::new().with_prefix("crawler".to_string()),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Fetches one feed and normalizes its items. Never fails: a broken feed logs
    /// and yields no articles.
    pub async fn fetch_feed(&self, url: &str) -> Vec<Article> {
        let logger = self.logger.clone().with_prefix(url.to_string());
        logger.debug("fetching feed");

        let feed = match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(Ok(feed)) => feed,
            Ok(Err(e)) => {
                logger.error(&format!("failed to fetch feed: {}", e));
                return Vec::new();
            }
            Err(_) => {
                logger.warn(&format!(
                    "feed did not respond within {}s",
                    self.fetch_timeout.as_secs()
                ));
                return Vec::new();
            }
        };

        let articles = normalize_feed(feed, Utc::now());
        logger.info(&format!("fetched {} articles", articles.len()));
        articles
    }

    /// Fetches every enabled source in order; failing sources contribute nothing.
    pub async fn fetch_all(&self, sources: &[FeedSource]) -> Vec<Article> {
        let mut all_articles = Vec::new();
        for source in sources.iter().filter(|s| s.enabled) {
            let mut articles = self.fetch_feed(&source.url).await;
            all_articles.append(&mut articles);
        }
        all_articles
    }

    /// Keeps articles whose hash has not been seen before, preserving order.
    pub async fn filter_new(&self, articles: Vec<Article>) -> Vec<Article> {
        let mut fresh = Vec::with_capacity(articles.len());
        for article in articles {
            let Some(hash) = article.hash.as_deref() else {
                continue;
            };
            match self.store.hash_exists(hash).await {
                Ok(false) => fresh.push(article),
                Ok(true) => {}
                Err(e) => error!(url = %article.url, "failed to check whether article exists: {}", e),
            }
        }
        fresh
    }

    /// Saves articles in one transaction and returns the ones actually stored.
    /// Articles whose id or url already exists are skipped by the store and left out.
    pub async fn persist(&self, articles: &[Article]) -> Result<Vec<Article>> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }
        let ids: HashSet<String> = self.store.insert_articles(articles).await?.into_iter().collect();
        let saved: Vec<Article> = articles
            .iter()
            .filter(|a| ids.contains(&a.id))
            .cloned()
            .collect();
        if saved.len() < articles.len() {
            warn!(
                skipped = articles.len() - saved.len(),
                "some new articles share an id or url with stored ones and were skipped"
            );
        }
        info!(saved = saved.len(), candidates = articles.len(), "articles persisted");
        Ok(saved)
    }
}

pub fn normalize_feed(feed: RawFeed, now: DateTime<Utc>) -> Vec<Article> {
    let feed_title = feed.title;
    feed.items
        .into_iter()
        .map(|item| normalize_item(item, feed_title.as_deref(), now))
        .collect()
}

/// Turns a raw feed item into an [`Article`], applying the fallback rules for
/// every optional field and computing the dedup hash.
pub fn normalize_item(item: RawItem, feed_title: Option<&str>, now: DateTime<Utc>) -> Article {
    let id = item
        .guid
        .clone()
        .or_else(|| item.link.clone())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let author = item
        .author
        .or(item.creator)
        .or_else(|| feed_title.map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    let published_at = item
        .pub_date
        .as_deref()
        .and_then(parse_pub_date)
        .unwrap_or(now);

    let summary = match (&item.content_snippet, &item.content) {
        (Some(snippet), _) if !snippet.is_empty() => snippet.clone(),
        (_, Some(content)) => truncate_chars(content, CONTENT_SUMMARY_CHARS).to_string(),
        _ => String::new(),
    };

    Article {
        id,
        title: item.title.unwrap_or_else(|| UNTITLED.to_string()),
        url: item.link.unwrap_or_default(),
        author,
        published_at,
        summary,
        content: item.content,
        cover_image: item.enclosure_url.or(item.image),
        hash: None,
    }
    .with_computed_hash()
}

fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|d| d.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use fb_core::Error;
    use fb_storage::InMemoryStore;
    use std::collections::HashMap;

    /// Serves canned feeds by url; unknown urls fail like a dead host.
    #[derive(Default)]
    struct StubFetcher {
        feeds: HashMap<String, RawFeed>,
        slow: Option<String>,
    }

    #[async_trait]
    impl FeedFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<RawFeed> {
            if self.slow.as_deref() == Some(url) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.feeds
                .get(url)
                .cloned()
                .ok_or_else(|| Error::Fetch(format!("connection refused: {}", url)))
        }
    }

    fn item(n: usize) -> RawItem {
        RawItem {
            guid: Some(format!("guid-{}", n)),
            link: Some(format!("https://a.example/{}", n)),
            title: Some(format!("Title {}", n)),
            content_snippet: Some(format!("Summary {}", n)),
            ..Default::default()
        }
    }

    fn feed(title: &str, items: Vec<RawItem>) -> RawFeed {
        RawFeed {
            title: Some(title.to_string()),
            items,
        }
    }

    fn crawler(fetcher: StubFetcher) -> (ContentCrawler, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (ContentCrawler::new(Arc::new(fetcher), store.clone()), store)
    }

    #[test]
    fn test_normalize_prefers_guid_then_link() {
        let now = Utc::now();
        let article = normalize_item(item(1), None, now);
        assert_eq!(article.id, "guid-1");

        let mut no_guid = item(2);
        no_guid.guid = None;
        assert_eq!(normalize_item(no_guid, None, now).id, "https://a.example/2");

        let bare = normalize_item(RawItem::default(), None, now);
        assert!(uuid::Uuid::parse_str(&bare.id).is_ok());
        assert_eq!(bare.title, UNTITLED);
        assert_eq!(bare.url, "");
        assert_eq!(bare.summary, "");
        assert!(bare.hash.is_some());
    }

    #[test]
    fn test_normalize_author_priority() {
        let now = Utc::now();
        let mut raw = RawItem {
            author: Some("Author".to_string()),
            creator: Some("Creator".to_string()),
            ..Default::default()
        };
        assert_eq!(normalize_item(raw.clone(), Some("Feed"), now).author, "Author");
        raw.author = None;
        assert_eq!(normalize_item(raw.clone(), Some("Feed"), now).author, "Creator");
        raw.creator = None;
        assert_eq!(normalize_item(raw.clone(), Some("Feed"), now).author, "Feed");
        assert_eq!(normalize_item(raw, None, now).author, UNKNOWN_AUTHOR);
    }

    #[test]
    fn test_normalize_publish_time() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut raw = RawItem {
            pub_date: Some("Tue, 02 Jan 2024 08:30:00 +0000".to_string()),
            ..Default::default()
        };
        assert_eq!(
            normalize_item(raw.clone(), None, now).published_at,
            Utc.with_ymd_and_hms(2024, 1, 2, 8, 30, 0).unwrap()
        );

        raw.pub_date = Some("2024-03-04T05:06:07Z".to_string());
        assert_eq!(
            normalize_item(raw.clone(), None, now).published_at,
            Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap()
        );

        raw.pub_date = Some("last tuesday".to_string());
        assert_eq!(normalize_item(raw, None, now).published_at, now);
    }

    #[test]
    fn test_normalize_summary_fallbacks() {
        let now = Utc::now();
        let long_content = "x".repeat(500);
        let raw = RawItem {
            content: Some(long_content.clone()),
            ..Default::default()
        };
        let article = normalize_item(raw, None, now);
        assert_eq!(article.summary.chars().count(), CONTENT_SUMMARY_CHARS);
        assert_eq!(article.content.as_deref(), Some(long_content.as_str()));

        let raw = RawItem {
            content_snippet: Some("snippet".to_string()),
            content: Some(long_content),
            ..Default::default()
        };
        assert_eq!(normalize_item(raw, None, now).summary, "snippet");
    }

    #[test]
    fn test_normalize_cover_image() {
        let now = Utc::now();
        let raw = RawItem {
            enclosure_url: Some("https://a.example/cover.png".to_string()),
            image: Some("https://a.example/thumb.png".to_string()),
            ..Default::default()
        };
        assert_eq!(
            normalize_item(raw, None, now).cover_image.as_deref(),
            Some("https://a.example/cover.png")
        );
    }

    #[tokio::test]
    async fn test_fetch_all_isolates_failing_sources() {
        let mut fetcher = StubFetcher::default();
        fetcher
            .feeds
            .insert("https://a.example/rss".to_string(), feed("A", vec![item(1), item(2)]));
        fetcher
            .feeds
            .insert("https://c.example/rss".to_string(), feed("C", vec![item(3)]));
        let (crawler, _) = crawler(fetcher);

        let mut disabled = FeedSource::new("D", "https://c.example/rss");
        disabled.enabled = false;
        let sources = vec![
            FeedSource::new("A", "https://a.example/rss"),
            FeedSource::new("B", "https://broken.example/rss"),
            FeedSource::new("C", "https://c.example/rss"),
            disabled,
        ];

        let articles = crawler.fetch_all(&sources).await;
        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Title 1", "Title 2", "Title 3"]);
        assert_eq!(articles[0].author, "A");
        assert_eq!(articles[2].author, "C");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_feed_times_out() {
        let fetcher = StubFetcher {
            slow: Some("https://slow.example/rss".to_string()),
            ..Default::default()
        };
        let (crawler, _) = crawler(fetcher);

        let articles = crawler.fetch_feed("https://slow.example/rss").await;
        assert!(articles.is_empty());
    }

    #[tokio::test]
    async fn test_filter_new_and_persist_are_idempotent() {
        let (crawler, store) = crawler(StubFetcher::default());
        let now = Utc::now();
        let candidates: Vec<Article> = (1..=3).map(|n| normalize_item(item(n), None, now)).collect();

        let fresh = crawler.filter_new(candidates.clone()).await;
        assert_eq!(fresh.len(), 3);
        assert_eq!(crawler.persist(&fresh).await.unwrap(), fresh);

        assert!(crawler.filter_new(candidates.clone()).await.is_empty());
        assert!(crawler.persist(&fresh).await.unwrap().is_empty());
        assert_eq!(store.article_count().await, 3);
    }

    #[tokio::test]
    async fn test_persist_leaves_out_articles_sharing_a_url() {
        let (crawler, store) = crawler(StubFetcher::default());
        let now = Utc::now();
        let first = normalize_item(item(1), None, now);
        let mut republished = item(2);
        republished.link = Some(first.url.clone());
        let republished = normalize_item(republished, None, now);

        let fresh = crawler.filter_new(vec![first.clone(), republished]).await;
        assert_eq!(fresh.len(), 2);

        let saved = crawler.persist(&fresh).await.unwrap();
        assert_eq!(saved, vec![first]);
        assert_eq!(store.article_count().await, 1);
    }

    #[tokio::test]
    async fn test_filter_new_drops_hashless_and_keeps_order() {
        let (crawler, _) = crawler(StubFetcher::default());
        let now = Utc::now();
        let mut hashless = normalize_item(item(1), None, now);
        hashless.hash = None;
        let second = normalize_item(item(2), None, now);
        let third = normalize_item(item(3), None, now);

        let fresh = crawler
            .filter_new(vec![third.clone(), hashless, second.clone()])
            .await;
        assert_eq!(fresh, vec![third, second]);
    }

    #[tokio::test]
    async fn test_filter_new_treats_hash_collision_as_seen() {
        let (crawler, _) = crawler(StubFetcher::default());
        let now = Utc::now();
        let original = normalize_item(item(1), None, now);
        crawler.persist(&[original]).await.unwrap();

        let mut lookalike = item(1);
        lookalike.guid = Some("other-guid".to_string());
        lookalike.link = Some("https://b.example/other".to_string());
        let lookalike = normalize_item(lookalike, Some("B"), now);

        assert!(crawler.filter_new(vec![lookalike]).await.is_empty());
    }
}
