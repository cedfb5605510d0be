use async_trait::async_trait;
use fb_core::text::{collapse_whitespace, strip_html};
use fb_core::{Error, FeedFetcher, RawFeed, RawItem, Result};
use reqwest::Client;
use atom_syndication::{Entry, Feed};
use rss::{Channel, Item};
use std::time::Duration;

use crate::crawler::FETCH_TIMEOUT;

const USER_AGENT: &str = concat!("feed-brief/", env!("CARGO_PKG_VERSION"));

/// Downloads feeds over HTTP. RSS 2.0 is parsed with the `rss` crate, Atom with
/// `atom_syndication` when the document is not RSS.
pub struct RssFeedFetcher {
    client: Client,
}

impl RssFeedFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Create a fetcher with a custom reqwest Client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedFetcher for RssFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<RawFeed> {
        tracing::debug!("Fetching RSS feed from: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("request to {} failed: {}", url, e)))?;
        let status = response.status();

        if !status.is_success() {
            return Err(Error::Fetch(format!("HTTP {} when fetching {}", status, url)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Fetch(format!("failed to read body of {}: {}", url, e)))?;

        let feed = parse_feed(&bytes)?;
        tracing::debug!("Parsed {} items from RSS feed", feed.items.len());
        Ok(feed)
    }
}

/// Parses RSS 2.0 or Atom XML into a [`RawFeed`].
pub fn parse_feed(xml: &[u8]) -> Result<RawFeed> {
    let rss_error = match Channel::read_from(xml) {
        Ok(channel) => {
            return Ok(RawFeed {
                title: non_empty(Some(channel.title())),
                items: channel.items().iter().map(raw_item).collect(),
            })
        }
        Err(e) => e,
    };

    match Feed::read_from(xml) {
        Ok(feed) => Ok(RawFeed {
            title: non_empty(Some(feed.title().as_str())),
            items: feed.entries().iter().map(raw_entry).collect(),
        }),
        Err(atom_error) => Err(Error::Fetch(format!(
            "failed to parse feed as RSS ({}) or Atom ({})",
            rss_error, atom_error
        ))),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn raw_item(item: &Item) -> RawItem {
    let content = non_empty(item.content()).or_else(|| non_empty(item.description()));
    let content_snippet = item
        .description()
        .or(item.content())
        .map(|html| collapse_whitespace(&strip_html(html)))
        .filter(|s| !s.is_empty());

    RawItem {
        guid: non_empty(item.guid().map(|g| g.value())),
        link: non_empty(item.link()),
        title: non_empty(item.title()),
        author: non_empty(item.author()),
        creator: item
            .dublin_core_ext()
            .and_then(|dc| dc.creators().first())
            .and_then(|c| non_empty(Some(c.as_str()))),
        pub_date: non_empty(item.pub_date()),
        content_snippet,
        content,
        enclosure_url: item.enclosure().and_then(|e| non_empty(Some(e.url()))),
        image: item_image(item),
    }
}

fn raw_entry(entry: &Entry) -> RawItem {
    let link = entry
        .links()
        .iter()
        .find(|l| l.rel() == "alternate")
        .or_else(|| entry.links().first())
        .and_then(|l| non_empty(Some(l.href())));
    let enclosure_url = entry
        .links()
        .iter()
        .find(|l| l.rel() == "enclosure")
        .and_then(|l| non_empty(Some(l.href())));
    let content = entry.content().and_then(|c| non_empty(c.value()));
    let content_snippet = entry
        .summary()
        .map(|s| s.as_str())
        .or(content.as_deref())
        .map(|html| collapse_whitespace(&strip_html(html)))
        .filter(|s| !s.is_empty());

    RawItem {
        guid: non_empty(Some(entry.id())),
        link,
        title: non_empty(Some(entry.title().as_str())),
        author: entry.authors().first().and_then(|p| non_empty(Some(p.name()))),
        creator: None,
        pub_date: Some(entry.published().unwrap_or(entry.updated()).to_rfc3339()),
        content_snippet,
        content: content.or_else(|| entry.summary().and_then(|s| non_empty(Some(s.as_str())))),
        enclosure_url,
        image: None,
    }
}

fn item_image(item: &Item) -> Option<String> {
    if let Some(image) = item.itunes_ext().and_then(|it| non_empty(it.image())) {
        return Some(image);
    }
    let media = item.extensions().get("media")?;
    ["thumbnail", "content"]
        .iter()
        .filter_map(|name| media.get(*name))
        .flat_map(|extensions| extensions.iter())
        .find_map(|ext| non_empty(ext.attrs().get("url").map(String::as_str)))
}
