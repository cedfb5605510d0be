use async_trait::async_trait;

use crate::Result;

/// A feed as returned by the fetch capability, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeed {
    pub title: Option<String>,
    pub items: Vec<RawItem>,
}

/// One feed entry with every field optional, mirroring what publishers actually send.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub guid: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub pub_date: Option<String>,
    pub content_snippet: Option<String>,
    pub content: Option<String>,
    pub enclosure_url: Option<String>,
    pub image: Option<String>,
}

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Downloads and parses the feed at `url`
    async fn fetch(&self, url: &str) -> Result<RawFeed>;
}
