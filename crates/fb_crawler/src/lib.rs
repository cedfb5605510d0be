pub mod cli;
pub mod crawler;
pub mod fetcher;
mod logging;

pub use cli::{handle_command, CrawlerArgs, CrawlerCommands};
pub use crawler::{normalize_feed, normalize_item, ContentCrawler, FETCH_TIMEOUT};
pub use fetcher::RssFeedFetcher;
pub use logging::{init_logging, Logger};

pub mod prelude {
    pub use super::crawler::ContentCrawler;
    pub use super::fetcher::RssFeedFetcher;
    pub use fb_core::{Article, Error, FeedFetcher, FeedSource, Result};
}
