use chrono::Utc;
use clap::{Args, Subcommand};
use fb_core::{Article, Error, FeedFetcher, Result};
use std::path::PathBuf;

use crate::crawler::normalize_feed;
use crate::fetcher::{parse_feed, RssFeedFetcher};

#[derive(Args, Debug, Clone)]
pub struct CrawlerArgs {
    #[command(subcommand)]
    pub command: CrawlerCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CrawlerCommands {
    /// Fetch a feed and print its normalized articles without saving them
    Fetch {
        /// Feed URL (e.g. https://example.com/rss.xml)
        url: String,
        /// Print at most this many articles
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Parse an RSS file from disk
    Parse {
        path: PathBuf,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

pub async fn handle_command(args: CrawlerArgs) -> Result<()> {
    match args.command {
        CrawlerCommands::Fetch { url, limit } => {
            url::Url::parse(&url)
                .map_err(|e| Error::Configuration(format!("invalid feed url {}: {}", url, e)))?;
            let fetcher = RssFeedFetcher::new()?;
            let feed = fetcher.fetch(&url).await?;
            print_articles(&normalize_feed(feed, Utc::now()), limit);
        }
        CrawlerCommands::Parse { path, limit } => {
            let xml = tokio::fs::read(&path).await?;
            let feed = parse_feed(&xml)?;
            print_articles(&normalize_feed(feed, Utc::now()), limit);
        }
    }
    Ok(())
}

fn print_articles(articles: &[Article], limit: usize) {
    println!("Found {} articles", articles.len());
    for article in articles.iter().take(limit) {
        println!(
            "{} {} - {} ({})",
            article.published_at.format("%Y-%m-%d %H:%M"),
            article.title,
            article.author,
            article.url
        );
    }
}
