use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

fn default_enabled() -> bool {
    true
}

/// An RSS feed the crawler pulls from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enabled: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Configuration(format!(
                "RSS source `{}` has an empty url",
                self.name
            )));
        }
        Url::parse(&self.url).map_err(|e| {
            Error::Configuration(format!("RSS source `{}` has an invalid url: {}", self.name, e))
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    #[default]
    Group,
    User,
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "group" => Some(Self::Group),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// A chat that receives digests: a group chat or a direct message to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: DestinationKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Destination {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: DestinationKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            enabled: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Configuration(format!(
                "destination `{}` has an empty id",
                self.name
            )));
        }
        Ok(())
    }
}

/// Parses and validates a JSON list of feed sources.
pub fn parse_sources(json: &str) -> Result<Vec<FeedSource>> {
    let sources: Vec<FeedSource> = serde_json::from_str(json)
        .map_err(|e| Error::Configuration(format!("invalid RSS source list: {}", e)))?;
    for source in &sources {
        source.validate()?;
    }
    Ok(sources)
}

/// Parses and validates a JSON list of destinations.
pub fn parse_destinations(json: &str) -> Result<Vec<Destination>> {
    let destinations: Vec<Destination> = serde_json::from_str(json)
        .map_err(|e| Error::Configuration(format!("invalid destination list: {}", e)))?;
    for destination in &destinations {
        destination.validate()?;
    }
    Ok(destinations)
}

/// On-disk layout accepted by `fb import-config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub rss_sources: Vec<FeedSource>,
    #[serde(default)]
    pub target_chats: Vec<Destination>,
}

impl ConfigFile {
    pub fn parse(json: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid config file: {}", e)))?;
        for source in &file.rss_sources {
            source.validate()?;
        }
        for destination in &file.target_chats {
            destination.validate()?;
        }
        Ok(file)
    }
}

/// Supplies the feed and destination lists for a digest cycle.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn feed_sources(&self) -> Result<Vec<FeedSource>>;

    async fn destinations(&self) -> Result<Vec<Destination>>;

    async fn enabled_sources(&self) -> Result<Vec<FeedSource>> {
        Ok(self
            .feed_sources()
            .await?
            .into_iter()
            .filter(|s| s.enabled)
            .collect())
    }

    async fn enabled_destinations(&self) -> Result<Vec<Destination>> {
        Ok(self
            .destinations()
            .await?
            .into_iter()
            .filter(|d| d.enabled)
            .collect())
    }
}

/// Fixed lists, used by tests and by one-shot CLI commands.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    pub sources: Vec<FeedSource>,
    pub destinations: Vec<Destination>,
}

impl StaticConfig {
    pub fn new(sources: Vec<FeedSource>, destinations: Vec<Destination>) -> Self {
        Self {
            sources,
            destinations,
        }
    }
}

#[async_trait]
impl ConfigProvider for StaticConfig {
    async fn feed_sources(&self) -> Result<Vec<FeedSource>> {
        Ok(self.sources.clone())
    }

    async fn destinations(&self) -> Result<Vec<Destination>> {
        Ok(self.destinations.clone())
    }
}
