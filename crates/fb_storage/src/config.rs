use async_trait::async_trait;
use fb_core::config::{parse_destinations, parse_sources};
use fb_core::{ConfigFile, ConfigProvider, ConfigStore, Destination, FeedSource, Result};
use std::sync::Arc;
use tracing::{debug, info};

pub const SOURCES_KEY: &str = "rss_sources";
pub const DESTINATIONS_KEY: &str = "target_chats";

pub const SOURCES_ENV: &str = "RSS_SOURCES";
pub const DESTINATIONS_ENV: &str = "TARGET_CHATS";

/// Resolves sources and destinations from the persisted config table, falling back
/// to serialized lists taken from the environment.
pub struct StoreConfigProvider {
    store: Arc<dyn ConfigStore>,
    env_sources: Option<String>,
    env_destinations: Option<String>,
}

impl StoreConfigProvider {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        env_sources: Option<String>,
        env_destinations: Option<String>,
    ) -> Self {
        Self {
            store,
            env_sources,
            env_destinations,
        }
    }

    pub fn from_env(store: Arc<dyn ConfigStore>) -> Self {
        Self::new(
            store,
            std::env::var(SOURCES_ENV).ok(),
            std::env::var(DESTINATIONS_ENV).ok(),
        )
    }

    async fn resolve(&self, key: &str, fallback: Option<&str>) -> Result<Option<String>> {
        if let Some(value) = self.store.get_config(key).await? {
            debug!(key, "using persisted config");
            return Ok(Some(value));
        }
        if let Some(value) = fallback.filter(|v| !v.trim().is_empty()) {
            debug!(key, len = value.len(), "using config from environment");
            return Ok(Some(value.to_string()));
        }
        Ok(None)
    }
}

#[async_trait]
impl ConfigProvider for StoreConfigProvider {
    async fn feed_sources(&self) -> Result<Vec<FeedSource>> {
        match self.resolve(SOURCES_KEY, self.env_sources.as_deref()).await? {
            Some(json) => parse_sources(&json),
            None => {
                info!("no RSS sources configured (neither database nor environment)");
                Ok(Vec::new())
            }
        }
    }

    async fn destinations(&self) -> Result<Vec<Destination>> {
        match self
            .resolve(DESTINATIONS_KEY, self.env_destinations.as_deref())
            .await?
        {
            Some(json) => parse_destinations(&json),
            None => {
                info!("no destinations configured (neither database nor environment)");
                Ok(Vec::new())
            }
        }
    }
}

/// Validates a config file and writes both lists into the store.
pub async fn import_config(store: &dyn ConfigStore, json: &str) -> Result<ConfigFile> {
    let file = ConfigFile::parse(json)?;
    store
        .set_config(SOURCES_KEY, &serde_json::to_string(&file.rss_sources)?)
        .await?;
    store
        .set_config(DESTINATIONS_KEY, &serde_json::to_string(&file.target_chats)?)
        .await?;
    info!(
        sources = file.rss_sources.len(),
        destinations = file.target_chats.len(),
        "config imported"
    );
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;
    use fb_core::{DestinationKind, Error};

    const ENV_SOURCES: &str = r#"[{"name": "Env", "url": "https://env.example/rss"}]"#;

    #[tokio::test]
    async fn test_env_fallback_when_store_empty() {
        let store = Arc::new(InMemoryStore::new());
        let provider = StoreConfigProvider::new(store, Some(ENV_SOURCES.to_string()), None);

        let sources = provider.feed_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "Env");
        assert!(provider.destinations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_wins_over_env() {
        let store = Arc::new(InMemoryStore::new());
        store
            .set_config(
                SOURCES_KEY,
                r#"[{"name": "Db", "url": "https://db.example/rss"}]"#,
            )
            .await
            .unwrap();
        let provider = StoreConfigProvider::new(store, Some(ENV_SOURCES.to_string()), None);

        let sources = provider.feed_sources().await.unwrap();
        assert_eq!(sources[0].name, "Db");
    }

    #[tokio::test]
    async fn test_malformed_config_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let provider =
            StoreConfigProvider::new(store, None, Some(r#"{"id": "oc_1"}"#.to_string()));
        assert!(matches!(
            provider.destinations().await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_import_config_writes_both_keys() {
        let store = Arc::new(InMemoryStore::new());
        let file = import_config(
            store.as_ref(),
            r#"{
                "rss_sources": [{"name": "A", "url": "https://a.example/rss"}],
                "target_chats": [{"id": "ou_1", "name": "Alice", "type": "user"}]
            }"#,
        )
        .await
        .unwrap();
        assert_eq!(file.rss_sources.len(), 1);

        let provider = StoreConfigProvider::new(store, None, None);
        let destinations = provider.enabled_destinations().await.unwrap();
        assert_eq!(destinations.len(), 1);
        assert_eq!(destinations[0].kind, DestinationKind::User);
    }

    #[tokio::test]
    async fn test_import_rejects_invalid_file() {
        let store = InMemoryStore::new();
        let result = import_config(
            &store,
            r#"{"rss_sources": [{"name": "A", "url": "ftp//broken"}]}"#,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(store.get_config(SOURCES_KEY).await.unwrap(), None);
    }
}
