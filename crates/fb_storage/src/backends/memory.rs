use async_trait::async_trait;
use fb_core::{Article, ConfigStore, ContentStore, DeliveryRecord, DeliveryStatus, Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::StorageBackend;

#[derive(Default)]
pub struct MemoryStore {
    articles: Vec<Article>,
    deliveries: Vec<DeliveryRecord>,
    config: HashMap<String, String>,
}

impl MemoryStore {
    fn contains(&self, article: &Article) -> bool {
        self.articles
            .iter()
            .any(|a| a.id == article.id || a.url == article.url)
    }

    fn insert_articles(&mut self, articles: &[Article]) -> Vec<String> {
        let mut saved = Vec::new();
        for article in articles {
            if article.hash.is_none() || self.contains(article) {
                continue;
            }
            self.articles.push(article.clone());
            saved.push(article.id.clone());
        }
        saved
    }

    fn record_deliveries(&mut self, records: &[DeliveryRecord]) -> Result<()> {
        // All-or-nothing, like the SQLite transaction with its foreign key.
        if let Some(missing) = records
            .iter()
            .find(|r| !self.articles.iter().any(|a| a.id == r.article_id))
        {
            return Err(Error::Persistence(format!(
                "unknown article id in delivery record: {}",
                missing.article_id
            )));
        }
        self.deliveries.extend_from_slice(records);
        Ok(())
    }
}

/// Process-local store with the same semantics as the SQLite backend.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn article_count(&self) -> usize {
        self.store.read().await.articles.len()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStore {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn open(_path: &Path) -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn hash_exists(&self, hash: &str) -> Result<bool> {
        let store = self.store.read().await;
        Ok(store
            .articles
            .iter()
            .any(|a| a.hash.as_deref() == Some(hash)))
    }

    async fn insert_articles(&self, articles: &[Article]) -> Result<Vec<String>> {
        let mut store = self.store.write().await;
        Ok(store.insert_articles(articles))
    }

    async fn record_deliveries(&self, records: &[DeliveryRecord]) -> Result<()> {
        let mut store = self.store.write().await;
        store.record_deliveries(records)
    }

    async fn is_delivered(&self, article_id: &str, destination_id: &str) -> Result<bool> {
        let store = self.store.read().await;
        Ok(store.deliveries.iter().any(|r| {
            r.article_id == article_id
                && r.destination_id == destination_id
                && r.status == DeliveryStatus::Success
        }))
    }

    async fn recent_articles(&self, limit: usize) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        let mut articles = store.articles.clone();
        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(articles.into_iter().take(limit).collect())
    }

    async fn deliveries_for(&self, destination_id: &str) -> Result<Vec<DeliveryRecord>> {
        let store = self.store.read().await;
        Ok(store
            .deliveries
            .iter()
            .filter(|r| r.destination_id == destination_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ConfigStore for InMemoryStore {
    async fn get_config(&self, key: &str) -> Result<Option<String>> {
        Ok(self.store.read().await.config.get(key).cloned())
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.store
            .write()
            .await
            .config
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
