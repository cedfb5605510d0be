use async_trait::async_trait;

use crate::model::{Article, DeliveryRecord};
use crate::Result;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Returns true if an article with this dedup hash was already persisted
    async fn hash_exists(&self, hash: &str) -> Result<bool>;

    /// Inserts articles in one transaction, ignoring ids or urls that already exist.
    /// Returns the ids of the rows actually inserted, in input order.
    async fn insert_articles(&self, articles: &[Article]) -> Result<Vec<String>>;

    /// Appends delivery records in one transaction
    async fn record_deliveries(&self, records: &[DeliveryRecord]) -> Result<()>;

    /// Returns true if the article was successfully delivered to the destination
    async fn is_delivered(&self, article_id: &str, destination_id: &str) -> Result<bool>;

    /// Most recently published articles, newest first
    async fn recent_articles(&self, limit: usize) -> Result<Vec<Article>>;

    /// Delivery history of a destination, oldest first
    async fn deliveries_for(&self, destination_id: &str) -> Result<Vec<DeliveryRecord>>;
}

/// Persisted key-value settings, e.g. the serialized source and destination lists.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_config(&self, key: &str) -> Result<Option<String>>;

    async fn set_config(&self, key: &str, value: &str) -> Result<()>;
}
