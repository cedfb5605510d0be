use fb_core::{
    Article, ContentStore, DeliveryRecord, DeliveryStatus, Destination, Error, MessageTransport,
    OutgoingMessage, Result,
};
use fb_digest::Digest;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Sends digests through a transport and keeps the delivery log in the store.
pub struct DeliveryManager {
    transport: Arc<dyn MessageTransport>,
    store: Arc<dyn ContentStore>,
}

impl DeliveryManager {
    pub fn new(transport: Arc<dyn MessageTransport>, store: Arc<dyn ContentStore>) -> Self {
        Self { transport, store }
    }

    /// Drops articles that already reached `destination` successfully.
    /// A failed lookup keeps the article.
    pub async fn pending_for(&self, destination: &Destination, articles: &[Article]) -> Vec<Article> {
        let mut pending = Vec::with_capacity(articles.len());
        for article in articles {
            match self.store.is_delivered(&article.id, &destination.id).await {
                Ok(true) => {}
                Ok(false) => pending.push(article.clone()),
                Err(e) => {
                    warn!(
                        article = %article.id,
                        destination = %destination.id,
                        "delivery lookup failed, keeping article: {}", e
                    );
                    pending.push(article.clone());
                }
            }
        }
        pending
    }

    /// Delivers a digest and logs one record per article with the outcome.
    pub async fn send(&self, destination: &Destination, digest: &Digest) -> Result<()> {
        let message = digest.to_message()?;

        match self.transport.deliver(destination, &message).await {
            Ok(()) => {
                info!(
                    transport = self.transport.name(),
                    destination = %destination.id,
                    articles = digest.article_ids.len(),
                    "digest delivered"
                );
                self.record(destination, digest, DeliveryStatus::Success).await;
                Ok(())
            }
            Err(e) => {
                error!(destination = %destination.id, "failed to deliver digest: {}", e);
                self.record(destination, digest, DeliveryStatus::Failure).await;
                Err(into_delivery_error(e))
            }
        }
    }

    pub async fn send_text(&self, destination: &Destination, text: &str) -> Result<()> {
        self.transport
            .deliver(destination, &OutgoingMessage::Text(text.to_string()))
            .await
            .map_err(into_delivery_error)
    }

    async fn record(&self, destination: &Destination, digest: &Digest, status: DeliveryStatus) {
        if digest.is_empty() {
            return;
        }
        let records: Vec<DeliveryRecord> = digest
            .article_ids
            .iter()
            .map(|id| DeliveryRecord::new(id.clone(), destination.id.clone(), destination.kind, status))
            .collect();

        if let Err(e) = self.store.record_deliveries(&records).await {
            error!(
                destination = %destination.id,
                status = status.as_str(),
                "failed to write delivery records: {}", e
            );
        }
    }
}

fn into_delivery_error(e: Error) -> Error {
    match e {
        Error::Delivery(_) => e,
        other => Error::Delivery(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use fb_core::DestinationKind;
    use fb_digest::DigestRenderer;
    use fb_storage::InMemoryStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, OutgoingMessage)>>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl MessageTransport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn deliver(&self, destination: &Destination, message: &OutgoingMessage) -> Result<()> {
            if self.failing.contains(&destination.id) {
                return Err(Error::Configuration("chat not found".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((destination.id.clone(), message.clone()));
            Ok(())
        }
    }

    fn article(id: &str) -> Article {
        Article {
            id: id.to_string(),
            title: format!("Title {}", id),
            url: format!("https://news.example/{}", id),
            author: "Desk".to_string(),
            published_at: Utc::now(),
            summary: "Summary.".to_string(),
            content: None,
            cover_image: None,
            hash: None,
        }
        .with_computed_hash()
    }

    async fn setup(failing: Vec<String>) -> (DeliveryManager, Arc<RecordingTransport>, Arc<InMemoryStore>, Vec<Article>) {
        let store = Arc::new(InMemoryStore::new());
        let articles = vec![article("1"), article("2")];
        store.insert_articles(&articles).await.unwrap();
        let transport = Arc::new(RecordingTransport {
            failing,
            ..Default::default()
        });
        let manager = DeliveryManager::new(transport.clone(), store.clone());
        (manager, transport, store, articles)
    }

    #[tokio::test]
    async fn test_send_records_success_per_article() {
        let (manager, transport, store, articles) = setup(vec![]).await;
        let destination = Destination::new("oc_1", "Team", DestinationKind::Group);
        let digest = DigestRenderer::default().render(&articles);

        manager.send(&destination, &digest).await.unwrap();

        assert_eq!(transport.sent.lock().unwrap().len(), 1);
        let records = store.deliveries_for("oc_1").await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.status == DeliveryStatus::Success
            && r.destination_kind == DestinationKind::Group));

        assert!(manager.pending_for(&destination, &articles).await.is_empty());
        let other = Destination::new("oc_2", "Other", DestinationKind::Group);
        assert_eq!(manager.pending_for(&other, &articles).await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_send_records_failure_and_stays_pending() {
        let (manager, _, store, articles) = setup(vec!["oc_bad".to_string()]).await;
        let destination = Destination::new("oc_bad", "Broken", DestinationKind::Group);
        let digest = DigestRenderer::default().render(&articles);

        let result = manager.send(&destination, &digest).await;
        assert!(matches!(result, Err(Error::Delivery(_))));

        let records = store.deliveries_for("oc_bad").await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.status == DeliveryStatus::Failure));
        assert_eq!(manager.pending_for(&destination, &articles).await.len(), 2);
    }

    #[tokio::test]
    async fn test_record_failure_does_not_fail_send() {
        let (manager, _, store, _) = setup(vec![]).await;
        let destination = Destination::new("oc_1", "Team", DestinationKind::Group);
        // never persisted, so the delivery log rejects the batch
        let digest = DigestRenderer::default().render(&[article("ghost")]);

        manager.send(&destination, &digest).await.unwrap();
        assert!(store.deliveries_for("oc_1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_new_content_writes_no_records() {
        let (manager, transport, store, _) = setup(vec![]).await;
        let destination = Destination::new("oc_1", "Team", DestinationKind::Group);

        manager
            .send(&destination, &DigestRenderer::default().no_new_content())
            .await
            .unwrap();
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
        assert!(store.deliveries_for("oc_1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_text() {
        let (manager, transport, _, _) = setup(vec!["oc_bad".to_string()]).await;
        manager
            .send_text(&Destination::new("oc_1", "Team", DestinationKind::Group), "hello")
            .await
            .unwrap();
        assert_eq!(
            transport.sent.lock().unwrap()[0].1,
            OutgoingMessage::Text("hello".to_string())
        );
        assert!(matches!(
            manager.send_text(&Destination::new("oc_bad", "x", DestinationKind::Group), "hi").await,
            Err(Error::Delivery(_))
        ));
    }
}
