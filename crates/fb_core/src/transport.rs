use async_trait::async_trait;

use crate::config::Destination;
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingMessage {
    /// Structured interactive card, already serialized to the platform's JSON shape
    Card(serde_json::Value),
    Text(String),
}

#[async_trait]
pub trait MessageTransport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sends a message; a rejected send is an `Error::Delivery`
    async fn deliver(&self, destination: &Destination, message: &OutgoingMessage) -> Result<()>;
}
