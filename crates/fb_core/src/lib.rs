pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod store;
pub mod text;
pub mod transport;

pub use config::{ConfigFile, ConfigProvider, Destination, DestinationKind, FeedSource, StaticConfig};
pub use error::Error;
pub use fetch::{FeedFetcher, RawFeed, RawItem};
pub use model::{Article, DeliveryRecord, DeliveryStatus};
pub use store::{ConfigStore, ContentStore};
pub use transport::{MessageTransport, OutgoingMessage};

pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::{Article, Destination, Error, FeedSource, Result};
    pub use crate::{ConfigProvider, ContentStore, FeedFetcher, MessageTransport};
}
