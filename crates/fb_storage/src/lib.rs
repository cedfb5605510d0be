use async_trait::async_trait;
use fb_core::{ConfigStore, ContentStore, Result};
use std::path::Path;
use std::sync::Arc;

pub mod backends;
pub mod config;

pub use backends::*;
pub use config::{import_config, StoreConfigProvider, DESTINATIONS_KEY, SOURCES_KEY};

#[async_trait]
pub trait StorageBackend: ContentStore + ConfigStore + Sized + 'static {
    fn get_error_message() -> &'static str;

    async fn open(path: &Path) -> Result<Self>;
}

/// The same backend viewed through both of its capabilities.
#[derive(Clone)]
pub struct StoreHandles {
    pub content: Arc<dyn ContentStore>,
    pub config: Arc<dyn ConfigStore>,
}

impl StoreHandles {
    pub fn from_backend<T: StorageBackend>(backend: T) -> Self {
        let backend = Arc::new(backend);
        Self {
            content: backend.clone(),
            config: backend,
        }
    }
}

/// Opens the backend named by `kind` ("sqlite" or "memory").
pub async fn create_store(kind: &str, path: &Path) -> Result<StoreHandles> {
    match kind {
        "memory" => open_backend::<InMemoryStore>(path).await,
        #[cfg(feature = "sqlite")]
        "sqlite" => open_backend::<SQLiteStore>(path).await,
        other => Err(fb_core::Error::Configuration(format!(
            "unsupported storage backend: {}",
            other
        ))),
    }
}

async fn open_backend<T: StorageBackend>(path: &Path) -> Result<StoreHandles> {
    match T::open(path).await {
        Ok(backend) => Ok(StoreHandles::from_backend(backend)),
        Err(e) => {
            tracing::error!("{} ({})", T::get_error_message(), e);
            Err(e)
        }
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_store, StorageBackend, StoreHandles};
}
