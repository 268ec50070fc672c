//! Shared application state.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::cache::ChannelCache;
use crate::config::{Config, StoreBackend};
use crate::database::{ChatStore, Database, InMemoryStore, MongoStore};
use crate::services::ChatService;

/// Shared application state.
///
/// Constructed once in `main` and handed to whatever drives requests.
#[derive(Clone)]
pub struct AppState {
    /// Chat operations (owns the channel cache).
    pub chat: Arc<ChatService>,

    /// MongoDB handle, kept for shutdown. `None` on the memory backend.
    pub db: Option<Database>,
}

impl AppState {
    /// Connect the configured backend and build the services on top of it.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let (store, db): (Arc<dyn ChatStore>, Option<Database>) = match config.store_backend {
            StoreBackend::Mongo => {
                let uri = config
                    .mongodb_uri
                    .as_deref()
                    .context("MONGODB_URI is required for the mongo backend")?;

                info!("Connecting to MongoDB...");
                let db = Database::connect(uri, &config.mongodb_database).await?;
                let store = MongoStore::new(&db).await?;
                (Arc::new(store), Some(db))
            }
            StoreBackend::Memory => {
                info!("Using in-memory store (not durable)");
                (Arc::new(InMemoryStore::new()), None)
            }
        };

        Ok(Self::with_store(store, config, db))
    }

    /// Build state over an already constructed store.
    pub fn with_store(store: Arc<dyn ChatStore>, config: &Config, db: Option<Database>) -> Self {
        let chat = Arc::new(ChatService::new(store, ChannelCache::new(), config));
        Self { chat, db }
    }

    /// Release backend resources.
    pub async fn shutdown(self) {
        if let Some(db) = self.db {
            db.shutdown().await;
            info!("Database connection closed");
        }
    }
}
