pub mod couch_store;
pub mod memory_store;
pub mod mongo_store;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{config::Backend, domain::store::StoreAdapter};

/// Connects and provisions the configured backend.
pub async fn connect_store(backend: &Backend) -> Result<Arc<dyn StoreAdapter>> {
    let store: Arc<dyn StoreAdapter> = match backend {
        Backend::Couch { url, db } => Arc::new(couch_store::CouchStore::new(url, db)?),
        Backend::Mongo { url, db, collection } => Arc::new(mongo_store::MongoStore::connect(url, db, collection).await?),
        Backend::Memory => Arc::new(memory_store::InMemoryStore::new()),
    };
    store.init().await.with_context(|| format!("initialising {} store", store.kind()))?;
    tracing::info!(store = store.kind(), "store ready");
    Ok(store)
}
