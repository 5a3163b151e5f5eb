use async_trait::async_trait;
use thiserror::Error;

use super::todo::{Todo, TodoFields, TodoId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed store response: {0}")]
    Malformed(String),
    #[error("write conflict: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Capability set every document store backend provides.
///
/// Implementations only ever hand out valid todos: documents lacking a title
/// or a non-null `completed` flag are skipped by listings, counts, `oldest`
/// and `get`. Ids a backend cannot parse are treated as absent.
#[async_trait]
pub trait StoreAdapter: Send + Sync + 'static {
    fn kind(&self) -> &'static str;
    /// Idempotent provisioning (database, indexes, views).
    async fn init(&self) -> StoreResult<()>;
    /// Valid todos, ascending by `order`.
    async fn list_ordered(&self) -> StoreResult<Vec<Todo>>;
    async fn count(&self) -> StoreResult<u64>;
    /// The valid todo with the lowest `order`.
    async fn oldest(&self) -> StoreResult<Option<Todo>> {
        Ok(self.list_ordered().await?.into_iter().next())
    }
    async fn get(&self, id: &TodoId) -> StoreResult<Option<Todo>>;
    async fn insert(&self, fields: &TodoFields) -> StoreResult<TodoId>;
    /// Returns `false` when no document with `id` exists.
    async fn replace(&self, id: &TodoId, fields: &TodoFields) -> StoreResult<bool>;
    /// Returns `false` when no document with `id` exists.
    async fn remove(&self, id: &TodoId) -> StoreResult<bool>;
}
