use std::sync::Arc;

use serde_json::Value;

use super::error::{TodoError, TodoResult};
use crate::domain::{
    store::StoreAdapter,
    todo::{Todo, TodoFields, TodoId},
};

/// CRUD over whichever document store was selected at start-up.
///
/// Holds no state of its own: every call goes straight to the store.
#[derive(Clone)]
pub struct TodoRepository {
    store: Arc<dyn StoreAdapter>,
}

impl TodoRepository {
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self { Self { store } }

    pub fn store_kind(&self) -> &'static str { self.store.kind() }

    pub async fn list(&self) -> TodoResult<Vec<Todo>> {
        Ok(self.store.list_ordered().await?)
    }

    pub async fn get(&self, id: &TodoId) -> TodoResult<Todo> {
        self.store.get(id).await?.ok_or_else(|| TodoError::NotFound(id.clone()))
    }

    pub async fn create(&self, candidate: TodoFields) -> TodoResult<Todo> {
        validate(&candidate)?;
        let id = self.store.insert(&candidate).await?;
        tracing::debug!(%id, "created todo");
        Ok(Todo::new(id, candidate))
    }

    pub async fn update(&self, id: &TodoId, changes: TodoFields) -> TodoResult<Todo> {
        validate(&changes)?;
        if !self.store.replace(id, &changes).await? {
            return Err(TodoError::NotFound(id.clone()));
        }
        tracing::debug!(%id, "updated todo");
        Ok(Todo::new(id.clone(), changes))
    }

    pub async fn delete(&self, id: &TodoId) -> TodoResult<()> {
        if !self.store.remove(id).await? {
            return Err(TodoError::NotFound(id.clone()));
        }
        tracing::debug!(%id, "deleted todo");
        Ok(())
    }

    pub async fn count(&self) -> TodoResult<u64> {
        Ok(self.store.count().await?)
    }

    pub async fn oldest(&self) -> TodoResult<Option<Todo>> {
        Ok(self.store.oldest().await?)
    }
}

/// Decodes a request body into the mutable todo fields.
///
/// The body must be a JSON object. Unknown keys (including any `id`) are
/// ignored; `order` and `completed` default when omitted.
pub fn parse_fields(body: &[u8]) -> TodoResult<TodoFields> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(TodoError::InvalidInput("request body is empty".into()));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| TodoError::InvalidInput(format!("request body is not JSON: {e}")))?;
    if !value.is_object() {
        return Err(TodoError::InvalidInput("request body must be a JSON object".into()));
    }
    serde_json::from_value(value).map_err(|e| TodoError::InvalidInput(e.to_string()))
}

fn validate(fields: &TodoFields) -> TodoResult<()> {
    if fields.title.is_empty() {
        return Err(TodoError::InvalidInput("title must not be empty".into()));
    }
    Ok(())
}
