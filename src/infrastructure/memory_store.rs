use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    document::{fields_to_json, is_todo_document, todo_from_json, JsonDocument},
    store::{StoreAdapter, StoreResult},
    todo::{Todo, TodoFields, TodoId},
};

/// Process-local document store. Used when no database service is bound and
/// as the substitute store in tests.
///
/// Documents keep insertion order, which breaks ties between equal `order`
/// values.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    docs: Arc<Mutex<Vec<(TodoId, JsonDocument)>>>,
}

impl InMemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Stores an arbitrary document, valid todo or not.
    pub fn insert_document(&self, doc: JsonDocument) -> TodoId {
        let id = TodoId(Uuid::new_v4().simple().to_string());
        self.docs().push((id.clone(), doc));
        id
    }

    /// Number of stored documents, including ones that are not todos.
    pub fn document_count(&self) -> usize { self.docs().len() }

    fn docs(&self) -> MutexGuard<'_, Vec<(TodoId, JsonDocument)>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StoreAdapter for InMemoryStore {
    fn kind(&self) -> &'static str { "In Memory" }

    async fn init(&self) -> StoreResult<()> { Ok(()) }

    async fn list_ordered(&self) -> StoreResult<Vec<Todo>> {
        let mut todos: Vec<Todo> = self
            .docs()
            .iter()
            .filter_map(|(id, doc)| todo_from_json(id.clone(), doc))
            .collect();
        todos.sort_by_key(|t| t.order);
        Ok(todos)
    }

    async fn count(&self) -> StoreResult<u64> {
        let docs = self.docs();
        Ok(docs.iter().filter(|(id, doc)| todo_from_json(id.clone(), doc).is_some()).count() as u64)
    }

    async fn oldest(&self) -> StoreResult<Option<Todo>> {
        let docs = self.docs();
        // min_by_key keeps the first of equal keys
        Ok(docs
            .iter()
            .filter_map(|(id, doc)| todo_from_json(id.clone(), doc))
            .min_by_key(|t| t.order))
    }

    async fn get(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
        let docs = self.docs();
        Ok(docs.iter().find(|(k, _)| k == id).and_then(|(k, doc)| todo_from_json(k.clone(), doc)))
    }

    async fn insert(&self, fields: &TodoFields) -> StoreResult<TodoId> {
        Ok(self.insert_document(fields_to_json(fields)))
    }

    async fn replace(&self, id: &TodoId, fields: &TodoFields) -> StoreResult<bool> {
        let mut docs = self.docs();
        let Some((_, doc)) = docs.iter_mut().find(|(k, doc)| k == id && is_todo_document(doc)) else { return Ok(false) };
        doc.extend(fields_to_json(fields));
        Ok(true)
    }

    async fn remove(&self, id: &TodoId) -> StoreResult<bool> {
        let mut docs = self.docs();
        let before = docs.len();
        docs.retain(|(k, doc)| k != id || !is_todo_document(doc));
        Ok(docs.len() != before)
    }
}
