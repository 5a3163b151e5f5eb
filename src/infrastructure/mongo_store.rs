use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Bson, Document, doc, oid::ObjectId},
};

use crate::domain::{
    store::{StoreAdapter, StoreError, StoreResult},
    todo::{Todo, TodoFields, TodoId},
};

pub const DEFAULT_DB_NAME: &str = "db";
pub const DEFAULT_COLLECTION: &str = "todos";

/// MongoDB backend. Ids on the wire are the hex form of the `_id` ObjectId;
/// strings that are not valid ObjectIds never match a document.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
    todos: Collection<Document>,
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str, collection: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await.map_err(unavailable)?;
        let db = client.database(db_name);
        let todos = db.collection::<Document>(collection);
        Ok(Self { db, todos })
    }
}

#[async_trait]
impl StoreAdapter for MongoStore {
    fn kind(&self) -> &'static str { "MongoDB" }

    async fn init(&self) -> StoreResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await.map_err(unavailable)?;
        let index = IndexModel::builder().keys(doc! { "order": 1 }).build();
        self.todos.create_index(index).await.map_err(unavailable)?;
        Ok(())
    }

    async fn list_ordered(&self) -> StoreResult<Vec<Todo>> {
        let cursor = self.todos.find(todo_filter()).sort(order_sort()).await.map_err(unavailable)?;
        let docs: Vec<Document> = cursor.try_collect().await.map_err(unavailable)?;
        Ok(docs.iter().filter_map(todo_from_bson).collect())
    }

    async fn count(&self) -> StoreResult<u64> {
        self.todos.count_documents(todo_filter()).await.map_err(unavailable)
    }

    async fn oldest(&self) -> StoreResult<Option<Todo>> {
        let doc = self.todos.find_one(todo_filter()).sort(order_sort()).await.map_err(unavailable)?;
        Ok(doc.as_ref().and_then(todo_from_bson))
    }

    async fn get(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
        let Some(filter) = id_filter(id) else { return Ok(None) };
        let doc = self.todos.find_one(filter).await.map_err(unavailable)?;
        Ok(doc.as_ref().and_then(todo_from_bson))
    }

    async fn insert(&self, fields: &TodoFields) -> StoreResult<TodoId> {
        let result = self.todos.insert_one(fields_to_bson(fields)).await.map_err(unavailable)?;
        match result.inserted_id {
            Bson::ObjectId(oid) => Ok(TodoId(oid.to_hex())),
            other => Err(StoreError::Malformed(format!("unexpected inserted id {other}"))),
        }
    }

    async fn replace(&self, id: &TodoId, fields: &TodoFields) -> StoreResult<bool> {
        let Some(filter) = id_filter(id) else { return Ok(false) };
        let result = self
            .todos
            .update_one(filter, doc! { "$set": fields_to_bson(fields) })
            .await
            .map_err(unavailable)?;
        Ok(result.matched_count > 0)
    }

    async fn remove(&self, id: &TodoId) -> StoreResult<bool> {
        let Some(filter) = id_filter(id) else { return Ok(false) };
        let result = self.todos.delete_one(filter).await.map_err(unavailable)?;
        Ok(result.deleted_count > 0)
    }
}

/// Matches documents that are todos: non-empty string title, boolean completed.
fn todo_filter() -> Document {
    doc! {
        "title": { "$type": "string", "$ne": "" },
        "completed": { "$type": "bool" },
    }
}

// `_id` follows insertion order, giving equal orders a stable tie-break.
fn order_sort() -> Document {
    doc! { "order": 1, "_id": 1 }
}

/// Matches the todo with `id`; documents under that id that are not todos
/// are left alone.
fn id_filter(id: &TodoId) -> Option<Document> {
    let oid = ObjectId::parse_str(id.as_str()).ok()?;
    let mut filter = doc! { "_id": oid };
    filter.extend(todo_filter());
    Some(filter)
}

fn fields_to_bson(fields: &TodoFields) -> Document {
    doc! { "title": fields.title.as_str(), "order": fields.order, "completed": fields.completed }
}

fn todo_from_bson(doc: &Document) -> Option<Todo> {
    let id = match doc.get("_id")? {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        _ => return None,
    };
    let title = doc.get_str("title").ok().filter(|t| !t.is_empty())?;
    let completed = doc.get_bool("completed").ok()?;
    let order = match doc.get("order") {
        Some(Bson::Int32(n)) => i64::from(*n),
        Some(Bson::Int64(n)) => *n,
        Some(Bson::Double(f)) => *f as i64,
        _ => 0,
    };
    Some(Todo { id: TodoId(id), title: title.to_owned(), order, completed })
}

fn unavailable(e: mongodb::error::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}
