use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::domain::{
    document::{JsonDocument, fields_to_json, is_todo_document, order_of, todo_from_json},
    store::{StoreAdapter, StoreError, StoreResult},
    todo::{Todo, TodoFields, TodoId},
};

pub const DEFAULT_DB_NAME: &str = "bluemix-todo";
const DESIGN_NAME: &str = "todos";
const VIEW_NAME: &str = "allTodos";
// Same validity rule as `is_todo_document`, so view counts match what listings return.
const VIEW_MAP: &str = "function(doc){if(typeof doc.title === 'string' && doc.title !== '' && typeof doc.completed === 'boolean'){emit(doc.order,{title: doc.title,completed: doc.completed})}}";

/// CouchDB / Cloudant backend.
///
/// Listings and counts go through the `todos/allTodos` view, keyed by
/// `order` and reduced with `_count`. Document revisions stay inside this
/// type: updates and deletes fetch the current `_rev` first.
#[derive(Clone)]
pub struct CouchStore {
    client: Client,
    db_url: Url,
    credentials: Option<(String, String)>,
}

impl CouchStore {
    /// `server_url` may carry `user:password@` credentials; they are sent as
    /// basic auth rather than left in request URLs.
    pub fn new(server_url: &str, db_name: &str) -> StoreResult<Self> {
        let mut url = Url::parse(server_url).map_err(|e| StoreError::Unavailable(format!("invalid CouchDB url: {e}")))?;
        let credentials = match url.username() {
            "" => None,
            user => Some((user.to_owned(), url.password().unwrap_or_default().to_owned())),
        };
        let _ = url.set_username("");
        let _ = url.set_password(None);
        url.path_segments_mut()
            .map_err(|_| StoreError::Unavailable("CouchDB url cannot be a base".into()))?
            .pop_if_empty()
            .push(db_name);
        Ok(Self { client: Client::new(), db_url: url, credentials })
    }

    pub fn db_url(&self) -> &Url { &self.db_url }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.db_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    fn view_url(&self, reduce: bool, limit: Option<u32>) -> Url {
        let mut url = self.url(&["_design", DESIGN_NAME, "_view", VIEW_NAME]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("reduce", if reduce { "true" } else { "false" });
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.client.request(method, url);
        match &self.credentials {
            Some((user, password)) => req.basic_auth(user, Some(password)),
            None => req,
        }
    }

    /// Current revision and body of a document, `None` on 404.
    async fn fetch(&self, id: &TodoId) -> StoreResult<Option<JsonDocument>> {
        let resp = send(self.request(Method::GET, self.url(&[id.as_str()]))).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(decode(resp).await?)),
            s => Err(unexpected("read document", s)),
        }
    }

    /// Like `fetch`, but documents that are not todos (design documents
    /// included) count as absent.
    async fn fetch_todo(&self, id: &TodoId) -> StoreResult<Option<JsonDocument>> {
        Ok(self.fetch(id).await?.filter(is_todo_document))
    }

    async fn view_rows(&self, limit: Option<u32>) -> StoreResult<Vec<Todo>> {
        let resp = send(self.request(Method::GET, self.view_url(false, limit))).await?;
        if !resp.status().is_success() {
            return Err(unexpected("query view", resp.status()));
        }
        let rows: ViewRows<Value> = decode(resp).await?;
        Ok(todos_from_rows(rows))
    }

    async fn ensure_database(&self) -> StoreResult<()> {
        let resp = send(self.request(Method::GET, self.db_url.clone())).await?;
        if resp.status().is_success() {
            tracing::info!(db = %self.db_url, "database already exists");
            return Ok(());
        }
        if resp.status() != StatusCode::NOT_FOUND {
            return Err(unexpected("read database", resp.status()));
        }
        tracing::info!(db = %self.db_url, "database does not exist, creating it");
        let resp = send(self.request(Method::PUT, self.db_url.clone())).await?;
        match resp.status() {
            // 412: created concurrently by another instance
            StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::PRECONDITION_FAILED => Ok(()),
            s => Err(unexpected("create database", s)),
        }
    }

    /// Creates the design document, or rewrites it when its view no longer
    /// matches the current map function.
    async fn ensure_design_doc(&self) -> StoreResult<()> {
        let url = self.url(&["_design", DESIGN_NAME]);
        let resp = send(self.request(Method::GET, url.clone())).await?;
        let mut design = design_document();
        match resp.status() {
            StatusCode::NOT_FOUND => {}
            s if s.is_success() => {
                let current: Value = decode(resp).await?;
                if current["views"][VIEW_NAME]["map"] == VIEW_MAP {
                    return Ok(());
                }
                tracing::info!("design document is outdated, replacing it");
                design["_rev"] = current["_rev"].clone();
            }
            s => return Err(unexpected("read design document", s)),
        }
        let resp = send(self.request(Method::PUT, url).json(&design)).await?;
        match resp.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::CONFLICT => Ok(()),
            s => Err(unexpected("create design document", s)),
        }
    }
}

#[async_trait]
impl StoreAdapter for CouchStore {
    fn kind(&self) -> &'static str { "CouchDB" }

    async fn init(&self) -> StoreResult<()> {
        self.ensure_database().await?;
        self.ensure_design_doc().await
    }

    async fn list_ordered(&self) -> StoreResult<Vec<Todo>> {
        self.view_rows(None).await
    }

    async fn count(&self) -> StoreResult<u64> {
        let resp = send(self.request(Method::GET, self.view_url(true, None))).await?;
        if !resp.status().is_success() {
            return Err(unexpected("count view", resp.status()));
        }
        let rows: ViewRows<u64> = decode(resp).await?;
        Ok(reduced_count(&rows))
    }

    async fn oldest(&self) -> StoreResult<Option<Todo>> {
        Ok(self.view_rows(Some(1)).await?.into_iter().next())
    }

    async fn get(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
        Ok(self.fetch(id).await?.and_then(|doc| todo_from_json(id.clone(), &doc)))
    }

    async fn insert(&self, fields: &TodoFields) -> StoreResult<TodoId> {
        let resp = send(self.request(Method::POST, self.db_url.clone()).json(&fields_to_json(fields))).await?;
        match resp.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                let saved: WriteResponse = decode(resp).await?;
                tracing::debug!(id = %saved.id, rev = ?saved.rev, "couch: inserted");
                Ok(TodoId(saved.id))
            }
            s => Err(unexpected("insert document", s)),
        }
    }

    async fn replace(&self, id: &TodoId, fields: &TodoFields) -> StoreResult<bool> {
        let Some(mut doc) = self.fetch_todo(id).await? else { return Ok(false) };
        doc.extend(fields_to_json(fields));
        let resp = send(self.request(Method::PUT, self.url(&[id.as_str()])).json(&doc)).await?;
        match resp.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::CONFLICT => Err(StoreError::Conflict(format!("document {id} changed concurrently"))),
            s => Err(unexpected("update document", s)),
        }
    }

    async fn remove(&self, id: &TodoId) -> StoreResult<bool> {
        let Some(doc) = self.fetch_todo(id).await? else { return Ok(false) };
        let rev = doc
            .get("_rev")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Malformed(format!("document {id} has no _rev")))?;
        let mut url = self.url(&[id.as_str()]);
        url.query_pairs_mut().append_pair("rev", rev);
        let resp = send(self.request(Method::DELETE, url)).await?;
        match resp.status() {
            StatusCode::OK | StatusCode::ACCEPTED => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::CONFLICT => Err(StoreError::Conflict(format!("document {id} changed concurrently"))),
            s => Err(unexpected("delete document", s)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ViewRows<V> {
    rows: Vec<ViewRow<V>>,
}

#[derive(Debug, Deserialize)]
struct ViewRow<V> {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    key: Value,
    value: V,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    id: String,
    #[serde(default)]
    rev: Option<String>,
}

fn design_document() -> Value {
    json!({
        "views": {
            VIEW_NAME: { "map": VIEW_MAP, "reduce": "_count" }
        }
    })
}

/// Rows whose value is not a valid todo are skipped rather than failing the
/// whole listing; views written by older map functions may still emit them.
fn todos_from_rows(rows: ViewRows<Value>) -> Vec<Todo> {
    rows.rows
        .into_iter()
        .filter_map(|row| {
            let id = TodoId(row.id?);
            let todo = todo_from_json(id, row.value.as_object()?)?;
            Some(Todo { order: order_of(Some(&row.key)), ..todo })
        })
        .collect()
}

/// An empty view reduces to no rows at all.
fn reduced_count(rows: &ViewRows<u64>) -> u64 {
    rows.rows.first().map(|r| r.value).unwrap_or(0)
}

async fn send(req: RequestBuilder) -> StoreResult<Response> {
    req.send().await.map_err(|e| StoreError::Unavailable(e.to_string()))
}

async fn decode<T: DeserializeOwned>(resp: Response) -> StoreResult<T> {
    resp.json().await.map_err(|e| StoreError::Malformed(e.to_string()))
}

fn unexpected(action: &str, status: StatusCode) -> StoreError {
    StoreError::Unavailable(format!("{action}: unexpected status {status}"))
}
