use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::body::to_bytes;
use axum::Router;
use serde_json::{json, Value};
use todo_docstore::application::{
    retention::{RetentionJob, RetentionPolicy},
    todo_repository::TodoRepository,
};
use todo_docstore::http::routing::{self, todos};
use todo_docstore::domain::{
    store::{StoreAdapter, StoreError, StoreResult},
    todo::{Todo, TodoFields, TodoId},
};
use todo_docstore::infrastructure::memory_store::InMemoryStore;

fn app() -> (Router, TodoRepository) {
    app_with(Arc::new(InMemoryStore::new()))
}

fn app_with(store: Arc<dyn StoreAdapter>) -> (Router, TodoRepository) {
    let repo = TodoRepository::new(store);
    let static_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("www");
    let app = routing::app(todos::router(todos::AppState { repo: repo.clone() }), &static_dir);
    (app, repo)
}

#[tokio::test]
async fn acceptance_create_list_update_delete() {
    let (app, _) = app();

    // create
    let res = request(&app, "POST", "/api/todos", Some(json!({ "title": "Test", "order": 2, "completed": false }))).await;
    assert_eq!(res.status(), 200);
    let created = body_json(res).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(created, json!({ "id": id, "title": "Test", "order": 2, "completed": false }));

    request(&app, "POST", "/api/todos", Some(json!({ "title": "Earlier", "order": 1, "completed": true }))).await;

    // list is ordered and exposes only the wire fields
    let res = request(&app, "GET", "/api/todos", None).await;
    assert_eq!(res.status(), 200);
    let listed = body_json(res).await;
    let titles: Vec<_> = listed.as_array().unwrap().iter().map(|t| t["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Earlier", "Test"]);
    for todo in listed.as_array().unwrap() {
        let mut keys: Vec<_> = todo.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["completed", "id", "order", "title"]);
    }

    // get
    let res = request(&app, "GET", &format!("/api/todos/{id}"), None).await;
    assert_eq!(res.status(), 200);

    // update keeps the path id even when the body names another
    let res = request(&app, "PUT", &format!("/api/todos/{id}"), Some(json!({ "id": "other", "title": "Done", "order": 5, "completed": true }))).await;
    assert_eq!(res.status(), 200);
    assert_eq!(body_json(res).await, json!({ "id": id, "title": "Done", "order": 5, "completed": true }));

    // delete
    let res = request(&app, "DELETE", &format!("/api/todos/{id}"), None).await;
    assert_eq!(res.status(), 204);
    assert!(to_bytes(res.into_body(), 1024).await.unwrap().is_empty());

    let res = request(&app, "GET", &format!("/api/todos/{id}"), None).await;
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let (app, repo) = app();

    let res = request_raw(&app, "POST", "/api/todos", None).await;
    assert_eq!(res.status(), 400);
    assert!(body_json(res).await["message"].is_string());

    let res = request_raw(&app, "POST", "/api/todos", Some("{not json")).await;
    assert_eq!(res.status(), 400);

    let res = request_raw(&app, "POST", "/api/todos", Some("[]")).await;
    assert_eq!(res.status(), 400);

    assert!(repo.list().await.unwrap().is_empty());

    let created = repo.create(todo_docstore::domain::todo::TodoFields::new("x", 1, false)).await.unwrap();
    let res = request_raw(&app, "PUT", &format!("/api/todos/{}", created.id), None).await;
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn unknown_ids_are_bad_requests() {
    let (app, _) = app();

    let res = request(&app, "PUT", "/api/todos/doesnotexist", Some(json!({ "title": "x", "order": 1, "completed": false }))).await;
    assert_eq!(res.status(), 400);

    let res = request(&app, "POST", "/api/todos", Some(json!({ "title": "abc", "order": 1, "completed": false }))).await;
    let id = body_json(res).await["id"].as_str().unwrap().to_string();

    let res = request(&app, "DELETE", &format!("/api/todos/{id}"), None).await;
    assert_eq!(res.status(), 204);
    let res = request(&app, "DELETE", &format!("/api/todos/{id}"), None).await;
    assert_eq!(res.status(), 400);

    let res = request(&app, "DELETE", "/api/todos/abc123", None).await;
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn retention_tick_trims_what_the_api_created() {
    let (app, repo) = app();
    for order in 1..=21 {
        let res = request(&app, "POST", "/api/todos", Some(json!({ "title": format!("t{order}"), "order": order, "completed": false }))).await;
        assert_eq!(res.status(), 200);
    }

    let job = RetentionJob::new(repo, RetentionPolicy { interval: Duration::from_secs(30), threshold: 20 });
    job.tick().await;

    let listed = body_json(request(&app, "GET", "/api/todos", None).await).await;
    let orders: Vec<i64> = listed.as_array().unwrap().iter().map(|t| t["order"].as_i64().unwrap()).collect();
    assert_eq!(orders.len(), 20);
    assert!(!orders.contains(&1));
}

#[tokio::test]
async fn health_and_static_assets() {
    let (app, _) = app();

    let res = request(&app, "GET", "/health", None).await;
    assert_eq!(res.status(), 200);

    let res = request(&app, "GET", "/", None).await;
    assert_eq!(res.status(), 200);
    let page = to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
    assert!(String::from_utf8_lossy(&page).contains("/api/todos"));

    let res = request(&app, "GET", "/missing.js", None).await;
    assert_eq!(res.status(), 404);
}

/// Every call fails the way an unreachable database does.
struct UnreachableStore;

#[async_trait::async_trait]
impl StoreAdapter for UnreachableStore {
    fn kind(&self) -> &'static str {
        "unreachable"
    }
    async fn init(&self) -> StoreResult<()> {
        Err(refused())
    }
    async fn list_ordered(&self) -> StoreResult<Vec<Todo>> {
        Err(refused())
    }
    async fn count(&self) -> StoreResult<u64> {
        Err(refused())
    }
    async fn get(&self, _: &TodoId) -> StoreResult<Option<Todo>> {
        Err(refused())
    }
    async fn insert(&self, _: &TodoFields) -> StoreResult<TodoId> {
        Err(refused())
    }
    async fn replace(&self, _: &TodoId, _: &TodoFields) -> StoreResult<bool> {
        Err(refused())
    }
    async fn remove(&self, _: &TodoId) -> StoreResult<bool> {
        Err(refused())
    }
}

fn refused() -> StoreError {
    StoreError::Unavailable("connection refused".into())
}

#[tokio::test]
async fn store_outage_is_a_server_error() {
    let (app, _) = app_with(Arc::new(UnreachableStore));

    let res = request(&app, "GET", "/api/todos", None).await;
    assert_eq!(res.status(), 500);
    assert!(body_json(res).await["message"].as_str().unwrap().contains("connection refused"));

    let res = request(&app, "POST", "/api/todos", Some(json!({ "title": "x", "order": 1, "completed": false }))).await;
    assert_eq!(res.status(), 500);

    let res = request(&app, "DELETE", "/api/todos/abc", None).await;
    assert_eq!(res.status(), 500);
}

#[tokio::test]
async fn documents_that_are_not_todos_are_unknown_ids() {
    let store = InMemoryStore::new();
    let id = store.insert_document(json!({ "views": {} }).as_object().cloned().unwrap());
    let (app, _) = app_with(Arc::new(store.clone()));

    let res = request(&app, "GET", &format!("/api/todos/{id}"), None).await;
    assert_eq!(res.status(), 400);
    let res = request(&app, "PUT", &format!("/api/todos/{id}"), Some(json!({ "title": "x", "order": 1, "completed": false }))).await;
    assert_eq!(res.status(), 400);
    let res = request(&app, "DELETE", &format!("/api/todos/{id}"), None).await;
    assert_eq!(res.status(), 400);
    assert_eq!(store.document_count(), 1);
}

async fn body_json(res: hyper::Response<axum::body::Body>) -> Value {
    serde_json::from_slice(&to_bytes(res.into_body(), 1024 * 1024).await.unwrap()).unwrap()
}

async fn request(app: &Router, method: &str, path: &str, body: Option<Value>) -> hyper::Response<axum::body::Body> {
    let body = body.map(|json| json.to_string());
    request_raw(app, method, path, body.as_deref()).await
}

async fn request_raw(app: &Router, method: &str, path: &str, body: Option<&str>) -> hyper::Response<axum::body::Body> {
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    let req = Request::builder().method(Method::from_bytes(method.as_bytes()).unwrap()).uri(path);
    let req = match body {
        Some(text) => req.header("content-type", "application/json").body(Body::from(text.to_owned())).unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(req).await.unwrap()
}
