use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};

use crate::{
    application::todo_repository::TodoRepository,
    domain::todo::{Todo, TodoId},
    http::types::{ApiError, TodoPayload},
};

#[derive(Clone)]
pub struct AppState { pub repo: TodoRepository }

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/todos", get(list_todos).post(create_todo))
        .route("/api/todos/:id", get(get_todo).put(update_todo).delete(delete_todo))
        .with_state(state)
}

async fn list_todos(State(state): State<AppState>) -> Result<Json<Vec<Todo>>, ApiError> {
    Ok(Json(state.repo.list().await?))
}

async fn create_todo(State(state): State<AppState>, TodoPayload(fields): TodoPayload) -> Result<Json<Todo>, ApiError> {
    Ok(Json(state.repo.create(fields).await?))
}

async fn get_todo(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Todo>, ApiError> {
    Ok(Json(state.repo.get(&TodoId(id)).await?))
}

async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    TodoPayload(fields): TodoPayload,
) -> Result<Json<Todo>, ApiError> {
    Ok(Json(state.repo.update(&TodoId(id), fields).await?))
}

async fn delete_todo(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.repo.delete(&TodoId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
