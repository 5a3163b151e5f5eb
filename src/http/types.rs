use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    application::{error::TodoError, todo_repository::parse_fields},
    domain::todo::TodoFields,
};

#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl From<TodoError> for ApiError {
    fn from(err: TodoError) -> Self {
        match err {
            // Unknown ids answer 400 like malformed bodies do.
            TodoError::InvalidInput(_) | TodoError::NotFound(_) => Self::bad_request(err.to_string()),
            TodoError::StoreUnavailable(_) => {
                tracing::error!(error = %err, "store call failed");
                Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: err.to_string() }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response { (self.status, axum::Json(self)).into_response() }
}

/// Request body holding the mutable todo fields.
///
/// Rejects empty, non-JSON and non-object bodies with 400 regardless of
/// the content type header.
#[derive(Debug)]
pub struct TodoPayload(pub TodoFields);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for TodoPayload {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state).await.map_err(|e| ApiError::bad_request(e.body_text()))?;
        Ok(Self(parse_fields(&body)?))
    }
}
