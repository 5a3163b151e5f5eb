use thiserror::Error;

use crate::domain::{store::StoreError, todo::TodoId};

#[derive(Debug, Error)]
pub enum TodoError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("todo {0} not found")]
    NotFound(TodoId),
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

pub type TodoResult<T> = Result<T, TodoError>;
