pub mod error;
pub mod retention;
pub mod todo_repository;
