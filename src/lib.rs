//! REST backend for a small todo list, persisted in CouchDB, MongoDB or
//! process memory, with a background job that caps the collection size.

pub mod application;
pub mod config;
pub mod domain;
pub mod http;
pub mod infrastructure;
