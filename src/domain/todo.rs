use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier assigned by the backing store when a todo is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TodoId(pub String);

impl TodoId {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for TodoId {
    fn from(value: &str) -> Self { Self(value.to_owned()) }
}

impl From<String> for TodoId {
    fn from(value: String) -> Self { Self(value) }
}

/// A todo as it appears on the wire: `{id, title, order, completed}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    pub order: i64,
    pub completed: bool,
}

impl Todo {
    pub fn new(id: TodoId, fields: TodoFields) -> Self {
        Self { id, title: fields.title, order: fields.order, completed: fields.completed }
    }

    pub fn fields(&self) -> TodoFields {
        TodoFields { title: self.title.clone(), order: self.order, completed: self.completed }
    }
}

/// The mutable part of a todo. Used both for creation and full replacement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoFields {
    pub title: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub completed: bool,
}

impl TodoFields {
    pub fn new(title: impl Into<String>, order: i64, completed: bool) -> Self {
        Self { title: title.into(), order, completed }
    }
}
