//! Mapping between raw store documents and [`Todo`] values.
//!
//! A document is only a todo when it carries a non-empty `title` and a
//! non-null boolean `completed`. Anything else in the collection (design
//! documents, half-written records) is invisible to listings and counts.

use serde_json::{Map, Value};

use super::todo::{Todo, TodoFields, TodoId};

pub type JsonDocument = Map<String, Value>;

pub fn is_todo_document(doc: &JsonDocument) -> bool {
    title_of(doc).is_some() && completed_of(doc).is_some()
}

/// Builds a todo from a document, dropping every store-specific field.
pub fn todo_from_json(id: TodoId, doc: &JsonDocument) -> Option<Todo> {
    let title = title_of(doc)?;
    let completed = completed_of(doc)?;
    Some(Todo { id, title: title.to_owned(), order: order_of(doc.get("order")), completed })
}

pub fn fields_to_json(fields: &TodoFields) -> JsonDocument {
    let mut doc = Map::new();
    doc.insert("title".into(), Value::String(fields.title.clone()));
    doc.insert("order".into(), Value::from(fields.order));
    doc.insert("completed".into(), Value::Bool(fields.completed));
    doc
}

/// Numeric sort key. Missing or non-numeric orders sort as zero; fractional
/// orders are truncated.
pub fn order_of(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        _ => 0,
    }
}

fn title_of(doc: &JsonDocument) -> Option<&str> {
    doc.get("title").and_then(Value::as_str).filter(|t| !t.is_empty())
}

fn completed_of(doc: &JsonDocument) -> Option<bool> {
    doc.get("completed").and_then(Value::as_bool)
}
