//! Raw attribute tree helpers.
//!
//! The tree follows the usual XML-to-map layout: attributes are keys prefixed with `@`,
//! element text next to attributes lives under `#text`, repeated children become arrays and a
//! single child stays a bare map. Readers here always normalize the bare-map case to a
//! one-element list.

use serde_json::{Map, Value};

use crate::error::{L5xError, L5xResult};
use crate::ports::template::TemplateSource;

pub type Meta = Map<String, Value>;

/// Text content of a node: plain string or the `#text` of an element with attributes.
pub fn value_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("#text").and_then(Value::as_str),
        _ => None,
    }
}

pub fn attr<'a>(meta: &'a Meta, key: &str) -> Option<&'a str> {
    meta.get(key).and_then(value_str)
}

pub fn attr_or<'a>(meta: &'a Meta, key: &str, default: &'a str) -> &'a str {
    attr(meta, key).unwrap_or(default)
}

/// Writes an attribute in place (existing keys keep their position).
pub fn set_attr(meta: &mut Meta, key: &str, value: impl Into<String>) {
    let value = value.into();
    match meta.get_mut(key) {
        Some(Value::Object(inner)) if !key.starts_with('@') => {
            inner.insert("#text".to_string(), Value::String(value));
        }
        Some(slot) => *slot = Value::String(value),
        None => {
            meta.insert(key.to_string(), Value::String(value));
        }
    }
}

/// Removes a key without disturbing the order of the remaining keys.
pub fn remove_key(meta: &mut Meta, key: &str) -> Option<Value> {
    if !meta.contains_key(key) {
        return None;
    }
    let mut removed = None;
    let entries: Vec<(String, Value)> = std::mem::take(meta).into_iter().collect();
    for (k, v) in entries {
        if k == key {
            removed = Some(v);
        } else {
            meta.insert(k, v);
        }
    }
    removed
}

pub fn insert_key_at_index(meta: &mut Meta, key: &str, value: Value, index: usize) {
    if meta.contains_key(key) {
        return;
    }
    let mut entries: Vec<(String, Value)> = std::mem::take(meta).into_iter().collect();
    let index = index.min(entries.len());
    entries.insert(index, (key.to_string(), value));
    *meta = entries.into_iter().collect();
}

/// Inserts every missing canonical key (as a null placeholder) at its index in `order`.
/// Present values are never touched.
pub fn init_dict_order(meta: &mut Meta, order: &[&str]) {
    for (index, key) in order.iter().enumerate() {
        if !meta.contains_key(*key) {
            insert_key_at_index(meta, key, Value::Null, index);
        }
    }
}

/// Normalizes an optional child slot to a list view. Missing, null and empty-text slots
/// are empty lists; a bare map is a one-element list.
pub fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) if s.trim().is_empty() => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

/// `container.item[]`, e.g. `Members.Member[]`.
pub fn child_list<'a>(meta: &'a Meta, container: &str, item: &str) -> Vec<&'a Value> {
    match meta.get(container) {
        Some(Value::Object(inner)) => as_list(inner.get(item)),
        _ => Vec::new(),
    }
}

/// Replaces a non-map slot with an empty map and returns the map.
pub(crate) fn ensure_object(slot: &mut Value) -> &mut Meta {
    match slot {
        Value::Object(map) => map,
        other => {
            *other = Value::Object(Map::new());
            ensure_object(other)
        }
    }
}

fn ensure_array(slot: &mut Value) -> &mut Vec<Value> {
    match slot {
        Value::Array(items) => items,
        other => {
            let items = match other.take() {
                Value::Null => Vec::new(),
                Value::String(s) if s.trim().is_empty() => Vec::new(),
                single => vec![single],
            };
            *other = Value::Array(items);
            ensure_array(other)
        }
    }
}

/// Mutable `container.item[]`, creating the container and normalizing a single child.
pub fn list_mut<'a>(meta: &'a mut Meta, container: &str, item: &str) -> &'a mut Vec<Value> {
    let slot = meta.entry(container).or_insert(Value::Null);
    let inner = ensure_object(slot);
    let items = inner.entry(item).or_insert(Value::Array(Vec::new()));
    ensure_array(items)
}

/// Lifts `container.item[]` out of the node. The container key stays in place so a later
/// [`put_list`] writes back at the same position.
pub fn take_list(meta: &mut Meta, container: &str, item: &str) -> Vec<Value> {
    if !has_child(meta, container, item) {
        return Vec::new();
    }
    std::mem::take(list_mut(meta, container, item))
}

pub fn put_list(meta: &mut Meta, container: &str, item: &str, items: Vec<Value>) {
    if items.is_empty() && !has_child(meta, container, item) {
        return;
    }
    *list_mut(meta, container, item) = items;
}

fn has_child(meta: &Meta, container: &str, item: &str) -> bool {
    matches!(meta.get(container), Some(Value::Object(inner)) if inner.contains_key(item))
}

pub fn into_meta(value: Value, what: &str) -> L5xResult<Meta> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(L5xError::configuration(format!(
            "{} meta data must be a map, got {}",
            what,
            kind_name(&other)
        ))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// Returns `data` when given (map or raw string), otherwise the `key` entry of a template.
pub fn get_default_meta_data(
    data: Option<Value>,
    templates: &dyn TemplateSource,
    template_path: &str,
    key: Option<&str>,
) -> L5xResult<Value> {
    match data {
        Some(value @ (Value::Object(_) | Value::String(_))) => Ok(value),
        Some(other) => Err(L5xError::configuration(format!(
            "meta data must be a map or string, got {}",
            kind_name(&other)
        ))),
        None => templates.load_template(template_path, key),
    }
}

/// Textual replacement across every string value of a subtree.
pub fn replace_strings(value: &mut Value, from: &str, to: &str) {
    match value {
        Value::String(s) => {
            if s.contains(from) {
                *s = s.replace(from, to);
            }
        }
        Value::Array(items) => {
            for item in items {
                replace_strings(item, from, to);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                replace_strings(v, from, to);
            }
        }
        _ => {}
    }
}
