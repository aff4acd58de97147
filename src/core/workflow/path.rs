use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde_json::{Map, Value};

/// Copy `base` and assign `value` at the dotted `path`.
///
/// A single leading separator is stripped; intermediate parts are created as
/// mappings, and an existing non-mapping intermediate is overwritten with a
/// fresh mapping. A path with no parts after stripping is an error.
pub fn write_at(base: &Value, path: &str, value: Value) -> Result<Value, AppError> {
    let trimmed = path.strip_prefix('.').unwrap_or(path);
    if trimmed.is_empty() {
        return Err(AppError::new(
            ErrorCategory::ValidationError,
            format!("cannot write at empty path '{}'", path),
        )
        .with_code("WF-PATH-001"));
    }
    let parts: Vec<&str> = trimmed.split('.').collect();

    let mut root = base.clone();
    if !root.is_object() {
        root = Value::Object(Map::new());
    }
    let mut current = &mut root;
    for part in &parts[..parts.len() - 1] {
        let map = ensure_object(current);
        current = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let last = parts[parts.len() - 1];
    ensure_object(current).insert(last.to_string(), value);
    Ok(root)
}

fn ensure_object(slot: &mut Value) -> &mut Map<String, Value> {
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just replaced with an object"),
    }
}
