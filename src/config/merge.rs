//! Configuration merge logic
//!
//! Implements the layered merge with:
//! - Objects: deep-merge by key
//! - Arrays: REPLACE (last wins)
//! - Scalars: override (last wins)
//!
//! Also turns `--conf key=value` pairs into an overlay object.

use serde_json::{Map, Value};

use super::effective::ConfigError;

/// Deep merge two JSON values.
///
/// Merge semantics:
/// - Objects: deep-merge by key (recursive)
/// - Arrays: REPLACE (second wins entirely)
/// - Scalars: override (second wins)
/// - Null: override (null can override any value)
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = if let Some(base_value) = base_map.remove(&key) {
                    deep_merge(base_value, overlay_value)
                } else {
                    overlay_value
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }

        (Value::Array(_), overlay @ Value::Array(_)) => overlay,

        (_, overlay) => overlay,
    }
}

/// Merge multiple config layers in order (first is base, last has highest precedence)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

/// Set `value` at a dot-separated `path`, creating intermediate objects.
///
/// A scalar sitting where an object is needed is replaced.
pub fn set_path(root: &mut Value, path: &str, value: Value) {
    let mut current = root;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        current = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Interpret a `--conf` value: booleans and integers become typed JSON,
/// everything else stays a string.
pub fn parse_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => trimmed
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(trimmed.to_string())),
    }
}

/// Build an overlay object from `key=value` pairs with dotted keys.
pub fn parse_overrides<S: AsRef<str>>(pairs: &[S]) -> Result<Value, ConfigError> {
    let mut overlay = Value::Object(Map::new());
    for pair in pairs {
        let pair = pair.as_ref();
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            ConfigError::ParseError(format!("expected key=value, got '{}'", pair))
        })?;
        let key = key.trim();
        if key.is_empty() || key.split('.').any(|segment| segment.is_empty()) {
            return Err(ConfigError::ParseError(format!("invalid key in '{}'", pair)));
        }
        set_path(&mut overlay, key, parse_scalar(value));
    }
    Ok(overlay)
}
