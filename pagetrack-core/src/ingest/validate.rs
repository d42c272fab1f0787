//! Event shape validation

use serde_json::Value;

/// Check that a JSON value has the event shape.
///
/// `event`, `url` and `title` must be strings, `tags` an array of strings
/// and `ts` an integer number of seconds. Extra fields are ignored.
pub fn is_valid_event(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    let is_str = |key: &str| obj.get(key).is_some_and(Value::is_string);

    let tags_ok = obj
        .get("tags")
        .and_then(Value::as_array)
        .is_some_and(|tags| tags.iter().all(Value::is_string));

    let ts_ok = obj.get("ts").and_then(Value::as_i64).is_some();

    is_str("event") && tags_ok && is_str("url") && is_str("title") && ts_ok
}
