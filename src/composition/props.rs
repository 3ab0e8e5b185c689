use crate::foundation::error::{DriveError, DriveResult};
use serde_json::{Map, Value};

/// Decode a props payload, which must be a JSON object.
pub fn parse_props_object(s: &str) -> DriveResult<Value> {
    let v: Value = serde_json::from_str(s)
        .map_err(|e| DriveError::serde(format!("props payload is not valid JSON: {e}")))?;
    if !v.is_object() {
        return Err(DriveError::serde("props payload must be a JSON object"));
    }
    Ok(v)
}

/// Encode props for the wire. Key order is the object's insertion order.
pub fn serialize_props(props: &Value) -> DriveResult<String> {
    Ok(serde_json::to_string(props)?)
}

/// Shallow merge: keys in `overrides` replace keys in `defaults`.
///
/// Keys keep their position from `defaults`; keys only present in `overrides` are appended in
/// their own order. Non-object inputs are treated as empty.
pub fn merge_props(defaults: &Value, overrides: &Value) -> Value {
    let mut out = defaults.as_object().cloned().unwrap_or_default();
    if let Some(extra) = overrides.as_object() {
        for (k, v) in extra {
            out.insert(k.clone(), v.clone());
        }
    }
    Value::Object(out)
}

/// An empty props object.
pub fn empty_props() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
#[path = "../../tests/unit/composition/props.rs"]
mod tests;
