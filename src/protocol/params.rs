//! Conversion of driver options into query parameters and headers.
//!
//! Options are a loose JSON map so callers can pass through any CouchDB query
//! parameter. Only scalar-ish values make sense on a URL:
//!
//! | Value | Encoding |
//! |-------|----------|
//! | string | as-is |
//! | array of strings | one parameter per element |
//! | bool | `true` / `false` |
//! | integer | decimal |
//!
//! Anything else is rejected as a bad API call.

use super::constants::options;
use crate::error::{CouchError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Driver options for an operation.
pub type QueryOptions = BTreeMap<String, Value>;

/// Encode options as `(key, value)` query pairs.
///
/// ```
/// use couchdb_stream_http::protocol::{options_to_params, QueryOptions};
/// use serde_json::json;
///
/// let mut opts = QueryOptions::new();
/// opts.insert("include_docs".into(), json!(true));
/// opts.insert("limit".into(), json!(10));
/// opts.insert("keys".into(), json!(["a", "b"]));
///
/// let params = options_to_params(&opts).unwrap();
/// assert_eq!(params, vec![
///     ("include_docs".to_string(), "true".to_string()),
///     ("keys".to_string(), "a".to_string()),
///     ("keys".to_string(), "b".to_string()),
///     ("limit".to_string(), "10".to_string()),
/// ]);
/// ```
pub fn options_to_params(opts: &QueryOptions) -> Result<Vec<(String, String)>> {
    let mut params = Vec::with_capacity(opts.len());
    for (key, value) in opts {
        match value {
            Value::String(s) => params.push((key.clone(), s.clone())),
            Value::Bool(b) => params.push((key.clone(), b.to_string())),
            Value::Number(n) if n.is_i64() || n.is_u64() => {
                params.push((key.clone(), n.to_string()))
            }
            Value::Array(items) => {
                for item in items {
                    let s = item.as_str().ok_or_else(|| invalid_type(key, value))?;
                    params.push((key.clone(), s.to_string()));
                }
            }
            _ => return Err(invalid_type(key, value)),
        }
    }
    Ok(params)
}

fn invalid_type(key: &str, value: &Value) -> CouchError {
    let kind = match value {
        Value::Null => "null",
        Value::Number(_) => "float",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Bool(_) => "bool",
        Value::String(_) => "string",
    };
    CouchError::bad_api_call(format!("invalid type {} for option '{}'", kind, key))
}

/// Remove the full-commit option, returning its value or `default`.
pub fn take_full_commit(opts: &mut QueryOptions, default: bool) -> Result<bool> {
    match opts.remove(options::FULL_COMMIT) {
        None => Ok(default),
        Some(Value::Bool(b)) => Ok(b),
        Some(other) => Err(CouchError::bad_api_call(format!(
            "{} must be a bool, got {}",
            options::FULL_COMMIT,
            other
        ))),
    }
}

/// Remove the If-None-Match option, returning its value.
pub fn take_if_none_match(opts: &mut QueryOptions) -> Result<Option<String>> {
    match opts.remove(options::IF_NONE_MATCH) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(CouchError::bad_api_call(format!(
            "{} must be a string, got {}",
            options::IF_NONE_MATCH,
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusKind;
    use serde_json::json;

    fn opts(value: Value) -> QueryOptions {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_rejects_float() {
        let err = options_to_params(&opts(json!({"limit": 1.5}))).unwrap_err();
        assert_eq!(err.status(), StatusKind::BadApiCall);
    }

    #[test]
    fn test_rejects_object_and_mixed_arrays() {
        assert!(options_to_params(&opts(json!({"key": {"a": 1}}))).is_err());
        assert!(options_to_params(&opts(json!({"keys": ["a", 1]}))).is_err());
    }

    #[test]
    fn test_take_full_commit() {
        let mut o = opts(json!({"X-Couch-Full-Commit": true, "rev": "1-a"}));
        assert!(take_full_commit(&mut o, false).unwrap());
        assert!(!o.contains_key("X-Couch-Full-Commit"));
        assert!(!take_full_commit(&mut o, false).unwrap());

        let mut bad = opts(json!({"X-Couch-Full-Commit": "yes"}));
        assert!(take_full_commit(&mut bad, false).is_err());
    }

    #[test]
    fn test_take_if_none_match() {
        let mut o = opts(json!({"If-None-Match": "1-abc"}));
        assert_eq!(take_if_none_match(&mut o).unwrap().as_deref(), Some("1-abc"));
        assert!(o.is_empty());
        assert_eq!(take_if_none_match(&mut o).unwrap(), None);
    }
}
