use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SearchError};

/// Deterministic fingerprint of a backend registration's configuration.
///
/// The value is serialized to JSON, re-encoded with recursively sorted
/// object keys, and hashed. Structurally equal configurations therefore
/// hash equal regardless of field or map ordering, which is what makes
/// reconciliation equality structural instead of identity-based.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)
        .map_err(|err| SearchError::Config(format!("unhashable configuration: {err}")))?;

    let mut canonical = String::new();
    write_canonical(&value, &mut canonical);

    Ok(blake3::hash(canonical.as_bytes()).to_hex().to_string())
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_equal_values_hash_equal() {
        let a = vec!["one".to_string(), "two".to_string()];
        let b = vec!["one".to_string(), "two".to_string()];

        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_different_values_hash_different() {
        let a = vec!["one".to_string()];
        let b = vec!["two".to_string()];

        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_hash_independent_of_map_insertion_order() {
        let mut a = HashMap::new();
        a.insert("zeta", 1);
        a.insert("alpha", 2);
        a.insert("mid", 3);

        let mut b = HashMap::new();
        b.insert("alpha", 2);
        b.insert("mid", 3);
        b.insert("zeta", 1);

        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_nested_structures_are_canonicalized() {
        let a = serde_json::json!({"outer": {"b": [1, 2], "a": true}});
        let b = serde_json::json!({"outer": {"a": true, "b": [1, 2]}});

        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_array_order_is_significant() {
        let a = serde_json::json!([1, 2]);
        let b = serde_json::json!([2, 1]);

        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }
}
