//! JSON-pointer writes (RFC 6901)
//!
//! `serde_json` only offers pointer reads and in-place mutation of existing
//! nodes. Field mappings also need to create missing branches, so this module
//! walks the document segment by segment.

use serde_json::{Map, Value};

/// Why a pointer write failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerError {
    /// A segment is absent and creation was not allowed
    NotFound,
    /// The pointer does not fit the document (bad index, scalar parent, ...)
    Invalid(String),
}

/// Splits a pointer into unescaped segments (`~1` is `/`, `~0` is `~`).
pub fn segments(pointer: &str) -> Result<Vec<String>, PointerError> {
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(PointerError::Invalid(
            "pointer must start with '/'".to_string(),
        ));
    };
    Ok(rest
        .split('/')
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect())
}

/// Writes `value` at `pointer`.
///
/// With `create`, missing object keys become empty maps and an array index
/// equal to the array length appends. Without it, every segment including the
/// last one must already exist.
pub fn set(doc: &mut Value, pointer: &str, value: Value, create: bool) -> Result<(), PointerError> {
    let segs = segments(pointer)?;
    let Some((last, parents)) = segs.split_last() else {
        return Err(PointerError::Invalid("empty pointer".to_string()));
    };

    let mut cur = doc;
    for seg in parents {
        cur = descend(cur, seg, create)?;
    }

    match cur {
        Value::Object(map) => {
            if !create && !map.contains_key(last.as_str()) {
                return Err(PointerError::NotFound);
            }
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let idx = parse_index(last)?;
            if idx < items.len() {
                items[idx] = value;
                Ok(())
            } else if idx == items.len() && create {
                items.push(value);
                Ok(())
            } else {
                Err(PointerError::NotFound)
            }
        }
        other => Err(PointerError::Invalid(format!(
            "cannot set '{last}' on a {}",
            type_name(other)
        ))),
    }
}

fn descend<'a>(cur: &'a mut Value, seg: &str, create: bool) -> Result<&'a mut Value, PointerError> {
    if cur.is_null() && create {
        *cur = Value::Object(Map::new());
    }
    match cur {
        Value::Object(map) => {
            if !map.contains_key(seg) {
                if !create {
                    return Err(PointerError::NotFound);
                }
                map.insert(seg.to_string(), Value::Object(Map::new()));
            }
            map.get_mut(seg).ok_or(PointerError::NotFound)
        }
        Value::Array(items) => {
            let idx = parse_index(seg)?;
            if idx == items.len() && create {
                items.push(Value::Object(Map::new()));
            }
            items.get_mut(idx).ok_or(PointerError::NotFound)
        }
        other => Err(PointerError::Invalid(format!(
            "cannot descend into '{seg}' of a {}",
            type_name(other)
        ))),
    }
}

fn parse_index(seg: &str) -> Result<usize, PointerError> {
    // RFC 6901 forbids leading zeros.
    if seg.len() > 1 && seg.starts_with('0') {
        return Err(PointerError::Invalid(format!("invalid array index '{seg}'")));
    }
    seg.parse()
        .map_err(|_| PointerError::Invalid(format!("invalid array index '{seg}'")))
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escaped_segments() {
        assert_eq!(
            segments("/spec/selector/app.kubernetes.io~1instance").unwrap(),
            vec!["spec", "selector", "app.kubernetes.io/instance"]
        );
        assert_eq!(segments("/a~0b").unwrap(), vec!["a~b"]);
        // ~01 is "~1" literally, not "/"
        assert_eq!(segments("/~01").unwrap(), vec!["~1"]);
        assert!(segments("no-slash").is_err());
    }

    #[test]
    fn test_set_creates_missing_maps() {
        let mut doc = json!({"spec": {}});
        set(&mut doc, "/spec/selector/app.kubernetes.io~1instance", json!("demo"), true).unwrap();
        assert_eq!(doc, json!({"spec": {"selector": {"app.kubernetes.io/instance": "demo"}}}));
    }

    #[test]
    fn test_set_without_create_requires_path() {
        let mut doc = json!({"spec": {}});
        assert_eq!(
            set(&mut doc, "/spec/resources/requests/storage", json!("1Gi"), false),
            Err(PointerError::NotFound)
        );
        assert_eq!(doc, json!({"spec": {}}));

        let mut doc = json!({"spec": {"replicas": 1}});
        set(&mut doc, "/spec/replicas", json!(3), false).unwrap();
        assert_eq!(doc["spec"]["replicas"], 3);
    }

    #[test]
    fn test_array_index_replace_and_append() {
        let mut doc = json!({"spec": {"ports": [{"port": 80, "name": "http"}]}});
        set(&mut doc, "/spec/ports/0/port", json!(9000), true).unwrap();
        assert_eq!(doc["spec"]["ports"][0], json!({"port": 9000, "name": "http"}));

        set(&mut doc, "/spec/ports/1/port", json!(9001), true).unwrap();
        assert_eq!(doc["spec"]["ports"][1], json!({"port": 9001}));

        assert_eq!(
            set(&mut doc, "/spec/ports/5/port", json!(1), true),
            Err(PointerError::NotFound)
        );
    }

    #[test]
    fn test_scalar_parent_is_invalid() {
        let mut doc = json!({"spec": "oops"});
        assert!(matches!(
            set(&mut doc, "/spec/replicas", json!(1), true),
            Err(PointerError::Invalid(_))
        ));
    }
}
