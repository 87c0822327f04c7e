//! Defensive accessors over raw JSON records.
//!
//! Raw dumps mix numbers, numeric strings and `"N/A"` markers for the same
//! field, and rename fields between releases. These helpers resolve a
//! preference-ordered list of names once and never fail: a value that cannot
//! be read is simply absent.

use crate::utils::config::UNAVAILABLE_MARKER;
use log::debug;
use serde_json::{Map, Value};

/// Read a numeric value from a JSON number or numeric string
pub fn parse_json_f64(val: &Value) -> Option<f64> {
    let parsed = match val {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// First numeric value found under any of `names`, in preference order
pub fn lookup_number(obj: &Map<String, Value>, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|field| {
        let val = obj.get(*field)?;
        let parsed = parse_json_f64(val);
        if parsed.is_none() {
            debug!("Field '{}' present but not numeric: {}", field, val);
        }
        parsed
    })
}

/// Numeric array field; non-numeric elements make the whole field unreadable
pub fn number_array(val: &Value) -> Option<Vec<f64>> {
    match val {
        Value::Array(items) => items.iter().map(parse_json_f64).collect(),
        other => parse_json_f64(other).map(|v| vec![v]),
    }
}

/// True for `null` and the `"N/A"` marker
pub fn is_unavailable(val: &Value) -> bool {
    match val {
        Value::Null => true,
        Value::String(s) => s == UNAVAILABLE_MARKER,
        _ => false,
    }
}

/// Object sub-record under `key`, if present and not marked unavailable
pub fn sub_record<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    obj.get(key)
        .filter(|v| !is_unavailable(v))
        .and_then(Value::as_object)
}

/// Parse an unsigned id stored as number or string
pub fn parse_json_u32(val: &Value) -> Option<u32> {
    match val {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_number_prefers_first_name() {
        let obj = json!({"legacy": 5, "current": 7});
        let obj = obj.as_object().unwrap();
        assert_eq!(lookup_number(obj, &["current", "legacy"]), Some(7.0));
        assert_eq!(lookup_number(obj, &["missing", "legacy"]), Some(5.0));
        assert_eq!(lookup_number(obj, &["missing"]), None);
    }

    #[test]
    fn test_lookup_number_falls_back_past_non_numeric() {
        let obj = json!({"current": "N/A", "legacy": "12.5"});
        let obj = obj.as_object().unwrap();
        assert_eq!(lookup_number(obj, &["current", "legacy"]), Some(12.5));
    }

    #[test]
    fn test_number_array() {
        assert_eq!(number_array(&json!([1, 2.5])), Some(vec![1.0, 2.5]));
        assert_eq!(number_array(&json!(3)), Some(vec![3.0]));
        assert_eq!(number_array(&json!([1, "x"])), None);
    }

    #[test]
    fn test_is_unavailable() {
        assert!(is_unavailable(&json!(null)));
        assert!(is_unavailable(&json!("N/A")));
        assert!(!is_unavailable(&json!({})));
    }

    #[test]
    fn test_parse_json_u32() {
        assert_eq!(parse_json_u32(&json!(3)), Some(3));
        assert_eq!(parse_json_u32(&json!("4211")), Some(4211));
        assert_eq!(parse_json_u32(&json!(-1)), None);
    }
}
