//! Lenient readers over loosely-typed JSON documents (map files, snapshots)

use serde_json::Value;

/// Numeric field or fallback when missing, non-numeric or non-finite
///
/// Numeric strings are accepted as authoring tools sometimes quote numbers.
pub fn finite(value: Option<&Value>, fallback: f64) -> f64 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(Value::Bool(flag)) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|n| n.is_finite()).unwrap_or(fallback)
}

/// Non-empty string field or fallback
pub fn text(value: Option<&Value>, fallback: &str) -> String {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => fallback.to_string(),
    }
}

/// Optional non-empty string field
pub fn opt_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Array field, empty when missing or mistyped
pub fn array(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    }
}

/// Trailing integer of ids such as `node-12`
pub fn id_suffix(id: &str, prefix: &str) -> Option<u64> {
    id.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_finite_rejects_garbage() {
        let doc = json!({"a": 3.5, "b": "12", "c": "abc", "d": null});
        assert_eq!(finite(doc.get("a"), 0.0), 3.5);
        assert_eq!(finite(doc.get("b"), 0.0), 12.0);
        assert_eq!(finite(doc.get("c"), 7.0), 7.0);
        assert_eq!(finite(doc.get("d"), 7.0), 7.0);
        assert_eq!(finite(doc.get("missing"), -1.0), -1.0);
    }

    #[test]
    fn test_text_and_suffix() {
        let doc = json!({"id": "", "name": "Capital"});
        assert_eq!(text(doc.get("id"), "town-1"), "town-1");
        assert_eq!(text(doc.get("name"), "x"), "Capital");
        assert_eq!(id_suffix("node-14", "node-"), Some(14));
        assert_eq!(id_suffix("capital", "town-"), None);
    }
}
