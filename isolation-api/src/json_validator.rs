//! Bounded JSON decoding for reporting API responses
//!
//! Response bodies are parsed into a `serde_json::Value` and rejected when their
//! nesting exceeds a fixed depth. A usage-data page is an object holding an array
//! of flat record objects, so legitimate responses sit far below the limit.

use serde_json::Value;

/// Maximum allowed JSON nesting depth
pub const MAX_JSON_DEPTH: usize = 32;

/// Parse a JSON document and reject it if it nests deeper than `max_depth`.
///
/// # Examples
///
/// ```
/// use isolation_api::json_validator::{parse_bounded, MAX_JSON_DEPTH};
///
/// let page = r#"{"status": "COMPLETED", "data": [{"userId": "u1"}]}"#;
/// assert!(parse_bounded(page, MAX_JSON_DEPTH).is_ok());
///
/// let deep_json = (0..50).fold(String::from("{\"a\":"), |acc, _| acc + "{\"a\":")
///     + &(0..51).map(|_| "}").collect::<String>();
/// assert!(parse_bounded(&deep_json, MAX_JSON_DEPTH).is_err());
/// ```
///
/// # Errors
///
/// Returns a message describing the parse failure or the depth violation.
pub fn parse_bounded(json_str: &str, max_depth: usize) -> Result<Value, String> {
    let value: Value =
        serde_json::from_str(json_str).map_err(|e| format!("Invalid JSON: {}", e))?;

    let depth = calculate_depth(&value);
    if depth > max_depth {
        return Err(format!(
            "JSON nesting depth {} exceeds maximum allowed depth of {}",
            depth, max_depth
        ));
    }

    Ok(value)
}

/// Maximum nesting depth of a JSON value (0 for scalars)
fn calculate_depth(value: &Value) -> usize {
    match value {
        Value::Array(arr) => {
            1_usize.saturating_add(arr.iter().map(calculate_depth).max().unwrap_or(0))
        }
        Value::Object(obj) => {
            1_usize.saturating_add(obj.values().map(calculate_depth).max().unwrap_or(0))
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => 0,
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_depth_scalar() {
        assert_eq!(calculate_depth(&serde_json::json!("COMPLETED")), 0);
        assert_eq!(calculate_depth(&serde_json::json!(42)), 0);
        assert_eq!(calculate_depth(&serde_json::json!(null)), 0);
    }

    #[test]
    fn test_calculate_depth_empty_structures() {
        assert_eq!(calculate_depth(&serde_json::json!({})), 1);
        assert_eq!(calculate_depth(&serde_json::json!([])), 1);
    }

    #[test]
    fn test_calculate_depth_usage_page() {
        let value = serde_json::json!({
            "status": "COMPLETED",
            "data": [
                {"userId": "u1", "categories": ["News", "Sports"]},
                {"userId": "u2"}
            ]
        });
        // object -> data array -> record object -> categories array
        assert_eq!(calculate_depth(&value), 4);
    }

    #[test]
    fn test_parse_bounded_returns_value() {
        let value = parse_bounded(r#"{"jobId": "abc", "total": 3}"#, MAX_JSON_DEPTH)
            .expect("should parse");
        assert_eq!(value["jobId"], "abc");
        assert_eq!(value["total"], 3);
    }

    #[test]
    fn test_parse_bounded_at_limit() {
        let mut json = String::from("{");
        for i in 0..MAX_JSON_DEPTH - 1 {
            json.push_str(&format!("\"level{}\":{{", i));
        }
        json.push_str("\"value\":42");
        json.push_str(&"}".repeat(MAX_JSON_DEPTH));

        assert!(parse_bounded(&json, MAX_JSON_DEPTH).is_ok());
    }

    #[test]
    fn test_parse_bounded_exceeds_limit() {
        let mut json = String::new();
        for _ in 0..50 {
            json.push('[');
        }
        json.push_str("42");
        for _ in 0..50 {
            json.push(']');
        }

        let err = parse_bounded(&json, MAX_JSON_DEPTH).expect_err("should reject deep nesting");
        assert!(err.contains("exceeds maximum allowed depth"));
    }

    #[test]
    fn test_parse_bounded_invalid_json() {
        let err = parse_bounded("<html>Gateway Timeout</html>", MAX_JSON_DEPTH)
            .expect_err("html is not json");
        assert!(err.contains("Invalid JSON"));

        assert!(parse_bounded("", MAX_JSON_DEPTH).is_err());
    }

    #[test]
    fn test_parse_bounded_custom_limit() {
        let json = r#"{"a": {"b": {"c": {"d": "value"}}}}"#;
        assert!(parse_bounded(json, 5).is_ok());
        assert!(parse_bounded(json, 3).is_err());
    }
}
