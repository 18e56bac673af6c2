//! Bracket form encoding of nested parameters

use serde_json::Value;

use crate::error::{ClientError, Result};

/// Flatten a JSON object into form pairs
///
/// Arrays and objects use bracket notation (`links[0][1]=5`). Null values are
/// skipped, which also drops empty arrays and objects from the output.
pub fn encode_params(params: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let Value::Object(map) = params {
        for (key, value) in map {
            encode_value(key.clone(), value, &mut pairs);
        }
    }
    pairs
}

/// Encode a JSON object as an `application/x-www-form-urlencoded` string
pub fn encode_form(params: &Value) -> Result<String> {
    serde_urlencoded::to_string(encode_params(params))
        .map_err(|e| ClientError::InvalidValue(format!("cannot form-encode parameters: {}", e)))
}

fn encode_value(prefix: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => pairs.push((prefix, b.to_string())),
        Value::Number(n) => pairs.push((prefix, n.to_string())),
        Value::String(s) => pairs.push((prefix, s.clone())),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                encode_value(format!("{}[{}]", prefix, i), item, pairs);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                encode_value(format!("{}[{}]", prefix, key), item, pairs);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_nested_arrays() {
        let pairs = encode_params(&json!({"links": [[12, 4, 5], [13, 3, 1]]}));
        assert_eq!(
            pairs,
            vec![
                pair("links[0][0]", "12"),
                pair("links[0][1]", "4"),
                pair("links[0][2]", "5"),
                pair("links[1][0]", "13"),
                pair("links[1][1]", "3"),
                pair("links[1][2]", "1"),
            ]
        );
    }

    #[test]
    fn test_nulls_and_empty_arrays_skipped() {
        let pairs = encode_params(&json!({"state": null, "cids": [], "x": 1.5}));
        assert_eq!(pairs, vec![pair("x", "1.5")]);
    }

    #[test]
    fn test_strings_are_not_quoted() {
        let pairs = encode_params(&json!({"state": "{\"edition_time\":\"t\"}"}));
        assert_eq!(pairs, vec![pair("state", "{\"edition_time\":\"t\"}")]);
    }

    #[test]
    fn test_form_string_escapes_brackets() {
        let body = encode_form(&json!({"links": [[12, 4]], "pid": 1})).unwrap();
        assert_eq!(body, "links%5B0%5D%5B0%5D=12&links%5B0%5D%5B1%5D=4&pid=1");
    }

    #[test]
    fn test_non_object_yields_nothing() {
        assert!(encode_params(&json!([1, 2])).is_empty());
    }
}
