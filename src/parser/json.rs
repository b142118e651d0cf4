//! JSON flattening into readable key/value lines

use crate::error::{NotetionError, Result};
use serde_json::Value;

pub(super) fn render(raw: &[u8]) -> Result<String> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| NotetionError::MalformedInput(format!("Invalid JSON: {}", e)))?;
    Ok(flatten_json(&value))
}

/// Flattens a JSON value into `path: value` lines
///
/// Object keys are joined with `.`, array elements use `[index]`. Empty
/// containers are rendered as `{}` / `[]` so they are not silently lost.
///
/// # Examples
///
/// ```
/// use notetion::parser::flatten_json;
/// use serde_json::json;
///
/// let text = flatten_json(&json!({"course": {"title": "Causal Inference", "weeks": [1, 2]}}));
/// assert_eq!(text, "course.title: Causal Inference\ncourse.weeks[0]: 1\ncourse.weeks[1]: 2");
/// ```
pub fn flatten_json(value: &Value) -> String {
    let mut lines = Vec::new();
    flatten_into(value, String::new(), &mut lines);
    lines.join("\n")
}

fn flatten_into(value: &Value, path: String, lines: &mut Vec<String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten_into(child, child_path, lines);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (idx, child) in items.iter().enumerate() {
                flatten_into(child, format!("{}[{}]", path, idx), lines);
            }
        }
        leaf => {
            let rendered = match leaf {
                Value::String(s) => s.clone(),
                Value::Object(_) => "{}".to_string(),
                Value::Array(_) => "[]".to_string(),
                other => other.to_string(),
            };
            if path.is_empty() {
                lines.push(rendered);
            } else {
                lines.push(format!("{}: {}", path, rendered));
            }
        }
    }
}
