//! JSON argument parsing helpers for tool implementations.
//!
//! Strict parsing is the default error path. Models sometimes wrap JSON in
//! Markdown fences; [`strip_code_fences`] is the explicit opt-in
//! pre-processing step for that case, never a silent fallback.
//!
//! ```rust
//! use wtooling::{parse_json_object, required_str};
//!
//! let args = parse_json_object(r#"{"file_path":"notes.txt"}"#).expect("object should parse");
//! let path = required_str(&args, "file_path").expect("path should be present");
//! assert_eq!(path, "notes.txt");
//! ```

use serde_json::{Map, Value};

use crate::ToolError;

pub fn parse_json_value(args_json: &str) -> Result<Value, ToolError> {
    serde_json::from_str(args_json)
        .map_err(|err| ToolError::invalid_arguments(format!("invalid JSON arguments: {err}")))
}

pub fn parse_json_object(args_json: &str) -> Result<Map<String, Value>, ToolError> {
    let value = parse_json_value(args_json)?;
    value
        .as_object()
        .cloned()
        .ok_or_else(|| ToolError::invalid_arguments("expected JSON object arguments"))
}

/// Removes a surrounding Markdown code fence, if any.
pub fn strip_code_fences(input: &str) -> &str {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Fence-tolerant variant of [`parse_json_object`].
pub fn parse_json_object_lenient(args_json: &str) -> Result<Map<String, Value>, ToolError> {
    parse_json_object(strip_code_fences(args_json))
}

pub fn required_str(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| ToolError::invalid_arguments(format!("missing required string: '{key}'")))
}

pub fn optional_str(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(ToString::to_string)
}

pub fn optional_u64(args: &Map<String, Value>, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}
