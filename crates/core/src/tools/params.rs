//! Parameter accessors. Every failure names the offending field.

use serde_json::{Map, Value};

use crate::error::ToolError;

pub type ToolParams = Map<String, Value>;

pub fn required_str<'a>(params: &'a ToolParams, field: &str) -> Result<&'a str, ToolError> {
    match optional_str(params, field)? {
        Some(value) => Ok(value),
        None => Err(ToolError::invalid(field, "is required")),
    }
}

/// Missing and `null` both read as `None`. Blank strings are rejected.
pub fn optional_str<'a>(params: &'a ToolParams, field: &str) -> Result<Option<&'a str>, ToolError> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(ToolError::invalid(field, "must not be empty"))
        }
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ToolError::invalid(field, "must be a string")),
    }
}

pub fn required_u64(params: &ToolParams, field: &str) -> Result<u64, ToolError> {
    optional_u64(params, field)?.ok_or_else(|| ToolError::invalid(field, "is required"))
}

pub fn optional_u64(params: &ToolParams, field: &str) -> Result<Option<u64>, ToolError> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| ToolError::invalid(field, "must be a non-negative integer")),
    }
}
