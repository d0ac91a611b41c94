//! Request and result envelopes shared by every execution mode

use crate::error::Error;
use crate::interp::Value;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// Maximum characters of serialized result kept in an [`ExecutionResult`]
pub const MAX_RESULT_CHARS: usize = 5000;

/// A snippet to run against one primary dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Analysis snippet
    #[serde(default)]
    pub code: String,
    /// Dataset bound to `df`
    #[serde(default)]
    pub primary_source: String,
    /// Extra parameters exposed to the snippet as `params`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub kwargs: BTreeMap<String, Json>,
}

impl ExecutionRequest {
    /// Create a request with no extra parameters
    #[must_use]
    pub fn new(code: impl Into<String>, primary_source: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            primary_source: primary_source.into(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Add a parameter
    #[must_use]
    pub fn with_kwarg(mut self, key: impl Into<String>, value: Json) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    /// Parameters converted for the interpreter
    pub(crate) fn params(&self) -> Vec<(String, Value)> {
        self.kwargs
            .iter()
            .map(|(k, v)| (k.clone(), json_to_value(v)))
            .collect()
    }
}

fn json_to_value(v: &Json) -> Value {
    match v {
        Json::Null => Value::None,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float))
            .unwrap_or(Value::None),
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        Json::Object(map) => Value::Dict(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect(),
        ),
    }
}

/// Outcome of one execution
///
/// Exactly one of `result` and `error` is set. `truncated` is true when the
/// serialized result exceeded [`MAX_RESULT_CHARS`] and only its prefix was kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Serialized result text
    #[serde(default)]
    pub result: Option<String>,
    /// Failure description
    #[serde(default)]
    pub error: Option<String>,
    /// Whether `result` was cut at the character limit
    #[serde(default)]
    pub truncated: bool,
}

impl ExecutionResult {
    /// Successful result, truncated to the character limit
    #[must_use]
    pub fn ok(text: impl Into<String>) -> Self {
        let (result, truncated) = truncate(text.into());
        Self {
            result: Some(result),
            error: None,
            truncated,
        }
    }

    /// Successful result from an interpreter value
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self::ok(serialize_value(value))
    }

    /// Failed result carrying the error's message
    #[must_use]
    pub fn from_error(err: &Error) -> Self {
        Self::failure(err.to_string())
    }

    /// Failed result with a custom message
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(message.into()),
            truncated: false,
        }
    }

    /// Whether execution succeeded
    #[must_use]
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

impl From<crate::Result<Value>> for ExecutionResult {
    fn from(outcome: crate::Result<Value>) -> Self {
        match outcome {
            Ok(v) => Self::from_value(&v),
            Err(e) => Self::from_error(&e),
        }
    }
}

/// Render a value as result text
///
/// Structured values become compact JSON; plain strings are kept as-is so
/// that prose answers are not wrapped in quotes.
#[must_use]
pub fn serialize_value(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::GroupBy(_) | Value::GroupedColumn(..) | Value::StrAccessor(_) | Value::Module(_) => {
            value.to_string()
        }
        other => serde_json::to_string(&other.to_json()).unwrap_or_else(|_| other.to_string()),
    }
}

/// Keep at most [`MAX_RESULT_CHARS`] characters
#[must_use]
pub fn truncate(text: String) -> (String, bool) {
    match text.char_indices().nth(MAX_RESULT_CHARS) {
        Some((cut, _)) => (text[..cut].to_string(), true),
        None => (text, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_at_limit_keeps_text() {
        let text = "a".repeat(MAX_RESULT_CHARS);
        let (kept, truncated) = truncate(text.clone());
        assert!(!truncated);
        assert_eq!(kept, text);
    }

    #[test]
    fn test_truncate_one_past_limit() {
        let (kept, truncated) = truncate("a".repeat(MAX_RESULT_CHARS + 1));
        assert!(truncated);
        assert_eq!(kept.chars().count(), MAX_RESULT_CHARS);
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let (kept, truncated) = truncate("é".repeat(MAX_RESULT_CHARS));
        assert!(!truncated);
        assert_eq!(kept.len(), MAX_RESULT_CHARS * 2);

        let (kept, truncated) = truncate("日本".repeat(MAX_RESULT_CHARS));
        assert!(truncated);
        assert_eq!(kept.chars().count(), MAX_RESULT_CHARS);
        assert!(kept.ends_with('本'));
    }
}
