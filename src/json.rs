use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JsonErrorCategory {
    Syntax,
    Data,
    Eof,
    Io,
    Shape,
}

impl std::fmt::Display for JsonErrorCategory {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Syntax => "syntax",
            Self::Data => "data",
            Self::Eof => "eof",
            Self::Io => "io",
            Self::Shape => "shape",
        };
        formatter.write_str(text)
    }
}

/// Encode or decode failure reported by a [`JsonCodec`].
///
/// Cloneable so a memoized decode failure can be handed out more than once.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{category} error: {message}")]
pub struct JsonError {
    category: JsonErrorCategory,
    message: String,
}

impl JsonError {
    pub fn new(category: JsonErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub(crate) fn shape(expected: &str, found: &Value) -> Self {
        Self::new(
            JsonErrorCategory::Shape,
            format!("expected {expected}, found {}", value_kind(found)),
        )
    }

    pub fn category(&self) -> JsonErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for JsonError {
    fn from(source: serde_json::Error) -> Self {
        let category = match source.classify() {
            serde_json::error::Category::Syntax => JsonErrorCategory::Syntax,
            serde_json::error::Category::Data => JsonErrorCategory::Data,
            serde_json::error::Category::Eof => JsonErrorCategory::Eof,
            serde_json::error::Category::Io => JsonErrorCategory::Io,
        };
        Self::new(category, source.to_string())
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Turns payloads into generic JSON trees and back.
///
/// Typed views are produced from the decoded tree, so a codec only deals with
/// [`Value`]. Implementations must not execute code or resolve type hints while
/// decoding.
pub trait JsonCodec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, JsonError>;

    fn decode(&self, body: &[u8]) -> Result<Value, JsonError>;
}

#[derive(Debug, Default)]
pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, JsonError> {
        serde_json::to_vec(value).map_err(JsonError::from)
    }

    fn decode(&self, body: &[u8]) -> Result<Value, JsonError> {
        // from_slice keeps serde_json's recursion limit and rejects trailing data.
        serde_json::from_slice(body).map_err(JsonError::from)
    }
}
