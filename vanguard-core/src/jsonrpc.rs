//! Transport-agnostic JSON-RPC 2.0 message types and classification.
//!
//! Both transports (stdio and socket) carry the same message format, so
//! classification lives here rather than in either transport. A message is
//! classified by the presence of its `id` and `method` fields:
//!
//! - Request: has both `id` and `method`
//! - Response: has `id` but no `method`
//! - Notification: has `method` but no `id`
//!
//! The `id` type (string, integer, or null) MUST be preserved verbatim in
//! responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

/// A JSON-RPC 2.0 message id: string, integer, or null.
///
/// Floats, booleans, arrays, and objects are invalid per JSON-RPC 2.0 and
/// are rejected during classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    /// Integer id.
    Number(i64),
    /// String id.
    String(String),
    /// Explicit null id (valid, if unusual).
    Null,
}

/// Classification of a parsed JSON-RPC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Has both `id` and `method` — a request expecting a response.
    Request { id: JsonRpcId, method: String },
    /// Has `id` but no `method` — a response to a previous request.
    Response { id: JsonRpcId },
    /// Has `method` but no `id` — a fire-and-forget notification.
    Notification { method: String },
}

/// Errors produced while classifying a JSON-RPC message.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// The `jsonrpc` field is missing or not `"2.0"`.
    #[error("missing or invalid jsonrpc version field")]
    InvalidVersion,
    /// The `id` field is present but not a string, integer, or null.
    #[error("invalid id field")]
    InvalidId,
    /// The message has neither `id` nor `method`.
    #[error("message has neither id nor method")]
    Unclassifiable,
}

/// Classify a parsed JSON-RPC value without taking ownership.
///
/// Validates the `"jsonrpc": "2.0"` version field, then classifies by the
/// presence of `id` and `method`.
pub fn classify(value: &Value) -> Result<MessageKind, ClassifyError> {
    let version = value.get("jsonrpc").and_then(|v| v.as_str());
    if version != Some("2.0") {
        return Err(ClassifyError::InvalidVersion);
    }

    let id = value
        .get("id")
        .map(parse_id)
        .transpose()
        .map_err(|_| ClassifyError::InvalidId)?;
    let method = value
        .get("method")
        .and_then(|v| v.as_str())
        .map(String::from);

    match (id, method) {
        (Some(id), Some(method)) => Ok(MessageKind::Request { id, method }),
        (Some(id), None) => Ok(MessageKind::Response { id }),
        (None, Some(method)) => Ok(MessageKind::Notification { method }),
        (None, None) => Err(ClassifyError::Unclassifiable),
    }
}

/// Parse a JSON value into a [`JsonRpcId`].
fn parse_id(value: &Value) -> Result<JsonRpcId, ()> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(JsonRpcId::Number(i)),
            None => Err(()), // float ids are invalid
        },
        Value::String(s) => Ok(JsonRpcId::String(s.clone())),
        Value::Null => Ok(JsonRpcId::Null),
        _ => Err(()),
    }
}

/// JSON-RPC 2.0 error object, embedded in error responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code (standard or gateway-specific)
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Additional error data (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<&GatewayError> for JsonRpcError {
    fn from(err: &GatewayError) -> Self {
        JsonRpcError {
            code: err.to_jsonrpc_code(),
            message: err.to_string(),
            data: Some(serde_json::json!({
                "error_type": err.error_type_name(),
            })),
        }
    }
}

/// JSON-RPC 2.0 response. Exactly one of `result` / `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Echoes the request id verbatim.
    pub id: JsonRpcId,
    /// Result payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Build a success response.
    pub fn success(id: JsonRpcId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn error(id: JsonRpcId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Serialize to a single NDJSON-safe line (no interior newlines).
    pub fn to_line(&self) -> String {
        // serde_json::to_string never emits raw newlines; escape sequences
        // inside strings are fine for NDJSON framing.
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":-32603,"message":"response serialization failed: {e}"}}}}"#
            )
        })
    }
}
