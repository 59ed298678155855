//! Structured error taxonomy shared by every tool action.
//!
//! Mirrors the wire contract from spec.md §7: every dispatcher call either
//! succeeds with a JSON object or fails with `{"error": {code, message, data}}`.
//! `ToolError` is the single typed representation; components return
//! `anyhow::Result` internally (matching the teacher's style) and only the
//! dispatcher boundary narrows to this enum.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidParameter,
    SystemNotFound,
    TypeNotFound,
    RouteNotFound,
    SourceUnavailable,
    RateLimited,
    IntegrityError,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn retryable(&self) -> bool {
        matches!(self, ErrorKind::SourceUnavailable | ErrorKind::RateLimited)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<Value>,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn invalid_parameter(param: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(
            ErrorKind::InvalidParameter,
            format!("invalid parameter `{param}`: {reason}"),
        )
        .with_data(serde_json::json!({ "parameter": param, "reason": reason }))
    }

    pub fn system_not_found(query: &str, suggestions: Vec<String>) -> Self {
        Self::new(
            ErrorKind::SystemNotFound,
            format!("system not found: {query}"),
        )
        .with_data(serde_json::json!({ "query": query, "suggestions": suggestions }))
    }

    pub fn type_not_found(query: &str, suggestions: Vec<String>) -> Self {
        Self::new(
            ErrorKind::TypeNotFound,
            format!("item type not found: {query}"),
        )
        .with_data(serde_json::json!({ "query": query, "suggestions": suggestions }))
    }

    pub fn route_not_found(origin: &str, destination: &str) -> Self {
        Self::new(
            ErrorKind::RouteNotFound,
            format!("no route from {origin} to {destination}"),
        )
        .with_data(serde_json::json!({
            "origin": origin,
            "destination": destination,
            "reason": "no_path",
        }))
    }

    pub fn source_unavailable(source: &str) -> Self {
        Self::new(
            ErrorKind::SourceUnavailable,
            format!("upstream source `{source}` is unavailable"),
        )
        .with_data(serde_json::json!({ "source": source }))
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::new(ErrorKind::RateLimited, "upstream rate limit exceeded").with_data(
            serde_json::json!({ "retry_after_seconds": retry_after_secs }),
        )
    }

    pub fn integrity_error(path: &str) -> Self {
        Self::new(
            ErrorKind::IntegrityError,
            format!("checksum mismatch for `{path}`"),
        )
        .with_data(serde_json::json!({ "path": path }))
    }

    pub fn cancelled(in_flight: &str) -> Self {
        Self::new(
            ErrorKind::Cancelled,
            format!("call cancelled while waiting on {in_flight}"),
        )
        .with_data(serde_json::json!({ "in_flight": in_flight }))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn retryable(&self) -> bool {
        self.kind.retryable()
    }

    /// Render the `{"error": {...}}` envelope the tool surface returns on failure.
    pub fn to_envelope(&self) -> Value {
        serde_json::json!({
            "error": {
                "code": self.kind,
                "message": self.message,
                "data": self.data.clone().unwrap_or(Value::Null),
                "retryable": self.kind.retryable(),
            }
        })
    }
}

/// Any unexpected internal failure (invariant violation, panic boundary) is
/// folded into `Internal` rather than leaking implementation detail, matching
/// §7's propagation rule that the dispatcher never relabels a typed error but
/// anything untyped becomes `Internal`.
impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        ToolError::internal(err.to_string())
    }
}

impl From<rusqlite::Error> for ToolError {
    fn from(err: rusqlite::Error) -> Self {
        ToolError::internal(format!("store error: {err}"))
    }
}

pub type ToolResult<T> = Result<T, ToolError>;
