//! Upstream call/reply types and error definitions.

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur while talking to the upstream service.
///
/// Timeouts, refused connections and protocol errors are not told apart.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The call failed or the reply could not be understood.
    #[error("upstream request failed: {0}")]
    Failed(String),

    /// The configured base URI cannot be used.
    #[error("invalid upstream base URI '{uri}': {reason}")]
    InvalidBaseUri { uri: String, reason: String },
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        UpstreamError::Failed(e.to_string())
    }
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// One outbound request, relative to the upstream base URI.
#[derive(Debug, Clone)]
pub struct UpstreamCall {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl UpstreamCall {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Attach a JSON body and the matching content type.
    pub fn with_json(mut self, value: &Value) -> Self {
        self.headers.insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/json"),
        );
        self.body = Some(Bytes::from(value.to_string()));
        self
    }
}

/// Reply envelope as reported by a transport.
///
/// Status and headers stay loosely typed: the forwarding engine sanitizes
/// them and recovers locally when they are malformed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamReply {
    pub status: Option<Value>,
    pub headers: Option<Value>,
    pub body: Option<ReplyBody>,
}

/// Body of an upstream reply after content decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Empty,
    /// Generic keyed map decoded from a JSON object.
    Map(Map<String, Value>),
    /// Any other JSON value.
    Json(Value),
    Text(String),
    Binary(Bytes),
}

impl ReplyBody {
    /// Decode raw bytes the way the upstream client reports them: JSON
    /// for `application/json` bodies that parse, text when it is UTF-8,
    /// raw bytes otherwise. Other JSON flavours (`application/problem+json`)
    /// stay text so they pass through byte for byte.
    pub fn decode(content_type: Option<&str>, bytes: Bytes) -> Self {
        if bytes.is_empty() {
            return ReplyBody::Empty;
        }

        if content_type.is_some_and(is_json_content_type) {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => return ReplyBody::Map(map),
                Ok(value) => return ReplyBody::Json(value),
                Err(e) => {
                    tracing::debug!(error = %e, "Upstream declared JSON but body did not parse");
                }
            }
        }

        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => ReplyBody::Text(text),
            Err(_) => ReplyBody::Binary(bytes),
        }
    }

    /// JSON view of the body, if it has one.
    pub fn into_json(self) -> Option<Value> {
        match self {
            ReplyBody::Map(map) => Some(Value::Object(map)),
            ReplyBody::Json(value) => Some(value),
            ReplyBody::Empty | ReplyBody::Text(_) | ReplyBody::Binary(_) => None,
        }
    }
}

/// Content types whose JSON bodies are decoded and re-materialized.
pub fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("application/json")
}
