//! Forwarding request and response envelopes.
//!
//! # Responsibilities
//! - Typed inbound request (method, path, query, headers, body)
//! - Canonical `{status, headers, body}` response envelope
//! - Strip connection-layer headers (`Host`, `Content-Length`)
//!
//! # Design Decisions
//! - Header maps are `http::HeaderMap`, so lookups are case-insensitive
//! - Structured documents are rendered as JSON with a JSON content type

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde_json::{Map, Value};

/// True for headers the transport must recompute: never forwarded in
/// either direction.
pub fn is_connection_header(name: &HeaderName) -> bool {
    name == header::HOST || name == header::CONTENT_LENGTH
}

/// Copy a header map without connection-layer headers.
pub fn strip_connection_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_connection_header(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

/// Methods the engine knows how to forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl ForwardMethod {
    /// POST, PUT and PATCH carry the inbound body; the rest send none.
    pub fn carries_body(self) -> bool {
        matches!(self, ForwardMethod::Post | ForwardMethod::Put | ForwardMethod::Patch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ForwardMethod::Get => "GET",
            ForwardMethod::Post => "POST",
            ForwardMethod::Put => "PUT",
            ForwardMethod::Patch => "PATCH",
            ForwardMethod::Delete => "DELETE",
            ForwardMethod::Head => "HEAD",
            ForwardMethod::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for ForwardMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&Method> for ForwardMethod {
    type Error = Method;

    fn try_from(method: &Method) -> Result<Self, Self::Error> {
        match *method {
            Method::GET => Ok(ForwardMethod::Get),
            Method::POST => Ok(ForwardMethod::Post),
            Method::PUT => Ok(ForwardMethod::Put),
            Method::PATCH => Ok(ForwardMethod::Patch),
            Method::DELETE => Ok(ForwardMethod::Delete),
            Method::HEAD => Ok(ForwardMethod::Head),
            Method::OPTIONS => Ok(ForwardMethod::Options),
            _ => Err(method.clone()),
        }
    }
}

impl From<ForwardMethod> for Method {
    fn from(method: ForwardMethod) -> Self {
        match method {
            ForwardMethod::Get => Method::GET,
            ForwardMethod::Post => Method::POST,
            ForwardMethod::Put => Method::PUT,
            ForwardMethod::Patch => Method::PATCH,
            ForwardMethod::Delete => Method::DELETE,
            ForwardMethod::Head => Method::HEAD,
            ForwardMethod::Options => Method::OPTIONS,
        }
    }
}

/// A generic inbound request to be re-issued upstream.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: ForwardMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ForwardRequest {
    pub fn new(method: ForwardMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Trimmed path, "/" when blank.
    pub fn normalized_path(&self) -> String {
        let path = self.path.trim();
        if path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        }
    }

    /// Query parameters in `a=1&b=2` form, order preserved.
    pub fn query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish()
    }
}

/// Body of a forwarding response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Text(String),
    Binary(Bytes),
    /// Structured value passed through as the upstream reported it.
    Json(Value),
    /// Keyed map re-materialized because the upstream declared JSON.
    Document(Map<String, Value>),
}

/// Canonical `{status, headers, body}` envelope.
#[derive(Debug, Clone)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl ForwardResponse {
    pub fn new(body: ResponseBody) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body,
        }
    }

    /// Synthesized 500 carrying a diagnostic message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: HeaderMap::new(),
            body: ResponseBody::Text(message.into()),
        }
    }
}

impl IntoResponse for ForwardResponse {
    fn into_response(self) -> Response {
        let mut headers = strip_connection_headers(&self.headers);

        let bytes = match self.body {
            ResponseBody::Empty => Bytes::new(),
            ResponseBody::Text(text) => Bytes::from(text),
            ResponseBody::Binary(bytes) => bytes,
            ResponseBody::Json(value) => {
                if !headers.contains_key(header::CONTENT_TYPE) {
                    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Bytes::from(value.to_string())
            }
            ResponseBody::Document(map) => {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Bytes::from(Value::Object(map).to_string())
            }
        };

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = self.status;
        *response.headers_mut() = headers;
        response
    }
}
