//! Generic forwarding engine.
//!
//! # Responsibilities
//! - Re-issue one inbound request against the upstream
//! - Normalize the upstream reply into a `ForwardResponse`
//!
//! # Design Decisions
//! - Exactly one upstream round trip per call, no retries
//! - Malformed status or headers are logged and defaulted, never fatal
//! - A keyed-map body becomes a document only under a JSON content type

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde_json::Value;

use crate::forward::envelope::{
    is_connection_header, strip_connection_headers, ForwardMethod, ForwardRequest, ForwardResponse,
    ResponseBody,
};
use crate::upstream::{is_json_content_type, ReplyBody, Upstream, UpstreamCall, UpstreamReply, UpstreamResult};

/// Forwards requests that no dispatch route claimed.
#[derive(Clone)]
pub struct Forwarder {
    upstream: Option<Arc<dyn Upstream>>,
}

impl Forwarder {
    pub fn new(upstream: Option<Arc<dyn Upstream>>) -> Self {
        Self { upstream }
    }

    /// Whether an upstream is configured.
    pub fn is_enabled(&self) -> bool {
        self.upstream.is_some()
    }

    /// Forward one request. `Ok(None)` means "not handled": no upstream is
    /// configured and the caller should fall back to its default handling.
    pub async fn forward(&self, request: ForwardRequest) -> UpstreamResult<Option<ForwardResponse>> {
        let Some(upstream) = &self.upstream else {
            return Ok(None);
        };

        let method = request.method;
        let path = request.normalized_path();
        let query = request.query_string();

        tracing::info!(
            method = %method,
            path = %path,
            query = %query,
            "Generic web service request"
        );
        if method.carries_body() {
            tracing::debug!(
                method = %method,
                body = %request
                    .body
                    .as_ref()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .unwrap_or_else(|| "-".to_string()),
                "Generic web service request body"
            );
        }

        let call = UpstreamCall {
            method: method.into(),
            path,
            query: request.query,
            headers: strip_connection_headers(&request.headers),
            body: if method.carries_body() { request.body } else { None },
        };

        let reply = upstream.send(call).await?;
        Ok(Some(normalize(method, reply)))
    }
}

/// Turn an upstream reply into the canonical envelope.
pub fn normalize(method: ForwardMethod, reply: Option<UpstreamReply>) -> ForwardResponse {
    let Some(reply) = reply else {
        tracing::warn!(method = %method, "Upstream produced no response");
        return ForwardResponse::failure(format!(
            "Invalid response to [{}] method: no response",
            method
        ));
    };

    let Some(raw_body) = reply.body.clone() else {
        tracing::warn!(method = %method, reply = ?reply, "Upstream response has no body field");
        return ForwardResponse::failure(format!(
            "Invalid response to [{}] method: {:?}",
            method, reply
        ));
    };

    let status = match reply.status.as_ref() {
        None => StatusCode::OK,
        Some(raw) => parse_status(raw).unwrap_or_else(|reason| {
            tracing::warn!(
                method = %method,
                status = %raw,
                reason = %reason,
                "Invalid upstream status code - 200 is returned"
            );
            StatusCode::OK
        }),
    };

    let headers = match reply.headers.as_ref() {
        None => HeaderMap::new(),
        Some(raw) => copy_headers(raw).unwrap_or_else(|reason| {
            tracing::warn!(
                method = %method,
                headers = %raw,
                reason = %reason,
                "Invalid upstream headers - empty headers are returned"
            );
            HeaderMap::new()
        }),
    };

    let body = match raw_body {
        ReplyBody::Map(map) if declares_json(&headers) => {
            tracing::info!(method = %method, "Body response fixed to Json");
            ResponseBody::Document(map)
        }
        ReplyBody::Map(map) => ResponseBody::Json(Value::Object(map)),
        ReplyBody::Json(value) => ResponseBody::Json(value),
        ReplyBody::Text(text) => ResponseBody::Text(text),
        ReplyBody::Binary(bytes) => ResponseBody::Binary(bytes),
        ReplyBody::Empty => ResponseBody::Empty,
    };

    tracing::info!(
        method = %method,
        status = status.as_u16(),
        headers = headers.len(),
        body = body_kind(&body),
        "Generic web service response"
    );

    ForwardResponse { status, headers, body }
}

fn parse_status(raw: &Value) -> Result<StatusCode, String> {
    let code = match raw {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| format!("'{}' is not an integer", n))?,
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("'{}': {}", s, e))?,
        other => return Err(format!("unexpected status value {}", other)),
    };
    let code = u16::try_from(code).map_err(|_| format!("{} is out of range", code))?;
    StatusCode::from_u16(code).map_err(|e| e.to_string())
}

/// Copy reply headers, skipping connection-layer ones and values that are
/// not valid header text.
fn copy_headers(raw: &Value) -> Result<HeaderMap, String> {
    let Value::Object(entries) = raw else {
        return Err(format!("expected an object, got {}", raw));
    };

    let mut headers = HeaderMap::with_capacity(entries.len());
    for (name, value) in entries {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            tracing::warn!(header = %name, "Skipping invalid upstream header name");
            continue;
        };
        if is_connection_header(&name) {
            continue;
        }

        let values = match value {
            Value::Array(items) => items.iter().filter_map(header_text).collect(),
            other => header_text(other).into_iter().collect::<Vec<_>>(),
        };
        for text in values {
            match HeaderValue::from_str(&text) {
                Ok(v) => {
                    headers.append(name.clone(), v);
                }
                Err(_) => {
                    tracing::warn!(header = %name, "Skipping invalid upstream header value");
                }
            }
        }
    }
    Ok(headers)
}

fn header_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn declares_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_json_content_type)
}

fn body_kind(body: &ResponseBody) -> &'static str {
    match body {
        ResponseBody::Empty => "empty",
        ResponseBody::Text(_) => "text",
        ResponseBody::Binary(_) => "binary",
        ResponseBody::Json(_) => "json",
        ResponseBody::Document(_) => "document",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::UpstreamError;
    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::{json, Map};
    use std::sync::Mutex;

    /// Records the last call and answers with a canned result.
    struct StubUpstream {
        reply: Mutex<Option<UpstreamResult<Option<UpstreamReply>>>>,
        last_call: Mutex<Option<UpstreamCall>>,
    }

    impl StubUpstream {
        fn answering(reply: UpstreamResult<Option<UpstreamReply>>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                last_call: Mutex::new(None),
            })
        }

        fn last_call(&self) -> UpstreamCall {
            self.last_call.lock().unwrap().clone().expect("no call recorded")
        }
    }

    #[async_trait]
    impl Upstream for StubUpstream {
        async fn send(&self, call: UpstreamCall) -> UpstreamResult<Option<UpstreamReply>> {
            *self.last_call.lock().unwrap() = Some(call);
            self.reply.lock().unwrap().take().expect("stub called twice")
        }
    }

    fn reply(status: Value, headers: Value, body: ReplyBody) -> UpstreamReply {
        UpstreamReply {
            status: Some(status),
            headers: Some(headers),
            body: Some(body),
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn test_not_handled_without_upstream() {
        let forwarder = Forwarder::new(None);
        assert!(!forwarder.is_enabled());
        let result = forwarder
            .forward(ForwardRequest::new(ForwardMethod::Get, "/x"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_get_drops_body_and_connection_headers() {
        let stub = StubUpstream::answering(Ok(Some(reply(json!(200), json!({}), ReplyBody::Empty))));
        let forwarder = Forwarder::new(Some(stub.clone()));

        let request = ForwardRequest::new(ForwardMethod::Get, "")
            .with_query("page", "2")
            .with_header(header::HOST, HeaderValue::from_static("proxy.local"))
            .with_header(header::CONTENT_LENGTH, HeaderValue::from_static("3"))
            .with_header(HeaderName::from_static("x-app"), HeaderValue::from_static("demo"))
            .with_body("abc");
        forwarder.forward(request).await.unwrap().unwrap();

        let call = stub.last_call();
        assert_eq!(call.path, "/");
        assert_eq!(call.query, vec![("page".to_string(), "2".to_string())]);
        assert!(call.body.is_none());
        assert!(call.headers.get(header::HOST).is_none());
        assert!(call.headers.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(call.headers.get("x-app").unwrap(), "demo");
    }

    #[tokio::test]
    async fn test_post_carries_body_unmodified() {
        let stub = StubUpstream::answering(Ok(Some(reply(json!(201), json!({}), ReplyBody::Empty))));
        let forwarder = Forwarder::new(Some(stub.clone()));

        let request = ForwardRequest::new(ForwardMethod::Post, "/orders").with_body(&b"\x00raw"[..]);
        let response = forwarder.forward(request).await.unwrap().unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(stub.last_call().body, Some(Bytes::from_static(b"\x00raw")));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let stub = StubUpstream::answering(Err(UpstreamError::Failed("connection refused".into())));
        let forwarder = Forwarder::new(Some(stub));
        let err = forwarder
            .forward(ForwardRequest::new(ForwardMethod::Delete, "/x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_no_reply_is_500() {
        let response = normalize(ForwardMethod::Put, None);
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.body,
            ResponseBody::Text("Invalid response to [PUT] method: no response".into())
        );
    }

    #[test]
    fn test_missing_body_is_500_with_raw_reply() {
        let raw = UpstreamReply {
            status: Some(json!(200)),
            headers: None,
            body: None,
        };
        let response = normalize(ForwardMethod::Get, Some(raw));
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        match response.body {
            ResponseBody::Text(text) => {
                assert!(text.starts_with("Invalid response to [GET] method: "));
                assert!(text.contains("200"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_204_without_body() {
        let response = normalize(
            ForwardMethod::Get,
            Some(reply(
                json!(204),
                json!({"Host": "upstream", "Content-Length": "0", "X-Id": "1"}),
                ReplyBody::Empty,
            )),
        );
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert_eq!(response.body, ResponseBody::Empty);
        assert!(response.headers.get(header::HOST).is_none());
        assert!(response.headers.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(response.headers.get("x-id").unwrap(), "1");
    }

    #[test]
    fn test_map_under_json_content_type_is_document() {
        let map = object(json!({"a": 1}));
        let response = normalize(
            ForwardMethod::Get,
            Some(reply(
                json!(200),
                json!({"Content-Type": "application/json; charset=utf-8"}),
                ReplyBody::Map(map.clone()),
            )),
        );
        assert_eq!(response.body, ResponseBody::Document(map));
    }

    #[test]
    fn test_map_without_json_content_type_passes_through() {
        let map = object(json!({"a": 1}));
        let response = normalize(
            ForwardMethod::Get,
            Some(reply(json!(200), json!({}), ReplyBody::Map(map.clone()))),
        );
        assert_eq!(response.body, ResponseBody::Json(Value::Object(map)));
    }

    #[test]
    fn test_text_plain_stays_text() {
        let response = normalize(
            ForwardMethod::Get,
            Some(reply(
                json!(200),
                json!({"Content-Type": "text/plain"}),
                ReplyBody::Text(r#"{"a":1}"#.into()),
            )),
        );
        assert_eq!(response.body, ResponseBody::Text(r#"{"a":1}"#.into()));
    }

    #[test]
    fn test_malformed_status_defaults_to_200() {
        for raw in [json!("abc"), json!(-3), json!(70000), json!(true), json!(2.5)] {
            let response = normalize(
                ForwardMethod::Get,
                Some(reply(raw, json!({}), ReplyBody::Text("ok".into()))),
            );
            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(response.body, ResponseBody::Text("ok".into()));
        }
    }

    #[test]
    fn test_string_status_is_parsed() {
        let response = normalize(
            ForwardMethod::Get,
            Some(reply(json!(" 404 "), json!({}), ReplyBody::Empty)),
        );
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_malformed_headers_become_empty() {
        let response = normalize(
            ForwardMethod::Get,
            Some(reply(json!(200), json!("nope"), ReplyBody::Text("x".into()))),
        );
        assert!(response.headers.is_empty());
        assert_eq!(response.status, StatusCode::OK);
    }

    #[test]
    fn test_header_values_are_coerced() {
        let response = normalize(
            ForwardMethod::Get,
            Some(reply(
                json!(200),
                json!({"x-count": 3, "x-multi": ["a", "b"], "x-null": null, "bad name": "v"}),
                ReplyBody::Empty,
            )),
        );
        assert_eq!(response.headers.get("x-count").unwrap(), "3");
        let multi: Vec<_> = response.headers.get_all("x-multi").iter().collect();
        assert_eq!(multi, vec!["a", "b"]);
        assert!(response.headers.get("x-null").is_none());
        assert_eq!(response.headers.len(), 3);
    }
}
