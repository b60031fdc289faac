//! HTTP client for the external service.
//!
//! # Responsibilities
//! - Issue requests against the single configured base URI
//! - Attach the shared-secret header to every call
//! - Report replies as a `{status, headers, body}` envelope
//!
//! No timeout is configured on the client and failed calls are not retried.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::{Map, Value};
use url::Url;

use crate::config::UpstreamConfig;
use crate::observability::metrics;
use crate::upstream::types::{ReplyBody, UpstreamCall, UpstreamError, UpstreamReply, UpstreamResult};

/// Path on the upstream that serves its configuration.
pub const CONFIGURATION_PATH: &str = "/configuration";

/// Path on the upstream that receives function calls.
pub const FUNCTION_PATH: &str = "/function";

/// Transport to the external service.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Perform one round trip. `Ok(None)` means the transport produced no
    /// reply at all.
    async fn send(&self, call: UpstreamCall) -> UpstreamResult<Option<UpstreamReply>>;

    /// GET a JSON document.
    async fn get_json(&self, path: &str) -> UpstreamResult<Value> {
        let reply = self.send(UpstreamCall::new(Method::GET, path)).await?;
        json_payload(path, reply)
    }

    /// POST a JSON document and read a JSON document back.
    async fn post_json(&self, path: &str, content: &Value) -> UpstreamResult<Value> {
        let call = UpstreamCall::new(Method::POST, path).with_json(content);
        let reply = self.send(call).await?;
        json_payload(path, reply)
    }
}

fn json_payload(path: &str, reply: Option<UpstreamReply>) -> UpstreamResult<Value> {
    let reply = reply.ok_or_else(|| UpstreamError::Failed(format!("no response from [{}]", path)))?;

    if let Some(status) = reply.status.as_ref().and_then(Value::as_u64) {
        if !(200..300).contains(&status) {
            return Err(UpstreamError::Failed(format!(
                "[{}] answered with status {}",
                path, status
            )));
        }
    }

    match reply.body {
        Some(ReplyBody::Empty) | None => Ok(Value::Object(Map::new())),
        Some(body) => body
            .into_json()
            .ok_or_else(|| UpstreamError::Failed(format!("[{}] did not answer with JSON", path))),
    }
}

/// reqwest-backed upstream.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_uri: Url,
    token_header: HeaderName,
    token: String,
}

impl HttpUpstream {
    /// Build a client from configuration. Returns `Ok(None)` when no base URI
    /// is configured.
    pub fn from_config(config: &UpstreamConfig) -> UpstreamResult<Option<Arc<dyn Upstream>>> {
        let Some(uri) = config.base_uri() else {
            return Ok(None);
        };
        let upstream = Self::new(uri, &config.token_header, &config.token)?;
        Ok(Some(Arc::new(upstream)))
    }

    pub fn new(base_uri: &str, token_header: &str, token: &str) -> UpstreamResult<Self> {
        let invalid = |reason: String| UpstreamError::InvalidBaseUri {
            uri: base_uri.to_string(),
            reason,
        };
        let base_uri = Url::parse(base_uri).map_err(|e| invalid(e.to_string()))?;
        if base_uri.cannot_be_a_base() {
            return Err(invalid("not a base URI".to_string()));
        }
        let token_header = HeaderName::from_bytes(token_header.as_bytes())
            .map_err(|e| invalid(format!("token header: {}", e)))?;
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            base_uri,
            token_header,
            token: token.to_string(),
        })
    }

    /// Join a request path onto the base URI, keeping any base path prefix.
    fn url_for(&self, path: &str) -> String {
        let base = self.base_uri.as_str().trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, call: UpstreamCall) -> UpstreamResult<Option<UpstreamReply>> {
        let url = self.url_for(&call.path);

        let mut headers = without_hop_by_hop(call.headers);
        if !self.token.is_empty() {
            let token = HeaderValue::from_str(&self.token)
                .map_err(|e| UpstreamError::Failed(format!("token is not a valid header value: {}", e)))?;
            headers.insert(self.token_header.clone(), token);
        }

        let mut request = self
            .client
            .request(call.method.clone(), url.as_str())
            .query(&call.query)
            .headers(headers);
        if let Some(body) = call.body {
            request = request.body(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_upstream_call("error");
                tracing::warn!(method = %call.method, url = %url, error = %e, "Upstream call failed");
                return Err(e.into());
            }
        };
        metrics::record_upstream_call("ok");

        let status = response.status().as_u16();
        let headers = headers_to_json(response.headers());
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        tracing::debug!(
            method = %call.method,
            url = %url,
            status,
            body_len = bytes.len(),
            "Upstream replied"
        );

        Ok(Some(UpstreamReply {
            status: Some(Value::from(status)),
            headers: Some(headers),
            body: Some(ReplyBody::decode(content_type.as_deref(), bytes)),
        }))
    }
}

/// Framing headers belong to a single connection; reqwest sets its own.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    name == header::CONNECTION
        || name == header::TRANSFER_ENCODING
        || name == header::UPGRADE
        || name == header::TE
        || name == header::TRAILER
        || name.as_str() == "keep-alive"
}

fn without_hop_by_hop(headers: HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if !is_hop_by_hop(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

/// Flatten a header map into a JSON object. A repeated header becomes an
/// array; values like `Set-Cookie` cannot be comma-joined.
fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for name in headers.keys().filter(|name| !is_hop_by_hop(name)) {
        let mut values: Vec<Value> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(Value::from)
            .collect();
        let value = match values.len() {
            0 => continue,
            1 => values.remove(0),
            _ => Value::Array(values),
        };
        map.insert(name.as_str().to_string(), value);
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_join_keeps_prefix() {
        let upstream = HttpUpstream::new("http://dev.local:9000/api/", "token", "t").unwrap();
        assert_eq!(upstream.url_for("/orders"), "http://dev.local:9000/api/orders");
        assert_eq!(upstream.url_for("orders"), "http://dev.local:9000/api/orders");
        assert_eq!(upstream.url_for("/"), "http://dev.local:9000/api/");
    }

    #[test]
    fn test_rejects_bad_base_uri() {
        assert!(matches!(
            HttpUpstream::new("mailto:dev@example.com", "token", ""),
            Err(UpstreamError::InvalidBaseUri { .. })
        ));
        assert!(HttpUpstream::new("not a uri", "token", "").is_err());
    }

    #[test]
    fn test_from_config_without_base_uri() {
        let config = UpstreamConfig::default();
        assert!(HttpUpstream::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_headers_to_json_keeps_repeated_values_apart() {
        let mut headers = HeaderMap::new();
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        assert_eq!(
            headers_to_json(&headers),
            json!({
                "set-cookie": ["a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT", "b=2"],
                "content-type": "text/plain"
            })
        );
    }

    #[test]
    fn test_framing_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        headers.insert("x-kept", HeaderValue::from_static("1"));
        assert_eq!(headers_to_json(&headers), json!({"x-kept": "1"}));
        assert_eq!(without_hop_by_hop(headers).len(), 1);
    }

    #[test]
    fn test_json_payload_rules() {
        let ok = UpstreamReply {
            status: Some(json!(200)),
            headers: None,
            body: Some(ReplyBody::Json(json!([1]))),
        };
        assert_eq!(json_payload("/x", Some(ok)).unwrap(), json!([1]));

        let empty = UpstreamReply {
            status: Some(json!(204)),
            headers: None,
            body: Some(ReplyBody::Empty),
        };
        assert_eq!(json_payload("/x", Some(empty)).unwrap(), json!({}));

        let failed = UpstreamReply {
            status: Some(json!(503)),
            headers: None,
            body: Some(ReplyBody::Text("down".into())),
        };
        assert!(json_payload("/x", Some(failed)).is_err());
        assert!(json_payload("/x", None).is_err());
    }
}
