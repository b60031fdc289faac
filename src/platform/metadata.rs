//! Service descriptor merging.
//!
//! # Responsibilities
//! - Fetch and cache the external service's configuration
//! - Replace the proxy's own descriptor sections with the service's
//!
//! # Design Decisions
//! - The cached configuration lives until `clear` is called
//! - A failed fetch is not cached; the next merge retries

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::platform::logs::{AppLog, AppLogSink};
use crate::upstream::{Upstream, UpstreamError, UpstreamResult, CONFIGURATION_PATH};

pub const HELP_URL_KEY: &str = "helpUrl";
pub const PER_USER_KEY: &str = "perUser";

/// Sections copied from the service when present and not null.
const COPY_IF_NOT_NULL: [&str; 3] = ["configuration", "functions", "events"];

/// Sections copied from the service when present and non-empty.
const COPY_IF_NOT_EMPTY: [&str; 4] = ["userConfiguration", "userConfigurationButtons", "js", "listeners"];

type Descriptor = Map<String, Value>;

pub struct MetadataCache {
    upstream: Option<Arc<dyn Upstream>>,
    cached: RwLock<Option<Descriptor>>,
}

impl MetadataCache {
    pub fn new(upstream: Option<Arc<dyn Upstream>>) -> Self {
        Self {
            upstream,
            cached: RwLock::new(None),
        }
    }

    /// The service's configuration, fetched on first use.
    pub async fn configuration(&self) -> UpstreamResult<Option<Descriptor>> {
        let Some(upstream) = &self.upstream else {
            return Ok(None);
        };
        if let Some(cached) = self.cached.read().await.as_ref() {
            return Ok(Some(cached.clone()));
        }

        let fetched = match upstream.get_json(CONFIGURATION_PATH).await? {
            Value::Object(map) => map,
            other => {
                return Err(UpstreamError::Failed(format!(
                    "configuration is not an object: {}",
                    other
                )))
            }
        };
        tracing::info!(sections = fetched.len(), "Properties received from service");

        *self.cached.write().await = Some(fetched.clone());
        Ok(Some(fetched))
    }

    pub async fn clear(&self) {
        *self.cached.write().await = None;
        tracing::info!("Configuration cache cleared");
    }

    /// Merge the service's sections into `descriptor`. Upstream failures
    /// go to the app log and leave the stripped descriptor.
    pub async fn merge_descriptor(&self, descriptor: Descriptor, help_url: &str, logs: &dyn AppLogSink) -> Descriptor {
        match self.configuration().await {
            Ok(service) => merge(descriptor, help_url, service.as_ref()),
            Err(e) => {
                let message = format!("Exception when try to request configuration from service: {}", e);
                tracing::warn!(error = %e, "Configuration request failed");
                logs.record(AppLog::error(message)).await;
                merge(descriptor, help_url, None)
            }
        }
    }
}

/// Stamp `helpUrl`, drop every service-owned section and copy those the
/// service provides.
pub fn merge(mut descriptor: Descriptor, help_url: &str, service: Option<&Descriptor>) -> Descriptor {
    descriptor.insert(HELP_URL_KEY.to_string(), Value::String(help_url.to_string()));
    descriptor.remove(PER_USER_KEY);
    for key in COPY_IF_NOT_NULL.iter().chain(COPY_IF_NOT_EMPTY.iter()) {
        descriptor.remove(*key);
    }

    let Some(service) = service else {
        return descriptor;
    };

    let per_user = service.get(PER_USER_KEY).and_then(Value::as_bool).unwrap_or(false);
    descriptor.insert(PER_USER_KEY.to_string(), Value::Bool(per_user));

    for key in COPY_IF_NOT_NULL {
        match service.get(key) {
            Some(Value::Null) | None => {}
            Some(value) => {
                descriptor.insert(key.to_string(), value.clone());
            }
        }
    }
    for key in COPY_IF_NOT_EMPTY {
        if let Some(value) = service.get(key).filter(|value| !is_empty(value)) {
            descriptor.insert(key.to_string(), value.clone());
        }
    }
    descriptor
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{ReplyBody, UpstreamCall, UpstreamReply};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn object(value: Value) -> Descriptor {
        value.as_object().cloned().unwrap()
    }

    struct ConfigUpstream {
        answer: Option<Value>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Upstream for ConfigUpstream {
        async fn send(&self, call: UpstreamCall) -> UpstreamResult<Option<UpstreamReply>> {
            assert_eq!(call.path, CONFIGURATION_PATH);
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                Some(Value::Object(map)) => Ok(Some(UpstreamReply {
                    status: Some(json!(200)),
                    headers: Some(json!({})),
                    body: Some(ReplyBody::Map(map.clone())),
                })),
                _ => Err(UpstreamError::Failed("connection refused".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingLogs(Mutex<Vec<AppLog>>);

    #[async_trait]
    impl AppLogSink for RecordingLogs {
        async fn record(&self, entry: AppLog) {
            self.0.lock().unwrap().push(entry);
        }
    }

    #[test]
    fn test_merge_replaces_service_sections() {
        let descriptor = object(json!({
            "name": "proxy",
            "perUser": true,
            "functions": [{"label": "proxy fn"}],
            "js": "old()"
        }));
        let service = object(json!({
            "perUser": "yes",
            "configuration": [{"name": "key"}],
            "functions": [{"label": "service fn"}],
            "events": null,
            "userConfiguration": [],
            "js": "new()",
            "listeners": ""
        }));

        let merged = merge(descriptor, "https://help", Some(&service));
        assert_eq!(
            Value::Object(merged),
            json!({
                "name": "proxy",
                "helpUrl": "https://help",
                "perUser": false,
                "configuration": [{"name": "key"}],
                "functions": [{"label": "service fn"}],
                "js": "new()"
            })
        );
    }

    #[test]
    fn test_merge_without_service_strips_sections() {
        let descriptor = object(json!({"name": "proxy", "events": [], "listeners": "x", "perUser": true}));
        let merged = merge(descriptor, "h", None);
        assert_eq!(Value::Object(merged), json!({"name": "proxy", "helpUrl": "h"}));
    }

    #[tokio::test]
    async fn test_configuration_is_cached_until_cleared() {
        let upstream = Arc::new(ConfigUpstream {
            answer: Some(json!({"perUser": true})),
            calls: AtomicUsize::new(0),
        });
        let cache = MetadataCache::new(Some(upstream.clone()));

        cache.configuration().await.unwrap();
        cache.configuration().await.unwrap();
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);

        cache.clear().await;
        let config = cache.configuration().await.unwrap().unwrap();
        assert_eq!(config["perUser"], json!(true));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_logged_and_not_cached() {
        let upstream = Arc::new(ConfigUpstream {
            answer: None,
            calls: AtomicUsize::new(0),
        });
        let cache = MetadataCache::new(Some(upstream.clone()));
        let logs = RecordingLogs::default();

        let merged = cache
            .merge_descriptor(object(json!({"perUser": true})), "h", &logs)
            .await;
        assert_eq!(Value::Object(merged), json!({"helpUrl": "h"}));

        cache.merge_descriptor(Descriptor::new(), "h", &logs).await;
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);

        let entries = logs.0.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].message.as_deref().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_no_upstream_means_no_configuration() {
        let cache = MetadataCache::new(None);
        assert!(cache.configuration().await.unwrap().is_none());
    }
}
