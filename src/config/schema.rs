//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the service proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// External service the proxy forwards to.
    pub upstream: UpstreamConfig,

    /// Values reported back to the external service.
    pub service: ServiceConfig,

    /// Document store settings.
    pub store: StoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream (external service) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URI of the external service. Forwarding is disabled when unset.
    pub base_uri: Option<String>,

    /// Shared secret. Checked on inbound service calls and sent on every
    /// outbound call. An empty token disables the inbound check.
    pub token: String,

    /// Header carrying the shared secret in both directions.
    pub token_header: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_uri: None,
            token: String::new(),
            token_header: "token".to_string(),
        }
    }
}

impl UpstreamConfig {
    /// Base URI with surrounding whitespace removed, `None` when blank.
    pub fn base_uri(&self) -> Option<&str> {
        self.base_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }

    /// Token safe to print in logs: first and last characters only.
    pub fn masked_token(&self) -> String {
        mask_token(&self.token)
    }
}

fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    match chars.len() {
        0 => "-".to_string(),
        1..=4 => "*".repeat(chars.len()),
        n => format!("{}{}{}", chars[0], "*".repeat(n - 2), chars[n - 1]),
    }
}

/// Values the proxy reports about itself.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Public URI under which this proxy's service API is reachable.
    pub web_services_uri: String,

    /// Help link stamped into merged service metadata.
    pub help_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            web_services_uri: "http://localhost:8080".to_string(),
            help_url: "/services_proxy.html#configuration".to_string(),
        }
    }
}

/// Document store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Page size used by `find` when the caller sends no `_size`.
    pub default_page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_page_size: 100,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
