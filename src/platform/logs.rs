//! Application log entries sent by the external service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppLogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl AppLogLevel {
    /// Case-insensitive; unknown levels read as `Info`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => AppLogLevel::Debug,
            "warn" | "warning" => AppLogLevel::Warn,
            "error" => AppLogLevel::Error,
            _ => AppLogLevel::Info,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppLog {
    pub date: Option<i64>,
    pub level: Option<String>,
    pub message: Option<String>,
    pub additional_info: Option<Value>,
}

impl AppLog {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Some("error".to_string()),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn level(&self) -> AppLogLevel {
        self.level.as_deref().map(AppLogLevel::parse).unwrap_or_default()
    }
}

#[async_trait]
pub trait AppLogSink: Send + Sync {
    async fn record(&self, entry: AppLog);
}

/// Writes application logs through `tracing` on the `app_log` target.
#[derive(Debug, Clone, Default)]
pub struct TracingAppLogs;

#[async_trait]
impl AppLogSink for TracingAppLogs {
    async fn record(&self, entry: AppLog) {
        let message = entry.message.as_deref().unwrap_or("");
        let info = entry.additional_info.as_ref().map(Value::to_string);
        let info = info.as_deref().unwrap_or("-");
        let date = entry.date.unwrap_or_default();

        match entry.level() {
            AppLogLevel::Debug => tracing::debug!(target: "app_log", date, info, "{}", message),
            AppLogLevel::Info => tracing::info!(target: "app_log", date, info, "{}", message),
            AppLogLevel::Warn => tracing::warn!(target: "app_log", date, info, "{}", message),
            AppLogLevel::Error => tracing::error!(target: "app_log", date, info, "{}", message),
        }
    }
}
