//! Application event bus.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::broadcast;

use crate::platform::{PlatformError, PlatformResult};

/// An event raised by the external service for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub date: Option<i64>,
    pub event: Option<String>,
    pub data: Option<Value>,
    pub from_function: Option<String>,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
}

impl Event {
    pub fn name(&self) -> &str {
        self.event.as_deref().unwrap_or("-")
    }
}

/// Application-side handler for synchronous events.
pub type SyncHandler = Arc<dyn Fn(Event) -> Result<Value, String> + Send + Sync>;

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Deliver without waiting for a result.
    async fn send(&self, event: Event) -> PlatformResult<()>;

    /// Deliver and wait for the application's answer.
    async fn send_sync(&self, event: Event) -> PlatformResult<Value>;
}

/// In-process bus: async events fan out over a broadcast channel, sync
/// events go to a single registered handler.
pub struct LocalEventBus {
    sender: broadcast::Sender<Event>,
    handler: Option<SyncHandler>,
}

impl LocalEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, handler: None }
    }

    pub fn with_handler(mut self, handler: SyncHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventBus for LocalEventBus {
    async fn send(&self, event: Event) -> PlatformResult<()> {
        let name = event.name().to_string();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(event = %name, receivers, "Event published"),
            Err(_) => tracing::debug!(event = %name, "Event dropped, no subscribers"),
        }
        Ok(())
    }

    async fn send_sync(&self, event: Event) -> PlatformResult<Value> {
        let Some(handler) = &self.handler else {
            return Err(PlatformError::NoHandler(event.name().to_string()));
        };
        handler(event).map_err(PlatformError::EventRejected)
    }
}

/// Response body for a synchronous event. Objects pass through, other
/// values are wrapped under `response`, failures under `error`.
pub fn sync_reply(result: PlatformResult<Value>) -> Value {
    match result {
        Ok(Value::Null) => Value::Object(Map::new()),
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => json!({ "response": other }),
        Err(e) => json!({ "error": e.to_string() }),
    }
}
