//! Events and application logs raised by the external service.

use axum::{body::Bytes, extract::State, Json};
use serde_json::{json, Value};

use crate::api::typed_body;
use crate::http::error::ApiResult;
use crate::http::server::AppState;
use crate::platform::events::{sync_reply, Event};
use crate::platform::AppLog;

pub async fn async_event(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let event: Event = typed_body(&body)?;
    tracing::info!(event = %event.name(), "Event received");
    state.platform.events.send(event).await?;
    Ok(Json(json!({})))
}

pub async fn sync_event(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let event: Event = typed_body(&body)?;
    let name = event.name().to_string();
    tracing::info!(event = %name, "Sync event received");

    let result = state.platform.events.send_sync(event).await;
    if let Err(e) = &result {
        tracing::warn!(event = %name, error = %e, "Sync event failed");
    }
    Ok(Json(sync_reply(result)))
}

pub async fn app_log(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let entry: AppLog = typed_body(&body)?;
    state.platform.app_logs.record(entry).await;
    Ok(Json(json!({})))
}
