//! Proxy status, cache control and calls toward the external service.

use axum::{body::Bytes, extract::State, Json};
use serde_json::{json, Map, Value};

use crate::api::typed_body;
use crate::http::error::ApiResult;
use crate::http::server::AppState;
use crate::platform::functions::{self, FunctionCall};

pub async fn configuration(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "proxy": true,
        "webServicesUri": state.config.service.web_services_uri,
    }))
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    state.platform.metadata.clear().await;
    Json(json!({}))
}

pub async fn function(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let call: FunctionCall = typed_body(&body)?;
    let result = functions::invoke(state.upstream.as_deref(), state.platform.app_logs.as_ref(), call).await?;
    Ok(Json(result))
}

pub async fn metadata(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let descriptor: Map<String, Value> = typed_body(&body)?;
    let merged = state
        .platform
        .metadata
        .merge_descriptor(descriptor, &state.config.service.help_url, state.platform.app_logs.as_ref())
        .await;
    Ok(Json(Value::Object(merged)))
}
