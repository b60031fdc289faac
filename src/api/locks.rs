use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::http::server::AppState;

pub async fn lock(State(state): State<AppState>, Path(key): Path<String>) -> Json<Value> {
    let acquired = state.platform.locks.lock(&key).await;
    tracing::info!(key = %key, acquired, "Lock requested");
    Json(json!({ "acquired": acquired }))
}

pub async fn unlock(State(state): State<AppState>, Path(key): Path<String>) -> Json<Value> {
    let released = state.platform.locks.unlock(&key).await;
    tracing::info!(key = %key, released, "Unlock requested");
    Json(json!({ "released": released }))
}
