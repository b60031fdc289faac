//! Dispatch surface.
//!
//! # Responsibilities
//! - Declare every route the proxy answers itself
//! - Guard them with the shared-secret check
//!
//! Anything not routed here falls through to the forwarding handler in
//! `http::server`, which does not check the secret.

pub mod auth;
pub mod events;
pub mod files;
pub mod locks;
pub mod service;
pub mod store;

use axum::{
    body::Bytes,
    middleware,
    routing::{get, post, put},
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::http::error::{ApiError, ApiResult};
use crate::http::server::AppState;

use self::auth::service_token_middleware;

pub fn setup_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/configuration", get(service::configuration))
        .route("/cache/clear", put(service::clear_cache))
        .route("/platform/function", post(service::function))
        .route("/platform/metadata", post(service::metadata))
        .route("/event/async", post(events::async_event))
        .route("/event/sync", post(events::sync_event))
        .route("/log", post(events::app_log))
        .route("/file/upload", post(files::upload))
        .route("/file/{file_id}", get(files::download))
        .route("/file/{file_id}/metadata", get(files::metadata))
        .route(
            "/store/{collection}",
            get(store::find).post(store::save).delete(store::delete_all),
        )
        .route("/store/{collection}/count", get(store::count))
        .route(
            "/store/{collection}/{document_id}",
            get(store::find_by_id).put(store::update).delete(store::delete_by_id),
        )
        .route("/lock/{key}", post(locks::lock).delete(locks::unlock))
        .route_layer(middleware::from_fn_with_state(state, service_token_middleware))
}

/// Parse a request body as JSON. An empty body reads as `null`.
pub(crate) fn json_body(body: &Bytes) -> ApiResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))
}

/// Parse a request body into a typed payload. An empty body reads as `{}`.
pub(crate) fn typed_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    let value = match json_body(body)? {
        Value::Null => Value::Object(Map::new()),
        value => value,
    };
    serde_json::from_value(value).map_err(|e| ApiError::BadRequest(format!("invalid payload: {}", e)))
}
