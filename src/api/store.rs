//! Document store routes.
//!
//! Query parameters become filters; `id` addresses the document id and
//! `_size` / `_offset` paginate `find`.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Map, Value};

use crate::api::json_body;
use crate::http::error::ApiResult;
use crate::http::server::AppState;
use crate::store::{document_from_json, FindResult};

type Params = Vec<(String, String)>;

pub async fn find(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<Params>,
) -> ApiResult<Json<FindResult>> {
    Ok(Json(state.documents.find(&collection, &params).await?))
}

pub async fn count(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<Params>,
) -> ApiResult<Json<Value>> {
    let total = state.documents.count(&collection, &params).await?;
    Ok(Json(json!({ "total": total })))
}

pub async fn find_by_id(
    State(state): State<AppState>,
    Path((collection, document_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let document = state
        .documents
        .find_by_id(&collection, &document_id)
        .await?
        .unwrap_or_else(Map::new);
    Ok(Json(Value::Object(document)))
}

pub async fn save(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let document = document_from_json(json_body(&body)?)?;
    let saved = state.documents.save_or_update(&collection, None, &document).await?;
    Ok(Json(Value::Object(saved)))
}

pub async fn update(
    State(state): State<AppState>,
    Path((collection, document_id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let document = document_from_json(json_body(&body)?)?;
    let saved = state
        .documents
        .save_or_update(&collection, Some(&document_id), &document)
        .await?;
    Ok(Json(Value::Object(saved)))
}

pub async fn delete_by_id(
    State(state): State<AppState>,
    Path((collection, document_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let removed = state.documents.delete_by_id(&collection, &document_id).await?;
    Ok(Json(removal(removed)))
}

pub async fn delete_all(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<Params>,
) -> ApiResult<Json<Value>> {
    let removed = state.documents.delete_all(&collection, &params).await?;
    Ok(Json(removal(removed)))
}

fn removal(removed: bool) -> Value {
    json!({ "result": removed, "total": if removed { 1 } else { 0 } })
}
