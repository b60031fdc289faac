//! Document store routes driven through the full router.

use axum::body::Body;
use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;
use common::{app, config, json_body, request, send_json};

fn router() -> axum::Router {
    app(config(None))
}

#[tokio::test]
async fn test_generated_id_lifecycle() {
    let router = router();

    let (status, saved) = send_json(
        &router,
        request("POST", "/store/orders")
            .body(json_body(json!({"customer": "A", "total": 10})))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = saved["id"].as_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&id).is_ok());
    assert_eq!(saved, json!({"id": id, "customer": "A", "total": 10}));

    let (_, found) = send_json(
        &router,
        request("GET", &format!("/store/orders/{}", id)).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(found, saved);

    let (_, removed) = send_json(
        &router,
        request("DELETE", &format!("/store/orders/{}", id)).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(removed, json!({"result": true, "total": 1}));

    let (status, gone) = send_json(
        &router,
        request("GET", &format!("/store/orders/{}", id)).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gone, json!({}));

    let (_, again) = send_json(
        &router,
        request("DELETE", &format!("/store/orders/{}", id)).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(again, json!({"result": false, "total": 0}));
}

#[tokio::test]
async fn test_collections_do_not_leak_into_each_other() {
    let router = router();
    for (collection, kind) in [("orders", "order"), ("invoices", "invoice")] {
        let (status, _) = send_json(
            &router,
            request("PUT", &format!("/store/{}/42", collection))
                .body(json_body(json!({"kind": kind})))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, listed) = send_json(&router, request("GET", "/store/orders").body(Body::empty()).unwrap()).await;
    assert_eq!(
        listed,
        json!({"items": [{"id": "42", "kind": "order"}], "total": 1, "offset": 0})
    );

    let (_, count) = send_json(&router, request("GET", "/store/invoices/count").body(Body::empty()).unwrap()).await;
    assert_eq!(count, json!({"total": 1}));
}

#[tokio::test]
async fn test_update_replaces_payload_under_same_id() {
    let router = router();
    for payload in [json!({"v": 1, "old": true}), json!({"v": 2})] {
        send_json(
            &router,
            request("PUT", "/store/orders/o-1").body(json_body(payload)).unwrap(),
        )
        .await;
    }

    let (_, listed) = send_json(&router, request("GET", "/store/orders").body(Body::empty()).unwrap()).await;
    assert_eq!(listed["total"], json!(1));
    assert_eq!(listed["items"][0], json!({"id": "o-1", "v": 2}));
}

#[tokio::test]
async fn test_query_by_id_matches_find_by_id() {
    let router = router();
    for id in ["a", "b", "c"] {
        send_json(
            &router,
            request("PUT", &format!("/store/orders/{}", id))
                .body(json_body(json!({"name": id})))
                .unwrap(),
        )
        .await;
    }

    let (_, by_query) = send_json(&router, request("GET", "/store/orders?id=b").body(Body::empty()).unwrap()).await;
    let (_, by_path) = send_json(&router, request("GET", "/store/orders/b").body(Body::empty()).unwrap()).await;
    assert_eq!(by_query["items"], Value::Array(vec![by_path]));
}

#[tokio::test]
async fn test_filters_pagination_and_delete_all() {
    let router = router();
    for (id, status, qty) in [("1", "open", 5), ("2", "open", 15), ("3", "closed", 25)] {
        send_json(
            &router,
            request("PUT", &format!("/store/orders/{}", id))
                .body(json_body(json!({"status": status, "qty": qty})))
                .unwrap(),
        )
        .await;
    }

    let (_, open) = send_json(
        &router,
        request("GET", "/store/orders?status=open&_size=1&_offset=1").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(open["total"], json!(2));
    assert_eq!(open["offset"], json!(1));
    assert_eq!(open["items"], json!([{"id": "2", "status": "open", "qty": 15}]));

    let (_, large) = send_json(
        &router,
        request("GET", "/store/orders/count?qty=gt(10)").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(large, json!({"total": 2}));

    let (_, removed) = send_json(
        &router,
        request("DELETE", "/store/orders?status=open").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(removed, json!({"result": true, "total": 1}));

    let (_, remaining) = send_json(&router, request("GET", "/store/orders/count").body(Body::empty()).unwrap()).await;
    assert_eq!(remaining, json!({"total": 1}));
}

#[tokio::test]
async fn test_internal_fields_never_surface() {
    let router = router();
    let (_, saved) = send_json(
        &router,
        request("POST", "/store/orders")
            .body(json_body(json!({"id": "x-1", "_id": "forced", "__ds_name__": "invoices", "a": 1})))
            .unwrap(),
    )
    .await;
    assert_eq!(saved, json!({"id": "x-1", "a": 1}));

    let (_, listed) = send_json(&router, request("GET", "/store/orders").body(Body::empty()).unwrap()).await;
    let item = listed["items"][0].as_object().unwrap();
    assert!(item.keys().all(|k| k == "id" || k == "a"));
}

#[tokio::test]
async fn test_bad_requests() {
    let router = router();

    let (status, body) = send_json(
        &router,
        request("POST", "/store/orders").body(Body::from("{not json")).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid JSON"));

    let (status, _) = send_json(
        &router,
        request("POST", "/store/orders").body(Body::from("[1, 2]")).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(
        &router,
        request("POST", "/store/%20").body(json_body(json!({}))).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_is_required() {
    let router = router();

    let missing = axum::http::Request::builder()
        .uri("/store/orders")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_json(&router, missing).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let wrong = axum::http::Request::builder()
        .uri("/store/orders")
        .header("token", "nope")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send_json(&router, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
