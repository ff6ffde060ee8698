//! HTTP API tests, driven through the router without a listener

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use lending_server::api::create_router;

use crate::common::{app_state, memory_services};

fn app() -> Router {
    create_router(app_state(memory_services()))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(format!("/api/v1{}", uri));
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_item(app: &Router, code: &str, stock: i32) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/items",
        Some(json!({
            "code": code,
            "title": "Dune",
            "author": "Frank Herbert",
            "category": "sf",
            "stock": stock
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_borrow_and_return_over_http() {
    let app = app();
    let item_id = create_item(&app, "DUNE-1", 1).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/loans",
        Some(json!({ "item_id": item_id, "borrower_id": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["remaining_stock"], 0);
    let loan_id = body["loan_id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/loans",
        Some(json!({ "item_id": item_id, "borrower_id": 8 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "OutOfStock");
    assert_eq!(body["retryable"], false);

    let (status, body) = send(&app, Method::GET, "/borrowers/7/loans?open_only=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["item_code"], "DUNE-1");
    assert_eq!(body[0]["item_author"], "Frank Herbert");

    let uri = format!("/loans/{}/return", loan_id);
    let (status, body) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 1);
    assert_eq!(body["loan"]["status"], "closed");

    // A second return is indistinguishable from an unknown loan
    let (status, body) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchData");
}

#[tokio::test]
async fn test_delete_guard_over_http() {
    let app = app();
    let item_id = create_item(&app, "DUNE-2", 2).await;

    let (_, body) = send(
        &app,
        Method::POST,
        "/loans",
        Some(json!({ "item_id": item_id, "borrower_id": 1 })),
    )
    .await;
    let loan_id = body["loan_id"].as_i64().unwrap();

    let item_uri = format!("/items/{}", item_id);
    let (status, body) = send(&app, Method::DELETE, &item_uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "ItemHasOpenLoans");

    let (status, body) = send(&app, Method::GET, &format!("{}/audit", item_uri), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["open_loans"], 1);
    assert_eq!(body["consistent"], true);

    send(&app, Method::POST, &format!("/loans/{}/return", loan_id), None).await;

    let (status, _) = send(&app, Method::DELETE, &item_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::GET, &item_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchItem");
}

#[tokio::test]
async fn test_malformed_input_is_rejected() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/loans",
        Some(json!({ "item_id": 0, "borrower_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (status, _) = send(&app, Method::POST, "/loans", Some(json!({ "item_id": "one" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/loans/abc/return", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/items",
        Some(json!({ "code": "", "title": "t", "author": "a", "category": "c", "stock": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_item_listing() {
    let app = app();
    create_item(&app, "L-1", 1).await;
    create_item(&app, "L-2", 1).await;

    let (status, body) = send(&app, Method::GET, "/items?category=sf&per_page=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["per_page"], 1);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app, Method::GET, "/items?page=9223372036854775807", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert!(body["items"].as_array().unwrap().is_empty());

    let (status, body) = send(
        &app,
        Method::POST,
        "/items",
        Some(json!({ "code": "L-1", "title": "t", "author": "a", "category": "c", "stock": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Duplicate");
}
