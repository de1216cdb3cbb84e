// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Route registration tests for POST /parse_receipt
//!
//! These tests drive the full router so status codes and JSON bodies are
//! checked exactly as a client would see them.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use receipt_parser::api::{create_app, AppState};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

use crate::common::{full_receipt_ids, state_with_stub, StubModel};

async fn post_json(app: Router, body: &str) -> (StatusCode, Option<Value>) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/parse_receipt")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).ok())
}

#[tokio::test]
async fn test_parse_receipt_success_over_http() {
    let (_dir, state, _store) = state_with_stub(StubModel::returning(full_receipt_ids())).await;

    let (status, body) = post_json(create_app(state), r#"{"s3_url": "s3://receipts/scan.png"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body.unwrap(),
        json!({
            "issuer_ruc": "20123456789",
            "document_series": "F001",
            "document_number": "00012345",
            "issue_date": "2024-03-15",
            "total": "59.00"
        })
    );
}

#[tokio::test]
async fn test_model_not_loaded_body() {
    let (status, body) = post_json(
        create_app(AppState::new_for_test()),
        r#"{"s3_url": "s3://receipts/scan.png"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.unwrap(), json!({"detail": "Model is not loaded."}));
}

#[tokio::test]
async fn test_bad_url_body() {
    let (_dir, state, _store) = state_with_stub(StubModel::returning(full_receipt_ids())).await;

    let (status, body) = post_json(create_app(state), r#"{"s3_url": "ftp://receipts/scan.png"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body.unwrap(),
        json!({"detail": "Error fetching image from S3: URL must start with s3://"})
    );
}

#[tokio::test]
async fn test_malformed_json_body() {
    let (_dir, state, _store) = state_with_stub(StubModel::returning(full_receipt_ids())).await;

    let (status, body) = post_json(create_app(state), r#"{"s3_url": "#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body.unwrap()["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Failed to parse the request body as JSON"));
}

#[tokio::test]
async fn test_missing_url_field() {
    let (_dir, state, _store) = state_with_stub(StubModel::returning(full_receipt_ids())).await;

    let (status, body) = post_json(create_app(state), r#"{"url": 5}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = body.unwrap();
    assert_eq!(body.as_object().unwrap().len(), 1);
    assert!(body["detail"].as_str().unwrap().contains("missing field `s3_url`"));
}
