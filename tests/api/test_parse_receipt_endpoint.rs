// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Handler tests for POST /parse_receipt
//!
//! These tests verify that parse_receipt_handler:
//! - Reports a missing model before touching storage
//! - Maps URL, storage and image failures to 400
//! - Returns the five-field projection of the parsed structure
//! - Keeps the 200 diagnostic body when the output has no structure

use axum::{extract::State, Json};
use receipt_parser::{
    api::{
        parse_receipt::{parse_receipt_handler, ParseReceiptRequest, ParseReceiptResponse},
        ApiJson, AppState,
    },
    storage::StorageError,
};
use serde_json::json;

use crate::common::{full_receipt_ids, ids, state_with_stub, StubModel};

fn request(url: &str) -> ApiJson<ParseReceiptRequest> {
    ApiJson(ParseReceiptRequest {
        s3_url: url.to_string(),
    })
}

#[cfg(test)]
mod parse_receipt_handler_tests {
    use super::*;

    // =============================================================================
    // Model availability
    // =============================================================================

    #[tokio::test]
    async fn test_model_not_loaded_returns_500() {
        let state = AppState::new_for_test();

        let err = parse_receipt_handler(State(state), request("s3://receipts/scan.png"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 500);
        assert_eq!(err.detail(), "Model is not loaded.");
    }

    #[tokio::test]
    async fn test_model_cleared_after_shutdown() {
        let (_dir, state, _store) = state_with_stub(StubModel::returning(full_receipt_ids())).await;
        assert!(state.model_holder.clear().await);

        let err = parse_receipt_handler(State(state), request("s3://receipts/scan.png"))
            .await
            .unwrap_err();
        assert_eq!(err.detail(), "Model is not loaded.");
    }

    // =============================================================================
    // Fetch failures (400)
    // =============================================================================

    #[tokio::test]
    async fn test_non_s3_url_returns_400() {
        let (_dir, state, _store) = state_with_stub(StubModel::returning(full_receipt_ids())).await;

        let err = parse_receipt_handler(State(state), request("https://receipts/scan.png"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert_eq!(
            err.detail(),
            "Error fetching image from S3: URL must start with s3://"
        );
    }

    #[tokio::test]
    async fn test_url_without_key_returns_400() {
        let (_dir, state, _store) = state_with_stub(StubModel::returning(full_receipt_ids())).await;

        let err = parse_receipt_handler(State(state), request("s3://bucketonly"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert!(err.detail().contains("Invalid S3 URL format"));
    }

    #[tokio::test]
    async fn test_storage_error_text_is_reported() {
        let (_dir, state, store) = state_with_stub(StubModel::returning(full_receipt_ids())).await;
        store
            .inject_error(StorageError::AccessDenied(
                "AccessDenied: bucket policy forbids GetObject".to_string(),
            ))
            .await;

        let err = parse_receipt_handler(State(state), request("s3://receipts/scan.png"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert!(err.detail().starts_with("Error fetching image from S3: "));
        assert!(err.detail().contains("bucket policy forbids GetObject"));
    }

    #[tokio::test]
    async fn test_missing_object_returns_400() {
        let (_dir, state, _store) = state_with_stub(StubModel::returning(full_receipt_ids())).await;

        let err = parse_receipt_handler(State(state), request("s3://receipts/other.png"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert!(err.detail().contains("receipts/other.png"));
    }

    #[tokio::test]
    async fn test_non_image_object_returns_400() {
        let (_dir, state, store) = state_with_stub(StubModel::returning(full_receipt_ids())).await;
        store
            .put_object("receipts", "notes.txt", b"hello".to_vec())
            .await;

        let err = parse_receipt_handler(State(state), request("s3://receipts/notes.txt"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert!(err.detail().starts_with("Error fetching image from S3: "));
    }

    // =============================================================================
    // Inference failures (500)
    // =============================================================================

    #[tokio::test]
    async fn test_generation_failure_returns_500() {
        let (_dir, state, _store) =
            state_with_stub(StubModel::failing("decoder graph exploded")).await;

        let err = parse_receipt_handler(State(state), request("s3://receipts/scan.png"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 500);
        assert!(err.detail().starts_with("Inference failed: "));
        assert!(err.detail().contains("decoder graph exploded"));
    }

    // =============================================================================
    // Successful extraction
    // =============================================================================

    #[tokio::test]
    async fn test_end_to_end_five_field_projection() {
        let stub = StubModel::returning(full_receipt_ids());
        let calls = stub.calls.clone();
        let (_dir, state, _store) = state_with_stub(stub).await;

        let Json(response) = parse_receipt_handler(State(state), request("s3://receipts/scan.png"))
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "issuer_ruc": "20123456789",
                "document_series": "F001",
                "document_number": "00012345",
                "issue_date": "2024-03-15",
                "total": "59.00"
            })
        );

        // Prompt and tensor reached the model as configured
        let calls = calls.lock().unwrap();
        assert_eq!(calls.prompt_ids, vec![ids("<s_receipt>")]);
        assert_eq!(calls.pixel_shapes, vec![vec![1, 3, 32, 24]]);
        assert_eq!(calls.configs[0].max_length, 64);
        assert_eq!(calls.configs[0].eos_token_id, crate::common::id_of("</s>"));
        assert_eq!(
            calls.configs[0].suppressed_token_ids,
            vec![crate::common::id_of("<unk>")]
        );
    }

    #[tokio::test]
    async fn test_missing_field_is_null_not_absent() {
        let sequence = ids("<s_receipt> \
             <s_issuer_ruc> 20123456789 </s_issuer_ruc> \
             <s_total> 59.00 </s_total> </s>");
        let (_dir, state, _store) = state_with_stub(StubModel::returning(sequence)).await;

        let Json(response) = parse_receipt_handler(State(state), request("s3://receipts/scan.png"))
            .await
            .unwrap();

        let body = serde_json::to_value(&response).unwrap();
        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 5);
        assert_eq!(object["issue_date"], serde_json::Value::Null);
        assert_eq!(object["document_series"], serde_json::Value::Null);
        assert_eq!(object["total"], json!("59.00"));
    }

    #[tokio::test]
    async fn test_untagged_output_yields_all_null_record() {
        // A tag-free sequence still structures as {"text_sequence": ...}
        let (_dir, state, _store) =
            state_with_stub(StubModel::returning(ids("<s_receipt> thank you </s>"))).await;

        let Json(response) = parse_receipt_handler(State(state), request("s3://receipts/scan.png"))
            .await
            .unwrap();

        match response {
            ParseReceiptResponse::Record(record) => assert_eq!(record.populated_fields(), 0),
            other => panic!("expected a record, got {:?}", other),
        }
    }

    // =============================================================================
    // Structuring failure (200 diagnostic)
    // =============================================================================

    #[tokio::test]
    async fn test_list_output_returns_diagnostic_payload() {
        let sequence = ids("<s_receipt> <s_total> 59.00 </s_total> <sep/> <s_total> 59.00 </s_total> </s> <pad>");
        let (_dir, state, _store) = state_with_stub(StubModel::returning(sequence)).await;

        let Json(response) = parse_receipt_handler(State(state), request("s3://receipts/scan.png"))
            .await
            .unwrap();

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["error"], "JSON parsing failed");

        assert_eq!(
            body["raw_sequence"],
            "<s_total> 59.00 </s_total> <sep/> <s_total> 59.00 </s_total>"
        );
        assert_eq!(body.as_object().unwrap().len(), 2);
    }
}
