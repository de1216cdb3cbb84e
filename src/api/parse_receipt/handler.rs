// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Receipt parsing endpoint handler

use axum::{extract::State, Json};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::request::ParseReceiptRequest;
use super::response::ParseReceiptResponse;
use crate::api::errors::{ApiError, ApiJson};
use crate::api::http_server::AppState;
use crate::pipeline::{fetch_receipt_image, run_inference, PipelineError};

/// POST /parse_receipt - Extract receipt fields from an S3-hosted image
///
/// # Request
/// - `s3_url`: Image location as `s3://bucket/key` (required)
///
/// # Response
/// The five fields `issuer_ruc`, `document_series`, `document_number`,
/// `issue_date` and `total`, each `null` when the model did not produce it.
/// When the model output has no key/value structure the body is
/// `{"error": "JSON parsing failed", "raw_sequence": ...}`, still with 200.
///
/// # Errors
/// - 400 Bad Request: malformed body, invalid URL, fetch failure or
///   undecodable image
/// - 500 Internal Server Error: model not loaded, preprocessing, inference
///   or post-processing failed
pub async fn parse_receipt_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ParseReceiptRequest>,
) -> Result<Json<ParseReceiptResponse>, ApiError> {
    let start = Instant::now();
    debug!("Parse receipt request for {}", request.s3_url);

    // 1. Model must be installed
    let model = state.model_holder.get().await.ok_or_else(|| {
        warn!("Receipt model not loaded");
        ApiError::model_not_loaded()
    })?;

    // 2. Fetch and decode the image
    let image = fetch_receipt_image(state.object_store.as_ref(), &request.s3_url)
        .await
        .map_err(|e| {
            warn!("Fetch failed for {}: {}", request.s3_url, e);
            ApiError::from(e)
        })?;

    // 3. Preprocess, generate, decode and structure off the async workers
    let outcome = tokio::task::spawn_blocking(move || run_inference(&model, &image))
        .await
        .map_err(|e| PipelineError::Inference(format!("inference task failed: {}", e)))
        .and_then(|result| result)
        .map_err(|e| {
            warn!("Receipt pipeline failed at {} stage: {}", e.kind(), e);
            ApiError::from(e)
        })?;

    info!(
        "Parsed receipt {} in {}ms",
        request.s3_url,
        start.elapsed().as_millis()
    );

    Ok(Json(outcome.into()))
}
