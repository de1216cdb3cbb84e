// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Receipt pipeline: fetch, preprocess, generate, decode, structure, filter
//!
//! Every stage returns its own [`PipelineError`] variant. The fetch stage is
//! async; the remaining stages are CPU bound and meant to run on the
//! blocking pool through [`run_inference`].

pub mod errors;
pub mod record;

pub use errors::{ErrorKind, PipelineError};
pub use record::{ReceiptRecord, TARGET_FIELDS};

use image::DynamicImage;
use ndarray::Array4;
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::storage::{parse_s3_url, ObjectStore};
use crate::vision::{decode_rgb_image, LoadedModel};

/// Result of a completed inference
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Record(ReceiptRecord),
    /// Generation succeeded but the sequence had no key/value structure
    Unparsed { raw_sequence: String },
}

/// Resolve an `s3://bucket/key` URL, download it and decode it to RGB
pub async fn fetch_receipt_image(
    store: &dyn ObjectStore,
    s3_url: &str,
) -> Result<DynamicImage, PipelineError> {
    let location = parse_s3_url(s3_url).map_err(|e| PipelineError::Fetch(e.to_string()))?;

    debug!("Fetching {} via {}", location, store.backend_name());
    let bytes = store
        .get_location(&location)
        .await
        .map_err(|e| PipelineError::Fetch(e.to_string()))?;

    let (image, info) = decode_rgb_image(&bytes).map_err(|e| PipelineError::Fetch(e.to_string()))?;
    debug!(
        "Decoded {:?} image: {}x{}, {} bytes",
        info.format, info.width, info.height, info.size_bytes
    );
    Ok(image)
}

/// Image to `[1, 3, H, W]` pixel values
pub fn preprocess(model: &LoadedModel, image: &DynamicImage) -> Result<Array4<f32>, PipelineError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::Preprocess(format!(
            "image has zero size ({}x{})",
            image.width(),
            image.height()
        )));
    }

    let pixel_values = model.processor().pixel_values(image);
    if pixel_values.shape()[..2] != [1, 3] || pixel_values.is_empty() {
        return Err(PipelineError::Preprocess(format!(
            "unexpected pixel tensor shape {:?}, expected [1, 3, H, W]",
            pixel_values.shape()
        )));
    }
    Ok(pixel_values)
}

/// Greedy generation from the task prompt
pub fn generate(model: &LoadedModel, pixel_values: &Array4<f32>) -> Result<Vec<u32>, PipelineError> {
    model
        .model()
        .generate(pixel_values, model.prompt_ids(), &model.generation_config())
        .map_err(|e| PipelineError::Inference(format!("{:#}", e)))
}

/// Ids to text, then strip EOS/PAD and the leading task tag
pub fn decode_sequence(model: &LoadedModel, ids: &[u32]) -> Result<String, PipelineError> {
    let decoded = model
        .processor()
        .decode(ids)
        .map_err(|e| PipelineError::Decode(e.to_string()))?;
    Ok(model.processor().clean_sequence(&decoded))
}

/// Tagged sequence to a key/value mapping
pub fn structure(model: &LoadedModel, sequence: &str) -> Result<Map<String, Value>, PipelineError> {
    match model.processor().token2json(sequence) {
        Value::Object(map) => Ok(map),
        other => Err(PipelineError::Structure {
            raw_sequence: sequence.to_string(),
            reason: format!("expected an object, got {}", json_type_name(&other)),
        }),
    }
}

/// Every stage after fetch. Blocking; call from `spawn_blocking`.
///
/// A structuring failure is not an error here: it comes back as
/// [`ParseOutcome::Unparsed`] carrying the cleaned sequence.
pub fn run_inference(model: &LoadedModel, image: &DynamicImage) -> Result<ParseOutcome, PipelineError> {
    let start = Instant::now();

    let pixel_values = preprocess(model, image)?;
    let ids = generate(model, &pixel_values)?;
    let sequence = decode_sequence(model, &ids)?;
    debug!("Cleaned sequence: {}", sequence);

    let outcome = match structure(model, &sequence) {
        Ok(parsed) => ParseOutcome::Record(ReceiptRecord::from_parsed(&parsed)),
        Err(PipelineError::Structure { raw_sequence, reason }) => {
            warn!("⚠️  Could not structure model output: {}", reason);
            ParseOutcome::Unparsed { raw_sequence }
        }
        Err(e) => return Err(e),
    };

    info!(
        "Receipt inference complete: {} tokens in {}ms",
        ids.len(),
        start.elapsed().as_millis()
    );
    Ok(outcome)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
