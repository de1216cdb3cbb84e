// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Donut vision-encoder/text-decoder model
//!
//! This module provides the complete generation pipeline combining:
//! - Vision encoder (document image to hidden states)
//! - Text decoder (hidden states to tagged token sequence)

use anyhow::{Context, Result};
use ndarray::Array4;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use super::decoder::{DonutDecoder, GenerationConfig};
use super::encoder::DonutEncoder;
use super::session::Device;

pub const MODEL_CONFIG_FILE: &str = "config.json";

const ENCODER_FILES: &[&str] = &["encoder_model.onnx", "encoder.onnx"];
const DECODER_FILES: &[&str] = &["decoder_model.onnx", "decoder.onnx"];
const DECODER_WITH_PAST_FILES: &[&str] = &["decoder_with_past_model.onnx"];

/// mBART decoder default when `config.json` omits the field
const DEFAULT_MAX_POSITION_EMBEDDINGS: usize = 1536;

/// Sequence-to-sequence generator over document images
///
/// Implemented by [`DonutModel`]; tests substitute stubs that return a
/// fixed token sequence.
pub trait Seq2SeqModel: Send + Sync {
    /// Full generated sequence, `decoder_input_ids` first
    fn generate(
        &self,
        pixel_values: &Array4<f32>,
        decoder_input_ids: &[u32],
        config: &GenerationConfig,
    ) -> Result<Vec<u32>>;

    /// Maximum sequence length the decoder supports
    fn max_length(&self) -> usize;

    /// Device the model was loaded on
    fn device(&self) -> Device;
}

#[derive(Debug, Deserialize)]
struct DecoderConfig {
    #[serde(default = "default_max_position_embeddings")]
    max_position_embeddings: usize,
}

fn default_max_position_embeddings() -> usize {
    DEFAULT_MAX_POSITION_EMBEDDINGS
}

/// Subset of the VisionEncoderDecoder `config.json` the service needs
#[derive(Debug, Deserialize)]
struct VisionEncoderDecoderConfig {
    decoder: DecoderConfig,
}

/// Read the decoder's maximum position length from `config.json`
pub fn read_max_length(model_dir: &Path) -> Result<usize> {
    let path = model_dir.join(MODEL_CONFIG_FILE);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: VisionEncoderDecoderConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid model config {}", path.display()))?;
    Ok(config.decoder.max_position_embeddings)
}

/// Donut model loaded from ONNX exports
#[derive(Clone)]
pub struct DonutModel {
    encoder: DonutEncoder,
    decoder: DonutDecoder,
    max_length: usize,
    device: Device,
    model_dir: PathBuf,
}

impl std::fmt::Debug for DonutModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DonutModel")
            .field("model_dir", &self.model_dir)
            .field("max_length", &self.max_length)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl DonutModel {
    /// Load Donut ONNX graphs from the specified directory
    ///
    /// Expected files:
    /// - config.json (decoder `max_position_embeddings`)
    /// - encoder_model.onnx (vision encoder)
    /// - decoder_model.onnx (text decoder)
    /// - decoder_with_past_model.onnx (optional, enables the KV cache)
    ///
    /// # Errors
    /// Returns error if:
    /// - Model directory doesn't exist
    /// - Required model files are missing
    /// - ONNX Runtime initialization fails
    pub fn load(model_dir: &Path, device: Device, intra_threads: usize) -> Result<Self> {
        if !model_dir.exists() {
            anyhow::bail!("Donut model directory not found: {}", model_dir.display());
        }

        info!(
            "Loading Donut model from {} on {}",
            model_dir.display(),
            device
        );

        let max_length = read_max_length(model_dir)?;

        let encoder_path = find_model_file(model_dir, ENCODER_FILES)?;
        let decoder_path = find_model_file(model_dir, DECODER_FILES)?;
        let with_past_path = find_model_file(model_dir, DECODER_WITH_PAST_FILES).ok();

        let encoder = DonutEncoder::new(&encoder_path, device, intra_threads)?;
        let decoder = DonutDecoder::new(
            &decoder_path,
            with_past_path.as_deref(),
            device,
            intra_threads,
        )?;

        info!(
            "✅ Donut model ready (max_length {}, kv cache: {})",
            max_length,
            decoder.uses_cache()
        );

        Ok(Self {
            encoder,
            decoder,
            max_length,
            device,
            model_dir: model_dir.to_path_buf(),
        })
    }
}

impl Seq2SeqModel for DonutModel {
    fn generate(
        &self,
        pixel_values: &Array4<f32>,
        decoder_input_ids: &[u32],
        config: &GenerationConfig,
    ) -> Result<Vec<u32>> {
        let start = Instant::now();

        let hidden = self
            .encoder
            .encode(pixel_values)
            .context("Failed to encode image")?;
        debug!("Encoded in {}ms", start.elapsed().as_millis());

        let tokens = self
            .decoder
            .generate(&hidden, decoder_input_ids, config)
            .context("Failed to generate sequence")?;

        info!(
            "Generated {} tokens in {}ms",
            tokens.len(),
            start.elapsed().as_millis()
        );
        Ok(tokens)
    }

    fn max_length(&self) -> usize {
        self.max_length
    }

    fn device(&self) -> Device {
        self.device
    }
}

/// Find a model file by trying multiple possible names
pub fn find_model_file(dir: &Path, names: &[&str]) -> Result<PathBuf> {
    for name in names {
        let path = dir.join(name);
        if path.exists() {
            return Ok(path);
        }
    }
    anyhow::bail!(
        "Model file not found in {}. Tried: {:?}",
        dir.display(),
        names
    );
}
