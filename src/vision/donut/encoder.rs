// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Donut vision encoder (Swin) running under ONNX Runtime

use anyhow::{Context, Result};
use ndarray::{Array3, Array4, Ix3};
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::session::{build_session, Device};

/// Donut vision encoder
///
/// Maps `pixel_values` `[1, 3, H, W]` to `last_hidden_state`
/// `[1, seq_len, hidden]` consumed by the decoder's cross-attention.
#[derive(Clone)]
pub struct DonutEncoder {
    session: Arc<Mutex<Session>>,
    input_name: String,
    output_name: String,
}

impl std::fmt::Debug for DonutEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DonutEncoder")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .finish_non_exhaustive()
    }
}

impl DonutEncoder {
    pub fn new(model_path: &Path, device: Device, intra_threads: usize) -> Result<Self> {
        info!("Loading Donut encoder from {}", model_path.display());

        let session = build_session(model_path, device, intra_threads)
            .context("Failed to load Donut encoder")?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "pixel_values".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|output| output.name == "last_hidden_state")
            .or_else(|| session.outputs.first())
            .map(|output| output.name.clone())
            .unwrap_or_else(|| "last_hidden_state".to_string());

        debug!(
            "Donut encoder loaded - input: {}, output: {}",
            input_name, output_name
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            output_name,
        })
    }

    /// Encode preprocessed pixels into hidden states
    pub fn encode(&self, pixel_values: &Array4<f32>) -> Result<Array3<f32>> {
        let shape = pixel_values.shape();
        if shape[0] != 1 || shape[1] != 3 {
            anyhow::bail!("Invalid input shape: {:?}, expected [1, 3, H, W]", shape);
        }

        let input_value = Value::from_array(pixel_values.to_owned())
            .context("Failed to create pixel_values tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("Encoder session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .context("Encoder inference failed")?;

        let hidden = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .context("Failed to extract encoder output")?
            .to_owned()
            .into_dimensionality::<Ix3>()
            .context("Unexpected encoder output rank")?;

        debug!("Encoder output shape: {:?}", hidden.shape());
        Ok(hidden)
    }
}
