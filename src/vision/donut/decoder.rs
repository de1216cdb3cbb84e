// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Donut text decoder (mBART) with greedy autoregressive generation
//!
//! Works with Optimum-style exports: `decoder_model.onnx` for the first
//! step and, when present, `decoder_with_past_model.onnx` for subsequent
//! steps fed from the `present.*` key/value outputs.

use anyhow::{Context, Result};
use ndarray::{s, Array2, Array3, ArrayD};
use ort::session::Session;
use ort::value::{DynValue, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::session::{build_session, Device};

const PAST_PREFIX: &str = "past_key_values";
const PRESENT_PREFIX: &str = "present";

/// Key/value states from the previous step, keyed by decoder input name
pub type KvCache = HashMap<String, ArrayD<f32>>;

/// Decoding parameters for one generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Upper bound on the full sequence length, prompt included
    pub max_length: usize,
    pub eos_token_id: u32,
    /// Ids never selected (the unknown token)
    pub suppressed_token_ids: Vec<u32>,
}

/// One ONNX graph plus its input/output names
struct DecoderGraph {
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl DecoderGraph {
    fn load(path: &Path, device: Device, intra_threads: usize) -> Result<Self> {
        let session = build_session(path, device, intra_threads)?;
        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        if input_names.iter().any(|name| name == "use_cache_branch") {
            anyhow::bail!(
                "Merged decoder exports are not supported: {} (export decoder_model.onnx and decoder_with_past_model.onnx separately)",
                path.display()
            );
        }

        debug!("Decoder graph {} inputs: {:?}", path.display(), input_names);
        Ok(Self {
            session: Mutex::new(session),
            input_names,
            output_names,
        })
    }
}

/// Donut language decoder
#[derive(Clone)]
pub struct DonutDecoder {
    decoder: Arc<DecoderGraph>,
    decoder_with_past: Option<Arc<DecoderGraph>>,
}

impl std::fmt::Debug for DonutDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DonutDecoder")
            .field("uses_cache", &self.uses_cache())
            .finish_non_exhaustive()
    }
}

impl DonutDecoder {
    /// Load the decoder graph and the optional with-past graph
    pub fn new(
        decoder_path: &Path,
        decoder_with_past_path: Option<&Path>,
        device: Device,
        intra_threads: usize,
    ) -> Result<Self> {
        info!("Loading Donut decoder from {}", decoder_path.display());
        let decoder = DecoderGraph::load(decoder_path, device, intra_threads)
            .context("Failed to load Donut decoder")?;

        let decoder_with_past = match decoder_with_past_path {
            Some(path) => {
                info!("Loading Donut decoder (with past) from {}", path.display());
                Some(Arc::new(
                    DecoderGraph::load(path, device, intra_threads)
                        .context("Failed to load Donut decoder with past")?,
                ))
            }
            None => {
                info!("No decoder_with_past graph, generation recomputes the full prefix each step");
                None
            }
        };

        Ok(Self {
            decoder: Arc::new(decoder),
            decoder_with_past,
        })
    }

    /// Whether key/value states are reused between steps
    pub fn uses_cache(&self) -> bool {
        self.decoder_with_past.is_some()
    }

    /// Greedy generation conditioned on encoder states and the prompt ids.
    ///
    /// Returns the full sequence (prompt first). Stops after emitting EOS or
    /// when `max_length` tokens exist.
    pub fn generate(
        &self,
        encoder_hidden_states: &Array3<f32>,
        prompt_ids: &[u32],
        config: &GenerationConfig,
    ) -> Result<Vec<u32>> {
        greedy_generate(prompt_ids, config, self.uses_cache(), |step_ids, cache| {
            let graph = match &self.decoder_with_past {
                Some(with_past) if !cache.is_empty() => with_past.as_ref(),
                _ => self.decoder.as_ref(),
            };
            self.forward(graph, encoder_hidden_states, step_ids, cache)
        })
    }

    /// One decoder pass; returns logits for the last position and refreshes the cache
    fn forward(
        &self,
        graph: &DecoderGraph,
        encoder_hidden_states: &Array3<f32>,
        input_ids: &[u32],
        cache: &mut KvCache,
    ) -> Result<Vec<f32>> {
        let encoder_len = encoder_hidden_states.shape()[1];
        let mut inputs: Vec<(String, DynValue)> = Vec::with_capacity(graph.input_names.len());

        for name in &graph.input_names {
            let value = match name.as_str() {
                "input_ids" => {
                    let ids = Array2::from_shape_vec(
                        (1, input_ids.len()),
                        input_ids.iter().map(|&id| id as i64).collect(),
                    )
                    .context("Failed to shape input_ids")?;
                    Value::from_array(ids)?.into_dyn()
                }
                "encoder_hidden_states" => {
                    Value::from_array(encoder_hidden_states.to_owned())?.into_dyn()
                }
                "encoder_attention_mask" => {
                    Value::from_array(Array2::<i64>::ones((1, encoder_len)))?.into_dyn()
                }
                past if past.starts_with(PAST_PREFIX) => {
                    let state = cache
                        .get(past)
                        .with_context(|| format!("Missing cached state for {}", past))?;
                    Value::from_array(state.clone())?.into_dyn()
                }
                other => anyhow::bail!("Unsupported decoder input: {}", other),
            };
            inputs.push((name.clone(), value));
        }

        let mut session = graph
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("Decoder session lock poisoned"))?;

        let outputs = session.run(inputs).context("Decoder inference failed")?;

        let logits = outputs["logits"]
            .try_extract_array::<f32>()
            .context("Failed to extract logits")?;
        if logits.ndim() != 3 {
            anyhow::bail!("Unexpected logits shape: {:?}", logits.shape());
        }
        let last_pos = logits.shape()[1] - 1;
        let last_logits: Vec<f32> = logits.slice(s![0, last_pos, ..]).iter().copied().collect();

        if self.decoder_with_past.is_some() {
            for name in graph
                .output_names
                .iter()
                .filter(|name| name.starts_with(PRESENT_PREFIX))
            {
                let state = outputs[name.as_str()]
                    .try_extract_array::<f32>()
                    .with_context(|| format!("Failed to extract {}", name))?
                    .to_owned();
                cache.insert(name.replacen(PRESENT_PREFIX, PAST_PREFIX, 1), state);
            }
        }

        Ok(last_logits)
    }
}

/// Greedy decoding loop over a single-sequence decoder step.
///
/// `step` receives the ids to feed and the cache, and returns logits for
/// the last position. While the cache is empty (or `uses_cache` is false)
/// it gets the whole sequence; afterwards only the newest token. The loop
/// stops right after EOS or once `max_length` tokens exist, so a prompt
/// already at `max_length` comes back unchanged.
pub fn greedy_generate<F>(
    prompt_ids: &[u32],
    config: &GenerationConfig,
    uses_cache: bool,
    mut step: F,
) -> Result<Vec<u32>>
where
    F: FnMut(&[u32], &mut KvCache) -> Result<Vec<f32>>,
{
    if prompt_ids.is_empty() {
        anyhow::bail!("Generation needs at least one decoder input id");
    }

    let mut tokens = prompt_ids.to_vec();
    let mut cache = KvCache::new();

    while tokens.len() < config.max_length {
        let step_ids = if uses_cache && !cache.is_empty() {
            &tokens[tokens.len() - 1..]
        } else {
            &tokens[..]
        };

        let logits = step(step_ids, &mut cache)?;
        let next_token = greedy_select(&logits, &config.suppressed_token_ids)?;
        tokens.push(next_token);

        if next_token == config.eos_token_id {
            debug!("Generation stopped at EOS after {} tokens", tokens.len());
            break;
        }
    }

    debug!("Generation complete: {} total tokens", tokens.len());
    Ok(tokens)
}

/// Highest-scoring token id, skipping suppressed ids and NaN scores.
/// Ties resolve to the lowest id.
pub fn greedy_select(logits: &[f32], suppressed: &[u32]) -> Result<u32> {
    let (max_idx, _) = logits
        .iter()
        .copied()
        .enumerate()
        .filter(|(idx, score)| !score.is_nan() && !suppressed.contains(&(*idx as u32)))
        .fold(None, |best, (idx, score)| match best {
            Some((_, best_score)) if score <= best_score => best,
            _ => Some((idx, score)),
        })
        .ok_or_else(|| anyhow::anyhow!("Empty logits vector after filtering"))?;

    Ok(max_idx as u32)
}
