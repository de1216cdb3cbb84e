// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-wide holder for the loaded Donut model and processor
//!
//! The model is loaded once at startup, shared read-only by every request
//! and released at shutdown. Requests that arrive while nothing is
//! installed observe `None` and report the model as not loaded.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::vision::donut::{
    select_device, Device, DevicePreference, DonutModel, DonutProcessor, GenerationConfig,
    ProcessorError, Seq2SeqModel, DEFAULT_INTRA_THREADS, TASK_PROMPT,
};

/// Configuration for loading the receipt model
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Directory holding the ONNX graphs, tokenizer and configs
    pub model_dir: PathBuf,
    pub device: DevicePreference,
    /// Intra-op threads per ONNX session
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("./model"),
            device: DevicePreference::Auto,
            intra_threads: DEFAULT_INTRA_THREADS,
        }
    }
}

/// Processor and model paired together, plus the encoded task prompt
pub struct LoadedModel {
    processor: Arc<DonutProcessor>,
    model: Arc<dyn Seq2SeqModel>,
    prompt_ids: Vec<u32>,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("processor", &self.processor)
            .field("device", &self.model.device())
            .field("prompt_ids", &self.prompt_ids)
            .finish_non_exhaustive()
    }
}

impl LoadedModel {
    /// Load processor and model from disk
    ///
    /// ONNX session creation is blocking, so it runs on the blocking pool.
    pub async fn load(config: ModelConfig) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::load_blocking(&config))
            .await
            .context("Model loading task panicked")?
    }

    fn load_blocking(config: &ModelConfig) -> Result<Self> {
        info!("Loading receipt model from {}", config.model_dir.display());

        let processor = DonutProcessor::from_pretrained(&config.model_dir)
            .context("Failed to load Donut processor")?;
        let device = select_device(config.device)?;
        let model = DonutModel::load(&config.model_dir, device, config.intra_threads)?;

        Ok(Self::new(processor, Arc::new(model))?)
    }

    /// Pair an already-built model with its processor
    pub fn new(
        processor: DonutProcessor,
        model: Arc<dyn Seq2SeqModel>,
    ) -> Result<Self, ProcessorError> {
        let prompt_ids = processor.prompt_ids(TASK_PROMPT)?;
        Ok(Self {
            processor: Arc::new(processor),
            model,
            prompt_ids,
        })
    }

    pub fn processor(&self) -> &DonutProcessor {
        &self.processor
    }

    pub fn model(&self) -> &dyn Seq2SeqModel {
        self.model.as_ref()
    }

    /// Decoder input ids for the receipt task prompt
    pub fn prompt_ids(&self) -> &[u32] {
        &self.prompt_ids
    }

    pub fn device(&self) -> Device {
        self.model.device()
    }

    /// Greedy decoding settings derived from the model and tokenizer
    pub fn generation_config(&self) -> GenerationConfig {
        let special = self.processor.special_tokens();
        GenerationConfig {
            max_length: self.model.max_length(),
            eos_token_id: special.eos_token_id,
            suppressed_token_ids: vec![special.unk_token_id],
        }
    }
}

/// Shared slot for the loaded model
#[derive(Clone, Default)]
pub struct ModelHolder {
    inner: Arc<RwLock<Option<Arc<LoadedModel>>>>,
}

impl ModelHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a model available to requests
    pub async fn install(&self, model: LoadedModel) {
        info!("✅ Receipt model installed (device: {})", model.device());
        *self.inner.write().await = Some(Arc::new(model));
    }

    /// Current model, if any. In-flight requests keep their `Arc` after a clear.
    pub async fn get(&self) -> Option<Arc<LoadedModel>> {
        self.inner.read().await.clone()
    }

    /// Release the model; returns whether one was installed
    pub async fn clear(&self) -> bool {
        let released = self.inner.write().await.take();
        if released.is_some() {
            info!("Receipt model released");
        }
        released.is_some()
    }

    pub async fn is_loaded(&self) -> bool {
        self.inner.read().await.is_some()
    }
}
