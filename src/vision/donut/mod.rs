// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Donut document-understanding model (Swin encoder + mBART decoder)
//!
//! Runs Optimum ONNX exports of `naver-clova-ix/donut-base` fine-tunes
//! with greedy decoding, then turns the tagged output into JSON.

pub mod decoder;
pub mod encoder;
pub mod model;
pub mod preprocessing;
pub mod processor;
pub mod session;
pub mod token2json;

pub use decoder::{greedy_generate, greedy_select, DonutDecoder, GenerationConfig, KvCache};
pub use encoder::DonutEncoder;
pub use model::{find_model_file, DonutModel, Seq2SeqModel, MODEL_CONFIG_FILE};
pub use preprocessing::{preprocess_for_donut, DonutImageConfig};
pub use processor::{clean_sequence, DonutProcessor, ProcessorError, SpecialTokens};
pub use session::{select_device, Device, DevicePreference, DEFAULT_INTRA_THREADS};
pub use token2json::token2json;

/// Decoder prompt of the receipt fine-tune
pub const TASK_PROMPT: &str = "<s_receipt>";
