// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fixtures: a tiny Donut-style model directory and a stub generator

#![allow(dead_code)]

use anyhow::Result;
use ndarray::Array4;
use receipt_parser::{
    api::AppState,
    storage::MockObjectStore,
    vision::{
        donut::{Device, DonutProcessor, GenerationConfig, Seq2SeqModel},
        LoadedModel, ModelHolder,
    },
};
use serde_json::json;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Vocabulary of the fixture tokenizer, index = token id
pub const VOCAB: &[&str] = &[
    "<pad>",
    "<s>",
    "</s>",
    "<unk>",
    "<s_receipt>",
    "<s_issuer_ruc>",
    "</s_issuer_ruc>",
    "<s_document_series>",
    "</s_document_series>",
    "<s_document_number>",
    "</s_document_number>",
    "<s_issue_date>",
    "</s_issue_date>",
    "<s_total>",
    "</s_total>",
    "<sep/>",
    "<s_menu>",
    "</s_menu>",
    "20123456789",
    "F001",
    "00012345",
    "2024-03-15",
    "59.00",
    "thank",
    "you",
];

/// Tokens registered as added vocabulary (everything tag-like)
fn is_added(token: &str) -> bool {
    token.starts_with('<')
}

pub fn id_of(token: &str) -> u32 {
    VOCAB
        .iter()
        .position(|t| *t == token)
        .unwrap_or_else(|| panic!("{} not in fixture vocab", token)) as u32
}

/// Ids for whitespace-separated tokens
pub fn ids(tokens: &str) -> Vec<u32> {
    tokens.split_whitespace().map(id_of).collect()
}

/// A complete, well-formed receipt sequence as the model would emit it
pub fn full_receipt_ids() -> Vec<u32> {
    ids("<s_receipt> \
         <s_issuer_ruc> 20123456789 </s_issuer_ruc> \
         <s_document_series> F001 </s_document_series> \
         <s_document_number> 00012345 </s_document_number> \
         <s_issue_date> 2024-03-15 </s_issue_date> \
         <s_total> 59.00 </s_total> \
         <s_menu> thank you </s_menu> \
         </s> <pad> <pad>")
}

/// Write tokenizer, special token map, configs and empty ONNX files
pub fn write_model_dir(dir: &Path) {
    let vocab: serde_json::Map<String, serde_json::Value> = VOCAB
        .iter()
        .enumerate()
        .map(|(id, token)| (token.to_string(), json!(id)))
        .collect();

    let added_tokens: Vec<serde_json::Value> = VOCAB
        .iter()
        .enumerate()
        .filter(|(_, token)| is_added(token))
        .map(|(id, token)| {
            json!({
                "id": id,
                "content": token,
                "single_word": false,
                "lstrip": false,
                "rstrip": false,
                "normalized": false,
                "special": true
            })
        })
        .collect();

    let tokenizer = json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added_tokens,
        "normalizer": null,
        "pre_tokenizer": {"type": "WhitespaceSplit"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "<unk>"
        }
    });
    write_json(dir, "tokenizer.json", &tokenizer);

    write_json(
        dir,
        "special_tokens_map.json",
        &json!({
            "bos_token": "<s>",
            "eos_token": "</s>",
            "pad_token": "<pad>",
            "unk_token": {"content": "<unk>", "lstrip": false, "normalized": true},
            "additional_special_tokens": ["<s_receipt>"]
        }),
    );

    write_json(
        dir,
        "preprocessor_config.json",
        &json!({
            "do_align_long_axis": false,
            "do_normalize": true,
            "do_pad": true,
            "do_resize": true,
            "do_thumbnail": true,
            "image_mean": [0.5, 0.5, 0.5],
            "image_std": [0.5, 0.5, 0.5],
            "size": {"height": 32, "width": 24}
        }),
    );

    write_json(
        dir,
        "config.json",
        &json!({
            "model_type": "vision-encoder-decoder",
            "decoder": {"model_type": "mbart", "max_position_embeddings": 64}
        }),
    );

    std::fs::write(dir.join("encoder_model.onnx"), b"").unwrap();
    std::fs::write(dir.join("decoder_model.onnx"), b"").unwrap();
}

fn write_json(dir: &Path, name: &str, value: &serde_json::Value) {
    std::fs::write(dir.join(name), serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

/// Inputs observed by [`StubModel`]
#[derive(Debug, Clone, Default)]
pub struct StubCalls {
    pub prompt_ids: Vec<Vec<u32>>,
    pub pixel_shapes: Vec<Vec<usize>>,
    pub configs: Vec<GenerationConfig>,
}

/// Seq2Seq model returning a fixed sequence
pub struct StubModel {
    output: Result<Vec<u32>, String>,
    pub calls: Arc<Mutex<StubCalls>>,
}

impl StubModel {
    pub fn returning(ids: Vec<u32>) -> Self {
        Self {
            output: Ok(ids),
            calls: Arc::new(Mutex::new(StubCalls::default())),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            output: Err(message.to_string()),
            calls: Arc::new(Mutex::new(StubCalls::default())),
        }
    }
}

impl Seq2SeqModel for StubModel {
    fn generate(
        &self,
        pixel_values: &Array4<f32>,
        decoder_input_ids: &[u32],
        config: &GenerationConfig,
    ) -> Result<Vec<u32>> {
        let mut calls = self.calls.lock().unwrap();
        calls.prompt_ids.push(decoder_input_ids.to_vec());
        calls.pixel_shapes.push(pixel_values.shape().to_vec());
        calls.configs.push(config.clone());

        self.output.clone().map_err(|e| anyhow::anyhow!(e))
    }

    fn max_length(&self) -> usize {
        64
    }

    fn device(&self) -> Device {
        Device::Cpu
    }
}

/// Fixture directory plus a [`LoadedModel`] wrapping `stub`
pub fn loaded_stub(stub: StubModel) -> (TempDir, LoadedModel) {
    let dir = tempfile::tempdir().unwrap();
    write_model_dir(dir.path());
    let processor = DonutProcessor::from_pretrained(dir.path()).unwrap();
    let model = LoadedModel::new(processor, Arc::new(stub)).unwrap();
    (dir, model)
}

/// Encoded test image (light gray, portrait)
pub fn receipt_png() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        30,
        60,
        image::Rgb([230, 230, 230]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// AppState with `stub` installed and `receipts/scan.png` in the store
pub async fn state_with_stub(stub: StubModel) -> (TempDir, AppState, MockObjectStore) {
    let (dir, model) = loaded_stub(stub);

    let holder = ModelHolder::new();
    holder.install(model).await;

    let store = MockObjectStore::new();
    store.put_object("receipts", "scan.png", receipt_png()).await;

    let state = AppState::new(holder, Arc::new(store.clone()));
    (dir, state, store)
}
