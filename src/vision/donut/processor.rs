// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Donut processor: image transform, tokenizer and tag grammar in one place

use image::DynamicImage;
use ndarray::Array4;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::preprocessing::{preprocess_for_donut, DonutImageConfig};
use super::token2json::token2json;

pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const SPECIAL_TOKENS_FILE: &str = "special_tokens_map.json";
pub const PREPROCESSOR_CONFIG_FILE: &str = "preprocessor_config.json";

const DEFAULT_EOS_TOKEN: &str = "</s>";
const DEFAULT_PAD_TOKEN: &str = "<pad>";
const DEFAULT_UNK_TOKEN: &str = "<unk>";

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid processor config {path}: {message}")]
    InvalidConfig { path: String, message: String },

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Special token '{0}' is not in the tokenizer vocabulary")]
    MissingSpecialToken(String),

    #[error("Task prompt '{0}' encodes to no tokens")]
    EmptyPrompt(String),
}

/// Entry in `special_tokens_map.json`: either a bare string or an
/// `AddedToken` object with a `content` field
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TokenEntry {
    Plain(String),
    Detailed { content: String },
}

impl TokenEntry {
    fn into_content(self) -> String {
        match self {
            Self::Plain(s) => s,
            Self::Detailed { content } => content,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SpecialTokensMap {
    eos_token: Option<TokenEntry>,
    pad_token: Option<TokenEntry>,
    unk_token: Option<TokenEntry>,
}

/// Special token strings with their vocabulary ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialTokens {
    pub eos_token: String,
    pub eos_token_id: u32,
    pub pad_token: String,
    pub pad_token_id: u32,
    pub unk_token: String,
    pub unk_token_id: u32,
}

/// Feature/token processor paired with the Donut model
pub struct DonutProcessor {
    image_config: DonutImageConfig,
    tokenizer: Tokenizer,
    special_tokens: SpecialTokens,
    added_vocab: HashSet<String>,
}

impl std::fmt::Debug for DonutProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DonutProcessor")
            .field("image_config", &self.image_config)
            .field("special_tokens", &self.special_tokens)
            .field("added_vocab", &self.added_vocab.len())
            .finish_non_exhaustive()
    }
}

impl DonutProcessor {
    /// Load the processor from a model directory
    ///
    /// Expected files:
    /// - tokenizer.json (required)
    /// - special_tokens_map.json (optional, defaults to `</s>`, `<pad>`, `<unk>`)
    /// - preprocessor_config.json (optional, Donut base defaults)
    pub fn from_pretrained<P: AsRef<Path>>(model_dir: P) -> Result<Self, ProcessorError> {
        let model_dir = model_dir.as_ref();

        let tokenizer_path = model_dir.join(TOKENIZER_FILE);
        if !tokenizer_path.exists() {
            return Err(ProcessorError::FileNotFound(
                tokenizer_path.display().to_string(),
            ));
        }
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ProcessorError::Tokenizer(format!("Failed to load tokenizer: {}", e)))?;

        let special_map = read_optional_json::<SpecialTokensMap>(&model_dir.join(SPECIAL_TOKENS_FILE))?
            .unwrap_or_default();

        let image_config =
            read_optional_json::<DonutImageConfig>(&model_dir.join(PREPROCESSOR_CONFIG_FILE))?
                .unwrap_or_default();

        let processor = Self::new(tokenizer, image_config, special_map)?;

        info!(
            "Loaded Donut processor ({} tokens, {} added, input {}x{})",
            processor.tokenizer.get_vocab_size(true),
            processor.added_vocab.len(),
            processor.image_config.target_width(),
            processor.image_config.target_height()
        );

        Ok(processor)
    }

    fn new(
        tokenizer: Tokenizer,
        image_config: DonutImageConfig,
        special_map: SpecialTokensMap,
    ) -> Result<Self, ProcessorError> {
        let content = |entry: Option<TokenEntry>, default: &str| {
            entry
                .map(TokenEntry::into_content)
                .unwrap_or_else(|| default.to_string())
        };
        let eos_token = content(special_map.eos_token, DEFAULT_EOS_TOKEN);
        let pad_token = content(special_map.pad_token, DEFAULT_PAD_TOKEN);
        let unk_token = content(special_map.unk_token, DEFAULT_UNK_TOKEN);

        let id_of = |token: &str| {
            tokenizer
                .token_to_id(token)
                .ok_or_else(|| ProcessorError::MissingSpecialToken(token.to_string()))
        };
        let special_tokens = SpecialTokens {
            eos_token_id: id_of(&eos_token)?,
            pad_token_id: id_of(&pad_token)?,
            unk_token_id: id_of(&unk_token)?,
            eos_token,
            pad_token,
            unk_token,
        };

        let added_vocab = tokenizer
            .get_added_tokens_decoder()
            .values()
            .map(|token| token.content.clone())
            .collect();

        debug!("Special tokens: {:?}", special_tokens);

        Ok(Self {
            image_config,
            tokenizer,
            special_tokens,
            added_vocab,
        })
    }

    pub fn image_config(&self) -> &DonutImageConfig {
        &self.image_config
    }

    pub fn special_tokens(&self) -> &SpecialTokens {
        &self.special_tokens
    }

    pub fn added_vocab(&self) -> &HashSet<String> {
        &self.added_vocab
    }

    /// Image to `[1, 3, H, W]` pixel values
    pub fn pixel_values(&self, image: &DynamicImage) -> Array4<f32> {
        preprocess_for_donut(image, &self.image_config)
    }

    /// Decoder priming ids for a task prompt, without BOS/EOS
    pub fn prompt_ids(&self, task_prompt: &str) -> Result<Vec<u32>, ProcessorError> {
        let encoding = self
            .tokenizer
            .encode(task_prompt, false)
            .map_err(|e| ProcessorError::Tokenizer(format!("Failed to encode prompt: {}", e)))?;

        let ids = encoding.get_ids().to_vec();
        if ids.is_empty() {
            return Err(ProcessorError::EmptyPrompt(task_prompt.to_string()));
        }
        Ok(ids)
    }

    /// Token ids back to text, special tokens kept
    pub fn decode(&self, ids: &[u32]) -> Result<String, ProcessorError> {
        self.tokenizer
            .decode(ids, false)
            .map_err(|e| ProcessorError::Tokenizer(format!("Decoding failed: {}", e)))
    }

    /// Strip EOS/PAD, drop the leading task tag and trim
    pub fn clean_sequence(&self, decoded: &str) -> String {
        clean_sequence(
            decoded,
            &self.special_tokens.eos_token,
            &self.special_tokens.pad_token,
        )
    }

    /// Tagged sequence to JSON using this tokenizer's added vocabulary
    pub fn token2json(&self, sequence: &str) -> Value {
        token2json(sequence, &self.added_vocab)
    }
}

/// Remove every EOS and PAD token, then the first `<...>` tag, then trim
pub fn clean_sequence(decoded: &str, eos_token: &str, pad_token: &str) -> String {
    let without_special = decoded.replace(eos_token, "").replace(pad_token, "");
    let first_tag = Regex::new(r"<.*?>").expect("static regex");
    first_tag
        .replacen(&without_special, 1, "")
        .trim()
        .to_string()
}

fn read_optional_json<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, ProcessorError> {
    if !path.exists() {
        debug!("{} not present, using defaults", path.display());
        return Ok(None);
    }

    let invalid = |message: String| ProcessorError::InvalidConfig {
        path: path.display().to_string(),
        message,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| invalid(e.to_string()))
}
