// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::DEFAULT_MODEL_PATH;
use crate::vision::donut::{DevicePreference, DEFAULT_INTRA_THREADS};
use crate::vision::{LoadedModel, ModelConfig};

/// Files that must exist in the model directory
pub const REQUIRED_FILES: &[&str] = &[
    "config.json",
    "tokenizer.json",
    "special_tokens_map.json",
    "encoder_model.onnx",
    "decoder_model.onnx",
];

/// Arguments for the model sanity check
#[derive(Args, Debug, Clone)]
pub struct ModelCheckArgs {
    /// Model directory to check
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    /// Device to load on (auto, cuda, cpu)
    #[arg(long, env = "DEVICE", default_value = "auto")]
    pub device: DevicePreference,

    /// Only check that the required files are present
    #[arg(long)]
    pub skip_load: bool,
}

/// Verify the directory holds every required file.
///
/// Returns the directory listing on success; the error names the missing
/// files and everything that was found.
pub fn check_required_files(model_dir: &Path) -> Result<Vec<String>> {
    if !model_dir.is_dir() {
        return Err(anyhow!(
            "Model directory not found at {}",
            model_dir.display()
        ));
    }

    let mut found: Vec<String> = std::fs::read_dir(model_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    found.sort();

    let missing: Vec<&str> = REQUIRED_FILES
        .iter()
        .copied()
        .filter(|name| !found.iter().any(|f| f == name))
        .collect();

    if !missing.is_empty() {
        return Err(anyhow!(
            "Missing critical model files: {:?}. Found: {:?}",
            missing,
            found
        ));
    }

    Ok(found)
}

/// Check files, then load the processor and the model
pub async fn run_model_check(args: ModelCheckArgs) -> Result<()> {
    println!("--- STARTING MODEL SANITY CHECK ---");
    println!("Checking model at: {}", args.model_path.display());

    let found = check_required_files(&args.model_path)?;
    println!("✅ Required files present ({} entries)", found.len());

    if args.skip_load {
        println!("⏭️  Skipping model load");
        return Ok(());
    }

    println!("Attempting to load processor and model...");
    let model = LoadedModel::load(ModelConfig {
        model_dir: args.model_path.clone(),
        device: args.device,
        intra_threads: DEFAULT_INTRA_THREADS,
    })
    .await?;

    info!("Loaded model: {:?}", model);
    println!(
        "✅ SUCCESS: Model loaded correctly on {} (max length {})",
        model.device(),
        model.model().max_length()
    );
    Ok(())
}
