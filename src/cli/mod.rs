// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod model_check;

use anyhow::Result;
use clap::Parser;

pub use model_check::{check_required_files, run_model_check, ModelCheckArgs, REQUIRED_FILES};

/// Receipt model sanity check
#[derive(Parser, Debug)]
#[command(name = "model-check")]
#[command(version)]
#[command(about = "Verify a Donut receipt model directory loads before deployment", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub args: ModelCheckArgs,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    run_model_check(cli.args).await
}
