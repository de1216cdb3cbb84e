// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use receipt_parser::{
    api::{start_server, AppState},
    config::ServerConfig,
    storage::S3ObjectStore,
    vision::{LoadedModel, ModelHolder},
};
use std::{env, sync::Arc};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting {}...\n", receipt_parser::version::get_version_string());

    let config = ServerConfig::from_env()?;
    let addr = config.socket_addr()?;

    // Load the model before accepting any request
    println!("🧠 Loading Donut model from {}...", config.model.model_dir.display());
    let model = LoadedModel::load(config.model.clone())
        .await
        .context("Model loading failed")?;
    let device = model.device();

    let model_holder = ModelHolder::new();
    model_holder.install(model).await;
    println!("✅ Model loaded on {}", device);

    println!("🪣 Connecting to object storage...");
    let object_store = Arc::new(S3ObjectStore::new(config.s3.clone()).await);

    let state = AppState::new(model_holder.clone(), object_store);

    let separator = "=".repeat(60);
    println!("\n{}", separator);
    println!("Listening:      http://{}", addr);
    println!("Model:          {}", config.model.model_dir.display());
    println!("Device:         {}", device);
    println!("\nAPI Endpoints:");
    println!("  Health:       GET  http://{}/health", addr);
    println!("  Parse:        POST http://{}/parse_receipt", addr);
    println!("\nPress Ctrl+C to shutdown...");
    println!("{}\n", separator);

    start_server(state, addr, shutdown_signal()).await?;

    println!("\n⏹️  Shutting down...");
    model_holder.clear().await;

    println!("👋 Goodbye!");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
