// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod storage;
pub mod version;
pub mod vision;

// Re-export main types
pub use api::{create_app, AppState};
pub use config::ServerConfig;
pub use pipeline::{ErrorKind, ParseOutcome, PipelineError, ReceiptRecord};
pub use storage::{MockObjectStore, ObjectStore, S3ObjectStore};
pub use vision::{LoadedModel, ModelConfig, ModelHolder};
