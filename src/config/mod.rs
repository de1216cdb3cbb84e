// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod server;

pub use server::{ServerConfig, DEFAULT_API_HOST, DEFAULT_API_PORT, DEFAULT_MODEL_PATH};
