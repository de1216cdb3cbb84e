// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration from environment variables

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::warn;

use crate::storage::S3ClientConfig;
use crate::vision::donut::{DevicePreference, DEFAULT_INTRA_THREADS};
use crate::vision::ModelConfig;

pub const DEFAULT_MODEL_PATH: &str = "./model";
pub const DEFAULT_API_HOST: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model: ModelConfig,
    pub s3: S3ClientConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_API_HOST.to_string(),
            port: DEFAULT_API_PORT,
            model: ModelConfig::default(),
            s3: S3ClientConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read `MODEL_PATH`, `API_HOST`, `API_PORT`, `DEVICE`,
    /// `ONNX_INTRA_THREADS`, `S3_ENDPOINT_URL` and `S3_FORCE_PATH_STYLE`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] over an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let device = match lookup("DEVICE") {
            Some(value) => value
                .parse::<DevicePreference>()
                .context("Invalid DEVICE")?,
            None => DevicePreference::Auto,
        };

        Ok(Self {
            host: lookup("API_HOST").unwrap_or_else(|| DEFAULT_API_HOST.to_string()),
            port: parse_or_default(&lookup, "API_PORT", DEFAULT_API_PORT),
            model: ModelConfig {
                model_dir: PathBuf::from(
                    lookup("MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
                ),
                device,
                intra_threads: parse_or_default(&lookup, "ONNX_INTRA_THREADS", DEFAULT_INTRA_THREADS)
                    .max(1),
            },
            s3: S3ClientConfig {
                endpoint_url: lookup("S3_ENDPOINT_URL").filter(|v| !v.trim().is_empty()),
                force_path_style: lookup("S3_FORCE_PATH_STYLE")
                    .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                    .unwrap_or(false),
            },
        })
    }

    /// Listen address from host and port
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("⚠️  Ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}
