// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the receipt parser

/// Semantic version number
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "donut-onnx",
    "s3-fetch",
    "greedy-decoding",
    "kv-cache",
    "cuda-auto-select",
    "health-endpoint",
];

/// Get formatted version string
pub fn get_version_string() -> String {
    format!("receipt-parser v{} ({})", VERSION, FEATURES.join(", "))
}
