// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Receipt parsing request types

use serde::{Deserialize, Serialize};

/// Request for receipt parsing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParseReceiptRequest {
    /// Image location, `s3://bucket/key`
    pub s3_url: String,
}
