// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Receipt parsing endpoint module
//!
//! Provides POST /parse_receipt for extracting fields from S3-hosted receipts.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::parse_receipt_handler;
pub use request::ParseReceiptRequest;
pub use response::{ParseReceiptResponse, UnparsedResponse, JSON_PARSING_FAILED};
