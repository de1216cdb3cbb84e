// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod http_server;
pub mod parse_receipt;

pub use errors::{ApiError, ApiJson, ErrorResponse, MODEL_NOT_LOADED};
pub use http_server::{create_app, start_server, AppState, HealthResponse};
pub use parse_receipt::{ParseReceiptRequest, ParseReceiptResponse};
