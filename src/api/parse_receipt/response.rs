// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Receipt parsing response types

use serde::{Deserialize, Serialize};

use crate::pipeline::{ParseOutcome, ReceiptRecord};

pub const JSON_PARSING_FAILED: &str = "JSON parsing failed";

/// Diagnostic body returned when the model output has no structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnparsedResponse {
    pub error: String,
    pub raw_sequence: String,
}

/// Body of a 200 response
///
/// `Unparsed` is listed first so deserialization does not fold the
/// diagnostic body into an all-null record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParseReceiptResponse {
    Unparsed(UnparsedResponse),
    Record(ReceiptRecord),
}

impl From<ParseOutcome> for ParseReceiptResponse {
    fn from(outcome: ParseOutcome) -> Self {
        match outcome {
            ParseOutcome::Record(record) => Self::Record(record),
            ParseOutcome::Unparsed { raw_sequence } => Self::Unparsed(UnparsedResponse {
                error: JSON_PARSING_FAILED.to_string(),
                raw_sequence,
            }),
        }
    }
}
