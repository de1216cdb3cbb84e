// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-stage failures of the receipt pipeline

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stage a failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Fetch,
    Preprocess,
    Inference,
    Decode,
    Structure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetch",
            Self::Preprocess => "preprocess",
            Self::Inference => "inference",
            Self::Decode => "decode",
            Self::Structure => "structure",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Bad URL, storage failure or undecodable image bytes
    #[error("Error fetching image from S3: {0}")]
    Fetch(String),

    #[error("Preprocessing failed: {0}")]
    Preprocess(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Post-processing failed: {0}")]
    Decode(String),

    /// The cleaned sequence did not yield a key/value mapping
    #[error("JSON parsing failed: {reason}")]
    Structure { raw_sequence: String, reason: String },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(_) => ErrorKind::Fetch,
            Self::Preprocess(_) => ErrorKind::Preprocess,
            Self::Inference(_) => ErrorKind::Inference,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Structure { .. } => ErrorKind::Structure,
        }
    }

    /// Whether the caller supplied something unusable (as opposed to a server fault)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}
