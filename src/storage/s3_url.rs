// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! `s3://bucket/key` URL parsing

use std::fmt;
use thiserror::Error;

const S3_SCHEME: &str = "s3://";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum S3UrlError {
    #[error("URL must start with s3://")]
    MissingScheme,

    #[error("Invalid S3 URL format")]
    InvalidFormat,
}

/// Bucket/key pair addressed by an `s3://` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl S3Location {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", S3_SCHEME, self.bucket, self.key)
    }
}

/// Split an `s3://bucket/key` URL on the first `/` after the scheme.
///
/// The key keeps any further `/` separators, so `s3://b/path/to/key`
/// yields bucket `b` and key `path/to/key`.
pub fn parse_s3_url(url: &str) -> Result<S3Location, S3UrlError> {
    let path = url.strip_prefix(S3_SCHEME).ok_or(S3UrlError::MissingScheme)?;

    match path.split_once('/') {
        Some((bucket, key)) => Ok(S3Location::new(bucket, key)),
        None => Err(S3UrlError::InvalidFormat),
    }
}
