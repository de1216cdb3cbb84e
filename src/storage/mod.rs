// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object storage access for receipt images

pub mod object_store;
pub mod s3_client;
pub mod s3_url;

pub use object_store::{MockObjectStore, ObjectStore, StorageError};
pub use s3_client::{S3ClientConfig, S3ObjectStore};
pub use s3_url::{parse_s3_url, S3Location, S3UrlError};
