// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! S3-backed object store
//!
//! Credentials and region come from the standard AWS provider chain
//! (environment, shared config files, instance/container roles).

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use super::object_store::{ObjectStore, StorageError};

/// Connection settings for the S3 client
#[derive(Debug, Clone, Default)]
pub struct S3ClientConfig {
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack)
    pub endpoint_url: Option<String>,
    /// Use path-style addressing (`host/bucket/key`)
    pub force_path_style: bool,
}

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build a client from the default AWS provider chain
    pub async fn new(config: S3ClientConfig) -> Self {
        let shared = aws_config::load_from_env().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(ref endpoint) = config.endpoint_url {
            info!("Using custom S3 endpoint: {}", endpoint);
            builder = builder.endpoint_url(endpoint);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        info!(
            "S3 client ready (region: {})",
            shared
                .region()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unset".to_string())
        );

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Wrap an already-configured SDK client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        debug!("GetObject s3://{}/{}", bucket, key);

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_get_object_error(bucket, key, e))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::NetworkError(format!("Failed to read object body: {}", e)))?;

        let bytes = body.into_bytes();
        debug!("Fetched {} bytes from s3://{}/{}", bytes.len(), bucket, key);

        Ok(bytes.to_vec())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

fn map_get_object_error(bucket: &str, key: &str, err: SdkError<GetObjectError>) -> StorageError {
    let location = format!("s3://{}/{}", bucket, key);

    match &err {
        SdkError::ServiceError(service) => {
            let inner = service.err();
            if inner.is_no_such_key() || inner.code() == Some("NoSuchBucket") {
                StorageError::NotFound(location)
            } else if inner.code() == Some("AccessDenied") {
                StorageError::AccessDenied(location)
            } else {
                StorageError::ServerError(DisplayErrorContext(&err).to_string())
            }
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            StorageError::NetworkError(DisplayErrorContext(&err).to_string())
        }
        _ => StorageError::ServerError(DisplayErrorContext(&err).to_string()),
    }
}
