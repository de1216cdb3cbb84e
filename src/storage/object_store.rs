// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use super::s3_url::S3Location;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid location: {0}")]
    InvalidLocation(String),
    #[error("Server error: {0}")]
    ServerError(String),
}

/// Read access to an object store addressed by bucket and key
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full body of an object
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Human-readable backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Fetch the object behind a parsed `s3://` location
    async fn get_location(&self, location: &S3Location) -> Result<Vec<u8>, StorageError> {
        self.get_object(&location.bucket, &location.key).await
    }
}

/// In-memory object store for tests and local runs
#[derive(Debug, Clone, Default)]
pub struct MockObjectStore {
    objects: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
    injected_error: Arc<Mutex<Option<StorageError>>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) {
        let mut objects = self.objects.lock().await;
        objects.insert((bucket.to_string(), key.to_string()), data);
    }

    /// Fail the next fetch with `error`
    pub async fn inject_error(&self, error: StorageError) {
        *self.injected_error.lock().await = Some(error);
    }

    async fn check_injected_error(&self) -> Result<(), StorageError> {
        let mut error_opt = self.injected_error.lock().await;
        if let Some(error) = error_opt.take() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.check_injected_error().await?;

        if bucket.is_empty() || key.is_empty() {
            return Err(StorageError::InvalidLocation(format!(
                "bucket '{}' key '{}'",
                bucket, key
            )));
        }

        let objects = self.objects.lock().await;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}
