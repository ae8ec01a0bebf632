//! `ObjectStore` backends for uploading run artifacts.
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stresser::{ObjectStore, StoreError};
use tracing::debug;
use url::Url;

use crate::error::RuntimeError;

/// Bucket store reached over plain HTTP: each artifact is a `PUT {endpoint}/{bucket}/{key}`.
#[derive(Clone, Debug)]
pub struct HttpObjectStore {
    endpoint: Url,
    bucket: String,
    client: Client,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, bucket: &str, timeout: Duration) -> Result<Self, RuntimeError> {
        let endpoint = Url::parse(endpoint)?;
        if endpoint.cannot_be_a_base() {
            return Err(RuntimeError::InvalidStoreUrl(endpoint.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint,
            bucket: bucket.to_string(),
            client,
        })
    }

    fn object_url(&self, key: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&self.bucket)
                .extend(key.split('/').filter(|part| !part.is_empty()));
        }
        url
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, local_path: &Path) -> Result<(), StoreError> {
        let body = tokio::fs::read(local_path).await?;
        let res = self
            .client
            .put(self.object_url(key))
            .body(body)
            .send()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            return Err(StoreError::Rejected {
                key: key.to_string(),
                reason: status.to_string(),
            });
        }
        debug!("Uploaded {} to {}/{key}", local_path.display(), self.bucket);
        Ok(())
    }
}

/// Mirrors artifacts into a local directory, e.g. a mounted volume that is shipped elsewhere.
#[derive(Clone, Debug)]
pub struct DirObjectStore {
    root: PathBuf,
}

impl DirObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn target(&self, key: &str) -> Result<PathBuf, StoreError> {
        let mut target = self.root.clone();
        for part in key.split('/').filter(|part| !part.is_empty()) {
            if part == "." || part == ".." {
                return Err(StoreError::Rejected {
                    key: key.to_string(),
                    reason: "relative path components are not allowed".to_string(),
                });
            }
            target.push(part);
        }
        if target == self.root {
            return Err(StoreError::Rejected {
                key: key.to_string(),
                reason: "empty key".to_string(),
            });
        }
        Ok(target)
    }
}

#[async_trait]
impl ObjectStore for DirObjectStore {
    async fn put(&self, key: &str, local_path: &Path) -> Result<(), StoreError> {
        let target = self.target(key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &target).await?;
        debug!("Copied {} to {}", local_path.display(), target.display());
        Ok(())
    }
}
