//! Contracts for the collaborators a run talks to.
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use stresser_core::ErrorClass;
use thiserror::Error;

/// An object to be created by a write.
#[derive(Clone, Debug)]
pub struct NewObject {
    pub name: String,
    pub data: Arc<str>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("request throttled by the API server")]
    Throttled,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("object already exists: {0}")]
    Conflict(String),

    #[error("request rejected: {0}")]
    Invalid(String),

    #[error("request timed out")]
    Timeout,

    #[error("API error: {0}")]
    Other(String),
}

impl ApiError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ApiError::Throttled => ErrorClass::Throttled,
            ApiError::NotFound(_) => ErrorClass::NotFound,
            ApiError::Timeout => ErrorClass::Timeout,
            ApiError::Conflict(_) | ApiError::Invalid(_) | ApiError::Other(_) => ErrorClass::Other,
        }
    }
}

/// Handle to the target cluster's control-plane API.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Create `object` in `namespace`, returning the name the server assigned.
    async fn create(&self, namespace: &str, object: &NewObject) -> Result<String, ApiError>;

    /// List objects in `namespace`, returning how many items came back.
    ///
    /// A non-zero `limit` caps the call to a single page of at most `limit` items. Zero lists
    /// the whole collection, following continuation tokens as needed.
    async fn list(&self, namespace: &str, limit: u64) -> Result<usize, ApiError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read local artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("object store rejected key {key}: {reason}")]
    Rejected { key: String, reason: String },

    #[error("object store transport error: {0}")]
    Transport(String),
}

/// Remote object storage for run artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `local_path` under `key`, overwriting any existing object.
    async fn put(&self, key: &str, local_path: &Path) -> Result<(), StoreError>;
}
