//! In-memory collaborators for unit tests.
use crate::client::{ApiError, ClusterClient, NewObject, ObjectStore, StoreError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Zero-latency control plane keyed by namespace. Optionally fails every Nth call.
pub(crate) struct FakeCluster {
    namespaces: Mutex<BTreeMap<String, Vec<(String, usize)>>>,
    latency: Duration,
    failure: Option<(ApiError, u64)>,
    calls: AtomicU64,
    creates: AtomicU64,
    lists: AtomicU64,
    last_listed: Mutex<Option<usize>>,
}

impl FakeCluster {
    pub fn new(namespaces: &[&str]) -> Self {
        Self {
            namespaces: Mutex::new(
                namespaces
                    .iter()
                    .map(|ns| (ns.to_string(), vec![]))
                    .collect(),
            ),
            latency: Duration::ZERO,
            failure: None,
            calls: AtomicU64::new(0),
            creates: AtomicU64::new(0),
            lists: AtomicU64::new(0),
            last_listed: Mutex::new(None),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail every `every`th call (1 fails all of them) with `err`.
    pub fn failing_with(mut self, err: ApiError, every: u64) -> Self {
        self.failure = Some((err, every.max(1)));
        self
    }

    pub fn seed(&self, namespace: &str, name: &str, size: usize) {
        self.namespaces
            .lock()
            .unwrap()
            .entry(namespace.to_string())
            .or_default()
            .push((name.to_string(), size));
    }

    pub fn stored_sizes(&self, namespace: &str) -> Vec<usize> {
        self.namespaces
            .lock()
            .unwrap()
            .get(namespace)
            .map(|objects| objects.iter().map(|(_, size)| *size).collect())
            .unwrap_or_default()
    }

    pub fn create_calls(&self) -> u64 {
        self.creates.load(Ordering::Relaxed)
    }

    pub fn list_calls(&self) -> u64 {
        self.lists.load(Ordering::Relaxed)
    }

    pub fn last_listed(&self) -> Option<usize> {
        *self.last_listed.lock().unwrap()
    }

    async fn call(&self) -> Result<(), ApiError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        match &self.failure {
            Some((err, every)) if n % every == 0 => Err(err.clone()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn create(&self, namespace: &str, object: &NewObject) -> Result<String, ApiError> {
        self.creates.fetch_add(1, Ordering::Relaxed);
        self.call().await?;
        let mut namespaces = self.namespaces.lock().unwrap();
        let objects = namespaces
            .get_mut(namespace)
            .ok_or_else(|| ApiError::NotFound(namespace.to_string()))?;
        if objects.iter().any(|(name, _)| *name == object.name) {
            return Err(ApiError::Conflict(object.name.clone()));
        }
        objects.push((object.name.clone(), object.data.len()));
        Ok(object.name.clone())
    }

    async fn list(&self, namespace: &str, limit: u64) -> Result<usize, ApiError> {
        self.lists.fetch_add(1, Ordering::Relaxed);
        self.call().await?;
        let count = {
            let namespaces = self.namespaces.lock().unwrap();
            let objects = namespaces
                .get(namespace)
                .ok_or_else(|| ApiError::NotFound(namespace.to_string()))?;
            match limit {
                0 => objects.len(),
                limit => objects.len().min(limit as usize),
            }
        };
        *self.last_listed.lock().unwrap() = Some(count);
        Ok(count)
    }
}

/// Object store that remembers uploaded keys and rejects a configured set.
#[derive(Default)]
pub(crate) struct FakeStore {
    rejected: HashSet<String>,
    uploaded: Mutex<Vec<(String, Vec<u8>)>>,
}

impl FakeStore {
    pub fn rejecting(keys: &[&str]) -> Self {
        Self {
            rejected: keys.iter().map(|k| k.to_string()).collect(),
            uploaded: Mutex::default(),
        }
    }

    pub fn uploaded_keys(&self) -> Vec<String> {
        self.uploaded
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn put(&self, key: &str, local_path: &Path) -> Result<(), StoreError> {
        if self.rejected.contains(key) {
            return Err(StoreError::Rejected {
                key: key.to_string(),
                reason: "access denied".to_string(),
            });
        }
        let data = tokio::fs::read(local_path).await?;
        self.uploaded.lock().unwrap().push((key.to_string(), data));
        Ok(())
    }
}
