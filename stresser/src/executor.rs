use crate::client::{ApiError, ClusterClient, NewObject};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stresser_core::{OperationKind, RequestOutcome};
use time::OffsetDateTime;
#[allow(unused)]
use tracing::{debug, trace};

/// Issues exactly one request per call and reports what happened. Failures are part of the
/// outcome, never returned as errors.
#[async_trait]
pub trait Executor: Send {
    fn kind(&self) -> OperationKind;

    async fn execute(&mut self) -> RequestOutcome;
}

/// Deterministic payload of exactly `size` ASCII bytes.
pub fn generate_payload(size: usize) -> Arc<str> {
    (0..size)
        .map(|i| char::from(b'a' + (i % 26) as u8))
        .collect::<String>()
        .into()
}

pub struct WriteExecutor {
    client: Arc<dyn ClusterClient>,
    namespace: String,
    payload: Arc<str>,
    name_prefix: String,
    seq: u64,
    timeout: Duration,
}

impl WriteExecutor {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        namespace: &str,
        payload: Arc<str>,
        name_prefix: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
            payload,
            name_prefix,
            seq: 0,
            timeout,
        }
    }

    fn next_object(&mut self) -> NewObject {
        let name = format!("{}-{}", self.name_prefix, self.seq);
        self.seq += 1;
        NewObject {
            name,
            data: self.payload.clone(),
        }
    }
}

#[async_trait]
impl Executor for WriteExecutor {
    fn kind(&self) -> OperationKind {
        OperationKind::Write
    }

    async fn execute(&mut self) -> RequestOutcome {
        let object = self.next_object();
        let started_at = OffsetDateTime::now_utc();
        let start = Instant::now();
        let res = with_timeout(self.timeout, self.client.create(&self.namespace, &object)).await;
        let latency = start.elapsed();

        match res {
            Ok(name) => {
                trace!("Created {name} in {}", self.namespace);
                RequestOutcome::success(OperationKind::Write, &self.namespace, started_at, latency)
                    .with_object(name)
            }
            Err(err) => {
                debug!("Write of {} failed: {err}", object.name);
                RequestOutcome::failure(
                    OperationKind::Write,
                    &self.namespace,
                    started_at,
                    latency,
                    err.class(),
                )
            }
        }
    }
}

/// Lists namespaces in round-robin order.
pub struct ReadExecutor {
    client: Arc<dyn ClusterClient>,
    namespaces: Arc<[String]>,
    cursor: usize,
    list_limit: u64,
    timeout: Duration,
}

impl ReadExecutor {
    /// `offset` staggers the starting namespace so concurrent clients do not all hit the same
    /// namespace first. Returns `None` when there is nothing to read.
    pub fn new(
        client: Arc<dyn ClusterClient>,
        namespaces: Arc<[String]>,
        offset: usize,
        list_limit: u64,
        timeout: Duration,
    ) -> Option<Self> {
        if namespaces.is_empty() {
            return None;
        }
        Some(Self {
            client,
            cursor: offset % namespaces.len(),
            namespaces,
            list_limit,
            timeout,
        })
    }

    fn next_namespace(&mut self) -> String {
        let namespace = self.namespaces[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.namespaces.len();
        namespace
    }
}

#[async_trait]
impl Executor for ReadExecutor {
    fn kind(&self) -> OperationKind {
        OperationKind::Read
    }

    async fn execute(&mut self) -> RequestOutcome {
        let namespace = self.next_namespace();
        let started_at = OffsetDateTime::now_utc();
        let start = Instant::now();
        let res = with_timeout(self.timeout, self.client.list(&namespace, self.list_limit)).await;
        let latency = start.elapsed();

        match res {
            Ok(items) => {
                trace!("Listed {items} items in {namespace}");
                RequestOutcome::success(OperationKind::Read, &namespace, started_at, latency)
            }
            Err(err) => {
                debug!("List of {namespace} failed: {err}");
                RequestOutcome::failure(
                    OperationKind::Read,
                    &namespace,
                    started_at,
                    latency,
                    err.class(),
                )
            }
        }
    }
}

async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, ApiError>
where
    F: std::future::Future<Output = Result<T, ApiError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(res) => res,
        Err(_elapsed) => Err(ApiError::Timeout),
    }
}
