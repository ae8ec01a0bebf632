//! In-process stand-in for a cluster control plane and a results bucket store.
use axum::{
    body::Bytes,
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct MockConfig {
    /// Namespaces that exist up front. Requests for any other namespace get a 404.
    pub namespaces: Vec<String>,
    /// Server-wide admission rate; requests beyond it get a 429.
    pub max_tps: Option<NonZeroU32>,
    pub delay: Duration,
    /// Page size for list requests that do not ask for one.
    pub page_size: usize,
    /// Buckets accepting result uploads.
    pub buckets: Vec<String>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            namespaces: vec!["default".to_string()],
            max_tps: None,
            delay: Duration::ZERO,
            page_size: 500,
            buckets: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectBody {
    pub name: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedObject {
    pub name: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectListPage {
    pub items: Vec<CreatedObject>,
    #[serde(rename = "continue", default, skip_serializing_if = "Option::is_none")]
    pub continue_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    #[serde(rename = "continue")]
    pub continue_token: Option<String>,
}

pub struct MockState {
    config: MockConfig,
    limiter: Option<DefaultDirectRateLimiter>,
    namespaces: RwLock<HashMap<String, BTreeMap<String, usize>>>,
    buckets: HashSet<String>,
    uploads: RwLock<HashMap<String, Bytes>>,
    requests: AtomicU64,
}

impl MockState {
    pub fn new(config: MockConfig) -> Self {
        let namespaces = config
            .namespaces
            .iter()
            .map(|ns| (ns.clone(), BTreeMap::new()))
            .collect();
        Self {
            limiter: config
                .max_tps
                .map(|tps| RateLimiter::direct(Quota::per_second(tps))),
            namespaces: RwLock::new(namespaces),
            buckets: config.buckets.iter().cloned().collect(),
            uploads: RwLock::new(HashMap::new()),
            requests: AtomicU64::new(0),
            config,
        }
    }

    /// Insert an object directly, bypassing admission and delay.
    pub fn seed(&self, namespace: &str, name: &str, size: usize) {
        self.write_namespaces()
            .entry(namespace.to_string())
            .or_default()
            .insert(name.to_string(), size);
    }

    pub fn object_count(&self, namespace: &str) -> usize {
        self.read_namespaces()
            .get(namespace)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub fn object_size(&self, namespace: &str, name: &str) -> Option<usize> {
        self.read_namespaces().get(namespace)?.get(name).copied()
    }

    pub fn upload(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.uploads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&format!("{bucket}/{key}"))
            .cloned()
    }

    /// Total requests served, including throttled ones.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    async fn admit(&self) -> Result<(), StatusCode> {
        counter!("mock-server.tps").increment(1);
        self.requests.fetch_add(1, Ordering::Relaxed);
        TPS_MEASURE.fetch_add(1, Ordering::Relaxed);

        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                debug!("Throttling request");
                return Err(StatusCode::TOO_MANY_REQUESTS);
            }
        }
        if !self.config.delay.is_zero() {
            tokio::time::sleep(self.config.delay).await;
        }
        Ok(())
    }

    fn read_namespaces(&self) -> RwLockReadGuard<'_, HashMap<String, BTreeMap<String, usize>>> {
        self.namespaces.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_namespaces(&self) -> RwLockWriteGuard<'_, HashMap<String, BTreeMap<String, usize>>> {
        self.namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route(
            "/api/v1/namespaces/:namespace/objects",
            post(create_object).get(list_objects),
        )
        .route("/store/:bucket/*key", put(put_upload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already bound listener until the process exits.
pub async fn serve(listener: TcpListener, state: Arc<MockState>) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

/// Bind an ephemeral local port and serve from a background task.
pub async fn spawn(config: MockConfig) -> std::io::Result<(SocketAddr, Arc<MockState>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = Arc::new(MockState::new(config));

    let served = state.clone();
    tokio::spawn(async move {
        if let Err(err) = serve(listener, served).await {
            tracing::error!("Mock service stopped: {err}");
        }
    });
    Ok((addr, state))
}

pub async fn run(addr: SocketAddr, config: MockConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("Mock service listening on {}", listener.local_addr()?);
    serve(listener, Arc::new(MockState::new(config))).await?;
    Ok(())
}

#[debug_handler]
async fn create_object(
    State(state): State<Arc<MockState>>,
    Path(namespace): Path<String>,
    Json(body): Json<ObjectBody>,
) -> Result<(StatusCode, Json<CreatedObject>), StatusCode> {
    state.admit().await?;

    if body.name.is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let mut namespaces = state.write_namespaces();
    let objects = namespaces.get_mut(&namespace).ok_or(StatusCode::NOT_FOUND)?;
    if objects.contains_key(&body.name) {
        return Err(StatusCode::CONFLICT);
    }

    let size = body.data.len();
    objects.insert(body.name.clone(), size);
    Ok((
        StatusCode::CREATED,
        Json(CreatedObject {
            name: body.name,
            size,
        }),
    ))
}

#[debug_handler]
async fn list_objects(
    State(state): State<Arc<MockState>>,
    Path(namespace): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<ObjectListPage>, StatusCode> {
    state.admit().await?;

    let page_size = params
        .limit
        .filter(|limit| *limit > 0)
        .unwrap_or(state.config.page_size)
        .max(1);

    let namespaces = state.read_namespaces();
    let objects = namespaces.get(&namespace).ok_or(StatusCode::NOT_FOUND)?;

    let mut remaining = objects
        .iter()
        .filter(|(name, _)| match &params.continue_token {
            Some(token) => name.as_str() > token.as_str(),
            None => true,
        })
        .map(|(name, size)| CreatedObject {
            name: name.clone(),
            size: *size,
        });

    let items: Vec<_> = remaining.by_ref().take(page_size).collect();
    let continue_token = match remaining.next() {
        Some(_) => items.last().map(|item| item.name.clone()),
        None => None,
    };
    Ok(Json(ObjectListPage {
        items,
        continue_token,
    }))
}

#[debug_handler]
async fn put_upload(
    State(state): State<Arc<MockState>>,
    Path((bucket, key)): Path<(String, String)>,
    body: Bytes,
) -> StatusCode {
    if !state.buckets.contains(&bucket) {
        return StatusCode::NOT_FOUND;
    }
    state
        .uploads
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(format!("{bucket}/{key}"), body);
    StatusCode::OK
}

/** TPS Printer **/

static TPS_MEASURE: AtomicU64 = AtomicU64::new(0);

pub async fn tps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let transactions = TPS_MEASURE.swap(0, Ordering::Relaxed);
        info!("{transactions} TPS");
    }
}
