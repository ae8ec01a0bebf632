//! Default stresser runtime
//!
//! Wires the load driver to an HTTP control plane, a result sink and the process's OS signals.
use crate::{
    error::RuntimeError,
    http::HttpClusterClient,
    store::{DirObjectStore, HttpObjectStore},
};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stresser::{LoadDriver, ObjectStore, ResultSink, RunMetrics, SinkReport, StopSignal};
use stresser_core::{
    random_suffix, LoadRunConfig, OutputLocations, RemoteDirs, DEFAULT_CLIENTS,
    DEFAULT_CLIENT_BURST, DEFAULT_CLIENT_QPS, DEFAULT_NAMESPACE, DEFAULT_OUTPUT_DIR,
};
use time::OffsetDateTime;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn, Instrument};
use tracing_subscriber::EnvFilter;

const DEFAULT_API_SERVER: &str = "http://localhost:8080";

pub const DEFAULT_LOG_FILTER: &str = "stresser=info,stresser_runtime=info";

/// Log filter from `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`] when it is unset, blank
/// or unparsable.
pub fn env_filter() -> EnvFilter {
    filter_from(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
}

fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "stresser",
    version,
    about = "Put rate-limited write and list load on a cluster control plane"
)]
pub struct StresserArgs {
    /// Base URL of the control-plane API server.
    #[arg(long, default_value = DEFAULT_API_SERVER)]
    pub api_server: String,

    /// Number of clients; each runs one write loop and one read loop.
    #[arg(long, default_value_t = DEFAULT_CLIENTS)]
    pub clients: usize,

    #[arg(long, default_value_t = DEFAULT_CLIENT_QPS)]
    pub client_qps: f64,

    #[arg(long, default_value_t = DEFAULT_CLIENT_BURST)]
    pub client_burst: u32,

    #[arg(long, value_parser = humantime::parse_duration, default_value = "15s")]
    pub client_timeout: Duration,

    /// Bytes per created object. 0 disables writes.
    #[arg(long, default_value_t = 0)]
    pub object_size: usize,

    /// Page size for list calls. 0 lists everything.
    #[arg(long, default_value_t = 0)]
    pub list_limit: u64,

    #[arg(long, value_parser = humantime::parse_duration, default_value = "5m")]
    pub duration: Duration,

    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace_write: String,

    /// Comma separated namespaces to list. An empty value disables reads.
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_NAMESPACE)]
    pub namespaces_read: Vec<String>,

    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    #[arg(long, default_value = "")]
    pub writes_output_name_prefix: String,

    #[arg(long, default_value = "")]
    pub reads_output_name_prefix: String,

    #[arg(long, default_value = "")]
    pub writes_raw_json_remote_dir: String,

    #[arg(long, default_value = "")]
    pub writes_summary_json_remote_dir: String,

    #[arg(long, default_value = "")]
    pub writes_summary_table_remote_dir: String,

    #[arg(long, default_value = "")]
    pub reads_raw_json_remote_dir: String,

    #[arg(long, default_value = "")]
    pub reads_summary_json_remote_dir: String,

    #[arg(long, default_value = "")]
    pub reads_summary_table_remote_dir: String,

    /// HTTP bucket store endpoint for uploads.
    #[arg(long, requires = "bucket", conflicts_with = "store_dir")]
    pub store_url: Option<String>,

    #[arg(long)]
    pub bucket: Option<String>,

    /// Mirror uploads into this directory instead of an HTTP store.
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Wait for SIGINT/SIGTERM after the run completes.
    #[arg(long)]
    pub block: bool,
}

impl Default for StresserArgs {
    fn default() -> Self {
        Self::parse_from(["stresser"])
    }
}

impl StresserArgs {
    /// Build the run configuration. The deadline starts counting now and a fresh run suffix is
    /// drawn on every call.
    pub fn to_config(&self) -> LoadRunConfig {
        let run_suffix = random_suffix();
        let remote = RemoteDirs {
            writes_raw_json: self.writes_raw_json_remote_dir.clone(),
            writes_summary_json: self.writes_summary_json_remote_dir.clone(),
            writes_summary_table: self.writes_summary_table_remote_dir.clone(),
            reads_raw_json: self.reads_raw_json_remote_dir.clone(),
            reads_summary_json: self.reads_summary_json_remote_dir.clone(),
            reads_summary_table: self.reads_summary_table_remote_dir.clone(),
        };
        let outputs = OutputLocations::generate(
            &self.output_dir,
            &self.writes_output_name_prefix,
            &self.reads_output_name_prefix,
            &run_suffix,
            &remote,
        );

        let namespaces_read = if self.namespaces_read.iter().all(String::is_empty) {
            vec![]
        } else {
            self.namespaces_read.clone()
        };

        LoadRunConfig {
            clients: self.clients,
            client_qps: self.client_qps,
            client_burst: self.client_burst,
            client_timeout: self.client_timeout,
            deadline: OffsetDateTime::now_utc() + self.duration,
            namespace_write: self.namespace_write.clone(),
            namespaces_read,
            object_size: self.object_size,
            list_limit: self.list_limit,
            run_suffix,
            outputs,
        }
    }

    fn object_store(
        &self,
        timeout: Duration,
    ) -> Result<Option<Arc<dyn ObjectStore>>, RuntimeError> {
        if let Some(url) = &self.store_url {
            let bucket = self.bucket.as_deref().ok_or(RuntimeError::MissingBucket)?;
            return Ok(Some(Arc::new(HttpObjectStore::new(url, bucket, timeout)?)));
        }
        Ok(self
            .store_dir
            .as_ref()
            .map(|dir| Arc::new(DirObjectStore::new(dir)) as Arc<dyn ObjectStore>))
    }
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    pub metrics: RunMetrics,
    pub sink: SinkReport,
}

/// Default stresser runtime.
///
/// Runs a single load run to completion: the driver stops at the configured duration or on
/// SIGINT/SIGTERM, whichever comes first, and the results are persisted before `run` returns.
///
/// # Example
///
/// ```ignore
/// use stresser_runtime::StresserRuntime;
///
/// #[tokio::main]
/// async fn main() {
///     let report = StresserRuntime::new()
///         .with_args()
///         .run()
///         .await
///         .unwrap();
///     println!("{}", report.metrics.writes.summary.total);
/// }
/// ```
pub struct StresserRuntime {
    args: StresserArgs,
}

impl Default for StresserRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl StresserRuntime {
    pub fn new() -> Self {
        StresserRuntime {
            args: StresserArgs::default(),
        }
    }

    /// Use the command-line arguments of the current process.
    ///
    /// # Example
    /// ```ignore
    /// $ stresser --api-server http://10.0.0.1:8080 --object-size 1024 --duration 10m
    /// $ stresser --namespaces-read default,kube-system --store-dir /mnt/results --block
    /// ```
    pub fn with_args(mut self) -> Self {
        self.args = StresserArgs::parse();
        self
    }

    pub fn args(mut self, args: StresserArgs) -> Self {
        self.args = args;
        self
    }

    #[instrument(name = "stresser", skip_all, fields(api_server = %self.args.api_server))]
    pub async fn run(self) -> Result<RunReport, RuntimeError> {
        if let Some(addr) = self.args.metrics_addr {
            PrometheusBuilder::new().with_http_listener(addr).install()?;
            info!("Serving metrics on {addr}");
        }

        let config = self.args.to_config();
        config.validate()?;

        let client = Arc::new(HttpClusterClient::new(
            &self.args.api_server,
            config.client_timeout,
        )?);
        let mut sink = ResultSink::new(config.outputs.clone());
        if let Some(store) = self.args.object_store(config.client_timeout)? {
            sink = sink.with_store(store);
        }
        sink.prepare().await?;

        let stop = StopSignal::new();
        let mut signals = OsSignals::listen().map_err(RuntimeError::Signal)?;
        let forwarder = {
            let stop = stop.clone();
            tokio::spawn(
                async move {
                    let name = signals.recv().await;
                    info!("Received {name}, stopping");
                    stop.raise();
                }
                .in_current_span(),
            )
        };

        info!(
            "Starting run {} for {:?}",
            config.run_suffix,
            config.remaining()
        );
        let mut driver = LoadDriver::new(config, client, stop.clone());
        driver.start()?;
        driver.finished().await;
        driver.stop().await;

        let metrics = driver.collect_metrics()?;
        if let Some(trigger) = metrics.trigger {
            info!(
                "Run ended by {trigger} after {}: {} writes, {} reads",
                metrics.time_frame,
                metrics.writes.summary.total,
                metrics.reads.summary.total
            );
        }

        let report = sink.persist(&metrics).await?;
        if !report.fully_uploaded() {
            warn!(
                "{} of {} uploads failed; local results are kept",
                report.failed_uploads.len(),
                report.failed_uploads.len() + report.uploaded.len()
            );
        }

        if self.args.block && !stop.is_raised() {
            info!("Run complete, waiting for SIGINT/SIGTERM");
            stop.raised().await;
        }
        forwarder.abort();

        Ok(RunReport {
            metrics,
            sink: report,
        })
    }
}

#[cfg(unix)]
struct OsSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    fn listen() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
struct OsSignals;

#[cfg(not(unix))]
impl OsSignals {
    fn listen() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        "ctrl-c"
    }
}
