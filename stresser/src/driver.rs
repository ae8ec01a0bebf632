//! Load driver lifecycle
use crate::aggregate::summarize;
use crate::client::ClusterClient;
use crate::error::DriverError;
use crate::executor::{generate_payload, Executor, ReadExecutor, WriteExecutor};
use crate::limiter::ClientLimiter;
use crate::recorder::Recorder;
use crate::stop::StopSignal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use stresser_core::{LoadRunConfig, OperationKind, RequestOutcome, RequestsSummary, TimeFrame};
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, debug_span, error, info, instrument, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    /// A stop trigger fired; workers are winding down but `stop()` has not returned yet.
    Stopping,
    Stopped,
}

/// What ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopTrigger {
    /// The caller's stop signal was raised.
    Signal,
    /// The configured deadline was reached.
    Deadline,
    /// `stop()` was called before either of the above.
    Manual,
}

impl fmt::Display for StopTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopTrigger::Signal => f.write_str("stop signal"),
            StopTrigger::Deadline => f.write_str("deadline"),
            StopTrigger::Manual => f.write_str("manual stop"),
        }
    }
}

/// Raw outcomes of one stream with their summary.
#[derive(Debug, Clone)]
pub struct StreamMetrics {
    pub outcomes: Vec<RequestOutcome>,
    pub summary: RequestsSummary,
}

impl StreamMetrics {
    fn new(kind: OperationKind, outcomes: Vec<RequestOutcome>) -> Self {
        let summary = summarize(kind, &outcomes);
        Self { outcomes, summary }
    }
}

#[derive(Debug, Clone)]
pub struct RunMetrics {
    pub writes: StreamMetrics,
    pub reads: StreamMetrics,
    pub time_frame: TimeFrame,
    pub trigger: Option<StopTrigger>,
}

impl RunMetrics {
    /// Names of every object created by a successful write, in record order.
    pub fn created_names(&self) -> Vec<String> {
        self.writes
            .outcomes
            .iter()
            .filter_map(|outcome| outcome.object.clone())
            .collect()
    }
}

/// Drives `clients` write loops and `clients` read loops against a cluster until the caller's
/// stop signal fires or the deadline passes.
///
/// # Example
/// ```no_run
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use stresser::{ClusterClient, LoadDriver, LoadRunConfig, StopSignal};
/// # async fn run(client: Arc<dyn ClusterClient>) -> Result<(), stresser::DriverError> {
/// let stop = StopSignal::new();
/// let config = LoadRunConfig::default().with_duration(Duration::from_secs(60));
/// let mut driver = LoadDriver::new(config, client, stop.clone());
/// driver.start()?;
/// driver.finished().await;
/// driver.stop().await;
/// let metrics = driver.collect_metrics()?;
/// println!("{} writes", metrics.writes.summary.total);
/// # Ok(())
/// # }
/// ```
pub struct LoadDriver {
    config: Arc<LoadRunConfig>,
    client: Arc<dyn ClusterClient>,
    external_stop: StopSignal,
    run_stop: StopSignal,
    recorder: Arc<Recorder>,
    state: DriverState,
    workers: Vec<JoinHandle<()>>,
    watcher: Option<JoinHandle<StopTrigger>>,
    trigger: Option<StopTrigger>,
    time_frame: Option<TimeFrame>,
}

impl LoadDriver {
    pub fn new(config: LoadRunConfig, client: Arc<dyn ClusterClient>, stop: StopSignal) -> Self {
        Self {
            config: Arc::new(config),
            client,
            external_stop: stop,
            run_stop: StopSignal::new(),
            recorder: Arc::new(Recorder::new()),
            state: DriverState::Idle,
            workers: vec![],
            watcher: None,
            trigger: None,
            time_frame: None,
        }
    }

    pub fn config(&self) -> &LoadRunConfig {
        &self.config
    }

    pub fn state(&self) -> DriverState {
        match self.state {
            DriverState::Running if self.run_stop.is_raised() => DriverState::Stopping,
            state => state,
        }
    }

    /// Which trigger ended the run, once known.
    pub fn trigger(&self) -> Option<StopTrigger> {
        self.trigger
    }

    /// Spawn every worker. Must be called from within a tokio runtime, and only once.
    #[instrument(name = "driver", skip_all, fields(run = %self.config.run_suffix))]
    pub fn start(&mut self) -> Result<(), DriverError> {
        if self.state != DriverState::Idle {
            return Err(DriverError::AlreadyStarted);
        }

        let config = self.config.clone();
        info!(
            "Starting {} clients at {} QPS (burst {}), deadline {}",
            config.clients,
            config.client_qps,
            config.effective_burst(),
            config.deadline
        );
        if !config.writes_enabled() {
            info!("Object size is 0, writes disabled");
        }
        if !config.reads_enabled() {
            info!("No read namespaces, reads disabled");
        }

        self.time_frame = Some(TimeFrame::begin());
        let deadline = Instant::now() + config.remaining();
        self.watcher = Some(tokio::spawn(
            watch_triggers(self.external_stop.clone(), self.run_stop.clone(), deadline)
                .in_current_span(),
        ));

        let payload = config
            .writes_enabled()
            .then(|| generate_payload(config.object_size));
        let namespaces: Arc<[String]> = config.namespaces_read.clone().into();

        for client in 0..config.clients {
            if let Some(payload) = &payload {
                let executor = WriteExecutor::new(
                    self.client.clone(),
                    &config.namespace_write,
                    payload.clone(),
                    format!("{}-w{client}", config.run_suffix),
                    config.client_timeout,
                );
                self.spawn_worker(client, executor);
            }
            // `None` when no read namespaces are configured.
            let reader = ReadExecutor::new(
                self.client.clone(),
                namespaces.clone(),
                client,
                config.list_limit,
                config.client_timeout,
            );
            if let Some(executor) = reader {
                self.spawn_worker(client, executor);
            }
        }

        self.state = DriverState::Running;
        debug!("Spawned {} workers", self.workers.len());
        Ok(())
    }

    fn spawn_worker<E: Executor + 'static>(&mut self, client: usize, executor: E) {
        let limiter = ClientLimiter::new(self.config.client_qps, self.config.effective_burst());
        let span = debug_span!("worker", client, kind = %executor.kind());
        self.workers.push(tokio::spawn(
            run_worker(
                executor,
                limiter,
                self.run_stop.clone(),
                self.recorder.clone(),
            )
            .instrument(span),
        ));
    }

    /// Resolves once the run has begun stopping, whichever trigger fired.
    pub async fn finished(&self) {
        self.run_stop.raised().await
    }

    /// Stop the run and wait for every worker to exit. No outcome is recorded after this returns.
    #[instrument(name = "driver", skip_all, fields(run = %self.config.run_suffix))]
    pub async fn stop(&mut self) {
        match self.state {
            DriverState::Stopped => return,
            DriverState::Idle => {
                debug!("Stopping a driver that was never started");
                let mut frame = TimeFrame::begin();
                frame.finish();
                self.time_frame = Some(frame);
                self.state = DriverState::Stopped;
                return;
            }
            DriverState::Running | DriverState::Stopping => {}
        }

        self.run_stop.raise();
        for handle in std::mem::take(&mut self.workers) {
            if let Err(err) = handle.await {
                error!("Worker exited abnormally: {err}");
            }
        }

        if let Some(watcher) = self.watcher.take() {
            match watcher.await {
                Ok(trigger) => self.trigger = Some(trigger),
                Err(err) => error!("Stop watcher exited abnormally: {err}"),
            }
        }

        if let Some(frame) = &mut self.time_frame {
            frame.finish();
        }
        self.state = DriverState::Stopped;
        info!(
            "Driver stopped, recorded {} writes and {} reads",
            self.recorder.len(OperationKind::Write),
            self.recorder.len(OperationKind::Read)
        );
    }

    /// Summaries of both streams. Only available after `stop()`; repeated calls return the same
    /// result.
    pub fn collect_metrics(&self) -> Result<RunMetrics, DriverError> {
        if self.state != DriverState::Stopped {
            return Err(DriverError::NotStopped);
        }

        let snapshot = self.recorder.snapshot();
        Ok(RunMetrics {
            writes: StreamMetrics::new(OperationKind::Write, snapshot.writes),
            reads: StreamMetrics::new(OperationKind::Read, snapshot.reads),
            time_frame: self.time_frame.unwrap_or_else(TimeFrame::begin),
            trigger: self.trigger,
        })
    }

    /// Names of every object created during the run.
    pub fn created_names(&self) -> Result<Vec<String>, DriverError> {
        if self.state != DriverState::Stopped {
            return Err(DriverError::NotStopped);
        }
        Ok(self
            .recorder
            .snapshot()
            .writes
            .into_iter()
            .filter_map(|outcome| outcome.object)
            .collect())
    }
}

impl Drop for LoadDriver {
    fn drop(&mut self) {
        // Detached workers would otherwise keep issuing requests until the deadline.
        self.run_stop.raise();
    }
}

async fn watch_triggers(
    external: StopSignal,
    run_stop: StopSignal,
    deadline: Instant,
) -> StopTrigger {
    let trigger = tokio::select! {
        biased;
        _ = external.raised() => StopTrigger::Signal,
        _ = run_stop.raised() => StopTrigger::Manual,
        _ = tokio::time::sleep_until(deadline) => StopTrigger::Deadline,
    };
    info!("Run stopping on {trigger}");
    run_stop.raise();
    trigger
}

async fn run_worker<E: Executor>(
    mut executor: E,
    limiter: ClientLimiter,
    stop: StopSignal,
    recorder: Arc<Recorder>,
) {
    let mut issued = 0u64;
    while !stop.is_raised() {
        tokio::select! {
            biased;
            _ = stop.raised() => break,
            _ = limiter.acquire() => {}
        }

        // NOTE: An admitted request always runs to completion or to its own timeout.
        let outcome = executor.execute().await;
        recorder.record(outcome);
        issued += 1;
    }
    debug!("Worker exiting after {issued} requests");
}
