//! Persisting run results to disk and remote object storage.
use crate::client::ObjectStore;
use crate::driver::{RunMetrics, StreamMetrics};
use crate::error::SinkError;
use comfy_table::{presets::ASCII_FULL, ContentArrangement, Table};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stresser_core::{random_suffix, ArtifactLocation, OutputLocations, RequestsSummary};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, warn};

/// An upload that did not make it. The local artifact is still in place.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFailure {
    pub key: String,
    pub local_path: PathBuf,
    pub reason: String,
}

/// A local artifact that could not be written. Nothing is uploaded for it.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteFailure {
    pub local_path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct SinkReport {
    pub written: Vec<PathBuf>,
    pub failed_writes: Vec<WriteFailure>,
    pub uploaded: Vec<String>,
    pub failed_uploads: Vec<UploadFailure>,
}

impl SinkReport {
    pub fn fully_uploaded(&self) -> bool {
        self.failed_uploads.is_empty()
    }

    pub fn fully_written(&self) -> bool {
        self.failed_writes.is_empty()
    }
}

/// Writes the six run artifacts locally, then mirrors them to the object store when one is
/// configured. Local files are authoritative: upload problems are reported, never fatal. A
/// failed local write only costs that artifact; the rest are still written and uploaded.
pub struct ResultSink {
    outputs: OutputLocations,
    store: Option<Arc<dyn ObjectStore>>,
}

impl ResultSink {
    pub fn new(outputs: OutputLocations) -> Self {
        Self {
            outputs,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn outputs(&self) -> &OutputLocations {
        &self.outputs
    }

    /// Make sure every output directory exists and accepts writes. Run this before starting a
    /// driver so a bad path fails the run up front.
    pub async fn prepare(&self) -> Result<(), SinkError> {
        let dirs: BTreeSet<&Path> = self
            .outputs
            .all()
            .iter()
            .filter_map(|location| location.local_path.parent())
            .collect();

        for dir in dirs {
            let dir_err = |source| SinkError::OutputDir {
                path: dir.to_path_buf(),
                source,
            };
            tokio::fs::create_dir_all(dir).await.map_err(dir_err)?;

            let probe = dir.join(format!(".stresser-probe-{}", random_suffix()));
            tokio::fs::write(&probe, b"probe").await.map_err(dir_err)?;
            tokio::fs::remove_file(&probe).await.map_err(dir_err)?;
            debug!("Output directory {} is writable", dir.display());
        }
        Ok(())
    }

    /// Write every artifact, then upload the ones that made it to disk. Returns
    /// [`SinkError::Incomplete`], carrying the full report, if any local write failed.
    #[instrument(name = "sink", skip_all)]
    pub async fn persist(&self, metrics: &RunMetrics) -> Result<SinkReport, SinkError> {
        let mut report = SinkReport::default();

        write_stream(
            &metrics.writes,
            [
                &self.outputs.writes_raw_json,
                &self.outputs.writes_summary_json,
                &self.outputs.writes_summary_table,
            ],
            &mut report,
        )
        .await;
        write_stream(
            &metrics.reads,
            [
                &self.outputs.reads_raw_json,
                &self.outputs.reads_summary_json,
                &self.outputs.reads_summary_table,
            ],
            &mut report,
        )
        .await;
        info!("Wrote {} local artifacts", report.written.len());

        self.upload_all(&mut report).await;

        if !report.fully_written() {
            return Err(SinkError::Incomplete(Box::new(report)));
        }
        Ok(report)
    }

    async fn upload_all(&self, report: &mut SinkReport) {
        let pending: Vec<_> = self
            .outputs
            .all()
            .into_iter()
            .filter(|location| report.written.contains(&location.local_path))
            .filter_map(|location| {
                location
                    .remote_key
                    .as_deref()
                    .map(|key| (key, &location.local_path))
            })
            .collect();
        if pending.is_empty() {
            return;
        }

        let Some(store) = &self.store else {
            warn!(
                "{} artifacts have remote keys but no object store is configured",
                pending.len()
            );
            return;
        };

        for (key, local_path) in pending {
            match store.put(key, local_path).await {
                Ok(()) => {
                    info!("Uploaded {} to {key}", local_path.display());
                    report.uploaded.push(key.to_string());
                }
                Err(err) => {
                    warn!("Failed to upload {} to {key}: {err}", local_path.display());
                    report.failed_uploads.push(UploadFailure {
                        key: key.to_string(),
                        local_path: local_path.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
}

/// Raw outcomes, summary JSON and summary table, in that order.
async fn write_stream(
    stream: &StreamMetrics,
    locations: [&ArtifactLocation; 3],
    report: &mut SinkReport,
) {
    let [raw, summary_json, summary_table] = locations;
    let artifacts = [
        (raw, serde_json::to_vec_pretty(&stream.outcomes)),
        (summary_json, serde_json::to_vec_pretty(&stream.summary)),
        (summary_table, Ok(render_table(&stream.summary).into_bytes())),
    ];

    for (location, contents) in artifacts {
        let res = match contents {
            Ok(contents) => write_artifact(location, &contents).await,
            Err(err) => Err(SinkError::from(err)),
        };
        match res {
            Ok(()) => report.written.push(location.local_path.clone()),
            Err(err) => {
                error!("{err}");
                report.failed_writes.push(WriteFailure {
                    local_path: location.local_path.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
}

async fn write_artifact(location: &ArtifactLocation, contents: &[u8]) -> Result<(), SinkError> {
    tokio::fs::write(&location.local_path, contents)
        .await
        .map_err(|source| SinkError::Write {
            path: location.local_path.clone(),
            source,
        })?;
    debug!("Wrote {}", location.local_path.display());
    Ok(())
}

/// Fixed-width text rendering of a summary.
pub fn render_table(summary: &RequestsSummary) -> String {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(vec![format!("{} SUMMARY", summary.kind).to_uppercase(), "VALUE".to_string()]);

    let mut row = |name: &str, value: String| {
        table.add_row(vec![name.to_string(), value]);
    };

    row("total", summary.total.to_string());
    row("succeeded", summary.succeeded.to_string());
    row("failed", summary.failed.to_string());
    row("error rate", format!("{:.2}%", summary.error_rate() * 100.0));
    row(
        "throughput",
        format!("{:.2} req/s", summary.throughput_per_second),
    );

    match &summary.latency {
        Some(latency) => {
            row("latency p50", fmt_duration(latency.p50));
            row("latency p90", fmt_duration(latency.p90));
            row("latency p99", fmt_duration(latency.p99));
            row("latency max", fmt_duration(latency.max));
        }
        None => row("latency", "n/a (no successful requests)".to_string()),
    }

    if let Some(frame) = &summary.time_frame {
        row("started", frame.start.to_string());
        if let Some(end) = frame.end {
            row("finished", end.to_string());
        }
    }

    for (class, count) in &summary.error_breakdown {
        row(&format!("errors: {class}"), count.to_string());
    }

    for bucket in &summary.latency_histogram {
        let name = match bucket.upper_bound {
            Some(bound) => format!("<= {}", fmt_duration(bound)),
            None => "> last bound".to_string(),
        };
        row(&format!("histogram {name}"), bucket.count.to_string());
    }

    let mut rendered = table.to_string();
    rendered.push('\n');
    rendered
}

fn fmt_duration(duration: std::time::Duration) -> String {
    humantime::format_duration(duration).to_string()
}
