use crate::{
    DEFAULT_CLIENTS, DEFAULT_CLIENT_BURST, DEFAULT_CLIENT_QPS, DEFAULT_CLIENT_TIMEOUT,
    DEFAULT_DURATION, DEFAULT_NAMESPACE, DEFAULT_OUTPUT_DIR, MAX_OBJECT_SIZE, RUN_SUFFIX_LEN,
};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("client QPS must be a positive finite number, got {0}")]
    InvalidQps(f64),

    #[error("client timeout must be greater than zero")]
    InvalidTimeout,

    #[error("object size {size} exceeds the maximum of {max} bytes")]
    ObjectTooLarge { size: usize, max: usize },

    #[error("write namespace is empty but writes are enabled")]
    EmptyWriteNamespace,

    #[error("read namespace at position {0} is empty")]
    EmptyReadNamespace(usize),

    #[error("deadline {0} has already passed")]
    DeadlineElapsed(OffsetDateTime),
}

/// Immutable input to a single load run.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoadRunConfig {
    /// Number of clients per operation kind. Each client runs its own write loop and its own
    /// read loop.
    pub clients: usize,
    pub client_qps: f64,
    pub client_burst: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub client_timeout: Duration,
    #[serde(with = "time::serde::rfc3339")]
    pub deadline: OffsetDateTime,
    pub namespace_write: String,
    pub namespaces_read: Vec<String>,
    /// Size of every write payload in bytes. Zero disables writes.
    pub object_size: usize,
    /// Page size for list calls. Zero lists everything.
    pub list_limit: u64,
    /// Random per-run identifier embedded in artifact and object names.
    pub run_suffix: String,
    pub outputs: OutputLocations,
}

impl Default for LoadRunConfig {
    fn default() -> Self {
        let run_suffix = random_suffix();
        let outputs = OutputLocations::generate(
            Path::new(DEFAULT_OUTPUT_DIR),
            "",
            "",
            &run_suffix,
            &RemoteDirs::default(),
        );
        Self {
            clients: DEFAULT_CLIENTS,
            client_qps: DEFAULT_CLIENT_QPS,
            client_burst: DEFAULT_CLIENT_BURST,
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
            deadline: OffsetDateTime::now_utc() + DEFAULT_DURATION,
            namespace_write: DEFAULT_NAMESPACE.to_string(),
            namespaces_read: vec![DEFAULT_NAMESPACE.to_string()],
            object_size: 0,
            list_limit: 0,
            run_suffix,
            outputs,
        }
    }
}

impl LoadRunConfig {
    /// Set the deadline relative to now.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.deadline = OffsetDateTime::now_utc() + duration;
        self
    }

    pub fn writes_enabled(&self) -> bool {
        self.object_size > 0
    }

    pub fn reads_enabled(&self) -> bool {
        !self.namespaces_read.is_empty()
    }

    /// Burst allowance with a floor of one token; a zero burst would never admit a request.
    pub fn effective_burst(&self) -> NonZeroU32 {
        NonZeroU32::new(self.client_burst).unwrap_or(NonZeroU32::MIN)
    }

    /// Time left until the deadline, zero if it has passed.
    pub fn remaining(&self) -> Duration {
        Duration::try_from(self.deadline - OffsetDateTime::now_utc()).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.client_qps.is_finite() || self.client_qps <= 0.0 {
            return Err(ConfigError::InvalidQps(self.client_qps));
        }
        if self.client_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.object_size > MAX_OBJECT_SIZE {
            return Err(ConfigError::ObjectTooLarge {
                size: self.object_size,
                max: MAX_OBJECT_SIZE,
            });
        }
        if self.writes_enabled() && self.namespace_write.is_empty() {
            return Err(ConfigError::EmptyWriteNamespace);
        }
        if let Some(idx) = self.namespaces_read.iter().position(String::is_empty) {
            return Err(ConfigError::EmptyReadNamespace(idx));
        }
        if self.deadline <= OffsetDateTime::now_utc() {
            return Err(ConfigError::DeadlineElapsed(self.deadline));
        }
        Ok(())
    }
}

/// Where one artifact is written locally and, optionally, uploaded remotely.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ArtifactLocation {
    pub local_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_key: Option<String>,
}

/// Remote directory prefixes for each artifact. Empty means "do not upload".
#[derive(Clone, Debug, Default)]
pub struct RemoteDirs {
    pub writes_raw_json: String,
    pub writes_summary_json: String,
    pub writes_summary_table: String,
    pub reads_raw_json: String,
    pub reads_summary_json: String,
    pub reads_summary_table: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputLocations {
    pub writes_raw_json: ArtifactLocation,
    pub writes_summary_json: ArtifactLocation,
    pub writes_summary_table: ArtifactLocation,
    pub reads_raw_json: ArtifactLocation,
    pub reads_summary_json: ArtifactLocation,
    pub reads_summary_table: ArtifactLocation,
}

impl OutputLocations {
    /// Lay out the six artifacts under `dir`, e.g. `<dir>/<prefix>-<suffix>-writes.json`.
    pub fn generate(
        dir: &Path,
        writes_prefix: &str,
        reads_prefix: &str,
        suffix: &str,
        remote: &RemoteDirs,
    ) -> Self {
        let location = |prefix: &str, tail: &str, remote_dir: &str| {
            let file_name = artifact_name(prefix, suffix, tail);
            ArtifactLocation {
                local_path: dir.join(&file_name),
                remote_key: remote_key(remote_dir, &file_name),
            }
        };

        Self {
            writes_raw_json: location(writes_prefix, "writes.json", &remote.writes_raw_json),
            writes_summary_json: location(
                writes_prefix,
                "writes-summary.json",
                &remote.writes_summary_json,
            ),
            writes_summary_table: location(
                writes_prefix,
                "writes-summary.txt",
                &remote.writes_summary_table,
            ),
            reads_raw_json: location(reads_prefix, "reads.json", &remote.reads_raw_json),
            reads_summary_json: location(
                reads_prefix,
                "reads-summary.json",
                &remote.reads_summary_json,
            ),
            reads_summary_table: location(
                reads_prefix,
                "reads-summary.txt",
                &remote.reads_summary_table,
            ),
        }
    }

    pub fn all(&self) -> [&ArtifactLocation; 6] {
        [
            &self.writes_raw_json,
            &self.writes_summary_json,
            &self.writes_summary_table,
            &self.reads_raw_json,
            &self.reads_summary_json,
            &self.reads_summary_table,
        ]
    }
}

fn artifact_name(prefix: &str, suffix: &str, tail: &str) -> String {
    [prefix, suffix, tail]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("-")
}

fn remote_key(dir: &str, file_name: &str) -> Option<String> {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        None
    } else {
        Some(format!("{dir}/{file_name}"))
    }
}

/// Short lowercase alphanumeric identifier, unique enough to keep co-located runs from
/// overwriting each other's artifacts.
pub fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RUN_SUFFIX_LEN)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}
