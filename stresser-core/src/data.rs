use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationNanoSeconds};
use std::fmt;
use std::time::Duration;
use time::OffsetDateTime;

/// The two independent traffic streams generated by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Write,
    Read,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Write => "writes",
            OperationKind::Read => "reads",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure taxonomy for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    Throttled,
    NotFound,
    Timeout,
    Other,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Throttled => "throttled",
            ErrorClass::NotFound => "not-found",
            ErrorClass::Timeout => "timeout",
            ErrorClass::Other => "other",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one attempted operation.
///
/// `finished_at` is derived from `started_at` plus a monotonic latency measurement, so an
/// outcome can never finish before it started even if the wall clock steps backwards mid-request.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RequestOutcome {
    pub kind: OperationKind,
    pub namespace: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub latency: Duration,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
    /// Name of the created object for successful writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
}

impl RequestOutcome {
    pub fn success(
        kind: OperationKind,
        namespace: &str,
        started_at: OffsetDateTime,
        latency: Duration,
    ) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            started_at,
            finished_at: started_at + latency,
            latency,
            succeeded: true,
            error_class: None,
            object: None,
        }
    }

    pub fn failure(
        kind: OperationKind,
        namespace: &str,
        started_at: OffsetDateTime,
        latency: Duration,
        class: ErrorClass,
    ) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            started_at,
            finished_at: started_at + latency,
            latency,
            succeeded: false,
            error_class: Some(class),
            object: None,
        }
    }

    pub fn with_object(mut self, name: String) -> Self {
        self.object = Some(name);
        self
    }
}

/// Wall-clock window of an activity. `end` is unset while the activity is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TimeFrame {
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end: Option<OffsetDateTime>,
}

impl TimeFrame {
    pub fn begin() -> Self {
        Self::starting_at(OffsetDateTime::now_utc())
    }

    pub fn starting_at(start: OffsetDateTime) -> Self {
        Self { start, end: None }
    }

    pub fn finish(&mut self) {
        self.finish_at(OffsetDateTime::now_utc());
    }

    pub fn finish_at(&mut self, end: OffsetDateTime) {
        self.end = Some(end.max(self.start));
    }

    pub fn is_finished(&self) -> bool {
        self.end.is_some()
    }

    /// Length of the window, or `None` while still in progress.
    pub fn took(&self) -> Option<Duration> {
        self.end
            .map(|end| Duration::try_from(end - self.start).unwrap_or_default())
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.took() {
            Some(took) => write!(f, "{} (took {})", self.start, humantime::format_duration(took)),
            None => write!(f, "{} (in progress)", self.start),
        }
    }
}
