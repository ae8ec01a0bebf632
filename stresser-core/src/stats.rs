use crate::{ErrorClass, OperationKind, TimeFrame};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationNanoSeconds};
use std::collections::BTreeMap;
use std::time::Duration;

/// Latency quantiles over the successful requests of one stream. All values in nanoseconds on
/// the wire.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub p50: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub p90: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub p99: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub max: Duration,
}

/// Count of successful requests whose latency fell at or below `upper_bound`, and above the
/// previous bucket's bound. The last bucket has no bound.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HistogramBucket {
    #[serde_as(as = "Option<DurationNanoSeconds<u64>>")]
    pub upper_bound: Option<Duration>,
    pub count: u64,
}

/// Aggregated statistics over one stream of outcomes.
///
/// Built once after the run stops and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RequestsSummary {
    pub kind: OperationKind,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub throughput_per_second: f64,
    /// `None` when no request succeeded; percentiles are never made up for an empty set.
    pub latency: Option<LatencyPercentiles>,
    pub latency_histogram: Vec<HistogramBucket>,
    pub error_breakdown: BTreeMap<ErrorClass, u64>,
    /// Observed window from the first request start to the last request finish. `None` when
    /// the stream is empty.
    pub time_frame: Option<TimeFrame>,
}

impl RequestsSummary {
    pub fn empty(kind: OperationKind) -> Self {
        Self {
            kind,
            total: 0,
            succeeded: 0,
            failed: 0,
            throughput_per_second: 0.0,
            latency: None,
            latency_histogram: vec![],
            error_breakdown: BTreeMap::new(),
            time_frame: None,
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failed as f64 / self.total as f64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn populated() -> RequestsSummary {
        let start = OffsetDateTime::from_unix_timestamp_nanos(1_700_000_000_123_456_789).unwrap();
        let mut frame = TimeFrame::starting_at(start);
        frame.finish_at(start + Duration::from_nanos(2_500_000_321));

        RequestsSummary {
            kind: OperationKind::Write,
            total: 7,
            succeeded: 5,
            failed: 2,
            throughput_per_second: 1.999_999_743_000_033,
            latency: Some(LatencyPercentiles {
                p50: Duration::from_nanos(30_000_001),
                p90: Duration::from_millis(50),
                p99: Duration::from_millis(50),
                max: Duration::from_millis(50),
            }),
            latency_histogram: vec![
                HistogramBucket {
                    upper_bound: Some(Duration::from_millis(25)),
                    count: 2,
                },
                HistogramBucket {
                    upper_bound: None,
                    count: 3,
                },
            ],
            error_breakdown: BTreeMap::from([(ErrorClass::Throttled, 1), (ErrorClass::Timeout, 1)]),
            time_frame: Some(frame),
        }
    }

    #[test]
    fn summary_json_round_trip() {
        let summary = populated();
        let json = serde_json::to_string_pretty(&summary).unwrap();
        let parsed: RequestsSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
    }

    #[test]
    fn empty_summary_json_round_trip() {
        let summary = RequestsSummary::empty(OperationKind::Read);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"latency\":null"));
        let parsed: RequestsSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
    }

    #[test]
    fn error_breakdown_keys_are_class_names() {
        let json = serde_json::to_value(populated()).unwrap();
        assert_eq!(json["error-breakdown"]["throttled"], 1);
        assert_eq!(json["error-breakdown"]["timeout"], 1);
    }

    #[test]
    fn error_rate() {
        assert_eq!(RequestsSummary::empty(OperationKind::Write).error_rate(), 0.0);
        let summary = populated();
        assert!((summary.error_rate() - 2.0 / 7.0).abs() < f64::EPSILON);
    }
}
