//! Reduction of raw outcomes into a [`RequestsSummary`].
use std::collections::BTreeMap;
use std::time::Duration;
use stresser_core::{
    ErrorClass, HistogramBucket, LatencyPercentiles, OperationKind, RequestOutcome,
    RequestsSummary, TimeFrame, LATENCY_BUCKET_BOUNDS,
};

// Quantiles in basis points so the rank arithmetic stays exact.
const P50: u64 = 5_000;
const P90: u64 = 9_000;
const P99: u64 = 9_900;

/// Summarize one stream. Outcome order does not matter.
pub fn summarize(kind: OperationKind, outcomes: &[RequestOutcome]) -> RequestsSummary {
    if outcomes.is_empty() {
        return RequestsSummary::empty(kind);
    }

    let mut latencies = Vec::with_capacity(outcomes.len());
    let mut error_breakdown: BTreeMap<ErrorClass, u64> = BTreeMap::new();
    for outcome in outcomes {
        if outcome.succeeded {
            latencies.push(outcome.latency);
        } else {
            let class = outcome.error_class.unwrap_or(ErrorClass::Other);
            *error_breakdown.entry(class).or_default() += 1;
        }
    }
    latencies.sort_unstable();

    let total = outcomes.len() as u64;
    let succeeded = latencies.len() as u64;
    let time_frame = observed_frame(outcomes);

    RequestsSummary {
        kind,
        total,
        succeeded,
        failed: total - succeeded,
        throughput_per_second: throughput(succeeded, time_frame.as_ref()),
        latency: percentiles(&latencies),
        latency_histogram: histogram(&latencies),
        error_breakdown,
        time_frame,
    }
}

/// Index of the `per_10k` quantile in a sorted set of `n` values: `ceil(p * n) - 1`, clamped
/// to the valid range.
pub fn percentile_index(n: usize, per_10k: u64) -> usize {
    if n == 0 {
        return 0;
    }
    let rank = (per_10k * n as u64).div_ceil(10_000) as usize;
    rank.saturating_sub(1).min(n - 1)
}

fn percentiles(sorted: &[Duration]) -> Option<LatencyPercentiles> {
    let max = *sorted.last()?;
    let at = |p| sorted[percentile_index(sorted.len(), p)];
    Some(LatencyPercentiles {
        p50: at(P50),
        p90: at(P90),
        p99: at(P99),
        max,
    })
}

fn histogram(sorted: &[Duration]) -> Vec<HistogramBucket> {
    if sorted.is_empty() {
        return vec![];
    }

    let mut buckets = Vec::with_capacity(LATENCY_BUCKET_BOUNDS.len() + 1);
    let mut below = 0;
    for bound in LATENCY_BUCKET_BOUNDS {
        let upto = sorted.partition_point(|latency| *latency <= bound);
        buckets.push(HistogramBucket {
            upper_bound: Some(bound),
            count: (upto - below) as u64,
        });
        below = upto;
    }
    buckets.push(HistogramBucket {
        upper_bound: None,
        count: (sorted.len() - below) as u64,
    });
    buckets
}

fn observed_frame(outcomes: &[RequestOutcome]) -> Option<TimeFrame> {
    let start = outcomes.iter().map(|o| o.started_at).min()?;
    let end = outcomes.iter().map(|o| o.finished_at).max()?;
    let mut frame = TimeFrame::starting_at(start);
    frame.finish_at(end);
    Some(frame)
}

fn throughput(succeeded: u64, frame: Option<&TimeFrame>) -> f64 {
    match frame.and_then(TimeFrame::took) {
        Some(window) if !window.is_zero() => succeeded as f64 / window.as_secs_f64(),
        _ => 0.0,
    }
}
