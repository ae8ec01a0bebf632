use std::sync::{Mutex, MutexGuard, PoisonError};
use stresser_core::{OperationKind, RequestOutcome};

/// Append-only store of every outcome of a run, one stream per operation kind.
#[derive(Debug, Default)]
pub struct Recorder {
    writes: Mutex<Vec<RequestOutcome>>,
    reads: Mutex<Vec<RequestOutcome>>,
}

/// Point-in-time copy of both streams, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct RecorderSnapshot {
    pub writes: Vec<RequestOutcome>,
    pub reads: Vec<RequestOutcome>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: RequestOutcome) {
        #[cfg(feature = "metrics")]
        emit_metrics(&outcome);

        self.stream(outcome.kind).push(outcome);
    }

    pub fn len(&self, kind: OperationKind) -> usize {
        self.stream(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len(OperationKind::Write) == 0 && self.len(OperationKind::Read) == 0
    }

    pub fn snapshot(&self) -> RecorderSnapshot {
        RecorderSnapshot {
            writes: self.stream(OperationKind::Write).clone(),
            reads: self.stream(OperationKind::Read).clone(),
        }
    }

    fn stream(&self, kind: OperationKind) -> MutexGuard<'_, Vec<RequestOutcome>> {
        let stream = match kind {
            OperationKind::Write => &self.writes,
            OperationKind::Read => &self.reads,
        };
        // NOTE: A panic while holding the lock cannot leave a half-pushed Vec behind, so the data
        // stays valid after poisoning.
        stream.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(feature = "metrics")]
fn emit_metrics(outcome: &RequestOutcome) {
    let labels = outcome.kind.labels();
    metrics::histogram!(labels.latency).record(outcome.latency.as_secs_f64());
    if outcome.succeeded {
        metrics::counter!(labels.success).increment(1);
    } else {
        metrics::counter!(labels.error).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use stresser_core::ErrorClass;
    use time::OffsetDateTime;

    fn outcome(kind: OperationKind, id: usize) -> RequestOutcome {
        RequestOutcome::success(
            kind,
            &format!("ns-{id}"),
            OffsetDateTime::now_utc(),
            Duration::from_micros(id as u64),
        )
    }

    #[test]
    fn streams_are_independent() {
        let recorder = Recorder::new();
        assert!(recorder.is_empty());
        recorder.record(outcome(OperationKind::Write, 1));
        recorder.record(outcome(OperationKind::Read, 2));
        recorder.record(RequestOutcome::failure(
            OperationKind::Read,
            "ns",
            OffsetDateTime::now_utc(),
            Duration::ZERO,
            ErrorClass::Other,
        ));

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.writes.len(), 1);
        assert_eq!(snapshot.reads.len(), 2);
        assert_eq!(snapshot.reads[0].namespace, "ns-2");
    }

    #[test]
    fn snapshot_is_a_copy() {
        let recorder = Recorder::new();
        recorder.record(outcome(OperationKind::Write, 1));
        let snapshot = recorder.snapshot();
        recorder.record(outcome(OperationKind::Write, 2));
        assert_eq!(snapshot.writes.len(), 1);
        assert_eq!(recorder.len(OperationKind::Write), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_are_not_lost_or_duplicated() {
        let recorder = Arc::new(Recorder::new());
        let handles: Vec<_> = (0..8)
            .map(|task| {
                let recorder = recorder.clone();
                tokio::spawn(async move {
                    for i in 0..500 {
                        recorder.record(outcome(OperationKind::Write, task * 1_000 + i));
                        if i % 50 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.writes.len(), 4_000);
        let unique: HashSet<_> = snapshot.writes.iter().map(|o| o.namespace.clone()).collect();
        assert_eq!(unique.len(), 4_000);
    }
}
