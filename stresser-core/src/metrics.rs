use crate::OperationKind;

/// Metric names emitted for one stream of outcomes.
#[derive(Copy, Clone, Debug)]
pub struct StreamLabels {
    pub success: &'static str,
    pub error: &'static str,
    pub latency: &'static str,
}

pub const WRITE_LABELS: StreamLabels = StreamLabels {
    success: "stresser_writes_success",
    error: "stresser_writes_error",
    latency: "stresser_writes_latency",
};

pub const READ_LABELS: StreamLabels = StreamLabels {
    success: "stresser_reads_success",
    error: "stresser_reads_error",
    latency: "stresser_reads_latency",
};

impl OperationKind {
    pub fn labels(&self) -> StreamLabels {
        match self {
            OperationKind::Write => WRITE_LABELS,
            OperationKind::Read => READ_LABELS,
        }
    }
}
