use std::time::Duration;

/// Default number of simulated clients per operation kind.
pub const DEFAULT_CLIENTS: usize = 2;

/// Default per-client request rate.
pub const DEFAULT_CLIENT_QPS: f64 = 10.0;

/// Default per-client burst allowance.
pub const DEFAULT_CLIENT_BURST: u32 = 20;

/// Default per-request deadline.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default run length when no explicit deadline is given.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(5 * 60);

pub const DEFAULT_NAMESPACE: &str = "default";

pub const DEFAULT_OUTPUT_DIR: &str = "/var/log";

/// Largest write payload accepted by the driver. Control-plane datastores reject
/// objects well below this, so anything larger is a configuration mistake.
pub const MAX_OBJECT_SIZE: usize = 1024 * 1024;

/// Length of the random component embedded in every artifact name.
pub const RUN_SUFFIX_LEN: usize = 7;

/// Upper bounds of the latency histogram buckets. The final bucket is unbounded.
pub const LATENCY_BUCKET_BOUNDS: [Duration; 11] = [
    Duration::from_millis(5),
    Duration::from_millis(10),
    Duration::from_millis(25),
    Duration::from_millis(50),
    Duration::from_millis(100),
    Duration::from_millis(250),
    Duration::from_millis(500),
    Duration::from_secs(1),
    Duration::from_millis(2500),
    Duration::from_secs(5),
    Duration::from_secs(10),
];
