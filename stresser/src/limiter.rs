use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

// Slowest refill we bother representing; anything below one request a day is effectively off.
const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Token bucket owned by a single client.
///
/// Admits `qps` requests per second on average with up to `burst` requests available at once.
pub struct ClientLimiter {
    limiter: DefaultDirectRateLimiter,
}

impl ClientLimiter {
    pub fn new(qps: f64, burst: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::direct(quota(qps).allow_burst(burst)),
        }
    }

    /// Wait until the next request is permitted.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

fn quota(qps: f64) -> Quota {
    let period = Duration::try_from_secs_f64(1.0 / qps)
        .unwrap_or(MAX_PERIOD)
        .clamp(Duration::from_nanos(1), MAX_PERIOD);
    Quota::with_period(period).unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
}
