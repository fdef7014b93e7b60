//! Process-wide request ceiling for discovery probes

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;

/// Shared by every probe worker; one permit per outbound request
pub struct GlobalRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl GlobalRateLimiter {
    /// A ceiling of zero is treated as one request per second
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32));
        Self {
            limiter: RateLimiter::direct(Quota::per_second(rps)),
        }
    }

    /// Wait for the next permit
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}
