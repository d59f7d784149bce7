use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};

/// A single rate-limited channel to one remote service.
///
/// Clones share the same limiter, so every caller of a service waits on the
/// same budget: one request per `delay`, no bursts.
#[derive(Clone)]
pub struct Pacer {
    name: &'static str,
    limiter: Option<Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
}

impl Pacer {
    /// A zero delay disables pacing.
    pub fn new(name: &'static str, delay: Duration) -> Self {
        let limiter = Quota::with_period(delay)
            .map(|quota| Arc::new(RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN))));
        Self { name, limiter }
    }

    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
            tracing::trace!(service = self.name, "pacer permit granted");
        }
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer")
            .field("name", &self.name)
            .field("enabled", &self.limiter.is_some())
            .finish()
    }
}
