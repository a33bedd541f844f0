//! Rate-limited logging (Design Notes): a small helper keeping per-call-site
//! counters so a noisy failure path logs its first few occurrences, then
//! backs off, instead of flooding the log at one line per frame.

use std::sync::atomic::{AtomicU64, Ordering};

/// Logs the first `burst` occurrences, then every `interval`th occurrence
/// after that. Used for format/decode errors in the Audio Bridge Session
/// (first 5, then every 500, per §4.2).
pub struct RateLimiter {
    count: AtomicU64,
    burst: u64,
    interval: u64,
}

impl RateLimiter {
    pub const fn new(burst: u64, interval: u64) -> Self {
        Self { count: AtomicU64::new(0), burst, interval }
    }

    /// Returns `true` if this occurrence should be logged.
    pub fn should_log(&self) -> bool {
        let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        n <= self.burst || (n - self.burst) % self.interval == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_first_burst_then_every_interval() {
        let limiter = RateLimiter::new(5, 500);
        let logged: Vec<bool> = (0..1005).map(|_| limiter.should_log()).collect();

        assert!(logged[0..5].iter().all(|&b| b));
        assert!(!logged[5]);
        assert!(logged[504]);
        assert!(logged[1004]);
    }
}
