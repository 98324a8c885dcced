//! ============================================================================
//! Polling - Bounded wait loops
//! ============================================================================
//! Every wait in the pipeline (object existence, job status) polls at a fixed
//! interval until a deadline. Nothing waits unbounded.
//! ============================================================================

use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Timeout and fixed interval for one wait loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollConfig {
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub const fn secs(timeout: u64, interval: u64) -> Self {
        Self::new(Duration::from_secs(timeout), Duration::from_secs(interval))
    }

    /// Start a deadline for this config
    pub fn start(&self) -> Deadline {
        Deadline {
            at: Instant::now() + self.timeout,
            interval: self.interval,
        }
    }
}

/// Running deadline for a poll loop
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    interval: Duration,
}

impl Deadline {
    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Sleep one interval, or return false if the deadline has passed
    pub async fn tick(&self) -> bool {
        if self.expired() {
            return false;
        }
        sleep(self.interval).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_ticks_until_timeout() {
        let deadline = PollConfig::secs(5, 1).start();
        let mut ticks = 0;
        while deadline.tick().await {
            ticks += 1;
        }
        assert_eq!(ticks, 5);
        assert!(deadline.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_never_sleeps() {
        let deadline = PollConfig::secs(0, 1).start();
        assert!(!deadline.tick().await);
    }
}
