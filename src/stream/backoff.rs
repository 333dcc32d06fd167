use std::time::Duration;

/// Limits for reconnecting a dropped socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Retries allowed between two successful connections
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_retries: 5,
        }
    }
}

/// Exponential backoff state for one socket.
///
/// Each call to [`Backoff::next_delay`] consumes one retry and doubles the
/// following delay up to `max_delay`. A successful open calls
/// [`Backoff::reset`], which restores the full retry budget.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    retries: u32,
    delay: Duration,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            retries: 0,
            delay: policy.initial_delay,
        }
    }

    /// Delay before the next attempt, or `None` once retries are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries >= self.policy.max_retries {
            return None;
        }
        self.retries += 1;
        let delay = self.delay.min(self.policy.max_delay);
        self.delay = (delay * 2).min(self.policy.max_delay);
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.retries = 0;
        self.delay = self.policy.initial_delay;
    }

    /// Retries consumed since the last reset
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn max_retries(&self) -> u32 {
        self.policy.max_retries
    }
}
