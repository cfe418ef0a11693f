//! Retry policy for the streaming transport.
//!
//! Exponential backoff driven by a plain attempt loop. The unary client
//! never retries; only streaming connection attempts do, and only before
//! the first data byte has arrived.

use std::time::Duration;

use rand::Rng;

/// Backoff schedule: `min(initial · multiplier^attempt, max)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; total attempts are `1 + max_retries`.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// When true, delays are perturbed by up to `jitter_factor` in either
    /// direction.
    pub use_jitter: bool,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            multiplier: 2.0,
            use_jitter: false,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub const fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(base as u64).min(self.max_delay);
        if self.use_jitter {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let range = delay.as_millis() as f64 * self.jitter_factor;
        let jitter = rng.gen_range(-range..=range);
        Duration::from_millis((delay.as_millis() as f64 + jitter).max(0.0) as u64)
    }

    /// Sleep out the delay for `attempt`.
    pub async fn wait(&self, attempt: u32) {
        tokio::time::sleep(self.delay_for(attempt)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_the_exponential_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8000));
    }

    #[test]
    fn delays_are_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(4), Duration::from_millis(10_000));
        assert_eq!(policy.delay_for(10), Duration::from_millis(10_000));
    }

    #[test]
    fn jitter_stays_within_the_configured_factor() {
        let policy = RetryPolicy::default().with_jitter(true);
        for _ in 0..32 {
            let delay = policy.delay_for(1).as_millis() as f64;
            assert!((1800.0..=2200.0).contains(&delay), "delay {delay} out of range");
        }
    }
}
