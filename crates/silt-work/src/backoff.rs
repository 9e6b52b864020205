//! Capped exponential retry intervals.

use std::time::Duration;

/// Retry interval policy: exponential growth from `initial` up to `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// First interval.
    pub initial: Duration,
    /// Upper bound on any interval.
    pub max: Duration,
    /// Growth factor between consecutive intervals.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
        }
    }

    /// Starts a fresh interval sequence under this policy.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            current: self.initial,
        }
    }
}

impl Default for RetryPolicy {
    /// 100ms base, 5s cap, doubling.
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(5), 2.0)
    }
}

/// A never-ending sequence of capped retry intervals.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    current: Duration,
}

impl Backoff {
    /// Returns the next interval and advances the sequence.
    pub fn next_interval(&mut self) -> Duration {
        let interval = self.current;
        let scaled = self.current.mul_f64(self.policy.multiplier);
        self.current = scaled.min(self.policy.max);
        interval
    }

    /// Restarts the sequence at the initial interval.
    pub fn reset(&mut self) {
        self.current = self.policy.initial;
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_grow_to_the_cap_and_stay() {
        let mut backoff = RetryPolicy::default().backoff();
        assert_eq!(backoff.next_interval(), Duration::from_millis(100));
        assert_eq!(backoff.next_interval(), Duration::from_millis(200));
        assert_eq!(backoff.next_interval(), Duration::from_millis(400));
        for _ in 0..10 {
            backoff.next_interval();
        }
        assert_eq!(backoff.next_interval(), Duration::from_secs(5));
        assert_eq!(backoff.next_interval(), Duration::from_secs(5));
    }

    #[test]
    fn reset_restarts_the_sequence() {
        let mut backoff = RetryPolicy::default().backoff();
        backoff.next_interval();
        backoff.next_interval();
        backoff.reset();
        assert_eq!(backoff.next_interval(), Duration::from_millis(100));
    }

    #[test]
    fn iterator_never_ends() {
        let backoff = RetryPolicy::default().backoff();
        assert_eq!(backoff.take(100).count(), 100);
    }
}
