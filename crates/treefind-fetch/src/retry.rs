//! Fixed-schedule retry policy for coverage requests.

use std::time::Duration;

/// Default wait schedule in seconds: 30 s, 1 min, 3 min, 15 min, 1 h.
pub const DEFAULT_WAIT_SECONDS: [u64; 5] = [30, 60, 180, 900, 3600];

/// Ordered waits between attempts.
///
/// Every attempt, the first included, takes one slot of the schedule. A failed
/// attempt sleeps its slot's wait; the request is given up once the last slot
/// has been slept, so a policy of `n` waits allows `n` attempts. An empty
/// schedule still allows one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    waits: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_secs(&DEFAULT_WAIT_SECONDS)
    }
}

impl RetryPolicy {
    /// Policy with the given waits.
    pub fn new(waits: Vec<Duration>) -> Self {
        Self { waits }
    }

    /// Policy with waits given in whole seconds.
    pub fn from_secs(secs: &[u64]) -> Self {
        Self::new(secs.iter().map(|&s| Duration::from_secs(s)).collect())
    }

    /// Policy with a single attempt and no wait.
    pub fn no_retry() -> Self {
        Self::new(Vec::new())
    }

    /// The wait schedule.
    pub fn waits(&self) -> &[Duration] {
        &self.waits
    }

    /// Maximum number of attempts.
    pub fn max_attempts(&self) -> usize {
        self.waits.len().max(1)
    }

    /// Fresh retrier for one request.
    pub fn backoff(&self) -> Backoff<'_> {
        Backoff {
            waits: &self.waits,
            max_attempts: self.max_attempts(),
            failed: 0,
        }
    }
}

/// Retry state of a single request.
#[derive(Debug, Clone)]
pub struct Backoff<'a> {
    waits: &'a [Duration],
    max_attempts: usize,
    failed: usize,
}

impl Backoff<'_> {
    /// Record a failed attempt and return the wait of its slot, if any.
    pub fn fail(&mut self) -> Option<Duration> {
        let wait = self.waits.get(self.failed).copied();
        self.failed += 1;
        wait
    }

    /// Wait that a failure of the current attempt would take.
    pub fn peek(&self) -> Option<Duration> {
        self.waits.get(self.failed).copied()
    }

    /// 1-based number of the current attempt.
    pub fn attempt(&self) -> usize {
        self.failed + 1
    }

    /// Attempts that have failed so far.
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// True once every slot has been used by a failed attempt.
    pub fn is_exhausted(&self) -> bool {
        self.failed >= self.max_attempts
    }
}

/// Blocking pause between attempts.
pub trait Sleeper {
    /// Block the current thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 5);

        let mut backoff = policy.backoff();
        let mut waits = Vec::new();
        while !backoff.is_exhausted() {
            assert_eq!(backoff.attempt(), waits.len() + 1);
            waits.push(backoff.fail().unwrap().as_secs());
        }
        assert_eq!(waits, vec![30, 60, 180, 900, 3600]);
        assert_eq!(backoff.failed(), 5);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let policy = RetryPolicy::from_secs(&[5, 10]);
        let mut backoff = policy.backoff();
        assert_eq!(backoff.peek(), Some(Duration::from_secs(5)));
        assert_eq!(backoff.fail(), Some(Duration::from_secs(5)));
        assert_eq!(backoff.peek(), Some(Duration::from_secs(10)));
        assert_eq!(backoff.attempt(), 2);
        assert!(!backoff.is_exhausted());
    }

    #[test]
    fn test_no_retry() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.max_attempts(), 1);

        let mut backoff = policy.backoff();
        assert!(!backoff.is_exhausted());
        assert_eq!(backoff.fail(), None);
        assert!(backoff.is_exhausted());
    }
}
