//! Retry policies for native handle construction.
//!
//! - [`RetryPolicy`]: Configurable retry with exponential backoff
//! - [`retry_blocking`]: Synchronous helper that retries an operation
//!
//! Retries never change the non-sticky failure contract of connectors:
//! a failed construction is reported and the next call starts afresh.

use std::thread;
use std::time::Duration;

/// Retry policy configuration.
///
/// Supports exponential backoff with optional jitter to prevent thundering herd.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial attempt).
    pub max_attempts: usize,
    /// Initial delay before first retry.
    pub initial_backoff: Duration,
    /// Maximum delay between retries.
    pub max_backoff: Duration,
    /// Backoff multiplier (e.g., 2.0 for doubling).
    pub multiplier: f64,
    /// Jitter factor (0.0-1.0) to randomize delays.
    pub jitter: f64,
}

impl RetryPolicy {
    /// Creates a simple exponential backoff policy.
    ///
    /// Uses a multiplier of 2.0, a 10 second cap and 10% jitter.
    #[must_use]
    pub fn exponential(max_attempts: usize, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }

    /// Creates a fixed-interval retry policy (no backoff).
    #[must_use]
    pub fn fixed(max_attempts: usize, interval: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff: interval,
            max_backoff: interval,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Creates a policy with no retries.
    #[must_use]
    pub fn none() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// Calculates the delay before the given retry (1-based).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // attempt count will never exceed i32::MAX
    #[allow(clippy::cast_possible_wrap)] // attempt count is always small positive
    #[allow(clippy::cast_precision_loss)] // acceptable for delay calculation
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = (attempt as i32).saturating_sub(1);
        let base_delay = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let clamped = base_delay.min(self.max_backoff.as_secs_f64());

        // Deterministic spread derived from the attempt number.
        let jitter_offset = if self.jitter > 0.0 {
            let pseudo_random = ((attempt as f64 * 0.618_033_988_749_895) % 1.0) * 2.0 - 1.0;
            clamped * self.jitter.clamp(0.0, 1.0) * pseudo_random
        } else {
            0.0
        };

        Duration::from_secs_f64((clamped + jitter_offset).max(0.0))
    }

    /// Returns `true` if another attempt is allowed after `attempt` retries.
    #[must_use]
    pub fn should_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Runs `op`, retrying according to `policy` and sleeping between attempts.
///
/// `on_error` sees every failure with the 0-based attempt number.
///
/// # Errors
///
/// Returns the last error once retries are exhausted.
pub fn retry_blocking<T, E, F, H>(policy: &RetryPolicy, mut op: F, mut on_error: H) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    H: FnMut(usize, &E),
{
    let mut attempt = 0;

    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => {
                on_error(attempt, &e);
                if !policy.should_retry(attempt) {
                    return Err(e);
                }
                attempt += 1;
                let delay = policy.delay_for_attempt(attempt);
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_policy() {
        let policy = RetryPolicy::none();
        assert!(!policy.should_retry(0));
        assert_eq!(RetryPolicy::default(), policy);
    }

    #[test]
    fn test_exponential_delays_grow_and_cap() {
        let mut policy = RetryPolicy::exponential(10, Duration::from_millis(100));
        policy.jitter = 0.0;
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1).as_millis(), 100);
        assert_eq!(policy.delay_for_attempt(2).as_millis(), 200);
        assert_eq!(policy.delay_for_attempt(3).as_millis(), 400);
        assert_eq!(policy.delay_for_attempt(20), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::exponential(5, Duration::from_millis(100));
        for attempt in 1..=5 {
            let mut plain = policy.clone();
            plain.jitter = 0.0;
            let base = plain.delay_for_attempt(attempt).as_secs_f64();
            let jittered = policy.delay_for_attempt(attempt).as_secs_f64();
            assert!((jittered - base).abs() <= base * 0.1 + 1e-9);
        }
    }

    #[test]
    fn test_retry_blocking_succeeds_after_failures() {
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let mut calls = 0;
        let mut seen = Vec::new();
        let result: Result<u32, String> = retry_blocking(
            &policy,
            || {
                calls += 1;
                if calls < 3 {
                    Err(format!("fail {calls}"))
                } else {
                    Ok(7)
                }
            },
            |attempt, _| seen.push(attempt),
        );
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 3);
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn test_retry_blocking_returns_last_error() {
        let policy = RetryPolicy::fixed(2, Duration::ZERO);
        let mut calls = 0;
        let result: Result<(), String> = retry_blocking(
            &policy,
            || {
                calls += 1;
                Err(format!("fail {calls}"))
            },
            |_, _| {},
        );
        assert_eq!(result.unwrap_err(), "fail 3");
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_no_retry_runs_once() {
        let mut calls = 0;
        let result: Result<(), &str> = retry_blocking(
            &RetryPolicy::none(),
            || {
                calls += 1;
                Err("down")
            },
            |_, _| {},
        );
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
