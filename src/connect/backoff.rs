//! # Backoff policy for reconnect attempts.
//!
//! [`BackoffPolicy`] controls how redial delays grow after repeated
//! connection failures. The delay for attempt `n` (0-indexed) is
//! `first × factor^n`, clamped to `max`. The base is derived purely from
//! the attempt number, so delays never feed back into each other.
//!
//! The attempt counter resets after every successful connection: a broker
//! that flaps once should not pay for outages it already recovered from.

use std::time::Duration;

/// Reconnect delay policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
}

impl Default for BackoffPolicy {
    /// Returns a policy with `first = 1s`, `factor = 2.0`, `max = 30s`.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given attempt number (0-indexed).
    ///
    /// Overflowing or non-finite intermediate values clamp to
    /// [`BackoffPolicy::max`].
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}
