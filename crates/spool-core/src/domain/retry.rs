//! Retry policy: decides backoff delays between item attempts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff without jitter.
///
/// `delay(n) = base_delay * multiplier^(n - 1)`, where `n` is the 1-indexed
/// attempt that just failed. With the defaults (2s, x2) this is `2^n` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt.
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    pub multiplier: f64,

    /// Optional ceiling. `None` leaves growth unbounded.
    #[serde(with = "humantime_serde")]
    pub max_delay: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, multiplier: f64) -> Self {
        Self {
            base_delay,
            multiplier,
            max_delay: None,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Reject policies whose delays would shrink, stall or overflow.
    ///
    /// Delays must never decrease from one attempt to the next, so the
    /// multiplier has to be finite and at least 1 and the base non-zero.
    pub fn validate(&self) -> Result<(), String> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!(
                "backoff multiplier must be a finite number >= 1, got {}",
                self.multiplier
            ));
        }
        if self.base_delay.is_zero() {
            return Err("backoff base_delay must be greater than zero".to_string());
        }
        if let Some(max) = self.max_delay {
            if max < self.base_delay {
                return Err(format!(
                    "backoff max_delay ({}) is shorter than base_delay ({})",
                    humantime::format_duration(max),
                    humantime::format_duration(self.base_delay)
                ));
            }
        }
        Ok(())
    }

    /// Delay before the attempt following failed attempt `attempt`.
    ///
    /// `attempt = 0` is treated like 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), 2.0)
    }
}
