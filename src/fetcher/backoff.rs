//! Pacing between outer fetch attempts

use super::classify::FailureClass;
use crate::config::PacingConfig;
use rand::Rng;
use std::time::Duration;

/// Randomized, widening delay between attempts
///
/// After failed attempt `n` the delay is drawn uniformly from
/// `[window_min * n, window_max * n]`. A transient (rate-limit) failure adds
/// `rate_limit_step * n` on top.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    pub window_min: Duration,
    pub window_max: Duration,
    pub rate_limit_step: Duration,
}

impl Backoff {
    /// No waiting at all
    pub fn none() -> Self {
        Self {
            window_min: Duration::ZERO,
            window_max: Duration::ZERO,
            rate_limit_step: Duration::ZERO,
        }
    }

    pub fn delay_after(&self, attempt: u32, class: FailureClass) -> Duration {
        let attempt = attempt.max(1);
        let low = self.window_min * attempt;
        let high = (self.window_max * attempt).max(low);

        let jitter = if high > low {
            rand::rng().random_range(low..=high)
        } else {
            low
        };

        match class {
            FailureClass::Transient => jitter + self.rate_limit_step * attempt,
            FailureClass::Unknown | FailureClass::Terminal => jitter,
        }
    }
}

impl From<&PacingConfig> for Backoff {
    fn from(config: &PacingConfig) -> Self {
        Self {
            window_min: Duration::from_secs_f64(config.retry_delay_min_secs),
            window_max: Duration::from_secs_f64(config.retry_delay_max_secs),
            rate_limit_step: Duration::from_secs_f64(config.rate_limit_backoff_secs),
        }
    }
}
