//! Exponential backoff schedule
//!
//! The delay after failed attempt `n` (1-based, `n < max_attempts`) is
//! `min(initial_delay * backoff_factor^(n-1), max_delay)`. No delay follows
//! the final attempt.

use crate::config::RetryConfig;
use std::time::Duration;

impl RetryConfig {
    /// Delay to wait after failed attempt `attempt` (1-based), ignoring `max_attempts`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return self.initial_delay.min(self.max_delay);
        }

        // A factor below 1 never shrinks the delay under `initial_delay`
        let factor = self.backoff_factor.max(1.0).powi(attempt as i32 - 1);
        let delay_secs = self.initial_delay.as_secs_f64() * factor;
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay_secs).min(self.max_delay)
    }

    /// The delays the retry loop will sleep, in order (`max_attempts - 1` entries)
    pub fn schedule(&self) -> BackoffSchedule<'_> {
        BackoffSchedule {
            config: self,
            attempt: 1,
        }
    }
}

/// Iterator over the between-attempt delays of a [`RetryConfig`]
#[derive(Debug, Clone)]
pub struct BackoffSchedule<'a> {
    config: &'a RetryConfig,
    attempt: u32,
}

impl Iterator for BackoffSchedule<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.attempt >= self.config.max_attempts {
            return None;
        }
        let delay = self.config.delay_for(self.attempt);
        self.attempt += 1;
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[test]
    fn test_capped_sequence() {
        let config = RetryConfig {
            max_attempts: 9,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        };

        let delays: Vec<Duration> = config.schedule().collect();
        assert_eq!(delays, secs(&[1, 2, 4, 8, 16, 30, 30, 30]));
    }

    #[test]
    fn test_no_delay_after_final_attempt() {
        let config = RetryConfig::default();
        assert_eq!(config.schedule().count(), 2);
        assert_eq!(RetryConfig::single_attempt().schedule().count(), 0);
    }

    #[test]
    fn test_fractional_factor() {
        let config = RetryConfig {
            max_attempts: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_factor: 1.5,
        };
        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(150));
        assert_eq!(config.delay_for(3), Duration::from_millis(225));
    }

    #[test]
    fn test_huge_attempt_saturates_at_max() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(10_000), config.max_delay);
    }

    #[test]
    fn test_degenerate_factor_never_panics() {
        for factor in [-2.0, 0.0, 0.5, f64::NAN, f64::INFINITY] {
            let config = RetryConfig {
                max_attempts: 5,
                backoff_factor: factor,
                ..Default::default()
            };
            for delay in config.schedule() {
                assert!(delay >= config.initial_delay);
                assert!(delay <= config.max_delay);
            }
        }
    }
}
