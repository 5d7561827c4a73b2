//! Retry policy (spec §4.8.2).

use std::time::Duration;

use crate::category::ErrorCategory;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    pub retryable_categories: Vec<ErrorCategory>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            retryable_categories: vec![
                ErrorCategory::Network,
                ErrorCategory::Timeout,
                ErrorCategory::Protocol,
            ],
        }
    }
}

impl RetryPolicy {
    pub fn should_retry(&self, category: ErrorCategory, attempt: u32) -> bool {
        attempt < self.max_retries && self.retryable_categories.contains(&category)
    }

    /// `attempt` is 1-based: attempt 1 yields `initial_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32 - 1);
        Duration::from_secs_f64(scaled).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_retry_respects_max_attempts_and_category() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(ErrorCategory::Network, 0));
        assert!(!policy.should_retry(ErrorCategory::Network, 3));
        assert!(!policy.should_retry(ErrorCategory::Validation, 0));
    }

    #[test]
    fn delay_backs_off_and_caps_at_max_delay() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(500),
            retryable_categories: vec![ErrorCategory::Network],
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
        assert_eq!(policy.delay(4), Duration::from_millis(500));
        assert_eq!(policy.delay(10), Duration::from_millis(500));
    }
}
