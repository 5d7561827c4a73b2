//! Circuit breaker (spec §4.8.1): CLOSED/OPEN/HALF_OPEN, grounded on the
//! original implementation's `error_recovery.cpp` breaker-per-name registry.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub retry_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfig {
            failure_threshold: 5,
            success_threshold: 2,
            retry_timeout: Duration::from_secs(30),
        }
    }
}

/// One breaker instance, looked up / created by name in [`crate::RecoveryEngine`].
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<BreakerState>,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    last_failure_at: RwLock<Option<Instant>>,
    trips: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        CircuitBreaker {
            config,
            state: RwLock::new(BreakerState::Closed),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            last_failure_at: RwLock::new(None),
            trips: AtomicU64::new(0),
        }
    }

    pub async fn state(&self) -> BreakerState {
        *self.state.read().await
    }

    pub fn trips(&self) -> u64 {
        self.trips.load(Ordering::Relaxed)
    }

    /// Whether a call may proceed right now, transitioning OPEN → HALF_OPEN
    /// when `retryTimeout` has elapsed since the last failure.
    pub async fn can_execute(&self) -> bool {
        let current = *self.state.read().await;
        match current {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = self
                    .last_failure_at
                    .read()
                    .await
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.config.retry_timeout {
                    *self.state.write().await = BreakerState::HalfOpen;
                    self.success_count.store(0, Ordering::SeqCst);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let current = *self.state.read().await;
        match current {
            BreakerState::Closed => {
                self.failure_count.store(0, Ordering::SeqCst);
            }
            BreakerState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.config.success_threshold {
                    *self.state.write().await = BreakerState::Closed;
                    self.failure_count.store(0, Ordering::SeqCst);
                    self.success_count.store(0, Ordering::SeqCst);
                }
            }
            BreakerState::Open => {}
        }
    }

    pub async fn record_failure(&self) {
        *self.last_failure_at.write().await = Some(Instant::now());
        let current = *self.state.read().await;
        match current {
            BreakerState::HalfOpen => {
                self.success_count.store(0, Ordering::SeqCst);
                *self.state.write().await = BreakerState::Open;
                self.trips.fetch_add(1, Ordering::Relaxed);
            }
            BreakerState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.config.failure_threshold {
                    *self.state.write().await = BreakerState::Open;
                    self.trips.fetch_add(1, Ordering::Relaxed);
                }
            }
            BreakerState::Open => {}
        }
    }
}
