//! Recovery engine (spec §4.8.4): ties the circuit breaker, retry policy and
//! strategy table together, grounded on the original implementation's
//! `error_recovery.cpp`/`error_handler_impl.cpp` single-engine-per-process
//! shape.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use hydrogen_message::ErrorCode;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::category::{default_strategy, ErrorCategory, RecoveryStrategy};
use crate::circuit_breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
use crate::error::RecoveryError;
use crate::history::{now_rfc3339, ErrorHistory, RecordedError, RecoveryStatistics};
use crate::retry::RetryPolicy;

pub type ErrorCallback = Arc<dyn Fn(&RecordedError) + Send + Sync>;
/// Returns whether the recovery action succeeded; boxed to let callbacks do
/// their own I/O (restart a device, fail over, etc.) before reporting back.
pub type RecoveryCallback = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct RecoveryEngineConfig {
    pub history_capacity: usize,
    pub worker_interval: Duration,
}

impl RecoveryEngineConfig {
    fn with_defaults() -> Self {
        RecoveryEngineConfig {
            history_capacity: 1000,
            worker_interval: Duration::from_secs(5),
        }
    }
}

struct EngineStats {
    total_errors: AtomicU64,
    recovered_errors: AtomicU64,
    critical_errors: AtomicU64,
    circuit_breaker_trips: AtomicU64,
    retry_attempts: AtomicU64,
    successful_retries: AtomicU64,
}

impl Default for EngineStats {
    fn default() -> Self {
        EngineStats {
            total_errors: AtomicU64::new(0),
            recovered_errors: AtomicU64::new(0),
            critical_errors: AtomicU64::new(0),
            circuit_breaker_trips: AtomicU64::new(0),
            retry_attempts: AtomicU64::new(0),
            successful_retries: AtomicU64::new(0),
        }
    }
}

pub struct RecoveryEngine {
    history: Arc<ErrorHistory>,
    stats: Arc<EngineStats>,
    retry_policy: RwLock<RetryPolicy>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    error_callbacks: RwLock<HashMap<ErrorCode, ErrorCallback>>,
    recovery_callbacks: RwLock<HashMap<RecoveryStrategyKey, RecoveryCallback>>,
    worker: RwLock<Option<JoinHandle<()>>>,
}

/// `RecoveryStrategy` doesn't implement `Hash` by default derive alone would
/// suffice, but keeping a thin newtype documents that this map key is a
/// strategy, not an error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RecoveryStrategyKey(u8);

fn strategy_key(strategy: RecoveryStrategy) -> RecoveryStrategyKey {
    RecoveryStrategyKey(strategy as u8)
}

impl RecoveryEngine {
    pub fn new(retry_policy: RetryPolicy) -> Arc<Self> {
        Self::with_config(retry_policy, RecoveryEngineConfig::with_defaults())
    }

    pub fn with_config(retry_policy: RetryPolicy, config: RecoveryEngineConfig) -> Arc<Self> {
        let engine = Arc::new(RecoveryEngine {
            history: Arc::new(ErrorHistory::new(config.history_capacity)),
            stats: Arc::new(EngineStats::default()),
            retry_policy: RwLock::new(retry_policy),
            breakers: RwLock::new(HashMap::new()),
            error_callbacks: RwLock::new(HashMap::new()),
            recovery_callbacks: RwLock::new(HashMap::new()),
            worker: RwLock::new(None),
        });
        engine.clone().spawn_worker(config.worker_interval);
        engine
    }

    fn spawn_worker(self: Arc<Self>, interval: Duration) {
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                engine.sweep_unresolved().await;
            }
        });
        tokio::spawn(async move {
            *self.worker.write().await = Some(handle);
        });
    }

    /// Revisits errors still marked unrecovered, bumps their retry count, and
    /// logs a NOTIFY exactly once when the count exhausts the retry policy's
    /// budget, per spec §4.8.4's background-worker clause.
    async fn sweep_unresolved(&self) {
        let policy = self.retry_policy.read().await.clone();
        let unresolved = self.history.filtered(None).await;
        for err in unresolved.iter().filter(|e| !e.recovered && !e.dropped) {
            let Some(count) = self.history.bump_retry(err.id).await else {
                continue;
            };
            if !policy.should_retry(err.category, count) {
                warn!(
                    code = %err.code,
                    category = ?err.category,
                    retry_count = count,
                    "NOTIFY: recovery abandoned after exhausting retries"
                );
                self.history.mark_dropped(err.id).await;
            }
        }
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.worker.write().await.take() {
            handle.abort();
        }
    }

    pub async fn register_error_callback(&self, code: ErrorCode, cb: ErrorCallback) {
        self.error_callbacks.write().await.insert(code, cb);
    }

    pub async fn register_recovery_callback(&self, strategy: RecoveryStrategy, cb: RecoveryCallback) {
        self.recovery_callbacks.write().await.insert(strategy_key(strategy), cb);
    }

    async fn breaker(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(config)))
            .clone()
    }

    /// Records `err`, dispatches the per-code callback if registered, then
    /// runs the chosen recovery strategy's callback (if one is registered)
    /// and marks the history entry `recovered` on success.
    pub async fn handle_error(
        &self,
        code: ErrorCode,
        category: ErrorCategory,
        message: impl Into<String>,
        device_id: Option<String>,
        critical: bool,
    ) -> bool {
        self.stats.total_errors.fetch_add(1, Ordering::Relaxed);
        if critical {
            self.stats.critical_errors.fetch_add(1, Ordering::Relaxed);
        }

        let mut entry = RecordedError {
            id: 0,
            timestamp: now_rfc3339(),
            recorded_at: std::time::Instant::now(),
            code: code.clone(),
            category,
            message: message.into(),
            device_id,
            recovered: false,
            critical,
            retry_count: 0,
            dropped: false,
        };

        if let Some(cb) = self.error_callbacks.read().await.get(&code) {
            cb(&entry);
        }

        let strategy = default_strategy(category, critical);
        let recovered = if let Some(cb) = self.recovery_callbacks.read().await.get(&strategy_key(strategy)) {
            let fut = cb();
            fut.await
        } else {
            matches!(strategy, RecoveryStrategy::Ignore)
        };

        if recovered {
            self.stats.recovered_errors.fetch_add(1, Ordering::Relaxed);
        }
        entry.recovered = recovered;
        self.history.push(entry).await;
        recovered
    }

    /// Runs `op` repeatedly per the retry policy until it succeeds or the
    /// policy's attempt budget/category mismatch exhausts it.
    pub async fn execute_with_retry<F, Fut, T, E>(
        &self,
        category: ErrorCategory,
        mut op: F,
    ) -> Result<T, RecoveryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let policy = self.retry_policy.read().await.clone();
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        self.stats.successful_retries.fetch_add(1, Ordering::Relaxed);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    attempt += 1;
                    self.stats.retry_attempts.fetch_add(1, Ordering::Relaxed);
                    if !policy.should_retry(category, attempt) {
                        return Err(RecoveryError::RetriesExhausted(attempt, e.to_string()));
                    }
                    tokio::time::sleep(policy.delay(attempt)).await;
                }
            }
        }
    }

    /// Runs `op` behind a named circuit breaker, creating it on first use.
    pub async fn execute_with_circuit_breaker<F, Fut, T, E>(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
        op: F,
    ) -> Result<T, RecoveryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let breaker = self.breaker(name, config).await;
        if !breaker.can_execute().await {
            return Err(RecoveryError::CircuitOpen(name.to_string()));
        }
        match op().await {
            Ok(value) => {
                breaker.record_success().await;
                Ok(value)
            }
            Err(e) => {
                breaker.record_failure().await;
                if breaker.state().await == BreakerState::Open {
                    self.stats.circuit_breaker_trips.fetch_add(1, Ordering::Relaxed);
                }
                Err(RecoveryError::OperationFailed(e.to_string()))
            }
        }
    }

    pub fn statistics(&self) -> RecoveryStatistics {
        RecoveryStatistics {
            total_errors: self.stats.total_errors.load(Ordering::Relaxed),
            recovered_errors: self.stats.recovered_errors.load(Ordering::Relaxed),
            critical_errors: self.stats.critical_errors.load(Ordering::Relaxed),
            circuit_breaker_trips: self.stats.circuit_breaker_trips.load(Ordering::Relaxed),
            retry_attempts: self.stats.retry_attempts.load(Ordering::Relaxed),
            successful_retries: self.stats.successful_retries.load(Ordering::Relaxed),
        }
    }

    pub async fn error_history(&self, category: Option<ErrorCategory>) -> Vec<RecordedError> {
        self.history.filtered(category).await
    }

    pub async fn recent_errors(&self, window: Duration) -> Vec<RecordedError> {
        self.history.recent(window).await
    }

    pub async fn error_rate(&self, window: Duration) -> f64 {
        self.history.error_rate(window).await
    }

    pub async fn error_category_counts(&self) -> HashMap<ErrorCategory, u64> {
        self.history.category_counts().await
    }

    pub async fn is_healthy(&self) -> bool {
        self.error_rate(Duration::from_secs(5 * 60)).await < 0.1
    }
}

impl Drop for RecoveryEngine {
    fn drop(&mut self) {
        if let Ok(mut worker) = self.worker.try_write() {
            if let Some(handle) = worker.take() {
                handle.abort();
            }
        }
    }
}

pub fn boxed_recovery<F>(f: F) -> RecoveryCallback
where
    F: Fn() -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn validation_errors_are_ignored_and_marked_recovered() {
        let engine = RecoveryEngine::new(RetryPolicy::default());
        let recovered = engine
            .handle_error(ErrorCode::Text("BAD_INPUT".into()), ErrorCategory::Validation, "bad", None, false)
            .await;
        assert!(recovered);
        assert_eq!(engine.statistics().total_errors, 1);
        assert_eq!(engine.statistics().recovered_errors, 1);
    }

    #[tokio::test]
    async fn execute_with_retry_gives_up_after_max_attempts() {
        let engine = RecoveryEngine::new(RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_millis(5),
            retryable_categories: vec![ErrorCategory::Network],
        });
        let attempts = Arc::new(AtomicU64::new(0));
        let attempts2 = attempts.clone();
        let result: Result<(), RecoveryError> = engine
            .execute_with_retry(ErrorCategory::Network, move || {
                let attempts2 = attempts2.clone();
                async move {
                    attempts2.fetch_add(1, Ordering::SeqCst);
                    Err::<(), &str>("boom")
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn sweep_drops_unresolved_errors_after_exhausting_retries() {
        let engine = RecoveryEngine::with_config(
            RetryPolicy {
                max_retries: 2,
                initial_delay: Duration::from_millis(1),
                backoff_multiplier: 1.0,
                max_delay: Duration::from_millis(5),
                retryable_categories: vec![ErrorCategory::Network],
            },
            RecoveryEngineConfig {
                history_capacity: 10,
                worker_interval: Duration::from_secs(3600),
            },
        );
        // Let the background worker finish registering (and, if its first
        // immediate tick races in here, sweep a still-empty history) before
        // stopping it — from here on only our own `sweep_unresolved` calls
        // below can touch the history.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        engine.stop().await;

        let recovered = engine
            .handle_error(ErrorCode::Text("NET_DOWN".into()), ErrorCategory::Network, "down", None, false)
            .await;
        assert!(!recovered);

        engine.sweep_unresolved().await;
        let after_one = engine.error_history(None).await;
        assert_eq!(after_one[0].retry_count, 1);
        assert!(!after_one[0].dropped, "must not drop before exhausting the retry budget");

        engine.sweep_unresolved().await;
        let after_two = engine.error_history(None).await;
        assert_eq!(after_two[0].retry_count, 2);
        assert!(after_two[0].dropped, "must drop once retries are exhausted");

        engine.sweep_unresolved().await;
        let after_three = engine.error_history(None).await;
        assert_eq!(after_three[0].retry_count, 2, "dropped entries must not be swept again");
    }

    #[tokio::test]
    async fn execute_with_circuit_breaker_rejects_when_open() {
        let engine = RecoveryEngine::new(RetryPolicy::default());
        let config = CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            retry_timeout: Duration::from_secs(60),
        };
        let _ = engine
            .execute_with_circuit_breaker("dev-1", config, || async { Err::<(), &str>("boom") })
            .await;
        let result = engine
            .execute_with_circuit_breaker("dev-1", config, || async { Ok::<(), &str>(()) })
            .await;
        assert!(matches!(result, Err(RecoveryError::CircuitOpen(_))));
    }
}
