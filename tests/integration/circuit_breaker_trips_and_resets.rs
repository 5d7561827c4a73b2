//! Spec §8 scenario: repeated failures trip the breaker open; after the
//! retry timeout it goes half-open, and a success streak closes it again.

use std::time::Duration;

use hydrogen_recovery::{BreakerState, CircuitBreaker, CircuitBreakerConfig};

#[tokio::test]
async fn breaker_trips_then_recovers_through_half_open() {
    let breaker = CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 3,
        success_threshold: 2,
        retry_timeout: Duration::from_millis(50),
    });

    assert!(breaker.can_execute().await);
    for _ in 0..3 {
        breaker.record_failure().await;
    }
    assert_eq!(breaker.state().await, BreakerState::Open);
    assert!(!breaker.can_execute().await);
    assert_eq!(breaker.trips(), 1);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(breaker.can_execute().await);
    assert_eq!(breaker.state().await, BreakerState::HalfOpen);

    breaker.record_success().await;
    assert_eq!(breaker.state().await, BreakerState::HalfOpen);
    breaker.record_success().await;
    assert_eq!(breaker.state().await, BreakerState::Closed);
}
