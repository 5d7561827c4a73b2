//! Error categories used by the strategy table (spec §4.8.3) — distinct from
//! `hydrogen-ws-classify`'s transport-specific category axis; this one
//! classifies *application* errors for recovery-strategy selection.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Network,
    Timeout,
    Auth,
    Resource,
    Validation,
    Protocol,
    Internal,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    Ignore,
    Retry,
    Notify,
    RestartDevice,
    Failover,
    Custom,
    CircuitBreaker,
    ExponentialBackoff,
    Escalate,
    GracefulDegradation,
    Restart,
}

/// Default strategy by category when no explicit per-code rule exists
/// (spec §4.8.3). `severe` distinguishes the NETWORK/TIMEOUT split between
/// circuit-breaking and plain backoff.
pub fn default_strategy(category: ErrorCategory, severe: bool) -> RecoveryStrategy {
    match category {
        ErrorCategory::Network | ErrorCategory::Timeout => {
            if severe {
                RecoveryStrategy::CircuitBreaker
            } else {
                RecoveryStrategy::ExponentialBackoff
            }
        }
        ErrorCategory::Auth => RecoveryStrategy::Escalate,
        ErrorCategory::Resource => RecoveryStrategy::GracefulDegradation,
        ErrorCategory::Validation => RecoveryStrategy::Ignore,
        ErrorCategory::Protocol => RecoveryStrategy::Retry,
        ErrorCategory::Internal | ErrorCategory::Critical => RecoveryStrategy::Restart,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_severe_trips_circuit_breaker() {
        assert_eq!(default_strategy(ErrorCategory::Network, true), RecoveryStrategy::CircuitBreaker);
        assert_eq!(default_strategy(ErrorCategory::Network, false), RecoveryStrategy::ExponentialBackoff);
    }

    #[test]
    fn validation_is_never_recovered() {
        assert_eq!(default_strategy(ErrorCategory::Validation, true), RecoveryStrategy::Ignore);
    }
}
