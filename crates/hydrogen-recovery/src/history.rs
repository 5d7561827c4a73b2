//! Bounded error history ring and derived statistics (spec §4.8.4).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use hydrogen_message::ErrorCode;
use tokio::sync::RwLock;

use crate::category::ErrorCategory;

#[derive(Debug, Clone)]
pub struct RecordedError {
    /// Stable identity for the background sweep to re-find this entry across
    /// ticks, independent of its position in the ring (spec §4.8.4).
    pub id: u64,
    pub timestamp: String,
    pub recorded_at: Instant,
    pub code: ErrorCode,
    pub category: ErrorCategory,
    pub message: String,
    pub device_id: Option<String>,
    pub recovered: bool,
    pub critical: bool,
    /// Times the background sweep has revisited this entry while unresolved.
    pub retry_count: u32,
    /// Set once the sweep abandons the entry after exhausting retries, so
    /// the NOTIFY log fires exactly once rather than every tick.
    pub dropped: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecoveryStatistics {
    pub total_errors: u64,
    pub recovered_errors: u64,
    pub critical_errors: u64,
    pub circuit_breaker_trips: u64,
    pub retry_attempts: u64,
    pub successful_retries: u64,
}

pub struct ErrorHistory {
    capacity: usize,
    entries: RwLock<VecDeque<RecordedError>>,
    next_id: AtomicU64,
}

impl ErrorHistory {
    pub fn new(capacity: usize) -> Self {
        ErrorHistory {
            capacity,
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Stamps `entry` with a fresh id and stores it, returning the id so the
    /// caller (the recovery engine's sweep) can track it across ticks.
    pub async fn push(&self, mut entry: RecordedError) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        entry.id = id;
        let mut guard = self.entries.write().await;
        if guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(entry);
        id
    }

    /// Increments the retry count of the still-present entry `id` and
    /// returns the new count; `None` if it was trimmed from the ring already.
    pub async fn bump_retry(&self, id: u64) -> Option<u32> {
        let mut guard = self.entries.write().await;
        let entry = guard.iter_mut().find(|e| e.id == id)?;
        entry.retry_count += 1;
        Some(entry.retry_count)
    }

    /// Marks `id` as abandoned so it's excluded from future sweeps.
    pub async fn mark_dropped(&self, id: u64) {
        let mut guard = self.entries.write().await;
        if let Some(entry) = guard.iter_mut().find(|e| e.id == id) {
            entry.dropped = true;
        }
    }

    /// `category = None` returns the full history, matching Open Question 3's
    /// decision to make "all categories" explicit rather than an overload.
    pub async fn filtered(&self, category: Option<ErrorCategory>) -> Vec<RecordedError> {
        let guard = self.entries.read().await;
        guard
            .iter()
            .filter(|e| category.is_none_or(|c| e.category == c))
            .cloned()
            .collect()
    }

    pub async fn recent(&self, window: Duration) -> Vec<RecordedError> {
        let guard = self.entries.read().await;
        guard.iter().filter(|e| e.recorded_at.elapsed() <= window).cloned().collect()
    }

    pub async fn error_rate(&self, window: Duration) -> f64 {
        let recent = self.recent(window).await;
        if recent.is_empty() {
            return 0.0;
        }
        let unrecovered = recent.iter().filter(|e| !e.recovered).count();
        unrecovered as f64 / recent.len() as f64
    }

    pub async fn category_counts(&self) -> HashMap<ErrorCategory, u64> {
        let guard = self.entries.read().await;
        let mut counts = HashMap::new();
        for e in guard.iter() {
            *counts.entry(e.category).or_insert(0) += 1;
        }
        counts
    }
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(category: ErrorCategory, recovered: bool) -> RecordedError {
        RecordedError {
            id: 0,
            timestamp: now_rfc3339(),
            recorded_at: Instant::now(),
            code: ErrorCode::Text("E1".into()),
            category,
            message: "boom".into(),
            device_id: None,
            recovered,
            critical: false,
            retry_count: 0,
            dropped: false,
        }
    }

    #[tokio::test]
    async fn ring_drops_oldest_past_capacity() {
        let history = ErrorHistory::new(2);
        history.push(entry(ErrorCategory::Network, true)).await;
        history.push(entry(ErrorCategory::Timeout, true)).await;
        history.push(entry(ErrorCategory::Protocol, true)).await;
        let all = history.filtered(None).await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].category, ErrorCategory::Timeout);
    }

    #[tokio::test]
    async fn filtered_matches_one_category() {
        let history = ErrorHistory::new(10);
        history.push(entry(ErrorCategory::Network, true)).await;
        history.push(entry(ErrorCategory::Timeout, true)).await;
        let net_only = history.filtered(Some(ErrorCategory::Network)).await;
        assert_eq!(net_only.len(), 1);
    }

    #[tokio::test]
    async fn error_rate_reflects_unrecovered_fraction() {
        let history = ErrorHistory::new(10);
        history.push(entry(ErrorCategory::Network, true)).await;
        history.push(entry(ErrorCategory::Network, false)).await;
        let rate = history.error_rate(Duration::from_secs(60)).await;
        assert!((rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn bump_retry_increments_the_matching_entry_only() {
        let history = ErrorHistory::new(10);
        let id = history.push(entry(ErrorCategory::Network, false)).await;
        history.push(entry(ErrorCategory::Timeout, false)).await;

        assert_eq!(history.bump_retry(id).await, Some(1));
        assert_eq!(history.bump_retry(id).await, Some(2));

        let all = history.filtered(None).await;
        let bumped = all.iter().find(|e| e.id == id).unwrap();
        assert_eq!(bumped.retry_count, 2);
        let other = all.iter().find(|e| e.id != id).unwrap();
        assert_eq!(other.retry_count, 0);
    }

    #[tokio::test]
    async fn bump_retry_on_trimmed_entry_returns_none() {
        let history = ErrorHistory::new(1);
        let id = history.push(entry(ErrorCategory::Network, false)).await;
        history.push(entry(ErrorCategory::Timeout, false)).await;
        assert_eq!(history.bump_retry(id).await, None);
    }

    #[tokio::test]
    async fn mark_dropped_flags_the_entry() {
        let history = ErrorHistory::new(10);
        let id = history.push(entry(ErrorCategory::Network, false)).await;
        history.mark_dropped(id).await;
        let all = history.filtered(None).await;
        assert!(all.iter().find(|e| e.id == id).unwrap().dropped);
    }
}
