//! Logging and performance metrics (spec §4.11): a filtered structured
//! logger with optional size-rotated file output, a bounded message-trace
//! ring, and a rolling per-device/per-metric performance collector with
//! trend analysis and threshold alerts.

mod logger;
mod metrics;
mod record;
mod rotation;
mod trace;

pub use logger::{Logger, LoggerConfig, Sink};
pub use metrics::{
    AlertCallback, AlertCondition, AlertConfig, MetricStats, PerformanceMetricsCollector, Trend,
    TrendDirection,
};
pub use record::{LogRecord, LogSeverity};
pub use rotation::{list_rotated_files, RotationConfig, SizeRotatingWriter};
pub use trace::{MessageTrace, TraceDirection, TraceEntry};

/// Millisecond-precision RFC 3339 timestamp, matching the format `hydrogen-message`
/// already uses for envelope timestamps.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_rfc3339_is_parseable() {
        let ts = now_rfc3339();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn log_record_new_stamps_a_timestamp() {
        let record = LogRecord::new(LogSeverity::Info, "test", "hello");
        assert!(!record.timestamp.is_empty());
    }
}
