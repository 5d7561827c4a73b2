//! Rolling performance metrics and alerting (spec §4.11), grounded on the
//! original implementation's `performance_metrics.cpp`/`.h` per-(device,
//! metric) rolling-window collector.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

type SeriesKey = (String, String);

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
    pub stddev: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Improving,
    Degrading,
    Stable,
}

#[derive(Debug, Clone, Copy)]
pub struct Trend {
    pub direction: TrendDirection,
    pub slope: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCondition {
    Gt,
    Lt,
    Eq,
    Ne,
}

#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub metric_type: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub duration: Duration,
}

pub type AlertCallback = Arc<dyn Fn(&str, &str, f64) + Send + Sync>;

fn compute_stats(samples: &[Sample]) -> Option<MetricStats> {
    if samples.is_empty() {
        return None;
    }
    let mut values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let count = values.len();
    let min = values[0];
    let max = values[count - 1];
    let avg = values.iter().sum::<f64>() / count as f64;
    let median = if count % 2 == 0 {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    } else {
        values[count / 2]
    };
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / count as f64;
    Some(MetricStats {
        count,
        min,
        max,
        avg,
        median,
        stddev: variance.sqrt(),
    })
}

/// Ordinary least squares over `(index, value)` pairs; `confidence` is R².
fn linear_regression(samples: &[Sample]) -> Option<Trend> {
    let n = samples.len();
    if n < 2 {
        return None;
    }
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let ys: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let x_mean = xs.iter().sum::<f64>() / n as f64;
    let y_mean = ys.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    for i in 0..n {
        cov += (xs[i] - x_mean) * (ys[i] - y_mean);
        var_x += (xs[i] - x_mean).powi(2);
    }
    if var_x == 0.0 {
        return Some(Trend {
            direction: TrendDirection::Stable,
            slope: 0.0,
            confidence: 0.0,
        });
    }
    let slope = cov / var_x;
    let intercept = y_mean - slope * x_mean;

    let mut ss_tot = 0.0;
    let mut ss_res = 0.0;
    for i in 0..n {
        let predicted = slope * xs[i] + intercept;
        ss_res += (ys[i] - predicted).powi(2);
        ss_tot += (ys[i] - y_mean).powi(2);
    }
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    let direction = if slope.abs() < 1e-9 {
        TrendDirection::Stable
    } else if slope < 0.0 {
        TrendDirection::Improving
    } else {
        TrendDirection::Degrading
    };

    Some(Trend {
        direction,
        slope,
        confidence: r_squared.clamp(0.0, 1.0),
    })
}

fn alert_fires(condition: AlertCondition, value: f64, threshold: f64) -> bool {
    match condition {
        AlertCondition::Gt => value > threshold,
        AlertCondition::Lt => value < threshold,
        AlertCondition::Eq => (value - threshold).abs() < f64::EPSILON,
        AlertCondition::Ne => (value - threshold).abs() >= f64::EPSILON,
    }
}

struct AlertEntry {
    config: AlertConfig,
    breached_since: Option<Instant>,
}

pub struct PerformanceMetricsCollector {
    window_size: usize,
    series: Arc<RwLock<HashMap<SeriesKey, Vec<Sample>>>>,
    alerts: Arc<RwLock<HashMap<SeriesKey, Vec<AlertEntry>>>>,
    alert_callback: Arc<RwLock<Option<AlertCallback>>>,
    aggregation_task: JoinHandle<()>,
    alert_task: JoinHandle<()>,
}

impl PerformanceMetricsCollector {
    pub fn new(window_size: usize, aggregation_interval: Duration) -> Arc<Self> {
        let series: Arc<RwLock<HashMap<SeriesKey, Vec<Sample>>>> = Arc::new(RwLock::new(HashMap::new()));
        let alerts: Arc<RwLock<HashMap<SeriesKey, Vec<AlertEntry>>>> = Arc::new(RwLock::new(HashMap::new()));
        let alert_callback: Arc<RwLock<Option<AlertCallback>>> = Arc::new(RwLock::new(None));

        let agg_series = series.clone();
        let aggregation_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(aggregation_interval);
            loop {
                ticker.tick().await;
                let guard = agg_series.read().await;
                tracing::debug!(series = guard.len(), "performance metrics aggregation tick");
            }
        });

        let eval_series = series.clone();
        let eval_alerts = alerts.clone();
        let eval_callback = alert_callback.clone();
        let alert_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(10));
            loop {
                ticker.tick().await;
                Self::evaluate_alerts(&eval_series, &eval_alerts, &eval_callback).await;
            }
        });

        Arc::new(PerformanceMetricsCollector {
            window_size,
            series,
            alerts,
            alert_callback,
            aggregation_task,
            alert_task,
        })
    }

    pub async fn record_sample(&self, device_id: impl Into<String>, metric_key: impl Into<String>, value: f64) {
        let key = (device_id.into(), metric_key.into());
        let mut series = self.series.write().await;
        let samples = series.entry(key).or_default();
        samples.push(Sample { at: Instant::now(), value });
        if samples.len() > self.window_size {
            samples.remove(0);
        }
    }

    pub async fn stats(&self, device_id: &str, metric_key: &str) -> Option<MetricStats> {
        let series = self.series.read().await;
        let samples = series.get(&(device_id.to_string(), metric_key.to_string()))?;
        compute_stats(samples)
    }

    pub async fn trend(&self, device_id: &str, metric_key: &str) -> Option<Trend> {
        let series = self.series.read().await;
        let samples = series.get(&(device_id.to_string(), metric_key.to_string()))?;
        linear_regression(samples)
    }

    pub async fn register_alert(&self, device_id: impl Into<String>, metric_key: impl Into<String>, config: AlertConfig) {
        let key = (device_id.into(), metric_key.into());
        self.alerts
            .write()
            .await
            .entry(key)
            .or_default()
            .push(AlertEntry { config, breached_since: None });
    }

    pub async fn set_alert_callback(&self, cb: AlertCallback) {
        *self.alert_callback.write().await = Some(cb);
    }

    async fn evaluate_alerts(
        series: &Arc<RwLock<HashMap<SeriesKey, Vec<Sample>>>>,
        alerts: &Arc<RwLock<HashMap<SeriesKey, Vec<AlertEntry>>>>,
        callback: &Arc<RwLock<Option<AlertCallback>>>,
    ) {
        let mut alerts = alerts.write().await;
        let series = series.read().await;
        for (key, entries) in alerts.iter_mut() {
            let Some(samples) = series.get(key) else { continue };
            let Some(latest) = samples.last() else { continue };
            for entry in entries.iter_mut() {
                let breached = alert_fires(entry.config.condition, latest.value, entry.config.threshold);
                if breached {
                    let since = entry.breached_since.get_or_insert(Instant::now());
                    if since.elapsed() >= entry.config.duration {
                        if let Some(cb) = callback.read().await.as_ref() {
                            cb(&key.0, &key.1, latest.value);
                        }
                    }
                } else {
                    entry.breached_since = None;
                }
            }
        }
    }
}

impl Drop for PerformanceMetricsCollector {
    fn drop(&mut self) {
        self.aggregation_task.abort();
        self.alert_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_computes_min_max_avg_median_stddev() {
        let samples: Vec<Sample> = [1.0, 2.0, 3.0, 4.0].iter().map(|&v| Sample { at: Instant::now(), value: v }).collect();
        let stats = compute_stats(&samples).unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.avg, 2.5);
        assert_eq!(stats.median, 2.5);
    }

    #[test]
    fn regression_detects_degrading_trend_with_high_confidence() {
        let samples: Vec<Sample> = (0..10).map(|i| Sample { at: Instant::now(), value: i as f64 }).collect();
        let trend = linear_regression(&samples).unwrap();
        assert_eq!(trend.direction, TrendDirection::Degrading);
        assert!(trend.confidence > 0.99);
    }

    #[test]
    fn alert_condition_matches() {
        assert!(alert_fires(AlertCondition::Gt, 5.0, 3.0));
        assert!(!alert_fires(AlertCondition::Lt, 5.0, 3.0));
        assert!(alert_fires(AlertCondition::Eq, 3.0, 3.0));
    }
}
