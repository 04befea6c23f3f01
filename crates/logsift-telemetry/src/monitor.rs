//! Per-operation performance monitoring
//!
//! The monitor keeps a bounded history of raw samples plus running
//! per-operation aggregates. It is injected wherever timing is wanted
//! rather than living in a global; cloning shares the same registry.

use metrics::{counter, histogram};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::trace;

/// Samples retained in the rolling history
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// Whether the timed operation returned `Ok` or `Err`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleOutcome {
    Success,
    Failure,
}

/// One timed invocation of a named operation
#[derive(Debug, Clone, Serialize)]
pub struct MetricSample {
    pub operation: String,
    /// Seconds since the Unix epoch at completion time
    pub timestamp_secs: u64,
    pub duration_micros: u64,
    pub outcome: SampleOutcome,
}

/// Running aggregates for one operation
#[derive(Debug, Clone, Serialize)]
pub struct OperationStats {
    pub calls: u64,
    pub errors: u64,
    pub total_micros: u64,
    pub min_micros: u64,
    pub max_micros: u64,
}

impl OperationStats {
    fn new() -> Self {
        Self {
            calls: 0,
            errors: 0,
            total_micros: 0,
            min_micros: u64::MAX,
            max_micros: 0,
        }
    }

    fn fold(&mut self, duration_micros: u64, outcome: SampleOutcome) {
        self.calls += 1;
        if outcome == SampleOutcome::Failure {
            self.errors += 1;
        }
        self.total_micros += duration_micros;
        self.min_micros = self.min_micros.min(duration_micros);
        self.max_micros = self.max_micros.max(duration_micros);
    }

    /// Mean duration across all recorded calls
    pub fn avg_micros(&self) -> u64 {
        if self.calls == 0 {
            0
        } else {
            self.total_micros / self.calls
        }
    }

    /// Fraction of calls that failed
    pub fn error_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.errors as f64 / self.calls as f64
        }
    }
}

struct MonitorInner {
    history: VecDeque<MetricSample>,
    max_history: usize,
    stats: HashMap<String, OperationStats>,
}

/// Thread-safe per-operation timing registry
#[derive(Clone)]
pub struct PerformanceMonitor {
    inner: Arc<Mutex<MonitorInner>>,
}

impl PerformanceMonitor {
    /// Create a monitor retaining [`DEFAULT_MAX_HISTORY`] raw samples
    pub fn new() -> Self {
        Self::with_history(DEFAULT_MAX_HISTORY)
    }

    /// Create a monitor retaining at most `max_history` raw samples;
    /// aggregates are unaffected by the history bound
    pub fn with_history(max_history: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MonitorInner {
                history: VecDeque::with_capacity(max_history.min(DEFAULT_MAX_HISTORY)),
                max_history,
                stats: HashMap::new(),
            })),
        }
    }

    /// Record one completed invocation
    pub fn record(&self, operation: &str, duration: Duration, outcome: SampleOutcome) {
        let duration_micros = duration.as_micros() as u64;
        trace!(operation, duration_micros, ?outcome, "recorded sample");

        histogram!("logsift_operation_duration_us", "operation" => operation.to_owned())
            .record(duration_micros as f64);
        if outcome == SampleOutcome::Failure {
            counter!("logsift_operation_errors", "operation" => operation.to_owned()).increment(1);
        }

        let mut inner = self.inner.lock();
        while inner.history.len() >= inner.max_history && !inner.history.is_empty() {
            inner.history.pop_front();
        }
        if inner.max_history > 0 {
            inner.history.push_back(MetricSample {
                operation: operation.to_owned(),
                timestamp_secs: unix_now_secs(),
                duration_micros,
                outcome,
            });
        }
        inner
            .stats
            .entry(operation.to_owned())
            .or_insert_with(OperationStats::new)
            .fold(duration_micros, outcome);
    }

    /// Time a `Result`-returning future, passing its output through
    /// unchanged
    pub async fn wrap<T, E, Fut>(&self, operation: &str, future: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let result = future.await;
        let outcome = if result.is_ok() {
            SampleOutcome::Success
        } else {
            SampleOutcome::Failure
        };
        self.record(operation, started.elapsed(), outcome);
        result
    }

    /// Aggregates for one operation, if it has been recorded
    pub fn operation(&self, operation: &str) -> Option<OperationStats> {
        self.inner.lock().stats.get(operation).cloned()
    }

    /// Aggregates for every recorded operation
    pub fn snapshot(&self) -> HashMap<String, OperationStats> {
        self.inner.lock().stats.clone()
    }

    /// Recent raw samples, oldest first
    pub fn history(&self) -> Vec<MetricSample> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Operations whose average duration exceeds `threshold`, slowest
    /// first
    pub fn slow_operations(&self, threshold: Duration) -> Vec<(String, OperationStats)> {
        let threshold_micros = threshold.as_micros() as u64;
        let mut slow: Vec<_> = self
            .inner
            .lock()
            .stats
            .iter()
            .filter(|(_, stats)| stats.avg_micros() > threshold_micros)
            .map(|(op, stats)| (op.clone(), stats.clone()))
            .collect();
        slow.sort_by(|a, b| b.1.avg_micros().cmp(&a.1.avg_micros()));
        slow
    }

    /// Discard all samples and aggregates
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.history.clear();
        inner.stats.clear();
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_folds_into_aggregates() {
        let monitor = PerformanceMonitor::new();
        monitor.record("route", Duration::from_micros(100), SampleOutcome::Success);
        monitor.record("route", Duration::from_micros(300), SampleOutcome::Failure);

        let stats = monitor.operation("route").unwrap();
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.total_micros, 400);
        assert_eq!(stats.min_micros, 100);
        assert_eq!(stats.max_micros, 300);
        assert_eq!(stats.avg_micros(), 200);
        assert!((stats.error_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn history_is_bounded() {
        let monitor = PerformanceMonitor::with_history(3);
        for n in 0..5u64 {
            monitor.record(
                &format!("op{n}"),
                Duration::from_micros(n),
                SampleOutcome::Success,
            );
        }

        let history = monitor.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].operation, "op2");
        assert_eq!(history[2].operation, "op4");
        // Aggregates still cover all five calls
        assert_eq!(monitor.snapshot().len(), 5);
    }

    #[tokio::test]
    async fn wrap_preserves_the_value_and_times_it() {
        let monitor = PerformanceMonitor::new();

        let ok: Result<u32, &str> = monitor.wrap("fetch", async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u32, &str> = monitor.wrap("fetch", async { Err("down") }).await;
        assert_eq!(err, Err("down"));

        let stats = monitor.operation("fetch").unwrap();
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn slow_operations_sorted_by_average_descending() {
        let monitor = PerformanceMonitor::new();
        monitor.record("fast", Duration::from_micros(10), SampleOutcome::Success);
        monitor.record("slow", Duration::from_micros(5000), SampleOutcome::Success);
        monitor.record("slower", Duration::from_micros(9000), SampleOutcome::Success);

        let slow = monitor.slow_operations(Duration::from_micros(100));
        let names: Vec<_> = slow.iter().map(|(op, _)| op.as_str()).collect();
        assert_eq!(names, vec!["slower", "slow"]);
    }

    #[test]
    fn reset_clears_everything() {
        let monitor = PerformanceMonitor::new();
        monitor.record("route", Duration::from_micros(100), SampleOutcome::Success);
        monitor.reset();

        assert!(monitor.snapshot().is_empty());
        assert!(monitor.history().is_empty());
        assert!(monitor.operation("route").is_none());
    }

    #[test]
    fn concurrent_recording_is_consistent() {
        let monitor = PerformanceMonitor::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let monitor = monitor.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        monitor.record(
                            "route",
                            Duration::from_micros(50),
                            SampleOutcome::Success,
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(monitor.operation("route").unwrap().calls, 800);
    }
}
