//! Aggregation of classified metric events into a consistent snapshot.

use parking_lot::RwLock;
use plotwatch_types::{
    HealthSeverity, MetricEvent, MetricsSnapshot, ERROR_RATE_CRITICAL_PCT, ERROR_RATE_WARNING_PCT,
    HEALTH_HISTORY_CAP,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

/// Owns all mutable telemetry state for one supervision session.
///
/// The pump task is the only writer; `snapshot()` is safe from any thread
/// while events are being applied. Nothing resets implicitly - `reset()`
/// runs when a new session begins, so metrics never leak across sessions.
#[derive(Debug)]
pub struct MetricsCollector {
    submissions: AtomicU64,
    network_errors: AtomicU64,
    total_reads: AtomicU64,
    failed_reads: AtomicU64,
    running: AtomicBool,
    current_round: RwLock<Option<String>>,
    best_deadline: RwLock<Option<String>>,
    health_lines: RwLock<VecDeque<String>>,
    session_started: RwLock<Option<Instant>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            submissions: AtomicU64::new(0),
            network_errors: AtomicU64::new(0),
            total_reads: AtomicU64::new(0),
            failed_reads: AtomicU64::new(0),
            running: AtomicBool::new(false),
            current_round: RwLock::new(None),
            best_deadline: RwLock::new(None),
            health_lines: RwLock::new(VecDeque::with_capacity(HEALTH_HISTORY_CAP)),
            session_started: RwLock::new(None),
        }
    }

    /// Apply one observed event. Total over all variants; no event is
    /// ever rejected.
    pub fn apply(&self, event: MetricEvent) {
        match event {
            MetricEvent::RoundObserved(height) => {
                *self.current_round.write() = Some(height);
            }
            MetricEvent::DeadlineObserved(value) => {
                // Last write wins; whether the value is actually "better"
                // is the consumer's call.
                *self.best_deadline.write() = Some(value);
            }
            MetricEvent::SubmissionAccepted => {
                self.submissions.fetch_add(1, Ordering::Relaxed);
            }
            MetricEvent::NetworkErrorObserved => {
                self.network_errors.fetch_add(1, Ordering::Relaxed);
            }
            MetricEvent::ReadCompleted => {
                self.total_reads.fetch_add(1, Ordering::Relaxed);
            }
            MetricEvent::ReadFailed => {
                self.failed_reads.fetch_add(1, Ordering::Relaxed);
            }
            MetricEvent::HealthLineObserved { line, .. } => {
                let mut lines = self.health_lines.write();
                lines.push_back(line);
                while lines.len() > HEALTH_HISTORY_CAP {
                    lines.pop_front();
                }
            }
        }
    }

    /// Consistent point-in-time copy of every metric.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let running = self.running.load(Ordering::Relaxed);
        let total_reads = self.total_reads.load(Ordering::Relaxed);
        let failed_reads = self.failed_reads.load(Ordering::Relaxed);
        let submissions = self.submissions.load(Ordering::Relaxed);

        let error_rate_percent =
            (total_reads > 0).then(|| failed_reads as f64 / total_reads as f64 * 100.0);

        let overall_health = error_rate_percent.map(|rate| {
            if rate > ERROR_RATE_CRITICAL_PCT {
                HealthSeverity::Critical
            } else if rate > ERROR_RATE_WARNING_PCT {
                HealthSeverity::Warning
            } else {
                HealthSeverity::Ok
            }
        });

        let uptime_secs = if running {
            self.session_started
                .read()
                .map(|started| started.elapsed().as_secs())
                .unwrap_or(0)
        } else {
            0
        };

        MetricsSnapshot {
            running,
            current_round: self.current_round.read().clone(),
            best_deadline: self.best_deadline.read().clone(),
            total_reads,
            failed_reads,
            submissions,
            network_errors: self.network_errors.load(Ordering::Relaxed),
            recent_health_lines: self.health_lines.read().iter().cloned().collect(),
            error_rate_percent,
            overall_health,
            pool_connected: submissions > 0 || running,
            uptime_secs,
        }
    }

    /// Clear everything for a fresh supervision session.
    pub fn reset(&self) {
        self.submissions.store(0, Ordering::Relaxed);
        self.network_errors.store(0, Ordering::Relaxed);
        self.total_reads.store(0, Ordering::Relaxed);
        self.failed_reads.store(0, Ordering::Relaxed);
        *self.current_round.write() = None;
        *self.best_deadline.write() = None;
        self.health_lines.write().clear();
        *self.session_started.write() = None;
        debug!("Metrics reset for new session");
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    pub fn mark_session_start(&self) {
        *self.session_started.write() = Some(Instant::now());
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_events() {
        let collector = MetricsCollector::new();

        collector.apply(MetricEvent::SubmissionAccepted);
        collector.apply(MetricEvent::SubmissionAccepted);
        collector.apply(MetricEvent::NetworkErrorObserved);
        collector.apply(MetricEvent::ReadCompleted);
        collector.apply(MetricEvent::ReadFailed);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.submissions, 2);
        assert_eq!(snapshot.network_errors, 1);
        assert_eq!(snapshot.total_reads, 1);
        assert_eq!(snapshot.failed_reads, 1);
    }

    #[test]
    fn test_error_rate_calculation() {
        let collector = MetricsCollector::new();

        for _ in 0..10 {
            collector.apply(MetricEvent::ReadCompleted);
        }
        collector.apply(MetricEvent::ReadFailed);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_reads, 10);
        assert_eq!(snapshot.failed_reads, 1);
        let rate = snapshot.error_rate_percent.expect("rate");
        assert!((rate - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_error_rate_undefined_without_reads() {
        let collector = MetricsCollector::new();
        collector.apply(MetricEvent::ReadFailed);

        let snapshot = collector.snapshot();
        assert!(snapshot.error_rate_percent.is_none());
        assert!(snapshot.overall_health.is_none());
    }

    #[test]
    fn test_overall_health_thresholds() {
        let healthy = MetricsCollector::new();
        for _ in 0..100 {
            healthy.apply(MetricEvent::ReadCompleted);
        }
        healthy.apply(MetricEvent::ReadFailed);
        assert_eq!(healthy.snapshot().overall_health, Some(HealthSeverity::Ok));

        let warning = MetricsCollector::new();
        for _ in 0..100 {
            warning.apply(MetricEvent::ReadCompleted);
        }
        for _ in 0..3 {
            warning.apply(MetricEvent::ReadFailed);
        }
        assert_eq!(
            warning.snapshot().overall_health,
            Some(HealthSeverity::Warning)
        );

        let critical = MetricsCollector::new();
        for _ in 0..100 {
            critical.apply(MetricEvent::ReadCompleted);
        }
        for _ in 0..10 {
            critical.apply(MetricEvent::ReadFailed);
        }
        assert_eq!(
            critical.snapshot().overall_health,
            Some(HealthSeverity::Critical)
        );
    }

    #[test]
    fn test_round_and_deadline_last_write_wins() {
        let collector = MetricsCollector::new();

        collector.apply(MetricEvent::RoundObserved("100".into()));
        collector.apply(MetricEvent::RoundObserved("99".into()));
        collector.apply(MetricEvent::DeadlineObserved("5000".into()));
        collector.apply(MetricEvent::DeadlineObserved("9000".into()));

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.current_round.as_deref(), Some("99"));
        assert_eq!(snapshot.best_deadline.as_deref(), Some("9000"));
    }

    #[test]
    fn test_health_history_fifo_eviction() {
        let collector = MetricsCollector::new();

        for i in 0..50 {
            collector.apply(MetricEvent::HealthLineObserved {
                line: format!("health report {i}"),
                severity: HealthSeverity::Ok,
            });
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent_health_lines.len(), HEALTH_HISTORY_CAP);
        assert_eq!(snapshot.recent_health_lines[0], "health report 30");
        assert_eq!(
            snapshot.recent_health_lines[HEALTH_HISTORY_CAP - 1],
            "health report 49"
        );
    }

    #[test]
    fn test_reset_clears_everything() {
        let collector = MetricsCollector::new();

        collector.apply(MetricEvent::RoundObserved("100".into()));
        collector.apply(MetricEvent::SubmissionAccepted);
        collector.apply(MetricEvent::ReadCompleted);
        collector.apply(MetricEvent::HealthLineObserved {
            line: "health ✓".into(),
            severity: HealthSeverity::Ok,
        });

        collector.reset();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.submissions, 0);
        assert_eq!(snapshot.total_reads, 0);
        assert!(snapshot.current_round.is_none());
        assert!(snapshot.best_deadline.is_none());
        assert!(snapshot.recent_health_lines.is_empty());
    }

    #[test]
    fn test_pool_connected_heuristic() {
        let collector = MetricsCollector::new();
        assert!(!collector.snapshot().pool_connected);

        collector.set_running(true);
        assert!(collector.snapshot().pool_connected);

        collector.set_running(false);
        collector.apply(MetricEvent::SubmissionAccepted);
        assert!(collector.snapshot().pool_connected);
    }

    #[test]
    fn test_uptime_gated_on_running() {
        let collector = MetricsCollector::new();
        collector.mark_session_start();
        assert_eq!(collector.snapshot().uptime_secs, 0);

        collector.set_running(true);
        // Started just now; the point is that it reads as a live session.
        assert!(collector.snapshot().uptime_secs < 2);
    }

    #[test]
    fn test_snapshot_serializes() {
        let collector = MetricsCollector::new();
        collector.apply(MetricEvent::RoundObserved("1042339".into()));

        let json = serde_json::to_string(&collector.snapshot()).expect("serialize");
        assert!(json.contains("\"current_round\":\"1042339\""));
        assert!(json.contains("\"running\":false"));
    }
}
