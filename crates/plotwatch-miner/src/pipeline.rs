//! The telemetry pump: captured lines in, aggregated metrics out.

use crate::classifier::classify;
use crate::metrics::MetricsCollector;
use plotwatch_types::{MetricsSnapshot, RawLine};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Pumps every captured [`RawLine`] through the classifier into the
/// shared collector, in arrival order.
///
/// `run()` returns when the line channel closes, which happens once the
/// child's pipes reach EOF - either because the miner exited on its own
/// or because `stop()` terminated it. Buffered lines are always drained
/// before the pump returns.
pub struct TelemetryPipeline {
    metrics: Arc<MetricsCollector>,
    lines: mpsc::Receiver<RawLine>,
}

impl TelemetryPipeline {
    pub fn new(metrics: Arc<MetricsCollector>, lines: mpsc::Receiver<RawLine>) -> Self {
        Self { metrics, lines }
    }

    /// Safe to call concurrently with `run()`.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn run(mut self) {
        let mut lines_pumped: u64 = 0;
        let mut events_applied: u64 = 0;

        while let Some(raw) = self.lines.recv().await {
            trace!("miner: {}", raw.text);
            lines_pumped += 1;

            for event in classify(&raw.text) {
                self.metrics.apply(event);
                events_applied += 1;
            }
        }

        debug!(
            "Telemetry pump drained: {} lines, {} events",
            lines_pumped, events_applied
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotwatch_types::MetricEvent;

    #[tokio::test]
    async fn test_pump_applies_events_in_order() {
        let metrics = Arc::new(MetricsCollector::new());
        let (tx, rx) = mpsc::channel(16);

        let pump = tokio::spawn(TelemetryPipeline::new(metrics.clone(), rx).run());

        tx.send(RawLine::now("Height: 100")).await.unwrap();
        tx.send(RawLine::now("Height: 200")).await.unwrap();
        tx.send(RawLine::now("new best deadline: 321"))
            .await
            .unwrap();
        tx.send(RawLine::now("finished scanning, speed 80 MiB/s"))
            .await
            .unwrap();
        drop(tx);

        pump.await.expect("pump task");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.current_round.as_deref(), Some("200"));
        assert_eq!(snapshot.best_deadline.as_deref(), Some("321"));
        assert_eq!(snapshot.total_reads, 1);
    }

    #[tokio::test]
    async fn test_pump_terminates_on_stream_closure() {
        let metrics = Arc::new(MetricsCollector::new());
        let (tx, rx) = mpsc::channel(16);

        let pump = tokio::spawn(TelemetryPipeline::new(metrics.clone(), rx).run());

        tx.send(RawLine::now("nonce submitted: accepted"))
            .await
            .unwrap();
        drop(tx);

        // The pump must return on its own once the stream ends.
        pump.await.expect("pump task");

        let before = metrics.snapshot();
        assert_eq!(before.submissions, 1);

        // No further events arrive after closure; the collector only
        // changes through explicit application.
        metrics.apply(MetricEvent::SubmissionAccepted);
        assert_eq!(metrics.snapshot().submissions, 2);
    }

    #[tokio::test]
    async fn test_snapshot_concurrent_with_pump() {
        let metrics = Arc::new(MetricsCollector::new());
        let (tx, rx) = mpsc::channel(16);
        let pipeline = TelemetryPipeline::new(metrics.clone(), rx);

        // Reading through the pipeline while lines are still in flight
        // must always observe a consistent copy.
        let snapshot = pipeline.snapshot();
        assert_eq!(snapshot.submissions, 0);

        let pump = tokio::spawn(pipeline.run());
        for _ in 0..100 {
            tx.send(RawLine::now("submission accepted")).await.unwrap();
        }
        drop(tx);
        pump.await.expect("pump task");

        assert_eq!(metrics.snapshot().submissions, 100);
    }
}
