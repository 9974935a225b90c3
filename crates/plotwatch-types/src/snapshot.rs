use crate::event::HealthSeverity;
use serde::{Deserialize, Serialize};

/// Point-in-time copy of every observable miner metric.
///
/// Copy-on-read: the collector is the sole mutator and hands out owned
/// snapshots, so consumers can poll from any thread at any cadence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct MetricsSnapshot {
    pub running: bool,

    /// Blockchain height of the round currently being mined, verbatim.
    pub current_round: Option<String>,

    /// Best deadline reported for the current session, verbatim.
    pub best_deadline: Option<String>,

    pub total_reads: u64,

    pub failed_reads: u64,

    pub submissions: u64,

    pub network_errors: u64,

    /// Most recent disk-health report lines, oldest first, capped at
    /// [`crate::HEALTH_HISTORY_CAP`].
    pub recent_health_lines: Vec<String>,

    /// `failed_reads / total_reads * 100`; `None` until a read completes.
    pub error_rate_percent: Option<f64>,

    /// Health classification derived from the error rate; `None` until a
    /// read completes.
    pub overall_health: Option<HealthSeverity>,

    /// Heuristic: submissions were accepted or the miner is running.
    pub pool_connected: bool,

    /// Seconds since the current session started; 0 when not running.
    pub uptime_secs: u64,
}
