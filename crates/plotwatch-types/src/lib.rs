#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

//! Shared types for the Plotwatch miner supervisor.

use thiserror::Error;

pub mod event;
pub mod process;
pub mod snapshot;

pub use event::{HealthSeverity, MetricEvent};
pub use process::{MinerState, ProcessHandle, RawLine};
pub use snapshot::MetricsSnapshot;

/// Maximum number of health report lines retained for display.
pub const HEALTH_HISTORY_CAP: usize = 20;

/// Seconds `stop()` waits for a graceful exit before hard-killing.
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

/// Capacity of the captured-line channel between readers and the pump.
pub const DEFAULT_LINE_BUFFER: usize = 1024;

/// Capacity of the broadcast log tap handed to subscribers.
pub const DEFAULT_LOG_TAP_BUFFER: usize = 256;

/// Disk-read error rate (percent) above which overall health degrades.
pub const ERROR_RATE_WARNING_PCT: f64 = 1.0;

/// Disk-read error rate (percent) above which overall health is critical.
pub const ERROR_RATE_CRITICAL_PCT: f64 = 5.0;

/// Conventional name of the miner executable.
pub const MINER_BINARY_NAME: &str = "signum-miner";

/// Default miner configuration file passed via `-c`.
pub const DEFAULT_MINER_CONFIG: &str = "config.yaml";

/// Everything that can go wrong inside the supervisor.
///
/// Failures are returned, never thrown across the API: a spawn failure is
/// fatal only to the `start()` that caused it, and nothing here may take
/// the host process down.
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum PlotwatchError {
    #[error("failed to spawn miner: {0}")]
    Spawn(String),

    #[error("miner is already running")]
    AlreadyRunning,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used across the workspace.
pub type PlotwatchResult<T> = Result<T, PlotwatchError>;
