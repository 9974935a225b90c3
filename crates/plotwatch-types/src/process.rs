use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of the supervised miner process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum MinerState {
    Idle,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for MinerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MinerState::Idle => "idle",
            MinerState::Starting => "starting",
            MinerState::Running => "running",
            MinerState::Stopping => "stopping",
        };
        write!(f, "{}", s)
    }
}

/// Identifier for one supervision session of the miner child process.
///
/// Created on spawn, dropped on reap. The lifecycle state lives in the
/// supervisor; copies of the handle do not go stale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ProcessHandle {
    pub id: Uuid,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl ProcessHandle {
    /// Handle for a child that was just spawned.
    pub fn new(pid: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            pid,
            started_at: Utc::now(),
        }
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "miner[pid={}]", self.pid)
    }
}

/// A single captured line of miner output plus its arrival time.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub struct RawLine {
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl RawLine {
    /// Wrap a line that just arrived.
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}
