use plotwatch_types::{
    DEFAULT_LINE_BUFFER, DEFAULT_LOG_TAP_BUFFER, DEFAULT_MINER_CONFIG, DEFAULT_STOP_TIMEOUT_SECS,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for the supervisor itself.
///
/// The miner's own configuration file is opaque to plotwatch; only its
/// path is carried here, to be handed to the miner via `-c`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Explicit miner executable path. When unset the supervisor searches
    /// the conventional install locations.
    pub binary_path: Option<PathBuf>,

    /// Miner configuration file passed as `-c <path>`. `None` omits the
    /// flag entirely.
    pub miner_config_path: Option<PathBuf>,

    /// Additional arguments appended to the miner command line.
    pub extra_args: Vec<String>,

    pub stop_timeout_secs: u64,

    pub line_buffer: usize,

    pub log_tap_buffer: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            miner_config_path: Some(PathBuf::from(DEFAULT_MINER_CONFIG)),
            extra_args: Vec::new(),
            stop_timeout_secs: DEFAULT_STOP_TIMEOUT_SECS,
            line_buffer: DEFAULT_LINE_BUFFER,
            log_tap_buffer: DEFAULT_LOG_TAP_BUFFER,
        }
    }
}

impl SupervisorConfig {
    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = Some(path.into());
        self
    }

    pub fn with_miner_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.miner_config_path = Some(path.into());
        self
    }

    pub fn without_miner_config(mut self) -> Self {
        self.miner_config_path = None;
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_stop_timeout(mut self, secs: u64) -> Self {
        self.stop_timeout_secs = secs;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.stop_timeout_secs == 0 {
            return Err("Stop timeout cannot be 0".into());
        }

        if self.line_buffer == 0 {
            return Err("Line buffer capacity cannot be 0".into());
        }

        if self.log_tap_buffer == 0 {
            return Err("Log tap capacity cannot be 0".into());
        }

        Ok(())
    }
}
