use crate::cli::Cli;
use anyhow::Context;
use plotwatch_miner::SupervisorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk daemon configuration. Everything is optional; command-line
/// flags override whatever the file says.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Seconds between snapshot polls.
    pub poll_interval_secs: u64,

    /// Echo every captured miner line into the daemon log.
    pub echo_miner_logs: bool,

    pub supervisor: SupervisorConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            echo_miner_logs: false,
            supervisor: SupervisorConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// File settings with command-line overrides folded in.
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match cli.config {
            Some(ref path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(ref binary) = cli.miner_binary {
            config.supervisor.binary_path = Some(binary.clone());
        }
        if let Some(ref miner_config) = cli.miner_config {
            config.supervisor.miner_config_path = Some(miner_config.clone());
        }
        if let Some(secs) = cli.poll_interval {
            config.poll_interval_secs = secs;
        }
        if cli.echo_miner_logs {
            config.echo_miner_logs = true;
        }

        if config.poll_interval_secs == 0 {
            anyhow::bail!("poll interval cannot be 0");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.poll_interval_secs, 2);
        assert!(!config.echo_miner_logs);
        assert!(config.supervisor.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "poll_interval_secs = 5\n\n[supervisor]\nbinary_path = \"/opt/miner/signum-miner\"\nstop_timeout_secs = 20"
        )
        .expect("write");

        let config = DaemonConfig::load(file.path()).expect("load");
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(
            config.supervisor.binary_path.as_deref(),
            Some(Path::new("/opt/miner/signum-miner"))
        );
        assert_eq!(config.supervisor.stop_timeout_secs, 20);
        // Untouched fields keep their defaults.
        assert_eq!(config.supervisor.line_buffer, 1024);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "this is not toml {{").expect("write");
        assert!(DaemonConfig::load(file.path()).is_err());
    }
}
