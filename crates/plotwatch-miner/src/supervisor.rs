//! Miner process lifecycle: spawn, capture, terminate, reap.

use crate::config::SupervisorConfig;
use crate::metrics::MetricsCollector;
use crate::pipeline::TelemetryPipeline;
use plotwatch_types::{
    MetricsSnapshot, MinerState, PlotwatchError, PlotwatchResult, ProcessHandle, RawLine,
    MINER_BINARY_NAME,
};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const PUMP_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Supervises one external miner process at a time.
///
/// Lifecycle is `Idle -> Starting -> Running -> Stopping -> Idle`, with a
/// direct `Running -> Idle` transition when the miner exits on its own.
/// All failure reporting is synchronous from the call that caused it;
/// nothing here retries, and nothing here can take the host process down.
#[derive(Debug)]
pub struct MinerSupervisor {
    config: SupervisorConfig,
    state: Arc<RwLock<MinerState>>,
    child: Arc<RwLock<Option<Child>>>,
    handle: Arc<RwLock<Option<ProcessHandle>>>,
    last_exit: Arc<RwLock<Option<i32>>>,
    metrics: Arc<MetricsCollector>,
    pump: RwLock<Option<JoinHandle<()>>>,
    log_tap: broadcast::Sender<RawLine>,
}

impl MinerSupervisor {
    pub fn new() -> Self {
        Self::with_config(SupervisorConfig::default())
    }

    pub fn with_config(config: SupervisorConfig) -> Self {
        let (log_tap, _) = broadcast::channel(config.log_tap_buffer.max(1));
        Self {
            config,
            state: Arc::new(RwLock::new(MinerState::Idle)),
            child: Arc::new(RwLock::new(None)),
            handle: Arc::new(RwLock::new(None)),
            last_exit: Arc::new(RwLock::new(None)),
            metrics: Arc::new(MetricsCollector::new()),
            pump: RwLock::new(None),
            log_tap,
        }
    }

    /// Spawn the miner and begin a fresh telemetry session.
    ///
    /// Fails with [`PlotwatchError::AlreadyRunning`] unless currently
    /// idle, and with [`PlotwatchError::Spawn`] when the executable
    /// cannot be located or launched. Spawn failures are never retried
    /// here; that policy belongs to the caller.
    pub async fn start(&self) -> PlotwatchResult<ProcessHandle> {
        {
            let mut state = self.state.write().await;
            if *state != MinerState::Idle {
                return Err(PlotwatchError::AlreadyRunning);
            }
            *state = MinerState::Starting;
        }

        info!("Starting miner supervision session");

        let binary = match self.locate_miner_binary().await {
            Ok(path) => path,
            Err(e) => {
                *self.state.write().await = MinerState::Idle;
                return Err(e);
            }
        };
        debug!("Using miner binary at {:?}", binary);

        let mut command = Command::new(&binary);
        if let Some(ref config_path) = self.config.miner_config_path {
            command.arg("-c").arg(config_path);
        }
        command
            .args(&self.config.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                *self.state.write().await = MinerState::Idle;
                return Err(PlotwatchError::Spawn(format!(
                    "{}: {}",
                    binary.display(),
                    e
                )));
            }
        };

        let pid = child.id().unwrap_or_default();
        let handle = ProcessHandle::new(pid);

        self.metrics.reset();
        self.metrics.mark_session_start();
        self.metrics.set_running(true);

        let (tx, rx) = mpsc::channel(self.config.line_buffer);

        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader("stdout", stdout, tx.clone(), self.log_tap.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader("stderr", stderr, tx, self.log_tap.clone());
        }

        *self.child.write().await = Some(child);
        *self.handle.write().await = Some(handle.clone());
        *self.last_exit.write().await = None;

        let pipeline = TelemetryPipeline::new(self.metrics.clone(), rx);
        let child_slot = self.child.clone();
        let state_slot = self.state.clone();
        let handle_slot = self.handle.clone();
        let exit_slot = self.last_exit.clone();
        let metrics = self.metrics.clone();

        let pump = tokio::spawn(async move {
            pipeline.run().await;
            reap_session(child_slot, state_slot, handle_slot, exit_slot, metrics).await;
        });
        *self.pump.write().await = Some(pump);

        *self.state.write().await = MinerState::Running;
        info!("Miner running (pid {})", pid);

        Ok(handle)
    }

    /// Terminate the miner and wait (bounded) for it to exit.
    ///
    /// Sends a graceful termination signal first and hard-kills after
    /// `stop_timeout_secs`. A no-op when already idle or stopping.
    pub async fn stop(&self) -> PlotwatchResult<()> {
        {
            let mut state = self.state.write().await;
            match *state {
                MinerState::Idle | MinerState::Stopping => return Ok(()),
                MinerState::Starting | MinerState::Running => *state = MinerState::Stopping,
            }
        }

        info!("Stopping miner");

        let taken = self.child.write().await.take();
        if let Some(mut child) = taken {
            terminate_gracefully(&mut child);

            let timeout = Duration::from_secs(self.config.stop_timeout_secs);
            match tokio::time::timeout(timeout, child.wait()).await {
                Ok(Ok(status)) => {
                    *self.last_exit.write().await = status.code();
                    debug!("Miner exited with status {:?}", status);
                }
                Ok(Err(e)) => {
                    warn!("Failed to wait for miner exit: {}", e);
                }
                Err(_) => {
                    warn!("Miner did not exit within {:?}, killing", timeout);
                    if let Err(e) = child.kill().await {
                        error!("Failed to kill miner: {}", e);
                    }
                    if let Ok(status) = child.wait().await {
                        *self.last_exit.write().await = status.code();
                    }
                }
            }
        }

        // The pump ends on its own once the pipes close; give it a
        // bounded window to drain whatever lines were still buffered.
        let pump = self.pump.write().await.take();
        if let Some(pump) = pump {
            match tokio::time::timeout(PUMP_DRAIN_TIMEOUT, pump).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Telemetry pump task failed: {}", e),
                Err(_) => warn!("Telemetry pump still draining after stop"),
            }
        }

        self.metrics.set_running(false);
        *self.handle.write().await = None;
        *self.state.write().await = MinerState::Idle;
        info!("Miner stopped");

        Ok(())
    }

    /// Non-blocking liveness check.
    pub async fn is_running(&self) -> bool {
        matches!(
            *self.state.read().await,
            MinerState::Starting | MinerState::Running
        )
    }

    pub async fn state(&self) -> MinerState {
        *self.state.read().await
    }

    pub async fn handle(&self) -> Option<ProcessHandle> {
        self.handle.read().await.clone()
    }

    /// Exit code of the most recently ended session. `None` while the
    /// miner runs, before the first session, or after death by signal.
    /// The code is exposed, never interpreted.
    pub async fn last_exit_code(&self) -> Option<i32> {
        *self.last_exit.read().await
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Live feed of every captured output line, for collaborators that
    /// display raw miner logs. Lagging or dropped receivers never block
    /// capture.
    pub fn subscribe_lines(&self) -> broadcast::Receiver<RawLine> {
        self.log_tap.subscribe()
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    async fn locate_miner_binary(&self) -> PlotwatchResult<PathBuf> {
        if let Some(ref path) = self.config.binary_path {
            let found = tokio::fs::metadata(path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if found {
                return Ok(path.clone());
            }
            return Err(PlotwatchError::Spawn(format!(
                "configured miner binary not found: {}",
                path.display()
            )));
        }

        let candidates = vec![
            PathBuf::from(".").join(MINER_BINARY_NAME),
            PathBuf::from("/usr/local/bin").join(MINER_BINARY_NAME),
            PathBuf::from("/usr/bin").join(MINER_BINARY_NAME),
            dirs::home_dir()
                .map(|h| h.join(".local").join("bin").join(MINER_BINARY_NAME))
                .unwrap_or_default(),
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.join(MINER_BINARY_NAME)))
                .unwrap_or_default(),
        ];

        for path in candidates {
            if let Ok(metadata) = tokio::fs::metadata(&path).await {
                if metadata.is_file() {
                    return Ok(path);
                }
            }
        }

        if let Ok(output) = Command::new("which").arg(MINER_BINARY_NAME).output().await {
            if output.status.success() {
                let path = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
                if path.exists() {
                    return Ok(path);
                }
            }
        }

        Err(PlotwatchError::Spawn(format!(
            "{} binary not found; set binary_path or install the miner",
            MINER_BINARY_NAME
        )))
    }
}

impl Default for MinerSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs after the pump drains: reap the child if nobody else did, record
/// the exit status, and fall back to idle.
async fn reap_session(
    child: Arc<RwLock<Option<Child>>>,
    state: Arc<RwLock<MinerState>>,
    handle: Arc<RwLock<Option<ProcessHandle>>>,
    last_exit: Arc<RwLock<Option<i32>>>,
    metrics: Arc<MetricsCollector>,
) {
    let taken = child.write().await.take();
    if let Some(mut child) = taken {
        match child.wait().await {
            Ok(status) => {
                *last_exit.write().await = status.code();
                if status.success() {
                    info!("Miner exited cleanly");
                } else {
                    warn!("Miner exited unexpectedly with status {:?}", status);
                }
            }
            Err(e) => {
                error!("Failed to reap miner process: {}", e);
            }
        }
    }

    metrics.set_running(false);
    *handle.write().await = None;
    *state.write().await = MinerState::Idle;
}

fn spawn_line_reader<R>(
    stream: &'static str,
    reader: R,
    tx: mpsc::Sender<RawLine>,
    tap: broadcast::Sender<RawLine>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let raw = RawLine::now(line);
                    let _ = tap.send(raw.clone());
                    if tx.send(raw).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    // A read failure is indistinguishable from the
                    // process going away; fold it into stream end.
                    warn!("Error reading miner {}: {}", stream, e);
                    break;
                }
            }
        }

        debug!("Miner {} stream closed", stream);
    });
}

#[cfg(unix)]
fn terminate_gracefully(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => debug!("Sent SIGTERM to miner (pid {})", pid),
            Err(e) => warn!("Failed to signal miner (pid {}): {}", pid, e),
        }
    }
}

#[cfg(not(unix))]
fn terminate_gracefully(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!("Failed to kill miner: {}", e);
    }
}

/// Builder with validation, for collaborators that assemble the
/// configuration piecemeal.
pub struct MinerSupervisorBuilder {
    config: SupervisorConfig,
}

impl MinerSupervisorBuilder {
    pub fn new() -> Self {
        Self {
            config: SupervisorConfig::default(),
        }
    }

    pub fn binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.binary_path = Some(path.into());
        self
    }

    pub fn miner_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.miner_config_path = Some(path.into());
        self
    }

    pub fn no_miner_config(mut self) -> Self {
        self.config.miner_config_path = None;
        self
    }

    pub fn extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    pub fn stop_timeout(mut self, secs: u64) -> Self {
        self.config.stop_timeout_secs = secs;
        self
    }

    pub fn build(self) -> PlotwatchResult<MinerSupervisor> {
        self.config.validate().map_err(PlotwatchError::Config)?;
        Ok(MinerSupervisor::with_config(self.config))
    }
}

impl Default for MinerSupervisorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
