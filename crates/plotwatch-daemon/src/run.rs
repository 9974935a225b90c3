use crate::cli::Cli;
use crate::config::DaemonConfig;
use plotwatch_miner::MinerSupervisor;
use plotwatch_types::MetricsSnapshot;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = DaemonConfig::resolve(cli)?;

    info!("Starting plotwatch daemon v{}", env!("CARGO_PKG_VERSION"));

    config.supervisor.validate().map_err(anyhow::Error::msg)?;
    let supervisor = MinerSupervisor::with_config(config.supervisor.clone());

    if config.echo_miner_logs {
        spawn_log_echo(supervisor.subscribe_lines());
    }

    let handle = supervisor.start().await?;
    info!("Miner started: {} (session {})", handle, handle.id);

    let mut poll = tokio::time::interval(Duration::from_secs(config.poll_interval_secs));
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                let snapshot = supervisor.snapshot();
                log_status(&snapshot);

                if !supervisor.is_running().await {
                    warn!(
                        "Miner exited on its own (exit code: {:?})",
                        supervisor.last_exit_code().await
                    );
                    break;
                }
            }
            _ = &mut shutdown => {
                supervisor.stop().await?;
                break;
            }
        }
    }

    info!("Shutdown complete");
    Ok(())
}

fn spawn_log_echo(mut lines: broadcast::Receiver<plotwatch_types::RawLine>) {
    tokio::spawn(async move {
        loop {
            match lines.recv().await {
                Ok(raw) => info!(target: "miner", "{}", raw.text),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Dropped {} miner log lines", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn log_status(snapshot: &MetricsSnapshot) {
    let round = snapshot.current_round.as_deref().unwrap_or("N/A");
    let deadline = snapshot.best_deadline.as_deref().unwrap_or("N/A");
    let health = snapshot
        .overall_health
        .map(|h| h.as_str())
        .unwrap_or("unknown");

    info!(
        "round={} best_deadline={} reads={} failed={} submissions={} net_errors={} health={}",
        round,
        deadline,
        snapshot.total_reads,
        snapshot.failed_reads,
        snapshot.submissions,
        snapshot.network_errors,
        health,
    );
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => { info!("Received SIGTERM"); }
            _ = sigint.recv() => { info!("Received SIGINT"); }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C");
    }
}
