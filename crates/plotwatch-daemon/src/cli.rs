use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, prelude::*, EnvFilter};

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "plotwatch")]
#[command(version = BUILD_VERSION)]
#[command(about = "Plotwatch Daemon - supervises the Signum miner and reports its telemetry")]
#[command(long_about = None)]
pub struct Cli {
    #[arg(short, long, value_name = "FILE", help = "Path to daemon config file (TOML)")]
    pub config: Option<PathBuf>,

    #[arg(short = 'b', long, value_name = "FILE", help = "Path to the miner executable")]
    pub miner_binary: Option<PathBuf>,

    #[arg(
        short = 'm',
        long,
        value_name = "FILE",
        help = "Miner configuration file handed to the miner via -c"
    )]
    pub miner_config: Option<PathBuf>,

    #[arg(long, value_name = "SECS", help = "Snapshot poll interval in seconds")]
    pub poll_interval: Option<u64>,

    #[arg(long, help = "Echo every captured miner output line")]
    pub echo_miner_logs: bool,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase verbosity (-v, -vv, -vvv)")]
    pub verbose: u8,

    #[arg(short, long, help = "Suppress non-error output")]
    pub quiet: bool,

    #[arg(long, value_name = "FILE", help = "Write logs to file")]
    pub log_file: Option<PathBuf>,

    #[arg(long, help = "Emit logs as JSON")]
    pub json: bool,
}

pub fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "info,plotwatch_miner=debug",
            2 => "debug",
            _ => "trace",
        }
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if let Some(ref log_file) = cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .expect("Failed to open log file");
        if cli.json {
            let file_layer = fmt::layer()
                .json()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false);
            subscriber.with(file_layer).init();
        } else {
            let file_layer = fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false);
            subscriber.with(file_layer).init();
        }
    } else if cli.json {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(cli.verbose >= 2))
            .init();
    }
}
