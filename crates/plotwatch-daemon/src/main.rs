mod cli;
mod config;
mod run;

use clap::Parser;
use cli::{init_logging, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli);

    run::run(&cli).await
}
