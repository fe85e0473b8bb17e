use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use haul_daemon::engine::MemoryEngine;
use haul_daemon::{DaemonConfig, DaemonState, server, tls};

#[derive(Parser)]
#[command(name = "hauld", about = "Background download/transfer job daemon")]
#[command(version)]
struct Cli {
    /// Path to the daemon config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address from the config file
    #[arg(short, long)]
    listen: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = DaemonConfig::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }

    let acceptor = tls::build_acceptor(&config.cert_path, &config.key_path)?;
    let engine = Arc::new(MemoryEngine::new());
    let state = DaemonState::build(config, engine).await?;

    server::run(state, acceptor).await?;
    Ok(())
}
