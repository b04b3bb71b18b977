use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::{info, warn};

use wardend::cleanup::ShellRunner;
use wardend::config::Config;
use wardend::monitor;
use wardend::server::{self, AppState};
use wardend::telemetry::SysinfoTelemetry;

/// Host resource guardian: samples memory and CPU, keeps a usage history,
/// and shuts the WSL2 VM down before the host freezes.
#[derive(Parser, Debug)]
#[command(name = "wardend", version)]
struct Args {
    /// Path to a TOML config file (default: ./memwarden.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the configured listen address
    #[arg(long)]
    listen: Option<String>,
    /// Arm guardian mode at startup
    #[arg(long)]
    guardian: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if args.guardian {
        config.guardian.start_enabled = true;
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.clone()),
    )
    .init();

    info!(
        "wardend v{} starting (guardian {})",
        env!("CARGO_PKG_VERSION"),
        if config.guardian.start_enabled { "on" } else { "off" }
    );
    if std::env::consts::OS != "windows" {
        warn!(
            "cleanup commands target Windows (wsl, taskkill); on {} they will run and fail cleanly",
            std::env::consts::OS
        );
    }

    let listen = config.server.listen.clone();
    let state = Arc::new(AppState::new(
        config,
        Arc::new(SysinfoTelemetry::new()),
        Arc::new(ShellRunner),
    ));

    tokio::spawn(monitor::run(Arc::clone(&state)));

    server::serve(state, &listen).await
}
