use clap::{Parser, Subcommand};
use colored::*;
use reqwest::Client;
use std::error::Error;

mod cleanup;
mod doctor;
mod history;
mod processes;
mod status;
mod tools;

#[derive(clap::Parser, Debug)]
struct Args {
    /// Base URL of the wardend service
    #[clap(long, default_value = "http://127.0.0.1:7070")]
    url: String,

    /// Disable colorized output
    #[clap(long)]
    no_color: bool,

    /// Subcommands
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show current memory and CPU status (records a history entry)
    Status {
        /// Task label for the history entry
        #[clap(long, default_value = "check")]
        task: String,
    },
    /// Summarize the recorded usage history by task label
    History,
    /// Free memory by shutting down WSL2 and/or browsers
    Cleanup {
        /// What to clean
        #[clap(value_parser = ["wsl", "browsers", "all"])]
        target: String,
    },
    /// Delete known junk files from the daemon's working directory
    Junk,
    /// Toggle autonomous guardian mode
    Guardian,
    /// List the processes holding the most memory
    Processes {
        /// Number of processes to show
        #[clap(long, default_value_t = 15)]
        limit: usize,
    },
    /// Force-terminate a process tree by pid
    Kill {
        /// Process id
        pid: u32,
    },
    /// Check daemon health and configuration
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }
    let client = Client::new();

    match args.command {
        Command::Status { task } => status::run(&client, &args.url, &task).await,
        Command::History => history::run(&client, &args.url).await,
        Command::Cleanup { target } => cleanup::run(&client, &args.url, &target).await,
        Command::Junk => cleanup::run_junk(&client, &args.url).await,
        Command::Guardian => toggle_guardian(&client, &args.url).await,
        Command::Processes { limit } => processes::run(&client, &args.url, limit).await,
        Command::Kill { pid } => cleanup::run_kill(&client, &args.url, pid).await,
        Command::Doctor => doctor::run(&client, &args.url).await,
    }
}

async fn toggle_guardian(client: &Client, url: &str) -> Result<(), Box<dyn Error>> {
    let resp: serde_json::Value = client
        .post(format!("{url}/guardian/toggle"))
        .send()
        .await?
        .json()
        .await?;
    match resp.get("guardian").and_then(|v| v.as_str()) {
        Some("on") => println!(
            "{}",
            "Guardian is ON: WSL2 will be shut down automatically under memory pressure.".green()
        ),
        Some("off") => println!("Guardian is OFF: monitoring only."),
        _ => println!("Unexpected response: {resp}"),
    }
    Ok(())
}
