use colored::Colorize;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::error::Error;

use crate::tools;

#[derive(Debug, Deserialize)]
struct CommandResult {
    command: String,
    outcome: String,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JunkReport {
    removed: Vec<String>,
    absent: Vec<String>,
    #[serde(default)]
    failed: Vec<JunkFailure>,
}

#[derive(Debug, Deserialize)]
struct JunkFailure {
    file: String,
    error: String,
}

pub async fn run(client: &Client, url: &str, target: &str) -> Result<(), Box<dyn Error>> {
    let reply = tools::call(
        client,
        url,
        "cleanup_memory",
        json!({ "target": target }),
    )
    .await?;

    if reply.is_error {
        eprintln!("{}", format!("cleanup failed: {}", reply.content).red());
        return Ok(());
    }

    println!("{}", format!("Cleanup `{target}`:").bold().cyan());
    let results: Vec<CommandResult> = reply
        .content
        .get("results")
        .cloned()
        .map(serde_json::from_value)
        .transpose()?
        .unwrap_or_default();
    print_results(&results);
    Ok(())
}

pub async fn run_junk(client: &Client, url: &str) -> Result<(), Box<dyn Error>> {
    let reply = tools::call(client, url, "cleanup_dev_junk", json!({})).await?;

    if reply.is_error {
        eprintln!("{}", format!("junk sweep failed: {}", reply.content).red());
        return Ok(());
    }

    let report: JunkReport = serde_json::from_value(reply.content)?;
    if report.removed.is_empty() {
        println!("No junk files found.");
    } else {
        for file in &report.removed {
            println!("  {} {}", "removed".green(), file);
        }
    }
    for failure in &report.failed {
        println!("  {} {} ({})", "failed ".red(), failure.file, failure.error);
    }
    println!(
        "{}",
        format!("({} known junk names not present)", report.absent.len()).dimmed()
    );
    Ok(())
}

pub async fn run_kill(client: &Client, url: &str, pid: u32) -> Result<(), Box<dyn Error>> {
    let response = client
        .post(format!("{url}/processes/{pid}/kill"))
        .send()
        .await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(format!("request rejected ({status}): {body}").into());
    }
    let body: Value = response.json().await?;
    println!("{}", format!("Kill pid {pid}:").bold().cyan());
    let results: Vec<CommandResult> = body
        .get("results")
        .cloned()
        .map(serde_json::from_value)
        .transpose()?
        .unwrap_or_default();
    print_results(&results);
    Ok(())
}

fn print_results(results: &[CommandResult]) {
    for result in results {
        if result.outcome == "success" {
            println!("  {} {}", "ok  ".green(), result.command);
        } else {
            let detail = result.error.as_deref().unwrap_or("unknown error");
            println!("  {} {} ({})", "fail".red(), result.command, detail);
        }
    }
}
