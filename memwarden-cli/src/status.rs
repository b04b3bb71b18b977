use colored::Colorize;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::error::Error;

use crate::tools;

#[derive(Debug, Deserialize)]
struct ResourceStatus {
    memory: Memory,
    cpu: Cpu,
    wsl2: Value,
    health: String,
    recommended_mode: String,
}

#[derive(Debug, Deserialize)]
struct Memory {
    #[serde(rename = "totalGB")]
    total_gb: f64,
    #[serde(rename = "availableGB")]
    available_gb: f64,
    #[serde(rename = "freePercent")]
    free_percent: f64,
}

#[derive(Debug, Deserialize)]
struct Cpu {
    #[serde(rename = "currentLoadPercent")]
    current_load_percent: f64,
}

pub async fn run(client: &Client, url: &str, task: &str) -> Result<(), Box<dyn Error>> {
    let reply = tools::call(
        client,
        url,
        "get_resource_status",
        json!({ "task_name": task }),
    )
    .await?;

    if reply.is_error {
        eprintln!("{}", format!("status failed: {}", reply.content).red());
        return Ok(());
    }

    let status: ResourceStatus = serde_json::from_value(reply.content)?;

    let badge = match status.health.as_str() {
        "critical" => "CRITICAL".red().bold(),
        "severe" => "SEVERE".red(),
        "warning" => "WARNING".yellow(),
        _ => "NOMINAL".green(),
    };

    println!("{}", "Memwarden Status".bold().cyan());
    println!();
    println!("  Health:    {badge}");
    println!(
        "  Memory:    {:.2} GB available of {:.2} GB ({:.1}% free)",
        status.memory.available_gb, status.memory.total_gb, status.memory.free_percent
    );
    println!("  CPU load:  {:.1}%", status.cpu.current_load_percent);
    match &status.wsl2 {
        Value::String(text) => println!("  WSL2:      {}", text.dimmed()),
        other => {
            let mb = other
                .get("consumingMB")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            println!("  WSL2:      {}", format!("{mb:.0} MB").yellow());
        }
    }
    let mode = if status.recommended_mode == "ECO_MODE" {
        status.recommended_mode.yellow()
    } else {
        status.recommended_mode.green()
    };
    println!("  Recommended mode: {mode}");
    println!();
    println!(
        "{}",
        format!("(history entry recorded with task \"{task}\")").dimmed()
    );
    Ok(())
}
