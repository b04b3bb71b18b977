use colored::*;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;

#[derive(Deserialize, Debug)]
struct HealthResponse {
    #[allow(dead_code)]
    status: String,
}

#[derive(Deserialize, Debug)]
struct StatusResponse {
    version: String,
    uptime_s: u64,
    platform: String,
    guardian: String,
    stale: bool,
    last: Option<LastReading>,
    history_file: String,
    metrics: MetricsView,
}

#[derive(Deserialize, Debug)]
struct LastReading {
    #[allow(dead_code)]
    at: String,
    health: String,
    available_gb: f64,
    wsl2_mb: Option<f64>,
    #[allow(dead_code)]
    guardian_fired: bool,
}

#[derive(Deserialize, Debug)]
struct MetricsView {
    poll_ticks: u64,
    telemetry_errors: u64,
    history_appends: u64,
    history_write_errors: u64,
    guardian_dispatches: u64,
    #[allow(dead_code)]
    tool_calls: u64,
    #[allow(dead_code)]
    commands_run: u64,
    commands_failed: u64,
}

pub async fn run(client: &Client, url: &str) -> Result<(), Box<dyn Error>> {
    println!("{}", "🩺 Memwarden Doctor".bold().cyan());
    println!("{}", "Checking daemon health...".dimmed());
    println!();

    let mut all_good = true;

    // 1. Check Connectivity & Health
    print!("• Daemon Connectivity: ");
    match client.get(format!("{}/healthz", url)).send().await {
        Ok(resp) => {
            if resp.status().is_success() {
                if resp.json::<HealthResponse>().await.is_ok() {
                    println!("{}", "OK".green());
                } else {
                    println!("{}", "OK (Invalid JSON)".yellow());
                }
            } else {
                println!("{}", format!("FAIL (Status {})", resp.status()).red());
                all_good = false;
            }
        }
        Err(e) => {
            println!("{}", format!("FAIL ({})", e).red());
            println!("  → Is wardend running? Try 'memwarden-cli doctor' again once it is up.");
            return Ok(()); // Stop here if we can't connect
        }
    }

    // 2. Fetch Status for deeper checks
    print!("• Daemon Status:       ");
    let status: StatusResponse = match client.get(format!("{}/status", url)).send().await {
        Ok(resp) => resp.json().await?,
        Err(e) => {
            println!("{}", format!("FAIL ({})", e).red());
            return Ok(());
        }
    };
    println!("{}", format!("OK (v{})", status.version).green());

    // 3. Check Uptime
    print!("• Uptime:              ");
    if status.uptime_s < 60 {
        println!(
            "{}",
            format!("{}s (Just started)", status.uptime_s).yellow()
        );
    } else {
        println!("{}", format!("{}s", status.uptime_s).green());
    }

    // 4. Check Platform
    print!("• Platform:            ");
    if status.platform == "windows" {
        println!("{}", status.platform.green());
    } else {
        println!(
            "{}",
            format!("{} (cleanup commands target Windows)", status.platform).yellow()
        );
    }

    // 5. Check Telemetry Freshness
    print!("• Telemetry:           ");
    if status.last.is_none() {
        println!("{}", "No reading yet".yellow());
    } else if status.stale {
        println!("{}", "STALE".red());
        println!("  → The last sample attempt failed; readings shown are old.");
        all_good = false;
    } else {
        println!(
            "{}",
            format!("Fresh ({} ticks)", status.metrics.poll_ticks).green()
        );
    }

    // 6. Check Memory Health
    print!("• Memory Health:       ");
    match &status.last {
        Some(reading) => {
            let label = format!(
                "{} ({:.2} GB available)",
                reading.health.to_uppercase(),
                reading.available_gb
            );
            match reading.health.as_str() {
                "critical" | "severe" => {
                    println!("{}", label.red());
                    all_good = false;
                }
                "warning" => println!("{}", label.yellow()),
                _ => println!("{}", label.green()),
            }
        }
        None => println!("{}", "N/A (no reading)".dimmed()),
    }

    // 7. Check WSL2 VM
    print!("• WSL2 VM:             ");
    match status.last.as_ref().and_then(|r| r.wsl2_mb) {
        Some(mb) => println!("{}", format!("Running ({:.0} MB)", mb).yellow()),
        None => println!("{}", "Not running".dimmed()),
    }

    // 8. Check Guardian Mode
    print!("• Guardian Mode:       ");
    if status.guardian == "on" {
        println!(
            "{}",
            format!("ON ({} dispatches)", status.metrics.guardian_dispatches).green()
        );
    } else {
        println!("{}", "OFF (monitoring only)".dimmed());
    }

    // 9. Check History Log
    print!("• History Log:         ");
    if status.metrics.history_write_errors > 0 {
        println!(
            "{}",
            format!("{} write errors", status.metrics.history_write_errors).red()
        );
        println!("  → Check permissions on {}", status.history_file);
        all_good = false;
    } else {
        println!(
            "{}",
            format!(
                "{} rows appended ({})",
                status.metrics.history_appends, status.history_file
            )
            .green()
        );
    }

    // 10. Check Telemetry Errors
    print!("• Telemetry Errors:    ");
    if status.metrics.telemetry_errors > 0 {
        println!(
            "{}",
            format!("{} (Warning)", status.metrics.telemetry_errors).yellow()
        );
    } else {
        println!("{}", "0".green());
    }

    // 11. Check Failed Commands
    print!("• Failed Commands:     ");
    if status.metrics.commands_failed > 0 {
        println!(
            "{}",
            format!("{} (Warning)", status.metrics.commands_failed).yellow()
        );
    } else {
        println!("{}", "0".green());
    }

    println!();
    if all_good {
        println!("{}", "✅ Daemon is healthy.".bold().green());
    } else {
        println!("{}", "⚠️  Daemon has issues. See above.".bold().yellow());
    }

    Ok(())
}
