use colored::Colorize;
use reqwest::Client;
use serde_json::{json, Value};
use std::error::Error;

use crate::tools;

pub async fn run(client: &Client, url: &str) -> Result<(), Box<dyn Error>> {
    let reply = tools::call(client, url, "analyze_usage_history", json!({})).await?;

    if reply.is_error {
        eprintln!("{}", format!("history failed: {}", reply.content).red());
        return Ok(());
    }

    match reply.content {
        Value::String(report) => println!("{report}"),
        other => println!("{other}"),
    }
    Ok(())
}
