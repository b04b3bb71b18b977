use reqwest::Client;
use serde::Deserialize;
use std::error::Error;

#[derive(Debug, Deserialize)]
struct ProcessRow {
    pid: u32,
    name: String,
    rss_mb: f64,
}

pub async fn run(client: &Client, url: &str, limit: usize) -> Result<(), Box<dyn Error>> {
    let rows: Vec<ProcessRow> = client
        .get(format!("{url}/processes?limit={limit}"))
        .send()
        .await?
        .json()
        .await?;

    println!("{:<8} {:>9}  NAME", "PID", "RSS_MB");
    for row in rows {
        println!("{:<8} {:>9.0}  {}", row.pid, row.rss_mb, row.name);
    }
    Ok(())
}
