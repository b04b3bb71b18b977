use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::error::Error;

#[derive(Debug, Deserialize)]
pub struct ToolReply {
    pub content: Value,
    #[serde(default)]
    pub is_error: bool,
}

/// Calls one named daemon tool. Transport and request-shape failures come
/// back as errors; tool-level failures arrive in the reply with `is_error`.
pub async fn call(
    client: &Client,
    url: &str,
    name: &str,
    arguments: Value,
) -> Result<ToolReply, Box<dyn Error>> {
    let response = client
        .post(format!("{url}/tools/call"))
        .json(&json!({ "name": name, "arguments": arguments }))
        .send()
        .await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(format!("request rejected ({status}): {body}").into());
    }
    Ok(response.json().await?)
}
