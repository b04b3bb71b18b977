//! The named tool surface: the four operations remote callers may invoke.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::cleanup::CleanupRequest;
use crate::history::NO_HISTORY_SENTINEL;
use crate::monitor::{self, Evaluation};
use crate::notify::NoticeLevel;
use crate::server::AppState;
use crate::types::{round1, round2};

#[derive(Debug, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Tool result. Operational failures (telemetry down, commands failing,
/// unreadable history) come back through here with `is_error` set, not as
/// transport errors.
#[derive(Debug, Serialize)]
pub struct ToolOutcome {
    pub content: Value,
    pub is_error: bool,
}

impl ToolOutcome {
    fn ok(content: Value) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    fn error(message: String) -> Self {
        Self {
            content: json!({ "error": message }),
            is_error: true,
        }
    }
}

/// Structurally invalid calls. These reject the request itself; everything
/// else is reported in-band through `ToolOutcome`.
#[derive(Debug, PartialEq, Eq)]
pub enum ToolError {
    UnknownTool(String),
    InvalidArguments(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTool(name) => write!(f, "unknown tool: {name}"),
            Self::InvalidArguments(msg) => write!(f, "invalid arguments: {msg}"),
        }
    }
}

impl std::error::Error for ToolError {}

pub async fn call(state: &AppState, call: ToolCall) -> Result<ToolOutcome, ToolError> {
    state.metrics.inc_tool_calls();
    match call.name.as_str() {
        "get_resource_status" => Ok(resource_status(state, &call.arguments).await),
        "analyze_usage_history" => Ok(usage_history(state)),
        "cleanup_dev_junk" => Ok(dev_junk(state)),
        "cleanup_memory" => cleanup_memory(state, &call.arguments).await,
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

/// Runs the same evaluation pass as the timer, tagged with the caller's task
/// label, and renders the current reading.
async fn resource_status(state: &AppState, arguments: &Value) -> ToolOutcome {
    let task = arguments
        .get("task_name")
        .and_then(Value::as_str)
        .unwrap_or("check");
    match monitor::evaluate_once(state, task).await {
        Ok(evaluation) => ToolOutcome::ok(render_status(&evaluation)),
        Err(err) => ToolOutcome::error(format!("telemetry unavailable: {err:#}")),
    }
}

fn render_status(evaluation: &Evaluation) -> Value {
    let snapshot = &evaluation.snapshot;
    let wsl2 = match snapshot.vmmem() {
        Some(_) => json!({ "consumingMB": snapshot.wsl2_mib().round() }),
        None => Value::String("Not running/Not found".to_string()),
    };
    json!({
        "memory": {
            "totalGB": round2(snapshot.total_gib()),
            "availableGB": round2(snapshot.available_gib()),
            "freePercent": round1(snapshot.free_percent()),
        },
        "cpu": {
            "currentLoadPercent": round1(snapshot.cpu_load_percent),
        },
        "wsl2": wsl2,
        "health": evaluation.health,
        "recommended_mode": evaluation.mode,
    })
}

fn usage_history(state: &AppState) -> ToolOutcome {
    match state.history.summarize() {
        Ok(Some(summary)) => ToolOutcome::ok(Value::String(summary.render())),
        Ok(None) => ToolOutcome::ok(Value::String(NO_HISTORY_SENTINEL.to_string())),
        Err(err) => ToolOutcome::error(format!(
            "failed to read history {}: {err}",
            state.history.path().display()
        )),
    }
}

fn dev_junk(state: &AppState) -> ToolOutcome {
    let report = state.dispatcher.sweep_junk();
    if !report.removed.is_empty() {
        state.notices.record(
            NoticeLevel::Info,
            format!("Junk sweep removed {} file(s)", report.removed.len()),
        );
    }
    match serde_json::to_value(&report) {
        Ok(content) => ToolOutcome::ok(content),
        Err(err) => ToolOutcome::error(format!("failed to encode junk report: {err}")),
    }
}

async fn cleanup_memory(state: &AppState, arguments: &Value) -> Result<ToolOutcome, ToolError> {
    let target = arguments
        .get("target")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ToolError::InvalidArguments("cleanup_memory requires a string `target`".to_string())
        })?;
    let request = CleanupRequest::parse_target(target).ok_or_else(|| {
        ToolError::InvalidArguments(format!(
            "unknown cleanup target `{target}` (expected wsl, browsers or all)"
        ))
    })?;

    let results = state.dispatcher.dispatch(&request).await;
    let failed = results.iter().filter(|r| !r.succeeded()).count();
    state.notices.record(
        if failed == 0 {
            NoticeLevel::Info
        } else {
            NoticeLevel::Warning
        },
        format!(
            "Cleanup `{}`: {} command(s) run, {failed} failed",
            request.label(),
            results.len()
        ),
    );
    Ok(ToolOutcome::ok(json!({
        "target": request.label(),
        "results": results,
    })))
}
