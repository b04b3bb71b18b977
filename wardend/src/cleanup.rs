//! Cleanup requests, their command plans, and the dispatcher that runs them.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;

use crate::metrics::Metrics;

/// Shut down the WSL2 utility VM. Releases everything vmmem holds at once.
pub const WSL_SHUTDOWN: &str = "wsl --shutdown";

/// Force-terminate the two browser families this tool knows about.
pub const BROWSER_KILLS: [&str; 2] = [
    "taskkill /F /IM msedge.exe /T",
    "taskkill /F /IM chrome.exe /T",
];

/// Transient debug leftovers that may be deleted from the junk directory
/// without asking. Exact names only; nothing is ever matched by pattern.
pub const JUNK_FILES: [&str; 9] = [
    "build_error.txt",
    "mcp_build_error.txt",
    "procs.txt",
    "top_mem_utf8.txt",
    "top_mem.txt",
    "wsl_status.txt",
    "mem_raw.json",
    "process_list.csv",
    "test-mem.js",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupRequest {
    Wsl,
    Browsers,
    All,
    KillPid(u32),
}

impl CleanupRequest {
    /// Parses a `cleanup_memory` target. Junk sweeps and pid kills have their
    /// own entry points, so only the three memory targets parse here.
    pub fn parse_target(target: &str) -> Option<Self> {
        match target {
            "wsl" => Some(Self::Wsl),
            "browsers" => Some(Self::Browsers),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Wsl => "wsl",
            Self::Browsers => "browsers",
            Self::All => "all",
            Self::KillPid(_) => "kill-pid",
        }
    }
}

/// Commands for a request, in execution order. `All` is the `Wsl` plan
/// followed by the `Browsers` plan and has no commands of its own.
pub fn command_plan(request: &CleanupRequest) -> Vec<String> {
    match request {
        CleanupRequest::Wsl => vec![WSL_SHUTDOWN.to_string()],
        CleanupRequest::Browsers => BROWSER_KILLS.iter().map(|c| c.to_string()).collect(),
        CleanupRequest::All => {
            let mut plan = command_plan(&CleanupRequest::Wsl);
            plan.extend(command_plan(&CleanupRequest::Browsers));
            plan
        }
        CleanupRequest::KillPid(pid) => vec![format!("taskkill /F /PID {pid} /T")],
    }
}

/// Executes one external command to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> anyhow::Result<()>;
}

/// Real runner: splits the command line on whitespace and spawns it directly.
/// Every command in this crate is a fixed program with fixed flags, so no
/// shell is involved.
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> anyhow::Result<()> {
        let mut parts = command.split_whitespace();
        let program = parts.next().context("empty command")?;
        let output = Command::new(program)
            .args(parts)
            .output()
            .await
            .with_context(|| format!("failed to spawn `{command}`"))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            anyhow::bail!("exited with {}", output.status);
        }
        anyhow::bail!("exited with {}: {stderr}", output.status);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub command: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub fn succeeded(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JunkFailure {
    pub file: String,
    pub error: String,
}

/// What a junk sweep found: deleted files, files that were not present, and
/// files that could not be removed.
#[derive(Debug, Clone, Serialize)]
pub struct JunkReport {
    pub removed: Vec<String>,
    pub absent: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<JunkFailure>,
}

/// Turns symbolic requests into effects and reports what happened. Shared by
/// the tool surface and the guardian.
pub struct Dispatcher {
    runner: Arc<dyn CommandRunner>,
    metrics: Arc<Metrics>,
    junk_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(runner: Arc<dyn CommandRunner>, metrics: Arc<Metrics>, junk_dir: PathBuf) -> Self {
        Self {
            runner,
            metrics,
            junk_dir,
        }
    }

    /// Runs every command in the request's plan, in order. A failing command
    /// never stops the ones after it; each failure is captured in its own
    /// result.
    pub async fn dispatch(&self, request: &CleanupRequest) -> Vec<CommandResult> {
        let mut results = Vec::new();
        for command in command_plan(request) {
            self.metrics.inc_commands_run();
            match self.runner.run(&command).await {
                Ok(()) => {
                    log::info!(target: "warden_audit", "cleanup ok: {command}");
                    results.push(CommandResult {
                        command,
                        outcome: Outcome::Success,
                        error: None,
                    });
                }
                Err(err) => {
                    self.metrics.inc_commands_failed();
                    log::warn!(target: "warden_audit", "cleanup failed: {command}: {err:#}");
                    results.push(CommandResult {
                        command,
                        outcome: Outcome::Failure,
                        error: Some(format!("{err:#}")),
                    });
                }
            }
        }
        results
    }

    /// Deletes the known junk files present in the junk directory. A file
    /// that is not there is reported as absent, not treated as an error. Runs
    /// no external commands.
    pub fn sweep_junk(&self) -> JunkReport {
        let mut report = JunkReport {
            removed: Vec::new(),
            absent: Vec::new(),
            failed: Vec::new(),
        };
        for name in JUNK_FILES {
            let path = self.junk_dir.join(name);
            if !path.exists() {
                report.absent.push(name.to_string());
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    log::info!(target: "warden_audit", "junk removed: {}", path.display());
                    report.removed.push(name.to_string());
                }
                Err(err) => {
                    log::warn!("[cleanup] could not remove {}: {err}", path.display());
                    report.failed.push(JunkFailure {
                        file: name.to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }
        report
    }
}
