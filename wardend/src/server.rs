//! HTTP surface and the state shared by every part of the daemon.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::SecondsFormat;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::cleanup::{CleanupRequest, CommandRunner, Dispatcher};
use crate::config::Config;
use crate::guardian::GuardianMode;
use crate::history::HistoryLog;
use crate::metrics::Metrics;
use crate::monitor::Evaluation;
use crate::notify::{NoticeLevel, NoticeStore};
use crate::telemetry::TelemetryProvider;
use crate::tools::{self, ToolCall};
use crate::types::{round1, round2, MIB};

/// Last published evaluation plus whether it is known to be out of date.
#[derive(Default)]
struct MonitorView {
    last: Option<Evaluation>,
    stale: bool,
}

/// Everything the handlers, the timer and the guardian share.
pub struct AppState {
    pub config: Config,
    pub metrics: Arc<Metrics>,
    pub telemetry: Arc<dyn TelemetryProvider>,
    pub dispatcher: Dispatcher,
    pub history: HistoryLog,
    pub notices: NoticeStore,
    guardian_on: AtomicBool,
    guardian_last_fire: Mutex<Option<Instant>>,
    view: RwLock<MonitorView>,
}

impl AppState {
    pub fn new(
        config: Config,
        telemetry: Arc<dyn TelemetryProvider>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let metrics = Arc::new(Metrics::new());
        let dispatcher = Dispatcher::new(
            runner,
            Arc::clone(&metrics),
            config.cleanup.junk_dir.clone(),
        );
        let history = HistoryLog::new(config.monitor.history_path.clone());
        let guardian_on = AtomicBool::new(config.guardian.start_enabled);
        Self {
            config,
            metrics,
            telemetry,
            dispatcher,
            history,
            notices: NoticeStore::new(64),
            guardian_on,
            guardian_last_fire: Mutex::new(None),
            view: RwLock::new(MonitorView::default()),
        }
    }

    pub fn guardian_mode(&self) -> GuardianMode {
        GuardianMode::from_flag(self.guardian_on.load(Ordering::SeqCst))
    }

    pub fn toggle_guardian(&self) -> GuardianMode {
        let mode = self.guardian_mode().toggle();
        self.guardian_on.store(mode.is_on(), Ordering::SeqCst);
        mode
    }

    /// Check-and-set on the cooldown window. Returns whether this caller may
    /// dispatch; claiming moves the window forward.
    pub fn claim_guardian_slot(&self) -> bool {
        let cooldown = Duration::from_secs(self.config.guardian.cooldown_secs);
        let mut last = self
            .guardian_last_fire
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if last.is_some_and(|at| at.elapsed() < cooldown) {
            return false;
        }
        *last = Some(Instant::now());
        true
    }

    pub async fn publish(&self, evaluation: Evaluation) {
        let mut view = self.view.write().await;
        view.last = Some(evaluation);
        view.stale = false;
    }

    pub async fn mark_stale(&self) {
        self.view.write().await.stale = true;
    }

    pub async fn view(&self) -> (Option<Evaluation>, bool) {
        let view = self.view.read().await;
        (view.last.clone(), view.stale)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .route("/processes", get(processes))
        .route("/processes/{pid}/kill", post(kill_pid))
        .route("/tools/call", post(tools_call))
        .route("/guardian/toggle", post(guardian_toggle))
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let (last, stale) = state.view().await;
    let last = last.map(|eval| {
        let snapshot = &eval.snapshot;
        json!({
            "at": eval.at.to_rfc3339_opts(SecondsFormat::Secs, true),
            "health": eval.health,
            "recommended_mode": eval.mode,
            "total_gb": round2(snapshot.total_gib()),
            "available_gb": round2(snapshot.available_gib()),
            "free_percent": round1(snapshot.free_percent()),
            "cpu_load_percent": round1(snapshot.cpu_load_percent),
            "wsl2_mb": snapshot.vmmem().map(|_| snapshot.wsl2_mib().round()),
            "guardian_fired": eval.guardian_fired,
        })
    });
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "platform": std::env::consts::OS,
        "uptime_s": state.metrics.uptime_s(),
        "guardian": state.guardian_mode(),
        "stale": stale,
        "last": last,
        "history_file": state.history.path().display().to_string(),
        "metrics": state.metrics.snapshot(),
        "notices": state.notices.recent(8),
    }))
}

#[derive(Debug, Deserialize)]
struct ProcessQuery {
    limit: Option<usize>,
}

/// Fresh top-of-memory listing. Unlike the status tool this takes no history
/// row; it is a pure read.
async fn processes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProcessQuery>,
) -> Response {
    match state.telemetry.sample() {
        Ok(snapshot) => {
            let limit = query.limit.unwrap_or(15);
            let mut processes = snapshot.processes;
            processes.sort_unstable_by(|a, b| b.resident_bytes.cmp(&a.resident_bytes));
            processes.truncate(limit);
            let rows: Vec<Value> = processes
                .iter()
                .map(|p| {
                    json!({
                        "pid": p.pid,
                        "name": p.name,
                        "rss_mb": (p.resident_bytes as f64 / MIB).round(),
                    })
                })
                .collect();
            Json(json!(rows)).into_response()
        }
        Err(err) => {
            state.metrics.inc_telemetry_errors();
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": format!("telemetry unavailable: {err:#}") })),
            )
                .into_response()
        }
    }
}

async fn kill_pid(State(state): State<Arc<AppState>>, Path(pid): Path<u32>) -> Json<Value> {
    warn!(target: "warden_audit", "kill requested for pid {pid}");
    let results = state
        .dispatcher
        .dispatch(&CleanupRequest::KillPid(pid))
        .await;
    Json(json!({ "pid": pid, "results": results }))
}

async fn tools_call(State(state): State<Arc<AppState>>, Json(call): Json<ToolCall>) -> Response {
    match tools::call(&state, call).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

async fn guardian_toggle(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mode = state.toggle_guardian();
    info!("[guardian] mode switched {}", mode.as_str());
    state.notices.record(
        NoticeLevel::Info,
        format!("Guardian mode switched {}", mode.as_str()),
    );
    Json(json!({ "guardian": mode }))
}

pub async fn serve(state: Arc<AppState>, listen: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    info!("[server] listening on {listen}");
    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("[server] shutdown signal received"),
        Err(err) => warn!("[server] could not watch for shutdown signal: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor;
    use crate::testutil::{snapshot_gib, test_app, test_app_with, TestApp};
    use crate::types::GIB;

    async fn spawn_app(app: &TestApp) -> String {
        let router = router(Arc::clone(&app.state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router.into_make_service()).await {
                eprintln!("test server error: {err}");
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn healthz_answers_ok() {
        let app = test_app(snapshot_gib(4.0, None));
        let base = spawn_app(&app).await;

        let body: Value = reqwest::get(format!("{base}/healthz"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], json!("ok"));
    }

    #[tokio::test]
    async fn status_reflects_the_last_evaluation() {
        let app = test_app(snapshot_gib(2.0, Some(5 * GIB as u64)));
        monitor::evaluate_once(&app.state, "check").await.unwrap();
        let base = spawn_app(&app).await;

        let body: Value = reqwest::get(format!("{base}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["guardian"], json!("off"));
        assert_eq!(body["stale"], json!(false));
        assert_eq!(body["last"]["health"], json!("warning"));
        assert_eq!(body["last"]["available_gb"], json!(2.0));
        assert_eq!(body["last"]["wsl2_mb"], json!(5120.0));
        assert_eq!(body["metrics"]["history_appends"], json!(1));
    }

    #[tokio::test]
    async fn status_before_any_evaluation_has_no_reading() {
        let app = test_app(snapshot_gib(4.0, None));
        let base = spawn_app(&app).await;

        let body: Value = reqwest::get(format!("{base}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["last"], Value::Null);
    }

    #[tokio::test]
    async fn toggle_flips_the_guardian_both_ways() {
        let app = test_app(snapshot_gib(4.0, None));
        let base = spawn_app(&app).await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{base}/guardian/toggle"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["guardian"], json!("on"));

        let body: Value = client
            .post(format!("{base}/guardian/toggle"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["guardian"], json!("off"));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_bad_request() {
        let app = test_app(snapshot_gib(4.0, None));
        let base = spawn_app(&app).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/tools/call"))
            .json(&json!({ "name": "defragment_disk", "arguments": {} }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn tool_call_round_trips_a_status_reading() {
        let app = test_app(snapshot_gib(4.0, None));
        let base = spawn_app(&app).await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{base}/tools/call"))
            .json(&json!({ "name": "get_resource_status" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["is_error"], json!(false));
        assert_eq!(body["content"]["memory"]["totalGB"], json!(16.0));
        assert_eq!(body["content"]["wsl2"], json!("Not running/Not found"));
    }

    #[tokio::test]
    async fn processes_sorts_by_memory_and_honors_limit() {
        let mut snapshot = snapshot_gib(4.0, Some(2 * GIB as u64));
        snapshot.processes[0].resident_bytes = 100 * 1024 * 1024;
        let app = test_app(snapshot);
        let base = spawn_app(&app).await;

        let rows: Vec<Value> = reqwest::get(format!("{base}/processes?limit=1"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], json!("vmmemWSL"));
        assert_eq!(rows[0]["rss_mb"], json!(2048.0));
    }

    #[tokio::test]
    async fn processes_reports_telemetry_outage() {
        let app = test_app(snapshot_gib(4.0, None));
        app.telemetry.set_fail(true);
        let base = spawn_app(&app).await;

        let response = reqwest::get(format!("{base}/processes")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn kill_endpoint_dispatches_a_taskkill() {
        let app = test_app(snapshot_gib(4.0, None));
        let base = spawn_app(&app).await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{base}/processes/4242/kill"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["pid"], json!(4242));
        assert_eq!(app.runner.seen(), ["taskkill /F /PID 4242 /T"]);
        assert_eq!(body["results"][0]["outcome"], json!("success"));
    }

    #[tokio::test]
    async fn armed_guardian_fires_through_the_tool_surface() {
        let app = test_app_with(snapshot_gib(0.4, Some(6 * GIB as u64)), Vec::new(), |c| {
            c.guardian.start_enabled = true;
        });
        let base = spawn_app(&app).await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{base}/tools/call"))
            .json(&json!({ "name": "get_resource_status", "arguments": { "task_name": "smoke" } }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["is_error"], json!(false));
        assert_eq!(app.runner.seen(), ["wsl --shutdown"]);
    }
}
