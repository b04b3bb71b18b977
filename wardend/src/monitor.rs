//! The evaluation pass shared by the poll timer and the on-demand tools.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::time::{interval, MissedTickBehavior};

use crate::classify;
use crate::guardian;
use crate::history::HistoryEntry;
use crate::notify::NoticeLevel;
use crate::server::AppState;
use crate::types::{HealthLevel, RecommendedMode, Snapshot};

/// Task label recorded by unattended timer ticks.
pub const IDLE_TASK: &str = "idle";

/// What one pass over the host produced.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub at: DateTime<Utc>,
    pub snapshot: Snapshot,
    pub health: HealthLevel,
    pub mode: RecommendedMode,
    pub guardian_fired: bool,
}

/// One full pass: sample telemetry, classify, give the guardian its look,
/// append a history row, publish the result as the daemon's current view.
/// On telemetry failure the previous view stays in place (marked stale) and
/// the error goes back to the caller.
pub async fn evaluate_once(state: &AppState, task: &str) -> anyhow::Result<Evaluation> {
    let snapshot = match state.telemetry.sample() {
        Ok(snapshot) => snapshot,
        Err(err) => {
            state.metrics.inc_telemetry_errors();
            state.mark_stale().await;
            warn!("[monitor] telemetry unavailable: {err:#}");
            return Err(err);
        }
    };

    let health = classify::classify(snapshot.available_memory_bytes);
    let mode = classify::recommend_mode(snapshot.available_memory_bytes);
    debug!(
        "[monitor] task={task} available={:.2}GB cpu={:.1}% health={}",
        snapshot.available_gib(),
        snapshot.cpu_load_percent,
        health.as_str()
    );

    let guardian_fired = run_guardian(state, &snapshot).await;

    let entry = HistoryEntry::from_snapshot(&snapshot, task);
    match state.history.record(&entry) {
        Ok(()) => state.metrics.inc_history_appends(),
        Err(err) => {
            // Recording is best effort on this path; the reading itself
            // still stands.
            state.metrics.inc_history_write_errors();
            warn!("[history] append to {} failed: {err}", state.history.path().display());
        }
    }

    let evaluation = Evaluation {
        at: entry.timestamp,
        snapshot,
        health,
        mode,
        guardian_fired,
    };
    state.publish(evaluation.clone()).await;
    Ok(evaluation)
}

/// Lets the guardian look at the snapshot and runs its plan when it fires.
/// Returns whether a dispatch actually happened.
async fn run_guardian(state: &AppState, snapshot: &Snapshot) -> bool {
    let Some(action) = guardian::evaluate(state.guardian_mode(), snapshot) else {
        return false;
    };
    if !state.claim_guardian_slot() {
        debug!("[guardian] qualifying snapshot within cooldown, holding fire");
        return false;
    }

    warn!(
        target: "warden_audit",
        "guardian dispatch: {:.2} GB available with {} (pid {}) running, shutting WSL2 down",
        action.available_gib, action.process, action.pid
    );
    state.notices.record(
        NoticeLevel::Warning,
        format!(
            "Guardian shut down WSL2: {:.2} GB available with {} running",
            action.available_gib, action.process
        ),
    );
    state.metrics.inc_guardian_dispatches();
    state.dispatcher.dispatch(&action.request).await;
    true
}

/// Unattended loop. Every tick runs the same pass the tools use; a failed
/// tick is logged and the loop keeps going.
pub async fn run(state: Arc<AppState>) {
    let period = Duration::from_secs(state.config.monitor.poll_interval_secs.max(1));
    info!("[monitor] sampling every {}s", period.as_secs());
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        state.metrics.inc_poll_ticks();
        let _ = evaluate_once(&state, IDLE_TASK).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{snapshot_gib, test_app, test_app_with};
    use crate::types::GIB;

    const VMMEM: Option<u64> = Some(5 * GIB as u64);

    #[tokio::test]
    async fn evaluation_classifies_records_and_publishes() {
        let app = test_app(snapshot_gib(2.0, None));

        let eval = evaluate_once(&app.state, "check").await.unwrap();
        assert_eq!(eval.health, HealthLevel::Warning);
        assert_eq!(eval.mode, RecommendedMode::Standard);
        assert!(!eval.guardian_fired);

        let content = std::fs::read_to_string(app.state.history.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"check\""));

        let (last, stale) = app.state.view().await;
        assert!(!stale);
        assert_eq!(last.unwrap().health, HealthLevel::Warning);
    }

    #[tokio::test]
    async fn armed_guardian_dispatches_exactly_one_shutdown() {
        let app = test_app_with(snapshot_gib(0.4, VMMEM), Vec::new(), |c| {
            c.guardian.start_enabled = true;
        });

        let eval = evaluate_once(&app.state, IDLE_TASK).await.unwrap();
        assert!(eval.guardian_fired);
        assert_eq!(app.runner.seen(), ["wsl --shutdown"]);
        assert_eq!(app.state.metrics.snapshot().guardian_dispatches, 1);
    }

    #[tokio::test]
    async fn zero_cooldown_fires_on_every_qualifying_pass() {
        let app = test_app_with(snapshot_gib(0.4, VMMEM), Vec::new(), |c| {
            c.guardian.start_enabled = true;
        });

        evaluate_once(&app.state, IDLE_TASK).await.unwrap();
        evaluate_once(&app.state, IDLE_TASK).await.unwrap();
        assert_eq!(app.runner.seen().len(), 2);
    }

    #[tokio::test]
    async fn cooldown_holds_repeat_dispatches() {
        let app = test_app_with(snapshot_gib(0.4, VMMEM), Vec::new(), |c| {
            c.guardian.start_enabled = true;
            c.guardian.cooldown_secs = 3600;
        });

        let first = evaluate_once(&app.state, IDLE_TASK).await.unwrap();
        let second = evaluate_once(&app.state, IDLE_TASK).await.unwrap();
        assert!(first.guardian_fired);
        assert!(!second.guardian_fired);
        assert_eq!(app.runner.seen().len(), 1);
        // Both passes still recorded history.
        let content = std::fs::read_to_string(app.state.history.path()).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[tokio::test]
    async fn an_expired_cooldown_lets_the_guardian_fire_again() {
        let app = test_app_with(snapshot_gib(0.4, VMMEM), Vec::new(), |c| {
            c.guardian.start_enabled = true;
            c.guardian.cooldown_secs = 1;
        });

        evaluate_once(&app.state, IDLE_TASK).await.unwrap();
        // The cooldown window is wall-clock time, so this test waits it out.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        evaluate_once(&app.state, IDLE_TASK).await.unwrap();
        assert_eq!(app.runner.seen().len(), 2);
    }

    #[tokio::test]
    async fn disarmed_guardian_observes_only() {
        let app = test_app(snapshot_gib(0.4, VMMEM));

        let eval = evaluate_once(&app.state, IDLE_TASK).await.unwrap();
        assert!(!eval.guardian_fired);
        assert!(app.runner.seen().is_empty());
        assert!(app.state.history.path().exists());
    }

    #[tokio::test]
    async fn low_memory_without_vmmem_never_dispatches() {
        let app = test_app_with(snapshot_gib(0.4, None), Vec::new(), |c| {
            c.guardian.start_enabled = true;
        });

        let eval = evaluate_once(&app.state, IDLE_TASK).await.unwrap();
        assert!(!eval.guardian_fired);
        assert!(app.runner.seen().is_empty());
    }

    #[tokio::test]
    async fn telemetry_failure_keeps_last_view_marked_stale() {
        let app = test_app(snapshot_gib(2.0, None));
        evaluate_once(&app.state, "check").await.unwrap();

        app.telemetry.set_fail(true);
        assert!(evaluate_once(&app.state, "check").await.is_err());

        let (last, stale) = app.state.view().await;
        assert!(stale);
        assert!(last.is_some());
        assert_eq!(app.state.metrics.snapshot().telemetry_errors, 1);

        // No row was appended for the failed pass.
        let content = std::fs::read_to_string(app.state.history.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn a_recovered_sample_clears_the_stale_flag() {
        let app = test_app(snapshot_gib(2.0, None));
        evaluate_once(&app.state, "check").await.unwrap();

        app.telemetry.set_fail(true);
        let _ = evaluate_once(&app.state, "check").await;
        app.telemetry.set_fail(false);
        evaluate_once(&app.state, "check").await.unwrap();

        let (_, stale) = app.state.view().await;
        assert!(!stale);
    }

    #[tokio::test]
    async fn history_write_failure_does_not_fail_the_pass() {
        let app = test_app_with(snapshot_gib(2.0, None), Vec::new(), |c| {
            let broken = c
                .monitor
                .history_path
                .parent()
                .unwrap()
                .join("no_such_dir")
                .join("usage.csv");
            c.monitor.history_path = broken;
        });

        assert!(evaluate_once(&app.state, "check").await.is_ok());
        assert_eq!(app.state.metrics.snapshot().history_write_errors, 1);
        assert_eq!(app.state.metrics.snapshot().history_appends, 0);
    }
}
