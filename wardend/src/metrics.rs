//! Daemon counters, surfaced through `/status`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

#[derive(Debug)]
pub struct Metrics {
    started_at: Instant,
    poll_ticks: AtomicU64,
    telemetry_errors: AtomicU64,
    history_appends: AtomicU64,
    history_write_errors: AtomicU64,
    guardian_dispatches: AtomicU64,
    tool_calls: AtomicU64,
    commands_run: AtomicU64,
    commands_failed: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub poll_ticks: u64,
    pub telemetry_errors: u64,
    pub history_appends: u64,
    pub history_write_errors: u64,
    pub guardian_dispatches: u64,
    pub tool_calls: u64,
    pub commands_run: u64,
    pub commands_failed: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            poll_ticks: AtomicU64::new(0),
            telemetry_errors: AtomicU64::new(0),
            history_appends: AtomicU64::new(0),
            history_write_errors: AtomicU64::new(0),
            guardian_dispatches: AtomicU64::new(0),
            tool_calls: AtomicU64::new(0),
            commands_run: AtomicU64::new(0),
            commands_failed: AtomicU64::new(0),
        }
    }

    pub fn uptime_s(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn inc_poll_ticks(&self) {
        self.poll_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_telemetry_errors(&self) {
        self.telemetry_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_history_appends(&self) {
        self.history_appends.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_history_write_errors(&self) {
        self.history_write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_guardian_dispatches(&self) {
        self.guardian_dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tool_calls(&self) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_commands_run(&self) {
        self.commands_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_commands_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            poll_ticks: self.poll_ticks.load(Ordering::Relaxed),
            telemetry_errors: self.telemetry_errors.load(Ordering::Relaxed),
            history_appends: self.history_appends.load(Ordering::Relaxed),
            history_write_errors: self.history_write_errors.load(Ordering::Relaxed),
            guardian_dispatches: self.guardian_dispatches.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            commands_run: self.commands_run.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let metrics = Metrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.poll_ticks, 0);
        assert_eq!(snapshot.commands_failed, 0);

        metrics.inc_poll_ticks();
        metrics.inc_poll_ticks();
        metrics.inc_commands_run();
        metrics.inc_commands_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.poll_ticks, 2);
        assert_eq!(snapshot.commands_run, 1);
        assert_eq!(snapshot.commands_failed, 1);
    }
}
