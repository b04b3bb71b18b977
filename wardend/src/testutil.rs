//! Fakes and builders shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::cleanup::CommandRunner;
use crate::config::Config;
use crate::server::AppState;
use crate::telemetry::TelemetryProvider;
use crate::types::{ProcessInfo, Snapshot, GIB};

/// Telemetry stand-in: hands out a fixed snapshot and can be flipped into a
/// failing state mid-test.
pub struct FakeTelemetry {
    pub snapshot: Mutex<Snapshot>,
    fail: AtomicBool,
}

impl FakeTelemetry {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl TelemetryProvider for FakeTelemetry {
    fn sample(&self) -> anyhow::Result<Snapshot> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("sensor offline");
        }
        Ok(self.snapshot.lock().unwrap().clone())
    }
}

/// Command runner stand-in: records every command and fails the ones whose
/// text contains an entry from its deny list.
pub struct ScriptedRunner {
    seen: Mutex<Vec<String>>,
    fail_on: Vec<&'static str>,
}

impl ScriptedRunner {
    pub fn ok() -> Self {
        Self::failing(Vec::new())
    }

    pub fn failing(fail_on: Vec<&'static str>) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            fail_on,
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(command.to_string());
        if self.fail_on.iter().any(|f| command.contains(f)) {
            anyhow::bail!("scripted failure");
        }
        Ok(())
    }
}

/// 16 GiB host with one background process, `available` GiB free, and an
/// optional vmmem of the given resident size. Conversion rounds up so a
/// snapshot built "at" a threshold does not land below it.
pub fn snapshot_gib(available: f64, vmmem_bytes: Option<u64>) -> Snapshot {
    let mut processes = vec![ProcessInfo {
        name: "cargo".to_string(),
        pid: 11,
        resident_bytes: 300 * 1024 * 1024,
    }];
    if let Some(bytes) = vmmem_bytes {
        processes.push(ProcessInfo {
            name: "vmmemWSL".to_string(),
            pid: 4444,
            resident_bytes: bytes,
        });
    }
    Snapshot {
        total_memory_bytes: 16 * GIB as u64,
        available_memory_bytes: (available * GIB).ceil() as u64,
        cpu_load_percent: 42.0,
        processes,
    }
}

/// A fully wired daemon state over fakes, with its history file and junk
/// directory inside a private tempdir.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub telemetry: Arc<FakeTelemetry>,
    pub runner: Arc<ScriptedRunner>,
    pub dir: tempfile::TempDir,
}

pub fn test_app(snapshot: Snapshot) -> TestApp {
    test_app_with(snapshot, Vec::new(), |_| {})
}

pub fn test_app_with(
    snapshot: Snapshot,
    fail_on: Vec<&'static str>,
    configure: impl FnOnce(&mut Config),
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.monitor.history_path = dir.path().join("usage_history.csv");
    config.cleanup.junk_dir = dir.path().to_path_buf();
    // Tests that exercise the cooldown opt back in explicitly.
    config.guardian.cooldown_secs = 0;
    configure(&mut config);

    let telemetry = Arc::new(FakeTelemetry::new(snapshot));
    let runner = Arc::new(ScriptedRunner::failing(fail_on));
    let state = Arc::new(AppState::new(
        config,
        Arc::clone(&telemetry) as Arc<dyn TelemetryProvider>,
        Arc::clone(&runner) as Arc<dyn CommandRunner>,
    ));
    TestApp {
        state,
        telemetry,
        runner,
        dir,
    }
}
