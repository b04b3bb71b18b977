//! Host telemetry sampling.

use std::sync::Mutex;

use anyhow::Result;
use sysinfo::{ProcessesToUpdate, System};

use crate::types::{ProcessInfo, Snapshot};

/// Source of point-in-time host state. The daemon owns exactly one; tests
/// substitute scripted implementations.
pub trait TelemetryProvider: Send + Sync {
    fn sample(&self) -> Result<Snapshot>;
}

/// sysinfo-backed provider. One `System` lives for the whole process so CPU
/// load is measured against the previous refresh instead of starting cold on
/// every sample.
pub struct SysinfoTelemetry {
    system: Mutex<System>,
}

impl SysinfoTelemetry {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_all()),
        }
    }
}

impl Default for SysinfoTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryProvider for SysinfoTelemetry {
    fn sample(&self) -> Result<Snapshot> {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_memory();
        system.refresh_cpu_usage();
        system.refresh_processes(ProcessesToUpdate::All, true);

        let mut processes: Vec<ProcessInfo> = system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessInfo {
                name: process.name().to_string_lossy().into_owned(),
                pid: pid.as_u32(),
                resident_bytes: process.memory(),
            })
            .collect();
        // sysinfo hands back a hash map; sort so repeat samples agree on
        // which vmmem-like process is "first".
        processes.sort_unstable_by_key(|p| p.pid);

        Ok(Snapshot {
            total_memory_bytes: system.total_memory(),
            available_memory_bytes: system.available_memory(),
            cpu_load_percent: f64::from(system.global_cpu_usage()),
            processes,
        })
    }
}
