use serde::{Deserialize, Serialize};

pub const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
pub const MIB: f64 = 1024.0 * 1024.0;

/// Name fragment that marks the WSL2 utility VM process.
pub const VMMEM_PATTERN: &str = "vmmem";

/// Point-in-time reading of host memory, CPU and process state, as delivered
/// by the telemetry provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub total_memory_bytes: u64,
    pub available_memory_bytes: u64,
    pub cpu_load_percent: f64,
    /// Process table in a stable order (the sysinfo adapter sorts by pid),
    /// so "first match" lookups are deterministic.
    pub processes: Vec<ProcessInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub name: String,
    pub pid: u32,
    pub resident_bytes: u64,
}

impl Snapshot {
    pub fn total_gib(&self) -> f64 {
        self.total_memory_bytes as f64 / GIB
    }

    pub fn available_gib(&self) -> f64 {
        self.available_memory_bytes as f64 / GIB
    }

    pub fn free_percent(&self) -> f64 {
        if self.total_memory_bytes == 0 {
            return 0.0;
        }
        self.available_memory_bytes as f64 / self.total_memory_bytes as f64 * 100.0
    }

    /// First process whose name contains "vmmem", case-insensitive.
    pub fn vmmem(&self) -> Option<&ProcessInfo> {
        self.processes
            .iter()
            .find(|p| p.name.to_lowercase().contains(VMMEM_PATTERN))
    }

    /// Resident size of the vmmem process in MiB; 0.0 when it is not running.
    pub fn wsl2_mib(&self) -> f64 {
        self.vmmem()
            .map(|p| p.resident_bytes as f64 / MIB)
            .unwrap_or(0.0)
    }
}

/// Health ladder derived from available memory alone, never from CPU load.
/// Declaration order gives the derived `Ord`: `Critical` sorts first and is
/// the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Critical,
    Severe,
    Warning,
    Nominal,
}

impl HealthLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Severe => "severe",
            Self::Warning => "warning",
            Self::Nominal => "nominal",
        }
    }
}

/// Suggested operating mode for memory-hungry callers. Spelled the way the
/// tool surface reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedMode {
    #[serde(rename = "ECO_MODE")]
    Eco,
    #[serde(rename = "STANDARD")]
    Standard,
}

impl RecommendedMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eco => "ECO_MODE",
            Self::Standard => "STANDARD",
        }
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
