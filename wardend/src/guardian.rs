//! Autonomous protection: decides when a snapshot warrants shutting WSL2 down.

use serde::{Deserialize, Serialize};

use crate::cleanup::CleanupRequest;
use crate::types::Snapshot;

/// Below this much available memory, with the WSL2 VM running, the host is
/// close enough to freezing that the guardian intervenes.
pub const AUTO_SHUTDOWN_BELOW_GIB: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardianMode {
    Off,
    On,
}

impl GuardianMode {
    pub fn toggle(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }

    pub fn from_flag(enabled: bool) -> Self {
        if enabled { Self::On } else { Self::Off }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
        }
    }
}

/// One intervention decision, with the evidence it was based on.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardianAction {
    pub request: CleanupRequest,
    pub process: String,
    pub pid: u32,
    pub available_gib: f64,
}

/// Pure decision: at most one action per snapshot, and only when the mode is
/// on, available memory is under the floor, and a vmmem-like process exists.
/// Dispatching (and any rate limiting of repeat firings) is the caller's job.
pub fn evaluate(mode: GuardianMode, snapshot: &Snapshot) -> Option<GuardianAction> {
    if !mode.is_on() {
        return None;
    }
    let available_gib = snapshot.available_gib();
    if available_gib >= AUTO_SHUTDOWN_BELOW_GIB {
        return None;
    }
    let vmmem = snapshot.vmmem()?;
    Some(GuardianAction {
        request: CleanupRequest::Wsl,
        process: vmmem.name.clone(),
        pid: vmmem.pid,
        available_gib,
    })
}
