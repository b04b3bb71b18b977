//! Pure health classification over available memory.

use crate::types::{HealthLevel, RecommendedMode, GIB};

/// Health ladder boundaries, in GiB of available memory. A sample sits in the
/// lowest band whose boundary it is strictly below.
pub const CRITICAL_BELOW_GIB: f64 = 0.8;
pub const SEVERE_BELOW_GIB: f64 = 1.5;
pub const WARNING_BELOW_GIB: f64 = 2.5;

/// Eco-mode boundary. Numerically equal to the Severe boundary today, but a
/// separate knob: the mode recommendation is computed on its own, not derived
/// from the health level.
pub const ECO_BELOW_GIB: f64 = 1.5;

pub fn classify(available_memory_bytes: u64) -> HealthLevel {
    let available_gib = available_memory_bytes as f64 / GIB;
    if available_gib < CRITICAL_BELOW_GIB {
        HealthLevel::Critical
    } else if available_gib < SEVERE_BELOW_GIB {
        HealthLevel::Severe
    } else if available_gib < WARNING_BELOW_GIB {
        HealthLevel::Warning
    } else {
        HealthLevel::Nominal
    }
}

pub fn recommend_mode(available_memory_bytes: u64) -> RecommendedMode {
    if (available_memory_bytes as f64 / GIB) < ECO_BELOW_GIB {
        RecommendedMode::Eco
    } else {
        RecommendedMode::Standard
    }
}
