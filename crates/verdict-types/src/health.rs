// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Health Report
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::shadow::KillSwitchStatus;

/// Consolidated "is this safe to trust right now" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Ok,
    Warning,
    Critical,
    /// Not enough shadow samples yet to judge drift.
    DataCollection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Mean coverage score over recent decisions, 0–100.
    pub avg_coverage: f64,
    /// Mean risk score over recent decisions, 0–100.
    pub avg_risk: f64,
    /// Distinct signal names seen in recent decisions.
    pub signals_count: usize,
    pub drift_flags: Vec<String>,
    pub kill_switch: KillSwitchStatus,
}
