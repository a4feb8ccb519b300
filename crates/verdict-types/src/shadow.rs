// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Shadow Comparison & Kill-Switch Types
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::decision::DecisionOutcome;
use crate::snapshot::{Subject, Window};

/// Whether a shadow sample counts toward drift metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleStatus {
    Compared,
    /// Legacy engine errored or timed out. Recorded, never counted as drift.
    Skipped { reason: String },
}

/// One V1-vs-V2 comparison on an identical snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSample {
    pub subject: Subject,
    pub window: Window,
    pub as_of_ms: u64,
    /// `None` when the legacy engine produced nothing.
    pub v1_decision: Option<DecisionOutcome>,
    pub v2_decision: DecisionOutcome,
    pub agree: bool,
    /// |risk(v2) − risk(v1)| in score points; 0 for skipped samples.
    pub risk_delta: f64,
    pub status: SampleStatus,
    pub captured_at_ms: u64,
}

impl ComparisonSample {
    pub fn is_skipped(&self) -> bool {
        matches!(self.status, SampleStatus::Skipped { .. })
    }
}

/// Rolling drift projection over the trailing sample window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftMetrics {
    pub agreement_rate: f64,
    pub decision_flip_rate: f64,
    pub avg_risk_delta: f64,
    /// Compared (non-skipped) samples in the window.
    pub sample_count: usize,
    pub skipped_count: usize,
    /// Epoch ms of the oldest sample in the window (0 when empty).
    pub window_start_ms: u64,
    /// Epoch ms of the newest sample in the window (0 when empty).
    pub window_end_ms: u64,
}

/// Kill-switch state machine status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KillSwitchStatus {
    Armed,
    Triggered,
}

/// Who caused a kill-switch transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionSource {
    Auto,
    Manual,
}

/// A versioned kill-switch record. The current state is the latest entry
/// of an append-only transition history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillSwitchState {
    pub status: KillSwitchStatus,
    pub reasons: Vec<String>,
    pub transitioned_at_ms: u64,
    pub transitioned_by: TransitionSource,
    /// Operator identity for manual transitions.
    #[serde(default)]
    pub operator: Option<String>,
    /// Monotonic record version used for compare-and-swap.
    pub version: u64,
}

impl KillSwitchState {
    /// Initial record of a fresh deployment.
    pub fn initial(now_ms: u64) -> Self {
        Self {
            status: KillSwitchStatus::Armed,
            reasons: vec!["initial_arm".to_string()],
            transitioned_at_ms: now_ms,
            transitioned_by: TransitionSource::Auto,
            operator: None,
            version: 0,
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.status == KillSwitchStatus::Triggered
    }
}

/// Data-only view of the shadow-mode subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowSummary {
    pub metrics: DriftMetrics,
    pub kill_switch: KillSwitchState,
    pub history: Vec<KillSwitchState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_armed() {
        let s = KillSwitchState::initial(42);
        assert!(!s.is_triggered());
        assert_eq!(s.version, 0);
        assert_eq!(s.transitioned_by, TransitionSource::Auto);
    }

    #[test]
    fn test_skipped_status_serializes_tagged() {
        let json = serde_json::to_string(&SampleStatus::Skipped {
            reason: "timeout".into(),
        })
        .unwrap();
        assert!(json.contains("\"kind\":\"skipped\""));
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&KillSwitchStatus::Triggered).unwrap();
        assert_eq!(json, "\"TRIGGERED\"");
    }
}
