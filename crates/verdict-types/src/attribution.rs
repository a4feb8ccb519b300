// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Attribution Types
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::decision::{DecisionOutcome, SignalContribution};
use crate::snapshot::{Subject, Window};

/// Terminal ground-truth judgment for a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeJudgment {
    Success,
    Fail,
}

/// Resolution attached exactly once to a recorded decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub judgment: OutcomeJudgment,
    pub resolved_at_ms: u64,
}

/// What the tracker keeps per recorded decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionRecord {
    pub decision_id: String,
    pub subject: Subject,
    pub window: Window,
    pub outcome: DecisionOutcome,
    pub confidence_score: u8,
    pub signals: Vec<SignalContribution>,
    pub recorded_at_ms: u64,
    pub resolution: Option<Resolution>,
}

/// Confidence-in-the-confidence for a signal's track record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Reliability {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEffectiveness {
    pub signal_name: String,
    pub total_occurrences: u64,
    pub success_count: u64,
    pub fail_count: u64,
    pub success_rate: f64,
    pub avg_contribution: f64,
    pub reliability: Reliability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStatus {
    Calibrated,
    /// Actual success rate below what the confidence implied.
    Overconfident,
    /// Actual success rate above what the confidence implied.
    Underconfident,
    InsufficientData,
}

/// Calibration of one (decision × confidence range) cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationBucket {
    pub decision: DecisionOutcome,
    /// Inclusive lower bound of the confidence range.
    pub range_lo: u8,
    /// Exclusive upper bound (the top bucket includes 100).
    pub range_hi: u8,
    pub samples: u64,
    pub successes: u64,
    pub actual_rate: f64,
    pub expected_rate: f64,
    /// actual − expected.
    pub gap: f64,
    pub status: CalibrationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessCheck {
    pub name: String,
    pub required: bool,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MlReadiness {
    pub checks: Vec<ReadinessCheck>,
    /// All required checks passed.
    pub ready: bool,
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionSummary {
    pub total_decisions: u64,
    pub resolved: u64,
    pub pending: u64,
    pub successes: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub buy_count: u64,
    pub sell_count: u64,
    pub neutral_count: u64,
    /// Sample-weighted mean |gap| across calibration buckets.
    pub calibration_error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionDashboard {
    pub summary: AttributionSummary,
    pub signal_effectiveness: Vec<SignalEffectiveness>,
    pub confidence_calibration: Vec<CalibrationBucket>,
    pub ml_ready_checklist: MlReadiness,
}
