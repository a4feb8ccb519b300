// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Decision Types
// ─────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::score::ScoreSet;
use crate::snapshot::{Subject, Window};

/// Verdict of a single gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Passed,
    Warning,
    Blocked,
}

/// Named gate outcome with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateVerdict {
    pub gate_name: String,
    pub status: GateStatus,
    pub reason_text: String,
}

impl GateVerdict {
    pub fn is_blocked(&self) -> bool {
        self.status == GateStatus::Blocked
    }
}

/// Final directional decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionOutcome {
    Buy,
    Sell,
    Neutral,
}

impl DecisionOutcome {
    pub const ALL: [DecisionOutcome; 3] = [
        DecisionOutcome::Buy,
        DecisionOutcome::Sell,
        DecisionOutcome::Neutral,
    ];

    pub fn is_directional(self) -> bool {
        !matches!(self, DecisionOutcome::Neutral)
    }
}

impl fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionOutcome::Buy => f.write_str("BUY"),
            DecisionOutcome::Sell => f.write_str("SELL"),
            DecisionOutcome::Neutral => f.write_str("NEUTRAL"),
        }
    }
}

/// Publish-eligibility label derived from the confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLabel {
    Hidden,
    Low,
    Medium,
    High,
}

impl ConfidenceLabel {
    /// HIDDEN is a hard publish gate, independent of decision severity.
    pub fn allows_publication(self) -> bool {
        self != ConfidenceLabel::Hidden
    }
}

/// Calibrated confidence with its component breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceResult {
    pub score: u8,
    pub label: ConfidenceLabel,
    /// Component name → 0–100 reading. Ordered for stable output.
    pub breakdown: BTreeMap<String, u8>,
    pub reasons: Vec<String>,
}

/// A signal's share of the evidence behind a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalContribution {
    pub name: String,
    /// Share of the signal-strength evidence, 0–100.
    pub contribution: f64,
}

/// Engine that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineVersion {
    /// Legacy engine.
    V1,
    /// Current (candidate) engine.
    V2,
    /// Forced NEUTRAL served when no trustworthy engine is available.
    SafeFallback,
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineVersion::V1 => f.write_str("v1"),
            EngineVersion::V2 => f.write_str("v2"),
            EngineVersion::SafeFallback => f.write_str("safe_fallback"),
        }
    }
}

/// Immutable result of one evaluation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: String,
    pub subject: Subject,
    pub window: Window,
    /// `as_of_ms` of the snapshot this decision was computed from.
    pub as_of_ms: u64,
    pub scores: ScoreSet,
    pub verdicts: Vec<GateVerdict>,
    pub outcome: DecisionOutcome,
    pub confidence: ConfidenceResult,
    #[serde(default)]
    pub signals: Vec<SignalContribution>,
    pub engine_version: EngineVersion,
    /// Epoch milliseconds.
    pub created_at_ms: u64,
}

impl Decision {
    /// Whether this decision may be pushed to notification channels
    /// automatically.
    pub fn publishable(&self) -> bool {
        self.confidence.label.allows_publication() && self.outcome.is_directional()
    }

    pub fn any_blocked(&self) -> bool {
        self.verdicts.iter().any(GateVerdict::is_blocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confidence(label: ConfidenceLabel) -> ConfidenceResult {
        ConfidenceResult {
            score: 10,
            label,
            breakdown: BTreeMap::new(),
            reasons: Vec::new(),
        }
    }

    fn decision(outcome: DecisionOutcome, label: ConfidenceLabel) -> Decision {
        Decision {
            id: "d-1".into(),
            subject: Subject::token("WIF"),
            window: Window::Hour24,
            as_of_ms: 1,
            scores: ScoreSet::new(90, 90, 10, 90),
            verdicts: Vec::new(),
            outcome,
            confidence: confidence(label),
            signals: Vec::new(),
            engine_version: EngineVersion::V2,
            created_at_ms: 1,
        }
    }

    #[test]
    fn test_hidden_never_publishable() {
        assert!(!decision(DecisionOutcome::Buy, ConfidenceLabel::Hidden).publishable());
        assert!(!decision(DecisionOutcome::Sell, ConfidenceLabel::Hidden).publishable());
    }

    #[test]
    fn test_low_directional_publishable() {
        assert!(decision(DecisionOutcome::Sell, ConfidenceLabel::Low).publishable());
    }

    #[test]
    fn test_neutral_not_publishable() {
        assert!(!decision(DecisionOutcome::Neutral, ConfidenceLabel::High).publishable());
    }

    #[test]
    fn test_outcome_serializes_uppercase() {
        let json = serde_json::to_string(&DecisionOutcome::Buy).unwrap();
        assert_eq!(json, "\"BUY\"");
        let label = serde_json::to_string(&ConfidenceLabel::Hidden).unwrap();
        assert_eq!(label, "\"HIDDEN\"");
    }

    #[test]
    fn test_label_ordering() {
        assert!(ConfidenceLabel::High > ConfidenceLabel::Medium);
        assert!(ConfidenceLabel::Low > ConfidenceLabel::Hidden);
    }
}
