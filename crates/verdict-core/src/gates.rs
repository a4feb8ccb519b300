// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Gate Evaluator
// ─────────────────────────────────────────────────────────────────────
//! Ordered threshold gates over a score set.
//!
//! Gates run in a fixed order (coverage, risk, evidence) so reasons are
//! reported reproducibly. The decision rule is veto-then-direction: any
//! blocked gate forces NEUTRAL, and only an unblocked score set may turn
//! its direction into BUY or SELL. This module is the single source of
//! gate policy; anything else that re-derives verdicts is a debug view.

use verdict_types::config::GateConfig;
use verdict_types::{DecisionOutcome, GateStatus, GateVerdict, ScoreSet};

pub const COVERAGE_GATE: &str = "coverage";
pub const RISK_GATE: &str = "risk";
pub const EVIDENCE_GATE: &str = "evidence";

#[derive(Debug, Clone)]
pub struct GateEvaluator {
    config: GateConfig,
}

impl GateEvaluator {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// Evaluate all gates in order and derive the final decision.
    pub fn evaluate(&self, scores: &ScoreSet) -> (Vec<GateVerdict>, DecisionOutcome) {
        let verdicts = vec![
            self.coverage_gate(scores.coverage),
            self.risk_gate(scores.risk),
            self.evidence_gate(scores.evidence),
        ];
        let outcome = self.decide(&verdicts, scores.direction);
        (verdicts, outcome)
    }

    /// Veto-then-direction. A blocked gate is never overridden.
    pub fn decide(&self, verdicts: &[GateVerdict], direction: i8) -> DecisionOutcome {
        if verdicts.iter().any(GateVerdict::is_blocked) {
            return DecisionOutcome::Neutral;
        }
        let min = i16::from(self.config.min_direction_magnitude);
        let direction = i16::from(direction);
        if direction > min {
            DecisionOutcome::Buy
        } else if direction < -min {
            DecisionOutcome::Sell
        } else {
            DecisionOutcome::Neutral
        }
    }

    fn coverage_gate(&self, coverage: u8) -> GateVerdict {
        let c = &self.config;
        if coverage < c.coverage_block_below {
            verdict(
                COVERAGE_GATE,
                GateStatus::Blocked,
                format!("coverage {coverage} < {} floor", c.coverage_block_below),
            )
        } else if coverage < c.coverage_warn_below {
            verdict(
                COVERAGE_GATE,
                GateStatus::Warning,
                format!("coverage {coverage} < {} target", c.coverage_warn_below),
            )
        } else {
            verdict(
                COVERAGE_GATE,
                GateStatus::Passed,
                format!("coverage {coverage} >= {}", c.coverage_warn_below),
            )
        }
    }

    fn risk_gate(&self, risk: u8) -> GateVerdict {
        let c = &self.config;
        if risk >= c.risk_block_at {
            verdict(
                RISK_GATE,
                GateStatus::Blocked,
                format!("risk {risk} >= {} ceiling", c.risk_block_at),
            )
        } else if risk >= c.risk_warn_at {
            verdict(
                RISK_GATE,
                GateStatus::Warning,
                format!("risk {risk} in warning band [{}, {})", c.risk_warn_at, c.risk_block_at),
            )
        } else {
            verdict(
                RISK_GATE,
                GateStatus::Passed,
                format!("risk {risk} < {}", c.risk_warn_at),
            )
        }
    }

    fn evidence_gate(&self, evidence: u8) -> GateVerdict {
        let c = &self.config;
        if evidence < c.evidence_block_below {
            verdict(
                EVIDENCE_GATE,
                GateStatus::Blocked,
                format!("evidence {evidence} < {} floor", c.evidence_block_below),
            )
        } else if evidence < c.evidence_warn_below {
            verdict(
                EVIDENCE_GATE,
                GateStatus::Warning,
                format!(
                    "evidence {evidence} in warning band [{}, {})",
                    c.evidence_block_below, c.evidence_warn_below
                ),
            )
        } else {
            verdict(
                EVIDENCE_GATE,
                GateStatus::Passed,
                format!("evidence {evidence} >= {}", c.evidence_warn_below),
            )
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}

impl Default for GateEvaluator {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}

fn verdict(gate: &str, status: GateStatus, reason: String) -> GateVerdict {
    GateVerdict {
        gate_name: gate.to_string(),
        status,
        reason_text: reason,
    }
}
