// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Confidence Calibrator
// ─────────────────────────────────────────────────────────────────────
//! Confidence is a separate axis from the decision: it measures whether
//! the pipeline ran with enough data to be trusted, not whether the
//! decision is right. The label doubles as the auto-publish gate.

use std::collections::BTreeMap;

use verdict_types::config::ConfidenceConfig;
use verdict_types::score::{clamp_score, to_unit_score};
use verdict_types::{ConfidenceLabel, ConfidenceResult, InputSnapshot, ScoreSet};

pub const COMPONENT_COVERAGE: &str = "coverage";
pub const COMPONENT_ACTOR_QUALITY: &str = "actor_quality";
pub const COMPONENT_FLOW_SIGNIFICANCE: &str = "flow_significance";
pub const COMPONENT_TEMPORAL_STABILITY: &str = "temporal_stability";
pub const COMPONENT_EVIDENCE_QUALITY: &str = "evidence_quality";

#[derive(Debug, Clone)]
pub struct ConfidenceCalibrator {
    config: ConfidenceConfig,
}

impl ConfidenceCalibrator {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    /// Decompose confidence into weighted components and label it.
    pub fn calibrate(&self, scores: &ScoreSet, snapshot: &InputSnapshot) -> ConfidenceResult {
        let w = &self.config.weights;
        let components = [
            (COMPONENT_COVERAGE, w.coverage, f64::from(scores.coverage)),
            (COMPONENT_ACTOR_QUALITY, w.actor_quality, Self::actor_quality(snapshot)),
            (
                COMPONENT_FLOW_SIGNIFICANCE,
                w.flow_significance,
                self.flow_significance(snapshot),
            ),
            (
                COMPONENT_TEMPORAL_STABILITY,
                w.temporal_stability,
                self.temporal_stability(snapshot),
            ),
            (COMPONENT_EVIDENCE_QUALITY, w.evidence_quality, f64::from(scores.evidence)),
        ];

        let mut breakdown = BTreeMap::new();
        let mut reasons = Vec::new();
        let mut total = 0.0;
        for (name, weight, value) in components {
            let value = to_unit_score(value);
            total += weight * f64::from(value);
            if value < self.config.component_floor {
                reasons.push(format!(
                    "{name} {value} below floor {}",
                    self.config.component_floor
                ));
            }
            breakdown.insert(name.to_string(), value);
        }

        if snapshot.actor.is_none() {
            reasons.push("no actor facts available".to_string());
        }
        if snapshot.signals.is_empty() {
            reasons.push("no signals in snapshot".to_string());
        }

        let score = to_unit_score(total);
        let label = self.label(score);
        if label == ConfidenceLabel::Hidden {
            reasons.push(format!(
                "confidence {score} below {}: auto-publish suppressed",
                self.config.low_at
            ));
        }

        ConfidenceResult {
            score,
            label,
            breakdown,
            reasons,
        }
    }

    /// Map a 0–100 confidence score to its label.
    pub fn label(&self, score: u8) -> ConfidenceLabel {
        let c = &self.config;
        if score >= c.high_at {
            ConfidenceLabel::High
        } else if score >= c.medium_at {
            ConfidenceLabel::Medium
        } else if score >= c.low_at {
            ConfidenceLabel::Low
        } else {
            ConfidenceLabel::Hidden
        }
    }

    /// Curated quality, blended half-and-half with the historical hit
    /// rate when one is known.
    fn actor_quality(snapshot: &InputSnapshot) -> f64 {
        match &snapshot.actor {
            Some(actor) => {
                let quality = clamp_score(actor.quality_score, 0.0, 100.0);
                match actor.historical_accuracy {
                    Some(acc) => 0.5 * quality + 0.5 * clamp_score(acc, 0.0, 1.0) * 100.0,
                    None => quality,
                }
            }
            None => 0.0,
        }
    }

    fn flow_significance(&self, snapshot: &InputSnapshot) -> f64 {
        let total: f64 = snapshot.signals.iter().map(|s| s.weight()).sum();
        (total / self.config.flow_saturation).min(1.0) * 100.0
    }

    /// Share of equal window slices holding at least one signal. Signals
    /// before the window start are ignored; future-dated ones land in the
    /// last slice.
    fn temporal_stability(&self, snapshot: &InputSnapshot) -> f64 {
        let slices = self.config.stability_slices as usize;
        let duration = snapshot.window.duration_ms();
        let start = snapshot.as_of_ms.saturating_sub(duration);
        let slice_len = (duration / slices as u64).max(1);
        let mut occupied = vec![false; slices];
        for signal in &snapshot.signals {
            if signal.observed_at_ms < start {
                continue;
            }
            let offset = signal.observed_at_ms.min(snapshot.as_of_ms) - start;
            let idx = ((offset / slice_len) as usize).min(slices - 1);
            occupied[idx] = true;
        }
        let filled = occupied.iter().filter(|o| **o).count();
        filled as f64 / slices as f64 * 100.0
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }
}

impl Default for ConfidenceCalibrator {
    fn default() -> Self {
        Self::new(ConfidenceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_types::{ActorFacts, Polarity, RawSignal, Subject, Window};

    const AS_OF: u64 = 1_700_000_000_000;
    const HOUR: u64 = 3_600_000;

    fn spread_snapshot() -> InputSnapshot {
        let mut snap = InputSnapshot::new(Subject::token("JUP"), Window::Hour24, AS_OF).with_actor(
            ActorFacts {
                quality_score: 90.0,
                verified: true,
                track_record_samples: 120,
                historical_accuracy: Some(0.7),
                risk_flags: 0,
            },
        );
        // One strong signal in each 4h slice of the 24h window.
        for i in 0..6 {
            snap = snap.with_signal(RawSignal::new(
                format!("s{i}"),
                Polarity::Bullish,
                1.0,
                1.0,
                AS_OF - i * 4 * HOUR - HOUR,
            ));
        }
        snap
    }

    #[test]
    fn test_label_thresholds() {
        let cal = ConfidenceCalibrator::default();
        assert_eq!(cal.label(100), ConfidenceLabel::High);
        assert_eq!(cal.label(70), ConfidenceLabel::High);
        assert_eq!(cal.label(69), ConfidenceLabel::Medium);
        assert_eq!(cal.label(40), ConfidenceLabel::Medium);
        assert_eq!(cal.label(39), ConfidenceLabel::Low);
        assert_eq!(cal.label(20), ConfidenceLabel::Low);
        assert_eq!(cal.label(19), ConfidenceLabel::Hidden);
        assert_eq!(cal.label(0), ConfidenceLabel::Hidden);
    }

    #[test]
    fn test_rich_snapshot_high_confidence() {
        let cal = ConfidenceCalibrator::default();
        let result = cal.calibrate(&ScoreSet::new(80, 90, 10, 80), &spread_snapshot());
        assert_eq!(result.breakdown[COMPONENT_TEMPORAL_STABILITY], 100);
        assert_eq!(result.breakdown[COMPONENT_FLOW_SIGNIFICANCE], 100);
        assert_eq!(result.breakdown[COMPONENT_ACTOR_QUALITY], 80);
        // 0.3*90 + 0.2*80 + 0.2*100 + 0.15*100 + 0.15*80 = 90
        assert_eq!(result.score, 90);
        assert_eq!(result.label, ConfidenceLabel::High);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn test_empty_snapshot_hidden() {
        let cal = ConfidenceCalibrator::default();
        let snap = InputSnapshot::new(Subject::actor("0x1"), Window::Day7, AS_OF);
        let result = cal.calibrate(&ScoreSet::new(0, 0, 0, 0), &snap);
        assert_eq!(result.score, 0);
        assert_eq!(result.label, ConfidenceLabel::Hidden);
        assert!(result.reasons.iter().any(|r| r.contains("auto-publish suppressed")));
        assert!(result.reasons.iter().any(|r| r.contains("no actor facts")));
    }

    #[test]
    fn test_breakdown_has_all_components() {
        let cal = ConfidenceCalibrator::default();
        let result = cal.calibrate(&ScoreSet::new(50, 50, 50, 0), &spread_snapshot());
        let keys: Vec<&str> = result.breakdown.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                COMPONENT_ACTOR_QUALITY,
                COMPONENT_COVERAGE,
                COMPONENT_EVIDENCE_QUALITY,
                COMPONENT_FLOW_SIGNIFICANCE,
                COMPONENT_TEMPORAL_STABILITY,
            ]
        );
    }

    #[test]
    fn test_clustered_signals_less_stable() {
        let cal = ConfidenceCalibrator::default();
        let mut clustered = spread_snapshot();
        for s in &mut clustered.signals {
            s.observed_at_ms = AS_OF - 1_000;
        }
        let result = cal.calibrate(&ScoreSet::new(90, 90, 10, 80), &clustered);
        assert_eq!(result.breakdown[COMPONENT_TEMPORAL_STABILITY], 17);
    }

    #[test]
    fn test_signals_outside_window_ignored_for_stability() {
        let cal = ConfidenceCalibrator::default();
        let snap = InputSnapshot::new(Subject::token("OLD"), Window::Hour1, AS_OF)
            .with_signal(RawSignal::new("old", Polarity::Bullish, 1.0, 1.0, AS_OF - 5 * HOUR));
        let result = cal.calibrate(&ScoreSet::new(50, 50, 50, 0), &snap);
        assert_eq!(result.breakdown[COMPONENT_TEMPORAL_STABILITY], 0);
    }
}
