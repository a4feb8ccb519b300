// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Decision Engine
// ─────────────────────────────────────────────────────────────────────
//! In-process decision pipeline: aggregate, gate, calibrate.
//!
//! Holds configuration only, so one engine serves any number of
//! concurrent callers. Two engines built from different configurations
//! tagged with different versions give the V1/V2 pair that shadow mode
//! compares.

use verdict_types::{Decision, EngineVersion, InputSnapshot, VerdictConfig, VerdictResult};

use crate::aggregator::ScoreAggregator;
use crate::backend::DecisionBackend;
use crate::clock::now_ms;
use crate::confidence::ConfidenceCalibrator;
use crate::gates::GateEvaluator;

#[derive(Debug, Clone)]
pub struct DecisionEngine {
    version: EngineVersion,
    aggregator: ScoreAggregator,
    gates: GateEvaluator,
    calibrator: ConfidenceCalibrator,
}

impl DecisionEngine {
    pub fn new(version: EngineVersion, config: &VerdictConfig) -> Self {
        Self {
            version,
            aggregator: ScoreAggregator::new(config.scoring.clone()),
            gates: GateEvaluator::new(config.gates.clone()),
            calibrator: ConfidenceCalibrator::new(config.confidence.clone()),
        }
    }

    /// Current-generation engine for a configuration.
    pub fn from_config(config: &VerdictConfig) -> Self {
        Self::new(EngineVersion::V2, config)
    }

    /// Run the full pipeline with an explicit creation timestamp.
    pub fn decide_at(&self, snapshot: &InputSnapshot, created_at_ms: u64) -> VerdictResult<Decision> {
        let aggregation = self.aggregator.aggregate(snapshot)?;
        let scores = aggregation.scores;
        let (verdicts, outcome) = self.gates.evaluate(&scores);
        let confidence = self.calibrator.calibrate(&scores, snapshot);

        let decision = Decision {
            id: uuid::Uuid::new_v4().to_string(),
            subject: snapshot.subject.clone(),
            window: snapshot.window,
            as_of_ms: snapshot.as_of_ms,
            scores,
            verdicts,
            outcome,
            confidence,
            signals: aggregation.contributions,
            engine_version: self.version,
            created_at_ms,
        };

        log::debug!(
            "{} decided {} for {} ({}), confidence {} {:?}",
            self.version,
            decision.outcome,
            decision.subject,
            decision.window,
            decision.confidence.score,
            decision.confidence.label
        );
        Ok(decision)
    }

    pub fn aggregator(&self) -> &ScoreAggregator {
        &self.aggregator
    }

    pub fn gates(&self) -> &GateEvaluator {
        &self.gates
    }

    pub fn calibrator(&self) -> &ConfidenceCalibrator {
        &self.calibrator
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::from_config(&VerdictConfig::default())
    }
}

impl DecisionBackend for DecisionEngine {
    fn version(&self) -> EngineVersion {
        self.version
    }

    fn decide(&self, snapshot: &InputSnapshot) -> VerdictResult<Decision> {
        self.decide_at(snapshot, now_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_types::{
        ActorFacts, ConfidenceLabel, DecisionOutcome, GateStatus, GraphCoverage, Polarity,
        RawSignal, Subject, Window,
    };

    const AS_OF: u64 = 1_700_000_000_000;

    fn bullish_snapshot() -> InputSnapshot {
        InputSnapshot::new(Subject::token("WIF"), Window::Hour24, AS_OF)
            .with_context_strength(70.0)
            .with_signal(RawSignal::new("smart_money", Polarity::Bullish, 0.9, 0.9, AS_OF - 60_000))
            .with_signal(RawSignal::new("cex_outflow", Polarity::Bullish, 0.7, 0.8, AS_OF - 120_000))
            .with_signal(RawSignal::new("whale_sell", Polarity::Bearish, 0.3, 0.5, AS_OF - 600_000))
            .with_actor(ActorFacts {
                quality_score: 80.0,
                verified: true,
                track_record_samples: 40,
                historical_accuracy: Some(0.62),
                risk_flags: 0,
            })
            .with_graph(GraphCoverage {
                resolved_edges: 90,
                total_edges: 100,
                covered_sources: 4,
                expected_sources: 5,
            })
    }

    #[test]
    fn test_bullish_snapshot_buys() {
        let engine = DecisionEngine::default();
        let decision = engine.decide_at(&bullish_snapshot(), 42).unwrap();
        assert_eq!(decision.outcome, DecisionOutcome::Buy);
        assert_eq!(decision.engine_version, EngineVersion::V2);
        assert_eq!(decision.created_at_ms, 42);
        assert_eq!(decision.as_of_ms, AS_OF);
        assert_eq!(decision.verdicts.len(), 3);
        assert!(decision.verdicts.iter().all(|v| v.status == GateStatus::Passed));
        assert_eq!(decision.confidence.label, ConfidenceLabel::Medium);
        assert!(decision.publishable());
        assert_eq!(decision.signals.len(), 3);
    }

    #[test]
    fn test_ids_are_unique() {
        let engine = DecisionEngine::default();
        let a = engine.decide_at(&bullish_snapshot(), 1).unwrap();
        let b = engine.decide_at(&bullish_snapshot(), 1).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.scores, b.scores);
        assert_eq!(a.outcome, b.outcome);
    }

    #[test]
    fn test_sparse_snapshot_neutral_and_hidden() {
        let snap = InputSnapshot::new(Subject::actor("0xabc"), Window::Hour1, AS_OF);
        let decision = DecisionEngine::default().decide_at(&snap, 1).unwrap();
        assert_eq!(decision.outcome, DecisionOutcome::Neutral);
        assert!(decision.any_blocked());
        assert_eq!(decision.confidence.label, ConfidenceLabel::Hidden);
        assert!(!decision.publishable());
    }

    #[test]
    fn test_version_tag() {
        let engine = DecisionEngine::new(EngineVersion::V1, &VerdictConfig::default());
        assert_eq!(DecisionBackend::version(&engine), EngineVersion::V1);
        let decision = DecisionBackend::decide(&engine, &bullish_snapshot()).unwrap();
        assert_eq!(decision.engine_version, EngineVersion::V1);
        assert!(decision.created_at_ms > 0);
    }

    #[test]
    fn test_invalid_snapshot_propagates() {
        let snap = InputSnapshot::new(Subject::token("X"), Window::Hour1, 0);
        assert!(DecisionEngine::default().decide_at(&snap, 1).is_err());
    }
}
