// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — End-to-End Scenarios
// ─────────────────────────────────────────────────────────────────────

use std::sync::Arc;

use verdict_core::killswitch::REASON_FLIP_RATE;
use verdict_core::{
    DecisionBackend, DecisionEngine, DecisionService, ExternalBackend, GateEvaluator,
    InMemorySnapshots, KillSwitch, ScoreAggregator, ShadowComparator,
};
use verdict_types::{
    ActorFacts, ComparisonSample, DecisionOutcome, EngineVersion, GateStatus, GraphCoverage,
    HealthStatus, InputSnapshot, KillSwitchStatus, OutcomeJudgment, Polarity, RawSignal,
    SampleStatus, ScoreSet, Subject, VerdictConfig, Window,
};

const AS_OF: u64 = 1_700_000_000_000;

fn sample(agree: bool, at: u64) -> ComparisonSample {
    ComparisonSample {
        subject: Subject::token("SOL"),
        window: Window::Hour24,
        as_of_ms: AS_OF,
        v1_decision: Some(DecisionOutcome::Buy),
        v2_decision: if agree {
            DecisionOutcome::Buy
        } else {
            DecisionOutcome::Neutral
        },
        agree,
        risk_delta: 1.0,
        status: SampleStatus::Compared,
        captured_at_ms: at,
    }
}

fn comparator() -> ShadowComparator {
    let engine: Arc<dyn DecisionBackend> = Arc::new(DecisionEngine::default());
    ShadowComparator::new(Arc::clone(&engine), engine, VerdictConfig::default().shadow)
}

fn bullish_snapshot(token: &str) -> InputSnapshot {
    InputSnapshot::new(Subject::token(token), Window::Hour24, AS_OF)
        .with_context_strength(75.0)
        .with_signal(RawSignal::new("smart_money", Polarity::Bullish, 0.9, 0.9, AS_OF - 60_000))
        .with_signal(RawSignal::new("cex_outflow", Polarity::Bullish, 0.8, 0.8, AS_OF - 5 * 3_600_000))
        .with_signal(RawSignal::new("lp_add", Polarity::Bullish, 0.6, 0.9, AS_OF - 13 * 3_600_000))
        .with_actor(ActorFacts {
            quality_score: 85.0,
            verified: true,
            track_record_samples: 80,
            historical_accuracy: Some(0.7),
            risk_flags: 0,
        })
        .with_graph(GraphCoverage {
            resolved_edges: 95,
            total_edges: 100,
            covered_sources: 5,
            expected_sources: 5,
        })
}

#[test]
fn test_strong_scores_buy() {
    let (verdicts, outcome) = GateEvaluator::default().evaluate(&ScoreSet::new(70, 80, 30, 60));
    assert_eq!(outcome, DecisionOutcome::Buy);
    assert!(verdicts.iter().all(|v| v.status == GateStatus::Passed));
}

#[test]
fn test_low_coverage_blocks_strong_direction() {
    let (verdicts, outcome) = GateEvaluator::default().evaluate(&ScoreSet::new(90, 45, 10, 90));
    assert_eq!(outcome, DecisionOutcome::Neutral);
    assert_eq!(verdicts[0].gate_name, "coverage");
    assert_eq!(verdicts[0].status, GateStatus::Blocked);
}

#[test]
fn test_97_of_100_agree_stays_armed() {
    let cmp = comparator();
    for i in 0..100 {
        cmp.record(sample(i >= 3, AS_OF + i));
    }
    let metrics = cmp.metrics_at(AS_OF + 100);
    assert!((metrics.agreement_rate - 0.97).abs() < 1e-9);
    assert!((metrics.decision_flip_rate - 0.03).abs() < 1e-9);

    let ks = KillSwitch::in_memory(VerdictConfig::default().kill_switch);
    let state = ks.evaluate_at(&metrics, AS_OF + 100).unwrap();
    assert_eq!(state.status, KillSwitchStatus::Armed);
}

#[test]
fn test_20_of_50_disagree_triggers() {
    let cmp = comparator();
    for i in 0..50 {
        cmp.record(sample(i >= 20, AS_OF + i));
    }
    let metrics = cmp.metrics_at(AS_OF + 50);
    assert!((metrics.decision_flip_rate - 0.40).abs() < 1e-9);

    let ks = KillSwitch::in_memory(VerdictConfig::default().kill_switch);
    let state = ks.evaluate_at(&metrics, AS_OF + 50).unwrap();
    assert_eq!(state.status, KillSwitchStatus::Triggered);
    assert!(state.reasons.iter().any(|r| r.starts_with(REASON_FLIP_RATE)));
}

#[test]
fn test_zero_agreement_below_min_samples_stays_armed() {
    let cmp = comparator();
    for i in 0..29 {
        cmp.record(sample(false, AS_OF + i));
    }
    let metrics = cmp.metrics_at(AS_OF + 29);
    assert_eq!(metrics.agreement_rate, 0.0);
    let ks = KillSwitch::in_memory(VerdictConfig::default().kill_switch);
    assert!(!ks.evaluate_at(&metrics, AS_OF + 29).unwrap().is_triggered());
}

#[test]
fn test_scores_pure_across_engines() {
    let snap = bullish_snapshot("JUP");
    let a = DecisionEngine::default().decide_at(&snap, 1).unwrap();
    let b = DecisionEngine::new(EngineVersion::V1, &VerdictConfig::default())
        .decide_at(&snap, 2)
        .unwrap();
    assert_eq!(a.scores, b.scores);
    assert_eq!(a.scores, ScoreAggregator::default().compute_scores(&snap).unwrap());
}

#[test]
fn test_hidden_never_publishable() {
    // Strong bullish lean but no actor, graph, or context behind it.
    let mut config = VerdictConfig::default();
    config.gates.coverage_block_below = 0;
    config.gates.coverage_warn_below = 0;
    config.gates.evidence_block_below = 0;
    config.gates.evidence_warn_below = 0;
    let snap = InputSnapshot::new(Subject::token("RUG"), Window::Day30, AS_OF).with_signal(
        RawSignal::new("pump", Polarity::Bullish, 0.2, 0.2, AS_OF - 20 * 86_400_000),
    );
    let decision = DecisionEngine::from_config(&config).decide_at(&snap, 1).unwrap();
    assert_eq!(decision.outcome, DecisionOutcome::Buy);
    assert_eq!(decision.confidence.label, verdict_types::ConfidenceLabel::Hidden);
    assert!(!decision.publishable());
}

#[test]
fn test_service_lifecycle() {
    let config = VerdictConfig::default();
    let provider = Arc::new(InMemorySnapshots::new());
    for token in ["JUP", "WIF", "BONK"] {
        provider.insert(bullish_snapshot(token));
    }
    let legacy: Arc<dyn DecisionBackend> =
        Arc::new(DecisionEngine::new(EngineVersion::V1, &config));
    let svc = DecisionService::new(config, provider, legacy).unwrap();

    let mut ids = Vec::new();
    for token in ["JUP", "WIF", "BONK"] {
        let d = svc.decide(&Subject::token(token), Window::Hour24).unwrap();
        assert_eq!(d.outcome, DecisionOutcome::Buy);
        assert!(d.publishable());
        ids.push(d.id);
    }
    svc.resolve_outcome(&ids[0], OutcomeJudgment::Success).unwrap();
    svc.resolve_outcome(&ids[1], OutcomeJudgment::Fail).unwrap();
    // Repeat is a no-op
    let again = svc.resolve_outcome(&ids[0], OutcomeJudgment::Fail).unwrap();
    assert_eq!(again.judgment, OutcomeJudgment::Success);

    let dash = svc.attribution_dashboard();
    assert_eq!(dash.summary.total_decisions, 3);
    assert_eq!(dash.summary.resolved, 2);
    assert_eq!(dash.summary.pending, 1);
    assert!((dash.summary.success_rate - 0.5).abs() < 1e-9);
    let smart = dash
        .signal_effectiveness
        .iter()
        .find(|s| s.signal_name == "smart_money")
        .unwrap();
    assert_eq!(smart.total_occurrences, 2);
    assert!(!dash.ml_ready_checklist.ready);

    let health = svc.health();
    assert_eq!(health.status, HealthStatus::DataCollection);
    assert_eq!(health.kill_switch, KillSwitchStatus::Armed);
    assert_eq!(health.signals_count, 3);

    let summary = svc.shadow_summary().unwrap();
    assert_eq!(summary.metrics.sample_count, 3);
    assert!((summary.metrics.agreement_rate - 1.0).abs() < 1e-9);
    assert_eq!(summary.history.len(), 1);
}

#[test]
fn test_responses_serialize_camel_case() {
    let config = VerdictConfig::default();
    let provider = Arc::new(InMemorySnapshots::new());
    provider.insert(bullish_snapshot("WIF"));
    let legacy: Arc<dyn DecisionBackend> = Arc::new(ExternalBackend::new(EngineVersion::V1, |_| {
        Err(verdict_types::VerdictError::Backend("legacy offline".into()))
    }));
    let svc = DecisionService::new(config, provider, legacy).unwrap();
    let decision = svc.decide(&Subject::token("WIF"), Window::Hour24).unwrap();

    let json = serde_json::to_value(&decision).unwrap();
    assert_eq!(json["outcome"], "BUY");
    assert_eq!(json["engineVersion"], "v2");
    assert!(json["asOfMs"].is_u64());

    let summary = serde_json::to_value(svc.shadow_summary().unwrap()).unwrap();
    assert_eq!(summary["metrics"]["skippedCount"], 1);
    assert_eq!(summary["killSwitch"]["status"], "ARMED");

    let dash = serde_json::to_value(svc.attribution_dashboard()).unwrap();
    assert!(dash["mlReadyChecklist"]["checks"].is_array());
    assert!(dash["signalEffectiveness"].is_array());
}
