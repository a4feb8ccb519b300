// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Decision Service
// ─────────────────────────────────────────────────────────────────────
//! Facade the surrounding product talks to.
//!
//! Every request runs the candidate engine, shadow-compares it with the
//! legacy engine on the same snapshot, and lets the kill switch decide
//! which result is served. While the switch is triggered the legacy
//! decision is served, or a NEUTRAL safe fallback when the legacy
//! engine produced nothing.

use std::sync::Arc;

use verdict_types::{
    AttributionDashboard, Decision, DecisionOutcome, EngineVersion, GateStatus, GateVerdict,
    HealthReport, InputSnapshot, KillSwitchState, OutcomeJudgment, Resolution, ShadowSummary,
    Subject, VerdictConfig, VerdictError, VerdictResult, Window,
};

use crate::attribution::AttributionTracker;
use crate::backend::DecisionBackend;
use crate::clock::now_ms;
use crate::engine::DecisionEngine;
use crate::health::HealthMonitor;
use crate::killswitch::{InMemoryKillSwitchStore, KillSwitch, KillSwitchStore};
use crate::provider::SnapshotProvider;
use crate::shadow::ShadowComparator;

/// Gate name carried by safe-fallback decisions.
pub const KILL_SWITCH_GATE: &str = "kill_switch";

pub struct DecisionService {
    config: VerdictConfig,
    provider: Arc<dyn SnapshotProvider>,
    candidate: Arc<DecisionEngine>,
    comparator: ShadowComparator,
    kill_switch: KillSwitch,
    attribution: AttributionTracker,
    health: HealthMonitor,
}

impl DecisionService {
    pub fn new(
        config: VerdictConfig,
        provider: Arc<dyn SnapshotProvider>,
        legacy: Arc<dyn DecisionBackend>,
    ) -> VerdictResult<Self> {
        Self::with_kill_switch_store(
            config,
            provider,
            legacy,
            Arc::new(InMemoryKillSwitchStore::default()),
        )
    }

    /// Build a service whose kill-switch record lives in `store`.
    pub fn with_kill_switch_store(
        config: VerdictConfig,
        provider: Arc<dyn SnapshotProvider>,
        legacy: Arc<dyn DecisionBackend>,
        store: Arc<dyn KillSwitchStore>,
    ) -> VerdictResult<Self> {
        config.validate()?;
        let candidate = Arc::new(DecisionEngine::from_config(&config));
        let comparator = ShadowComparator::new(
            legacy,
            Arc::clone(&candidate) as Arc<dyn DecisionBackend>,
            config.shadow.clone(),
        );
        let kill_switch = KillSwitch::new(config.kill_switch.clone(), store);
        let attribution = AttributionTracker::new(config.attribution.clone());
        let health = HealthMonitor::new(config.health.clone());
        log::info!(
            "decision service ready (kill switch {:?})",
            kill_switch.state().map(|s| s.status)
        );
        Ok(Self {
            config,
            provider,
            candidate,
            comparator,
            kill_switch,
            attribution,
            health,
        })
    }

    /// Fetch the snapshot for a subject and window, then decide on it.
    pub fn decide(&self, subject: &Subject, window: Window) -> VerdictResult<Decision> {
        let snapshot = self.provider.snapshot(subject, window)?;
        if snapshot.subject != *subject || snapshot.window != window {
            return Err(VerdictError::Provider(format!(
                "asked for {subject} ({window}), got {} ({})",
                snapshot.subject, snapshot.window
            )));
        }
        self.decide_snapshot(snapshot)
    }

    pub fn decide_snapshot(&self, snapshot: InputSnapshot) -> VerdictResult<Decision> {
        self.decide_snapshot_at(snapshot, now_ms())
    }

    /// Decide on a caller-supplied snapshot at an explicit time.
    pub fn decide_snapshot_at(&self, snapshot: InputSnapshot, now_ms: u64) -> VerdictResult<Decision> {
        if let Err(e) = snapshot.validate() {
            log::warn!("rejected snapshot for {} ({}): {e}", snapshot.subject, snapshot.window);
            return Err(e);
        }
        let snapshot = Arc::new(snapshot);
        let candidate = self.candidate.decide_at(&snapshot, now_ms)?;
        let (_, legacy) = self.comparator.compare_detailed(&snapshot, &candidate, now_ms);

        let metrics = self.comparator.metrics_at(now_ms);
        let triggered = match self.kill_switch.evaluate_at(&metrics, now_ms) {
            Ok(state) => state.is_triggered(),
            Err(e) => {
                log::error!("kill-switch evaluation failed, failing closed: {e}");
                true
            }
        };

        let served = if triggered {
            match legacy {
                Some(mut decision) => {
                    if decision.id.is_empty() {
                        decision.id = uuid::Uuid::new_v4().to_string();
                    }
                    decision
                }
                None => safe_fallback(&candidate),
            }
        } else {
            candidate
        };

        self.attribution.record_decision(&served);
        self.health.observe(&served);
        Ok(served)
    }

    pub fn resolve_outcome(&self, decision_id: &str, judgment: OutcomeJudgment) -> VerdictResult<Resolution> {
        self.attribution.resolve_outcome(decision_id, judgment)
    }

    pub fn health(&self) -> HealthReport {
        self.health
            .assess(&self.comparator.metrics(), &self.kill_switch)
    }

    pub fn shadow_summary(&self) -> VerdictResult<ShadowSummary> {
        Ok(ShadowSummary {
            metrics: self.comparator.metrics(),
            kill_switch: self.kill_switch.state()?,
            history: self.kill_switch.history()?,
        })
    }

    pub fn attribution_dashboard(&self) -> AttributionDashboard {
        self.attribution.dashboard()
    }

    /// Re-arm the kill-switch. A real TRIGGERED to ARMED transition also
    /// discards the drift window, so the samples that tripped the switch
    /// cannot trip it again on the next request.
    pub fn manual_reset(&self, operator: &str, note: &str) -> VerdictResult<KillSwitchState> {
        let was_triggered = self.kill_switch.is_triggered();
        let state = self.kill_switch.manual_reset(operator, note)?;
        if was_triggered && !state.is_triggered() {
            let dropped = self.comparator.clear();
            log::info!("drift window cleared after manual reset by {operator} ({dropped} samples)");
        }
        Ok(state)
    }

    /// Whether the candidate engine's decisions are currently served.
    pub fn is_candidate_authoritative(&self) -> bool {
        !self.kill_switch.is_triggered()
    }

    pub fn config(&self) -> &VerdictConfig {
        &self.config
    }

    pub fn candidate(&self) -> &DecisionEngine {
        &self.candidate
    }

    pub fn comparator(&self) -> &ShadowComparator {
        &self.comparator
    }

    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill_switch
    }

    pub fn attribution(&self) -> &AttributionTracker {
        &self.attribution
    }
}

/// NEUTRAL stand-in served when the candidate is demoted and the legacy
/// engine failed.
fn safe_fallback(candidate: &Decision) -> Decision {
    let mut fallback = candidate.clone();
    fallback.id = uuid::Uuid::new_v4().to_string();
    fallback.outcome = DecisionOutcome::Neutral;
    fallback.engine_version = EngineVersion::SafeFallback;
    fallback.verdicts.push(GateVerdict {
        gate_name: KILL_SWITCH_GATE.into(),
        status: GateStatus::Blocked,
        reason_text: "candidate demoted by kill switch, legacy engine unavailable".into(),
    });
    log::warn!(
        "serving safe fallback for {} ({})",
        candidate.subject,
        candidate.window
    );
    fallback
}
