// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Kill-Switch Controller
// ─────────────────────────────────────────────────────────────────────
//! ARMED/TRIGGERED state machine fed by shadow drift metrics.
//!
//! # Invariants
//!
//! 1. **No automatic recovery**: ARMED → TRIGGERED happens automatically
//!    on a breach. TRIGGERED → ARMED happens only through
//!    [`KillSwitch::manual_reset`], which records the operator.
//!
//! 2. **Minimum evidence**: breaches are not evaluated while the drift
//!    window holds fewer compared samples than configured, so a handful
//!    of early disagreements cannot trip the switch.
//!
//! 3. **Compare-and-swap only**: every transition is written through
//!    [`KillSwitchStore::compare_and_swap`] against the version that was
//!    read. Concurrent writers re-read and retry; a lost update is
//!    impossible.
//!
//! 4. **Fail closed**: if the store cannot be read, the candidate is
//!    treated as not authoritative.

use std::sync::Arc;

use parking_lot::Mutex;

use verdict_types::config::KillSwitchConfig;
use verdict_types::{
    DriftMetrics, KillSwitchState, KillSwitchStatus, TransitionSource, VerdictError,
    VerdictResult,
};

use crate::clock::now_ms;

pub const REASON_FLIP_RATE: &str = "decisionFlipRate_exceeded";
pub const REASON_AGREEMENT: &str = "agreementRate_below_floor";
pub const REASON_RISK_DELTA: &str = "avgRiskDelta_exceeded";

const MAX_CAS_ATTEMPTS: usize = 8;

/// Versioned storage for the kill-switch record.
pub trait KillSwitchStore: Send + Sync {
    /// Current record.
    fn load(&self) -> VerdictResult<KillSwitchState>;

    /// Write `next` if the current version equals `expected_version`.
    ///
    /// The store assigns `expected_version + 1` to the written record
    /// and returns it. A version mismatch yields
    /// [`VerdictError::StateConflict`].
    fn compare_and_swap(
        &self,
        expected_version: u64,
        next: KillSwitchState,
    ) -> VerdictResult<KillSwitchState>;

    /// Every record ever written, oldest first.
    fn history(&self) -> VerdictResult<Vec<KillSwitchState>>;
}

/// Append-only in-memory store. The last log entry is the current state.
pub struct InMemoryKillSwitchStore {
    log: Mutex<Vec<KillSwitchState>>,
}

impl InMemoryKillSwitchStore {
    pub fn new(initial: KillSwitchState) -> Self {
        Self {
            log: Mutex::new(vec![initial]),
        }
    }
}

impl Default for InMemoryKillSwitchStore {
    fn default() -> Self {
        Self::new(KillSwitchState::initial(now_ms()))
    }
}

impl KillSwitchStore for InMemoryKillSwitchStore {
    fn load(&self) -> VerdictResult<KillSwitchState> {
        self.log
            .lock()
            .last()
            .cloned()
            .ok_or_else(|| VerdictError::NotFound("kill-switch record".into()))
    }

    fn compare_and_swap(
        &self,
        expected_version: u64,
        mut next: KillSwitchState,
    ) -> VerdictResult<KillSwitchState> {
        let mut log = self.log.lock();
        let actual = log.last().map_or(0, |s| s.version);
        if actual != expected_version {
            return Err(VerdictError::StateConflict {
                expected: expected_version,
                actual,
            });
        }
        next.version = expected_version + 1;
        log.push(next.clone());
        Ok(next)
    }

    fn history(&self) -> VerdictResult<Vec<KillSwitchState>> {
        Ok(self.log.lock().clone())
    }
}

pub struct KillSwitch {
    config: KillSwitchConfig,
    store: Arc<dyn KillSwitchStore>,
}

impl KillSwitch {
    pub fn new(config: KillSwitchConfig, store: Arc<dyn KillSwitchStore>) -> Self {
        Self { config, store }
    }

    pub fn in_memory(config: KillSwitchConfig) -> Self {
        Self::new(config, Arc::new(InMemoryKillSwitchStore::default()))
    }

    /// Breach reasons for a drift projection, empty when healthy or when
    /// the window is too small to judge.
    pub fn breaches(&self, metrics: &DriftMetrics) -> Vec<String> {
        let c = &self.config;
        let mut reasons = Vec::new();
        if metrics.sample_count < c.min_samples {
            return reasons;
        }
        if metrics.decision_flip_rate > c.max_flip_rate {
            reasons.push(format!(
                "{REASON_FLIP_RATE} ({:.4} > {})",
                metrics.decision_flip_rate, c.max_flip_rate
            ));
        }
        if metrics.agreement_rate < c.min_agreement_rate {
            reasons.push(format!(
                "{REASON_AGREEMENT} ({:.4} < {})",
                metrics.agreement_rate, c.min_agreement_rate
            ));
        }
        if metrics.avg_risk_delta > c.max_avg_risk_delta {
            reasons.push(format!(
                "{REASON_RISK_DELTA} ({:.2} > {})",
                metrics.avg_risk_delta, c.max_avg_risk_delta
            ));
        }
        reasons
    }

    pub fn evaluate(&self, metrics: &DriftMetrics) -> VerdictResult<KillSwitchState> {
        self.evaluate_at(metrics, now_ms())
    }

    /// Trip the switch if the metrics breach a ceiling. Returns the state
    /// after evaluation; an already-triggered switch is left alone.
    pub fn evaluate_at(&self, metrics: &DriftMetrics, at_ms: u64) -> VerdictResult<KillSwitchState> {
        let reasons = self.breaches(metrics);
        let mut conflict = None;
        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self.store.load()?;
            if current.is_triggered() || reasons.is_empty() {
                return Ok(current);
            }
            let next = KillSwitchState {
                status: KillSwitchStatus::Triggered,
                reasons: reasons.clone(),
                transitioned_at_ms: at_ms,
                transitioned_by: TransitionSource::Auto,
                operator: None,
                version: current.version,
            };
            match self.store.compare_and_swap(current.version, next) {
                Ok(state) => {
                    log::error!(
                        ">>> KILL SWITCH TRIGGERED: candidate engine demoted ({}) <<<",
                        state.reasons.join("; ")
                    );
                    return Ok(state);
                }
                Err(e @ VerdictError::StateConflict { .. }) => conflict = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(conflict.unwrap_or(VerdictError::StateConflict {
            expected: 0,
            actual: 0,
        }))
    }

    pub fn manual_reset(&self, operator: &str, note: &str) -> VerdictResult<KillSwitchState> {
        self.manual_reset_at(operator, note, now_ms())
    }

    /// Re-arm a triggered switch. Resetting an armed switch is a no-op
    /// that returns the current state.
    pub fn manual_reset_at(
        &self,
        operator: &str,
        note: &str,
        at_ms: u64,
    ) -> VerdictResult<KillSwitchState> {
        let operator = operator.trim();
        if operator.is_empty() {
            return Err(VerdictError::Validation(
                "manual reset requires an operator identity".into(),
            ));
        }
        let reason = if note.trim().is_empty() {
            "manual_reset".to_string()
        } else {
            format!("manual_reset: {}", note.trim())
        };

        let mut conflict = None;
        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self.store.load()?;
            if !current.is_triggered() {
                log::info!("kill switch already armed; reset by {operator} ignored");
                return Ok(current);
            }
            let next = KillSwitchState {
                status: KillSwitchStatus::Armed,
                reasons: vec![reason.clone()],
                transitioned_at_ms: at_ms,
                transitioned_by: TransitionSource::Manual,
                operator: Some(operator.to_string()),
                version: current.version,
            };
            match self.store.compare_and_swap(current.version, next) {
                Ok(state) => {
                    log::info!("kill switch re-armed by {operator}");
                    return Ok(state);
                }
                Err(e @ VerdictError::StateConflict { .. }) => conflict = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(conflict.unwrap_or(VerdictError::StateConflict {
            expected: 0,
            actual: 0,
        }))
    }

    pub fn state(&self) -> VerdictResult<KillSwitchState> {
        self.store.load()
    }

    pub fn history(&self) -> VerdictResult<Vec<KillSwitchState>> {
        self.store.history()
    }

    /// Whether the candidate engine is demoted. Unreadable state counts
    /// as triggered.
    pub fn is_triggered(&self) -> bool {
        match self.store.load() {
            Ok(state) => state.is_triggered(),
            Err(e) => {
                log::error!("kill-switch state unreadable, failing closed: {e}");
                true
            }
        }
    }

    pub fn config(&self) -> &KillSwitchConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(samples: usize, agreeing: usize, avg_risk_delta: f64) -> DriftMetrics {
        let agreement = agreeing as f64 / samples as f64;
        DriftMetrics {
            agreement_rate: agreement,
            decision_flip_rate: 1.0 - agreement,
            avg_risk_delta,
            sample_count: samples,
            skipped_count: 0,
            window_start_ms: 1,
            window_end_ms: 2,
        }
    }

    fn switch() -> KillSwitch {
        KillSwitch::new(
            KillSwitchConfig::default(),
            Arc::new(InMemoryKillSwitchStore::new(KillSwitchState::initial(1))),
        )
    }

    #[test]
    fn test_initial_state_armed() {
        let ks = switch();
        let state = ks.state().unwrap();
        assert_eq!(state.status, KillSwitchStatus::Armed);
        assert_eq!(state.version, 0);
        assert!(!ks.is_triggered());
    }

    #[test]
    fn test_healthy_metrics_stay_armed() {
        let ks = switch();
        let state = ks.evaluate_at(&metrics(100, 97, 3.0), 10).unwrap();
        assert_eq!(state.status, KillSwitchStatus::Armed);
        assert_eq!(ks.history().unwrap().len(), 1);
    }

    #[test]
    fn test_flip_rate_breach_triggers() {
        let ks = switch();
        let state = ks.evaluate_at(&metrics(50, 30, 3.0), 10).unwrap();
        assert!(state.is_triggered());
        assert_eq!(state.transitioned_by, TransitionSource::Auto);
        assert_eq!(state.transitioned_at_ms, 10);
        assert_eq!(state.version, 1);
        assert!(state.reasons[0].starts_with(REASON_FLIP_RATE));
        assert!(state.reasons.iter().any(|r| r.starts_with(REASON_AGREEMENT)));
        assert!(ks.is_triggered());
    }

    #[test]
    fn test_risk_delta_breach_alone() {
        let ks = switch();
        let state = ks.evaluate_at(&metrics(100, 100, 35.0), 10).unwrap();
        assert!(state.is_triggered());
        assert_eq!(state.reasons.len(), 1);
        assert!(state.reasons[0].starts_with(REASON_RISK_DELTA));
    }

    #[test]
    fn test_insufficient_samples_never_trigger() {
        let ks = switch();
        let state = ks.evaluate_at(&metrics(29, 0, 100.0), 10).unwrap();
        assert_eq!(state.status, KillSwitchStatus::Armed);
        assert!(ks.breaches(&metrics(29, 0, 100.0)).is_empty());
    }

    #[test]
    fn test_no_auto_revert() {
        let ks = switch();
        ks.evaluate_at(&metrics(50, 30, 0.0), 10).unwrap();
        let state = ks.evaluate_at(&metrics(100, 100, 0.0), 20).unwrap();
        assert!(state.is_triggered());
        assert_eq!(state.transitioned_at_ms, 10);
        assert_eq!(ks.history().unwrap().len(), 2);
    }

    #[test]
    fn test_manual_reset_rearms() {
        let ks = switch();
        ks.evaluate_at(&metrics(50, 30, 0.0), 10).unwrap();
        let state = ks.manual_reset_at("alice", "v2 hotfix deployed", 30).unwrap();
        assert_eq!(state.status, KillSwitchStatus::Armed);
        assert_eq!(state.transitioned_by, TransitionSource::Manual);
        assert_eq!(state.operator.as_deref(), Some("alice"));
        assert_eq!(state.reasons, vec!["manual_reset: v2 hotfix deployed".to_string()]);
        assert_eq!(state.version, 2);

        let history = ks.history().unwrap();
        assert_eq!(history.len(), 3);
        let versions: Vec<u64> = history.iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![0, 1, 2]);
    }

    #[test]
    fn test_manual_reset_when_armed_is_noop() {
        let ks = switch();
        let state = ks.manual_reset_at("bob", "", 5).unwrap();
        assert_eq!(state.version, 0);
        assert_eq!(ks.history().unwrap().len(), 1);
    }

    #[test]
    fn test_manual_reset_requires_operator() {
        let ks = switch();
        ks.evaluate_at(&metrics(50, 30, 0.0), 10).unwrap();
        let err = ks.manual_reset_at("  ", "note", 30).unwrap_err();
        assert!(matches!(err, VerdictError::Validation(_)));
        assert!(ks.is_triggered());
    }

    #[test]
    fn test_store_rejects_stale_version() {
        let store = InMemoryKillSwitchStore::new(KillSwitchState::initial(1));
        let next = KillSwitchState::initial(2);
        store.compare_and_swap(0, next.clone()).unwrap();
        let err = store.compare_and_swap(0, next).unwrap_err();
        assert!(matches!(
            err,
            VerdictError::StateConflict {
                expected: 0,
                actual: 1
            }
        ));
    }

    struct BrokenStore;

    impl KillSwitchStore for BrokenStore {
        fn load(&self) -> VerdictResult<KillSwitchState> {
            Err(VerdictError::Backend("store offline".into()))
        }
        fn compare_and_swap(&self, _: u64, _: KillSwitchState) -> VerdictResult<KillSwitchState> {
            Err(VerdictError::Backend("store offline".into()))
        }
        fn history(&self) -> VerdictResult<Vec<KillSwitchState>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_unreadable_store_fails_closed() {
        let ks = KillSwitch::new(KillSwitchConfig::default(), Arc::new(BrokenStore));
        assert!(ks.is_triggered());
        assert!(ks.evaluate_at(&metrics(100, 100, 0.0), 1).is_err());
    }

    #[test]
    fn test_concurrent_evaluations_single_transition() {
        let ks = Arc::new(switch());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ks = Arc::clone(&ks);
                std::thread::spawn(move || ks.evaluate_at(&metrics(50, 30, 0.0), 100 + i).unwrap())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap().is_triggered());
        }
        assert_eq!(ks.history().unwrap().len(), 2);
    }
}
