// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Shadow Comparator
// ─────────────────────────────────────────────────────────────────────
//! Runs the legacy engine beside the candidate on the identical snapshot
//! and keeps a trailing window of comparison samples.
//!
//! The legacy call runs on a worker thread bounded by the configured
//! deadline. An error, timeout, or panic inside the legacy engine
//! produces a skipped sample, which is kept for auditing but never
//! counted as drift. Workers that outlive their deadline keep counting
//! against `legacy_max_in_flight`; once the cap is reached, compares are
//! skipped without spawning until a worker returns.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use verdict_types::config::ShadowConfig;
use verdict_types::{
    ComparisonSample, Decision, DriftMetrics, InputSnapshot, SampleStatus, VerdictError,
    VerdictResult,
};

use crate::backend::DecisionBackend;
use crate::clock::now_ms;

pub struct ShadowComparator {
    legacy: Arc<dyn DecisionBackend>,
    candidate: Arc<dyn DecisionBackend>,
    config: ShadowConfig,
    samples: Mutex<VecDeque<ComparisonSample>>,
    in_flight: Arc<AtomicUsize>,
}

/// Releases one in-flight legacy slot when dropped, including when the
/// legacy engine panics.
struct InFlightSlot(Arc<AtomicUsize>);

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ShadowComparator {
    pub fn new(
        legacy: Arc<dyn DecisionBackend>,
        candidate: Arc<dyn DecisionBackend>,
        config: ShadowConfig,
    ) -> Self {
        let capacity = config.window_max_samples.unwrap_or(256);
        Self {
            legacy,
            candidate,
            config,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run both engines on the snapshot and record the sample.
    ///
    /// Only a candidate failure is an error; legacy failures are
    /// recorded as skipped samples.
    pub fn compare(&self, snapshot: Arc<InputSnapshot>) -> VerdictResult<ComparisonSample> {
        let candidate = self.candidate.decide(&snapshot)?;
        Ok(self.compare_with(&snapshot, &candidate))
    }

    /// Compare an already-computed candidate decision for this snapshot
    /// against the legacy engine and record the sample.
    pub fn compare_with(&self, snapshot: &Arc<InputSnapshot>, candidate: &Decision) -> ComparisonSample {
        self.compare_detailed(snapshot, candidate, now_ms()).0
    }

    /// Like [`compare_with`](Self::compare_with), also handing back the
    /// legacy decision when one was produced.
    pub(crate) fn compare_detailed(
        &self,
        snapshot: &Arc<InputSnapshot>,
        candidate: &Decision,
        captured_at_ms: u64,
    ) -> (ComparisonSample, Option<Decision>) {
        let (sample, legacy) = match self.run_legacy(snapshot) {
            Ok(legacy) => {
                let sample = ComparisonSample {
                    subject: snapshot.subject.clone(),
                    window: snapshot.window,
                    as_of_ms: snapshot.as_of_ms,
                    v1_decision: Some(legacy.outcome),
                    v2_decision: candidate.outcome,
                    agree: legacy.outcome == candidate.outcome,
                    risk_delta: (f64::from(candidate.scores.risk) - f64::from(legacy.scores.risk))
                        .abs(),
                    status: SampleStatus::Compared,
                    captured_at_ms,
                };
                (sample, Some(legacy))
            }
            Err(e) => {
                log::warn!(
                    "shadow comparison skipped for {} ({}): {e}",
                    snapshot.subject,
                    snapshot.window
                );
                let sample = ComparisonSample {
                    subject: snapshot.subject.clone(),
                    window: snapshot.window,
                    as_of_ms: snapshot.as_of_ms,
                    v1_decision: None,
                    v2_decision: candidate.outcome,
                    agree: false,
                    risk_delta: 0.0,
                    status: SampleStatus::Skipped {
                        reason: e.to_string(),
                    },
                    captured_at_ms,
                };
                (sample, None)
            }
        };
        self.record(sample.clone());
        (sample, legacy)
    }

    fn run_legacy(&self, snapshot: &Arc<InputSnapshot>) -> VerdictResult<Decision> {
        let deadline_ms = self.config.legacy_deadline_ms;
        let slot = self.acquire_slot()?;
        let (tx, rx) = mpsc::channel();
        let legacy = Arc::clone(&self.legacy);
        let snap = Arc::clone(snapshot);
        thread::Builder::new()
            .name("verdict-legacy".into())
            .spawn(move || {
                let _slot = slot;
                // Receiver may have timed out already.
                let _ = tx.send(legacy.decide(&snap));
            })
            .map_err(|e| VerdictError::Backend(format!("legacy worker spawn failed: {e}")))?;

        match rx.recv_timeout(Duration::from_millis(deadline_ms)) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(VerdictError::Timeout { deadline_ms }),
            Err(RecvTimeoutError::Disconnected) => Err(VerdictError::Backend(
                "legacy worker exited without a result".into(),
            )),
        }
    }

    fn acquire_slot(&self) -> VerdictResult<InFlightSlot> {
        let max = self.config.legacy_max_in_flight;
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current >= max {
                return Err(VerdictError::Backend(format!(
                    "legacy saturated: {current} calls in flight (max {max})"
                )));
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(InFlightSlot(Arc::clone(&self.in_flight))),
                Err(actual) => current = actual,
            }
        }
    }

    /// Legacy calls currently running, including ones past their deadline.
    pub fn legacy_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Append a sample and prune the window by count and age.
    ///
    /// Samples arrive in lock order, not strictly in capture order, so
    /// age pruning scans the whole window.
    pub fn record(&self, sample: ComparisonSample) {
        let mut samples = self.samples.lock();
        samples.push_back(sample);
        if let Some(max) = self.config.window_max_samples {
            while samples.len() > max {
                samples.pop_front();
            }
        }
        if let Some(newest) = samples.iter().map(|s| s.captured_at_ms).max() {
            self.prune_by_age(&mut samples, newest);
        }
    }

    fn prune_by_age(&self, samples: &mut VecDeque<ComparisonSample>, now_ms: u64) {
        if let Some(max_age) = self.config.window_max_age_ms {
            let cutoff = now_ms.saturating_sub(max_age);
            samples.retain(|s| s.captured_at_ms >= cutoff);
        }
    }

    /// Drop every sample, starting a fresh drift window.
    pub fn clear(&self) -> usize {
        let mut samples = self.samples.lock();
        let dropped = samples.len();
        samples.clear();
        dropped
    }

    pub fn metrics(&self) -> DriftMetrics {
        self.metrics_at(now_ms())
    }

    /// Drift metrics over the trailing window as seen at `now_ms`.
    pub fn metrics_at(&self, now_ms: u64) -> DriftMetrics {
        let mut samples = self.samples.lock();
        self.prune_by_age(&mut samples, now_ms);
        compute_metrics(samples.iter())
    }

    /// Copy of the samples currently in the window, oldest first.
    pub fn samples(&self) -> Vec<ComparisonSample> {
        self.samples.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }
}

/// Project drift metrics from a run of samples. Skipped samples only
/// move the skip count and the window bounds.
pub fn compute_metrics<'a>(samples: impl IntoIterator<Item = &'a ComparisonSample>) -> DriftMetrics {
    let mut metrics = DriftMetrics::default();
    let mut agreements = 0usize;
    let mut risk_delta_sum = 0.0;
    let mut start: Option<u64> = None;
    let mut end: Option<u64> = None;

    for sample in samples {
        start = Some(start.map_or(sample.captured_at_ms, |s| s.min(sample.captured_at_ms)));
        end = Some(end.map_or(sample.captured_at_ms, |e| e.max(sample.captured_at_ms)));
        if sample.is_skipped() {
            metrics.skipped_count += 1;
            continue;
        }
        metrics.sample_count += 1;
        if sample.agree {
            agreements += 1;
        }
        risk_delta_sum += sample.risk_delta;
    }

    if metrics.sample_count > 0 {
        let n = metrics.sample_count as f64;
        metrics.agreement_rate = agreements as f64 / n;
        metrics.decision_flip_rate = 1.0 - metrics.agreement_rate;
        metrics.avg_risk_delta = risk_delta_sum / n;
    }
    metrics.window_start_ms = start.unwrap_or(0);
    metrics.window_end_ms = end.unwrap_or(0);
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ExternalBackend;
    use crate::engine::DecisionEngine;
    use verdict_types::{
        DecisionOutcome, EngineVersion, Polarity, RawSignal, Subject, VerdictConfig, Window,
    };

    const AS_OF: u64 = 1_700_000_000_000;

    fn snapshot() -> Arc<InputSnapshot> {
        Arc::new(
            InputSnapshot::new(Subject::token("JUP"), Window::Hour1, AS_OF)
                .with_signal(RawSignal::new("flow", Polarity::Bullish, 0.8, 0.9, AS_OF)),
        )
    }

    fn candidate() -> Arc<dyn DecisionBackend> {
        Arc::new(DecisionEngine::default())
    }

    fn legacy_with(outcome: DecisionOutcome, risk: u8) -> Arc<dyn DecisionBackend> {
        let engine = DecisionEngine::new(EngineVersion::V1, &VerdictConfig::default());
        Arc::new(ExternalBackend::new(EngineVersion::V1, move |snap| {
            let mut d = engine.decide_at(snap, 1)?;
            d.outcome = outcome;
            d.scores.risk = risk;
            Ok(d)
        }))
    }

    fn sample(agree: bool, risk_delta: f64, at: u64) -> ComparisonSample {
        ComparisonSample {
            subject: Subject::token("JUP"),
            window: Window::Hour1,
            as_of_ms: AS_OF,
            v1_decision: Some(DecisionOutcome::Buy),
            v2_decision: if agree { DecisionOutcome::Buy } else { DecisionOutcome::Sell },
            agree,
            risk_delta,
            status: SampleStatus::Compared,
            captured_at_ms: at,
        }
    }

    fn skipped(at: u64) -> ComparisonSample {
        ComparisonSample {
            v1_decision: None,
            agree: false,
            status: SampleStatus::Skipped {
                reason: "timeout".into(),
            },
            ..sample(false, 0.0, at)
        }
    }

    fn config(max_samples: Option<usize>, max_age_ms: Option<u64>) -> ShadowConfig {
        ShadowConfig {
            window_max_samples: max_samples,
            window_max_age_ms: max_age_ms,
            legacy_deadline_ms: 100,
            legacy_max_in_flight: 4,
        }
    }

    #[test]
    fn test_compare_agreeing_engines() {
        let v2 = DecisionEngine::default();
        let expected = v2.decide_at(&snapshot(), 1).unwrap();
        let cmp = ShadowComparator::new(
            legacy_with(expected.outcome, expected.scores.risk + 5),
            candidate(),
            ShadowConfig::default(),
        );
        let sample = cmp.compare(snapshot()).unwrap();
        assert_eq!(sample.status, SampleStatus::Compared);
        assert!(sample.agree);
        assert_eq!(sample.v1_decision, Some(expected.outcome));
        assert!((sample.risk_delta - 5.0).abs() < 1e-9);
        assert_eq!(cmp.len(), 1);
    }

    #[test]
    fn test_compare_with_disagreement() {
        let v2 = DecisionEngine::default().decide_at(&snapshot(), 1).unwrap();
        let flipped = if v2.outcome == DecisionOutcome::Sell {
            DecisionOutcome::Buy
        } else {
            DecisionOutcome::Sell
        };
        let cmp = ShadowComparator::new(
            legacy_with(flipped, v2.scores.risk),
            candidate(),
            ShadowConfig::default(),
        );
        let sample = cmp.compare_with(&snapshot(), &v2);
        assert!(!sample.agree);
        assert_eq!(sample.v2_decision, v2.outcome);
    }

    #[test]
    fn test_legacy_error_skips() {
        let legacy: Arc<dyn DecisionBackend> = Arc::new(ExternalBackend::new(EngineVersion::V1, |_| {
            Err(VerdictError::Backend("v1 down".into()))
        }));
        let cmp = ShadowComparator::new(legacy, candidate(), ShadowConfig::default());
        let sample = cmp.compare(snapshot()).unwrap();
        assert!(sample.is_skipped());
        assert_eq!(sample.v1_decision, None);
        let metrics = cmp.metrics_at(sample.captured_at_ms);
        assert_eq!(metrics.sample_count, 0);
        assert_eq!(metrics.skipped_count, 1);
    }

    #[test]
    fn test_legacy_timeout_skips() {
        let legacy: Arc<dyn DecisionBackend> = Arc::new(ExternalBackend::new(EngineVersion::V1, |snap| {
            thread::sleep(Duration::from_millis(500));
            DecisionEngine::default().decide_at(snap, 1)
        }));
        let cmp = ShadowComparator::new(legacy, candidate(), config(Some(10), None));
        let sample = cmp.compare(snapshot()).unwrap();
        match &sample.status {
            SampleStatus::Skipped { reason } => assert!(reason.contains("100ms")),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn test_legacy_panic_skips() {
        let legacy: Arc<dyn DecisionBackend> = Arc::new(ExternalBackend::new(EngineVersion::V1, |_| {
            panic!("legacy exploded")
        }));
        let cmp = ShadowComparator::new(legacy, candidate(), ShadowConfig::default());
        let sample = cmp.compare(snapshot()).unwrap();
        assert!(sample.is_skipped());
    }

    #[test]
    fn test_candidate_error_propagates() {
        let cmp = ShadowComparator::new(candidate(), candidate(), ShadowConfig::default());
        let bad = Arc::new(InputSnapshot::new(Subject::token(""), Window::Hour1, AS_OF));
        assert!(cmp.compare(bad).is_err());
        assert!(cmp.is_empty());
    }

    #[test]
    fn test_metrics_97_of_100_agree() {
        let samples: Vec<_> = (0..100).map(|i| sample(i >= 3, 2.0, AS_OF + i)).collect();
        let metrics = compute_metrics(&samples);
        assert_eq!(metrics.sample_count, 100);
        assert!((metrics.agreement_rate - 0.97).abs() < 1e-9);
        assert!((metrics.decision_flip_rate - 0.03).abs() < 1e-9);
        assert!((metrics.avg_risk_delta - 2.0).abs() < 1e-9);
        assert_eq!(metrics.window_start_ms, AS_OF);
        assert_eq!(metrics.window_end_ms, AS_OF + 99);
    }

    #[test]
    fn test_metrics_exclude_skipped() {
        let samples = vec![sample(true, 4.0, 1), skipped(2), sample(false, 0.0, 3)];
        let metrics = compute_metrics(&samples);
        assert_eq!(metrics.sample_count, 2);
        assert_eq!(metrics.skipped_count, 1);
        assert!((metrics.agreement_rate - 0.5).abs() < 1e-9);
        assert!((metrics.avg_risk_delta - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_metrics_default() {
        let metrics = compute_metrics(&Vec::<ComparisonSample>::new());
        assert_eq!(metrics, DriftMetrics::default());
    }

    #[test]
    fn test_window_bounded_by_count() {
        let cmp = ShadowComparator::new(candidate(), candidate(), config(Some(5), None));
        for i in 0..12 {
            cmp.record(sample(true, 0.0, AS_OF + i));
        }
        assert_eq!(cmp.len(), 5);
        assert_eq!(cmp.samples()[0].captured_at_ms, AS_OF + 7);
    }

    #[test]
    fn test_window_bounded_by_age() {
        let cmp = ShadowComparator::new(candidate(), candidate(), config(None, Some(1_000)));
        cmp.record(sample(false, 0.0, AS_OF));
        cmp.record(sample(true, 0.0, AS_OF + 500));
        cmp.record(sample(true, 0.0, AS_OF + 1_200));
        assert_eq!(cmp.len(), 2);
        let metrics = cmp.metrics_at(AS_OF + 1_200);
        assert_eq!(metrics.sample_count, 2);
        assert!((metrics.agreement_rate - 1.0).abs() < 1e-9);
        // Aging out on read as well
        let later = cmp.metrics_at(AS_OF + 2_100);
        assert_eq!(later.sample_count, 1);
    }

    #[test]
    fn test_out_of_order_stale_sample_pruned() {
        let cmp = ShadowComparator::new(candidate(), candidate(), config(None, Some(1_000)));
        cmp.record(sample(true, 0.0, AS_OF + 1_000));
        cmp.record(sample(true, 0.0, AS_OF + 5_000));
        // Captured early, recorded late
        cmp.record(sample(false, 0.0, AS_OF + 100));
        assert_eq!(cmp.len(), 1);
        let metrics = cmp.metrics_at(AS_OF + 5_000);
        assert_eq!(metrics.sample_count, 1);
        assert!((metrics.agreement_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_hung_legacy_caps_worker_threads() {
        let legacy: Arc<dyn DecisionBackend> = Arc::new(ExternalBackend::new(EngineVersion::V1, |snap| {
            thread::sleep(Duration::from_millis(300));
            DecisionEngine::default().decide_at(snap, 1)
        }));
        let cfg = ShadowConfig {
            legacy_deadline_ms: 5,
            ..config(Some(100), None)
        };
        let cmp = ShadowComparator::new(legacy, candidate(), cfg);
        let mut saturated = 0;
        for _ in 0..50 {
            let sample = cmp.compare(snapshot()).unwrap();
            assert!(sample.is_skipped());
            if let SampleStatus::Skipped { reason } = &sample.status {
                if reason.contains("legacy saturated") {
                    saturated += 1;
                }
            }
            assert!(cmp.legacy_in_flight() <= 4);
        }
        // Only the first four compares spawned a worker
        assert_eq!(saturated, 46);
        assert_eq!(cmp.metrics_at(AS_OF).skipped_count, 50);
    }

    #[test]
    fn test_in_flight_slots_released() {
        let cmp = ShadowComparator::new(legacy_with(DecisionOutcome::Buy, 0), candidate(), config(Some(10), None));
        for _ in 0..10 {
            cmp.compare(snapshot()).unwrap();
        }
        // Worker drops its slot after sending; give it a moment to exit.
        for _ in 0..100 {
            if cmp.legacy_in_flight() == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(cmp.legacy_in_flight(), 0);
        assert_eq!(cmp.metrics_at(AS_OF).sample_count, 10);
    }

    #[test]
    fn test_clear_starts_fresh_window() {
        let cmp = ShadowComparator::new(candidate(), candidate(), config(Some(10), None));
        for i in 0..4 {
            cmp.record(sample(false, 0.0, AS_OF + i));
        }
        assert_eq!(cmp.clear(), 4);
        assert!(cmp.is_empty());
        assert_eq!(cmp.metrics_at(AS_OF + 10), DriftMetrics::default());
    }
}
