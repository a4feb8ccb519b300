// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Attribution Tracker
// ─────────────────────────────────────────────────────────────────────
//! Joins decisions with their eventual ground-truth outcomes.
//!
//! Three projections are maintained:
//! - per-signal effectiveness (atomic counters, updated on resolution),
//! - confidence calibration buckets per (decision × confidence range),
//! - an ML-readiness checklist over the resolved history.
//!
//! Recording is append-only and resolution is exactly-once: the
//! check-and-set on a record happens under the record-map lock, so a
//! racing second resolution observes the first and returns it.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use verdict_types::config::AttributionConfig;
use verdict_types::{
    AttributionDashboard, AttributionRecord, AttributionSummary, CalibrationBucket,
    CalibrationStatus, Decision, DecisionOutcome, MlReadiness, OutcomeJudgment, ReadinessCheck,
    Reliability, Resolution, SignalContribution, SignalEffectiveness, VerdictError,
    VerdictResult,
};

use crate::clock::now_ms;

pub const CHECK_MIN_RESOLVED: &str = "min_resolved_samples";
pub const CHECK_CALIBRATION: &str = "calibration_error";
pub const CHECK_SIGNAL_COVERAGE: &str = "signal_reliability_coverage";
pub const CHECK_TIME_SPAN: &str = "data_time_span";
pub const CHECK_OUTCOME_BALANCE: &str = "outcome_balance";
pub const CHECK_DIRECTIONAL: &str = "directional_coverage";

/// Contributions are accumulated in millionths so they fit an atomic.
const CONTRIBUTION_SCALE: f64 = 1_000_000.0;

const DAY_MS: f64 = 86_400_000.0;

#[derive(Debug, Default)]
struct SignalCounters {
    total: AtomicU64,
    success: AtomicU64,
    fail: AtomicU64,
    contribution_micros: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy)]
struct BucketAccum {
    samples: u64,
    successes: u64,
    confidence_sum: f64,
}

pub struct AttributionTracker {
    config: AttributionConfig,
    records: Mutex<HashMap<String, AttributionRecord>>,
    signals: RwLock<HashMap<String, Arc<SignalCounters>>>,
}

impl AttributionTracker {
    pub fn new(config: AttributionConfig) -> Self {
        Self {
            config,
            records: Mutex::new(HashMap::new()),
            signals: RwLock::new(HashMap::new()),
        }
    }

    /// Record a decision for later resolution. Returns `false` when the
    /// id was already recorded; the earlier record is kept.
    pub fn record_decision(&self, decision: &Decision) -> bool {
        let mut records = self.records.lock();
        if records.contains_key(&decision.id) {
            log::warn!("decision {} already recorded, ignoring duplicate", decision.id);
            return false;
        }
        records.insert(
            decision.id.clone(),
            AttributionRecord {
                decision_id: decision.id.clone(),
                subject: decision.subject.clone(),
                window: decision.window,
                outcome: decision.outcome,
                confidence_score: decision.confidence.score,
                signals: decision.signals.clone(),
                recorded_at_ms: decision.created_at_ms,
                resolution: None,
            },
        );
        true
    }

    pub fn resolve_outcome(&self, decision_id: &str, judgment: OutcomeJudgment) -> VerdictResult<Resolution> {
        self.resolve_outcome_at(decision_id, judgment, now_ms())
    }

    /// Attach the ground-truth judgment to a decision, exactly once.
    ///
    /// A repeated call is a no-op returning the first resolution.
    pub fn resolve_outcome_at(
        &self,
        decision_id: &str,
        judgment: OutcomeJudgment,
        at_ms: u64,
    ) -> VerdictResult<Resolution> {
        let (resolution, signals) = {
            let mut records = self.records.lock();
            let record = records
                .get_mut(decision_id)
                .ok_or_else(|| VerdictError::NotFound(format!("decision {decision_id}")))?;
            if let Some(existing) = record.resolution {
                log::info!("decision {decision_id} already resolved as {:?}", existing.judgment);
                return Ok(existing);
            }
            let resolution = Resolution {
                judgment,
                resolved_at_ms: at_ms,
            };
            record.resolution = Some(resolution);
            (resolution, record.signals.clone())
        };

        for signal in &signals {
            self.count_signal(signal, judgment);
        }
        Ok(resolution)
    }

    fn count_signal(&self, signal: &SignalContribution, judgment: OutcomeJudgment) {
        if !signal.contribution.is_finite() {
            log::warn!(
                "skipping signal {} with non-finite contribution {}",
                signal.name,
                signal.contribution
            );
            return;
        }
        let counters = self.counters(&signal.name);
        counters.total.fetch_add(1, Ordering::Relaxed);
        match judgment {
            OutcomeJudgment::Success => counters.success.fetch_add(1, Ordering::Relaxed),
            OutcomeJudgment::Fail => counters.fail.fetch_add(1, Ordering::Relaxed),
        };
        let micros = (signal.contribution.max(0.0) * CONTRIBUTION_SCALE).round() as u64;
        counters.contribution_micros.fetch_add(micros, Ordering::Relaxed);
    }

    fn counters(&self, name: &str) -> Arc<SignalCounters> {
        if let Some(c) = self.signals.read().get(name) {
            return Arc::clone(c);
        }
        Arc::clone(self.signals.write().entry(name.to_string()).or_default())
    }

    pub fn record(&self, decision_id: &str) -> Option<AttributionRecord> {
        self.records.lock().get(decision_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    // ── Effectiveness ───────────────────────────────────────────────

    /// Per-signal effectiveness, sorted by signal name.
    pub fn signal_effectiveness(&self) -> Vec<SignalEffectiveness> {
        let signals = self.signals.read();
        let mut out: Vec<SignalEffectiveness> = signals
            .iter()
            .map(|(name, c)| {
                let total = c.total.load(Ordering::Relaxed);
                let success_count = c.success.load(Ordering::Relaxed);
                let fail_count = c.fail.load(Ordering::Relaxed);
                let micros = c.contribution_micros.load(Ordering::Relaxed);
                let success_rate = ratio(success_count, total);
                let avg_contribution = if total > 0 {
                    micros as f64 / CONTRIBUTION_SCALE / total as f64
                } else {
                    0.0
                };
                SignalEffectiveness {
                    signal_name: name.clone(),
                    total_occurrences: total,
                    success_count,
                    fail_count,
                    success_rate,
                    avg_contribution,
                    reliability: self.reliability(total, success_rate),
                }
            })
            .collect();
        out.sort_by(|a, b| a.signal_name.cmp(&b.signal_name));
        out
    }

    fn reliability(&self, samples: u64, success_rate: f64) -> Reliability {
        let c = &self.config;
        if samples < c.min_signal_samples {
            Reliability::Low
        } else if success_rate >= c.high_success_rate {
            Reliability::High
        } else if success_rate >= c.medium_success_rate {
            Reliability::Medium
        } else {
            Reliability::Low
        }
    }

    // ── Calibration ─────────────────────────────────────────────────

    pub fn confidence_calibration(&self) -> Vec<CalibrationBucket> {
        let resolved = self.resolved_records();
        self.calibration_buckets(&resolved)
    }

    fn calibration_buckets(&self, resolved: &[AttributionRecord]) -> Vec<CalibrationBucket> {
        let width = u16::from(self.config.bucket_width.max(1));
        let bucket_count = (100 + width - 1) / width;
        let mut cells: BTreeMap<(usize, u16), BucketAccum> = BTreeMap::new();

        for record in resolved {
            let Some(resolution) = record.resolution else {
                continue;
            };
            let idx = (u16::from(record.confidence_score) / width).min(bucket_count - 1);
            let cell = cells
                .entry((outcome_rank(record.outcome), idx))
                .or_default();
            cell.samples += 1;
            if resolution.judgment == OutcomeJudgment::Success {
                cell.successes += 1;
            }
            cell.confidence_sum += f64::from(record.confidence_score);
        }

        cells
            .into_iter()
            .map(|((rank, idx), cell)| {
                let range_lo = idx * width;
                let range_hi = if idx + 1 == bucket_count { 100 } else { range_lo + width };
                let actual_rate = ratio(cell.successes, cell.samples);
                let expected_rate = cell.confidence_sum / cell.samples as f64 / 100.0;
                let gap = actual_rate - expected_rate;
                CalibrationBucket {
                    decision: DecisionOutcome::ALL[rank],
                    range_lo: range_lo as u8,
                    range_hi: range_hi as u8,
                    samples: cell.samples,
                    successes: cell.successes,
                    actual_rate,
                    expected_rate,
                    gap,
                    status: self.calibration_status(cell.samples, gap),
                }
            })
            .collect()
    }

    fn calibration_status(&self, samples: u64, gap: f64) -> CalibrationStatus {
        let c = &self.config;
        if samples < c.min_bucket_samples {
            CalibrationStatus::InsufficientData
        } else if gap < -c.calibration_tolerance {
            CalibrationStatus::Overconfident
        } else if gap > c.calibration_tolerance {
            CalibrationStatus::Underconfident
        } else {
            CalibrationStatus::Calibrated
        }
    }

    // ── Dashboard ───────────────────────────────────────────────────

    pub fn summary(&self) -> AttributionSummary {
        let records: Vec<AttributionRecord> = self.records.lock().values().cloned().collect();
        let resolved: Vec<AttributionRecord> =
            records.iter().filter(|r| r.resolution.is_some()).cloned().collect();
        let buckets = self.calibration_buckets(&resolved);
        summarize(&records, &buckets)
    }

    pub fn ml_readiness(&self) -> MlReadiness {
        let resolved = self.resolved_records();
        let buckets = self.calibration_buckets(&resolved);
        self.readiness(&resolved, &buckets, &self.signal_effectiveness())
    }

    /// Everything at once, computed from one consistent copy of the
    /// record map.
    pub fn dashboard(&self) -> AttributionDashboard {
        let records: Vec<AttributionRecord> = self.records.lock().values().cloned().collect();
        let resolved: Vec<AttributionRecord> =
            records.iter().filter(|r| r.resolution.is_some()).cloned().collect();
        let buckets = self.calibration_buckets(&resolved);
        let effectiveness = self.signal_effectiveness();
        let readiness = self.readiness(&resolved, &buckets, &effectiveness);
        AttributionDashboard {
            summary: summarize(&records, &buckets),
            signal_effectiveness: effectiveness,
            confidence_calibration: buckets,
            ml_ready_checklist: readiness,
        }
    }

    fn resolved_records(&self) -> Vec<AttributionRecord> {
        self.records
            .lock()
            .values()
            .filter(|r| r.resolution.is_some())
            .cloned()
            .collect()
    }

    fn readiness(
        &self,
        resolved: &[AttributionRecord],
        buckets: &[CalibrationBucket],
        effectiveness: &[SignalEffectiveness],
    ) -> MlReadiness {
        let c = &self.config;
        let n = resolved.len() as u64;
        let mut checks = Vec::with_capacity(6);

        checks.push(ReadinessCheck {
            name: CHECK_MIN_RESOLVED.into(),
            required: true,
            passed: n >= c.min_resolved_samples,
            detail: format!("{n}/{} resolved decisions", c.min_resolved_samples),
        });

        let ece = expected_calibration_error(buckets);
        checks.push(ReadinessCheck {
            name: CHECK_CALIBRATION.into(),
            required: true,
            passed: n > 0 && ece <= c.max_calibration_error,
            detail: format!("ECE {ece:.3} (max {})", c.max_calibration_error),
        });

        let reliable = effectiveness
            .iter()
            .filter(|s| s.reliability != Reliability::Low)
            .count();
        let share = if effectiveness.is_empty() {
            0.0
        } else {
            reliable as f64 / effectiveness.len() as f64
        };
        checks.push(ReadinessCheck {
            name: CHECK_SIGNAL_COVERAGE.into(),
            required: true,
            passed: !effectiveness.is_empty() && share >= c.min_reliable_signal_share,
            detail: format!(
                "{reliable}/{} signals above LOW reliability",
                effectiveness.len()
            ),
        });

        let resolved_at = resolved.iter().filter_map(|r| r.resolution.map(|res| res.resolved_at_ms));
        let span = match (resolved_at.clone().min(), resolved_at.max()) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        };
        checks.push(ReadinessCheck {
            name: CHECK_TIME_SPAN.into(),
            required: true,
            passed: span >= c.min_data_span_ms,
            detail: format!(
                "{:.1}d of resolved history (min {:.1}d)",
                span as f64 / DAY_MS,
                c.min_data_span_ms as f64 / DAY_MS
            ),
        });

        let successes = resolved
            .iter()
            .filter(|r| matches!(r.resolution, Some(res) if res.judgment == OutcomeJudgment::Success))
            .count() as u64;
        let minority = successes.min(n - successes);
        let minority_share = ratio(minority, n);
        checks.push(ReadinessCheck {
            name: CHECK_OUTCOME_BALANCE.into(),
            required: false,
            passed: n > 0 && minority_share >= c.min_minority_outcome_share,
            detail: format!(
                "minority outcome share {minority_share:.2} (min {})",
                c.min_minority_outcome_share
            ),
        });

        let buys = resolved.iter().filter(|r| r.outcome == DecisionOutcome::Buy).count();
        let sells = resolved.iter().filter(|r| r.outcome == DecisionOutcome::Sell).count();
        checks.push(ReadinessCheck {
            name: CHECK_DIRECTIONAL.into(),
            required: false,
            passed: buys > 0 && sells > 0,
            detail: format!("{buys} BUY / {sells} SELL resolved"),
        });

        let ready = checks.iter().filter(|c| c.required).all(|c| c.passed);
        let failing = |required: bool| -> Vec<&str> {
            checks
                .iter()
                .filter(|c| c.required == required && !c.passed)
                .map(|c| c.name.as_str())
                .collect()
        };
        let recommendation = if !ready {
            format!("Keep collecting data; not ready: {}", failing(true).join(", "))
        } else if failing(false).is_empty() {
            "Ready for model training.".to_string()
        } else {
            format!(
                "Ready for model training; consider improving: {}",
                failing(false).join(", ")
            )
        };

        MlReadiness {
            checks,
            ready,
            recommendation,
        }
    }

    pub fn config(&self) -> &AttributionConfig {
        &self.config
    }
}

impl Default for AttributionTracker {
    fn default() -> Self {
        Self::new(AttributionConfig::default())
    }
}

fn outcome_rank(outcome: DecisionOutcome) -> usize {
    DecisionOutcome::ALL
        .iter()
        .position(|o| *o == outcome)
        .unwrap_or(0)
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Sample-weighted mean |gap| across buckets.
fn expected_calibration_error(buckets: &[CalibrationBucket]) -> f64 {
    let samples: u64 = buckets.iter().map(|b| b.samples).sum();
    if samples == 0 {
        return 0.0;
    }
    buckets
        .iter()
        .map(|b| b.samples as f64 * b.gap.abs())
        .sum::<f64>()
        / samples as f64
}

fn summarize(records: &[AttributionRecord], buckets: &[CalibrationBucket]) -> AttributionSummary {
    let mut s = AttributionSummary {
        total_decisions: records.len() as u64,
        ..AttributionSummary::default()
    };
    for record in records {
        match record.outcome {
            DecisionOutcome::Buy => s.buy_count += 1,
            DecisionOutcome::Sell => s.sell_count += 1,
            DecisionOutcome::Neutral => s.neutral_count += 1,
        }
        match record.resolution {
            Some(res) => {
                s.resolved += 1;
                match res.judgment {
                    OutcomeJudgment::Success => s.successes += 1,
                    OutcomeJudgment::Fail => s.failures += 1,
                }
            }
            None => s.pending += 1,
        }
    }
    s.success_rate = ratio(s.successes, s.resolved);
    s.calibration_error = expected_calibration_error(buckets);
    s
}
