// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Health Monitor
// ─────────────────────────────────────────────────────────────────────
//! Folds recent decision quality, shadow drift, and kill-switch state
//! into one status.
//!
//! Precedence: a triggered kill switch or any drift breach is CRITICAL;
//! a drift window below the minimum sample count is DATA_COLLECTION;
//! any soft flag is WARNING; otherwise OK. Health is never OK while the
//! kill switch is triggered.

use std::collections::{BTreeSet, VecDeque};

use parking_lot::Mutex;

use verdict_types::config::HealthConfig;
use verdict_types::{Decision, DriftMetrics, HealthReport, HealthStatus, KillSwitchStatus};

use crate::killswitch::KillSwitch;

pub const FLAG_KILL_SWITCH: &str = "kill_switch_triggered";
pub const FLAG_FLIP_RATE: &str = "decisionFlipRate_elevated";
pub const FLAG_RISK_DELTA: &str = "avgRiskDelta_elevated";
pub const FLAG_COVERAGE: &str = "coverage_low";
pub const FLAG_RISK: &str = "risk_high";

#[derive(Debug, Clone)]
struct RecentEntry {
    coverage: u8,
    risk: u8,
    signals: Vec<String>,
}

/// Bounded history of served decisions.
pub struct RecentDecisions {
    capacity: usize,
    entries: Mutex<VecDeque<RecentEntry>>,
}

impl RecentDecisions {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, decision: &Decision) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(RecentEntry {
            coverage: decision.scores.coverage,
            risk: decision.scores.risk,
            signals: decision.signals.iter().map(|s| s.name.clone()).collect(),
        });
    }

    /// (mean coverage, mean risk, distinct signal names, entries)
    fn stats(&self) -> (f64, f64, usize, usize) {
        let entries = self.entries.lock();
        if entries.is_empty() {
            return (0.0, 0.0, 0, 0);
        }
        let n = entries.len() as f64;
        let coverage = entries.iter().map(|e| f64::from(e.coverage)).sum::<f64>() / n;
        let risk = entries.iter().map(|e| f64::from(e.risk)).sum::<f64>() / n;
        let names: BTreeSet<&str> = entries
            .iter()
            .flat_map(|e| e.signals.iter().map(String::as_str))
            .collect();
        (coverage, risk, names.len(), entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

pub struct HealthMonitor {
    config: HealthConfig,
    recent: RecentDecisions,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        let recent = RecentDecisions::new(config.recent_decisions);
        Self { config, recent }
    }

    pub fn observe(&self, decision: &Decision) {
        self.recent.push(decision);
    }

    pub fn assess(&self, metrics: &DriftMetrics, kill_switch: &KillSwitch) -> HealthReport {
        let ks = kill_switch.config();
        let (avg_coverage, avg_risk, signals_count, observed) = self.recent.stats();
        let triggered = kill_switch.is_triggered();
        let breaches = kill_switch.breaches(metrics);

        let mut drift_flags = Vec::new();
        if triggered {
            drift_flags.push(FLAG_KILL_SWITCH.to_string());
        }
        drift_flags.extend(breaches.iter().cloned());

        let mut soft = Vec::new();
        if metrics.sample_count > 0 && metrics.decision_flip_rate > ks.warn_flip_rate {
            soft.push(FLAG_FLIP_RATE);
        }
        if metrics.sample_count > 0 && metrics.avg_risk_delta > ks.max_avg_risk_delta / 2.0 {
            soft.push(FLAG_RISK_DELTA);
        }
        if observed > 0 && avg_coverage < self.config.warn_avg_coverage {
            soft.push(FLAG_COVERAGE);
        }
        if observed > 0 && avg_risk >= self.config.warn_avg_risk {
            soft.push(FLAG_RISK);
        }
        drift_flags.extend(soft.iter().map(|f| f.to_string()));

        let status = if triggered || !breaches.is_empty() {
            HealthStatus::Critical
        } else if metrics.sample_count < ks.min_samples {
            HealthStatus::DataCollection
        } else if !soft.is_empty() {
            HealthStatus::Warning
        } else {
            HealthStatus::Ok
        };

        HealthReport {
            status,
            avg_coverage,
            avg_risk,
            signals_count,
            drift_flags,
            kill_switch: if triggered {
                KillSwitchStatus::Triggered
            } else {
                KillSwitchStatus::Armed
            },
        }
    }

    pub fn recent(&self) -> &RecentDecisions {
        &self.recent
    }
}
