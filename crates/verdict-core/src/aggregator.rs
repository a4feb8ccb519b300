// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Score Aggregator
// ─────────────────────────────────────────────────────────────────────
//! Turns an input snapshot into the evidence, coverage, and risk scores
//! plus the signed direction.
//!
//! Each dimension is `Σ weight_k · sub_k` where every sub-signal `sub_k`
//! is normalized to [0, 100] and the weights (configuration) sum to 1.
//! Missing optional readings contribute a zero-strength sub-signal, so
//! sparse snapshots score low instead of failing.
//!
//! Direction is independent of the three scores: the strength ×
//! confidence weighted mean polarity of the raw signals, scaled to
//! [-100, 100].

use std::collections::BTreeMap;

use verdict_types::config::ScoringConfig;
use verdict_types::score::{clamp_score, to_direction, to_unit_score};
use verdict_types::{InputSnapshot, ScoreSet, SignalContribution, VerdictResult};

/// Full aggregation trace: the scores plus everything that fed them.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub scores: ScoreSet,
    /// `"<dimension>.<sub_signal>"` → normalized 0–100 reading.
    pub sub_scores: BTreeMap<String, f64>,
    /// Per-signal-name share of the signal-strength evidence, by name.
    pub contributions: Vec<SignalContribution>,
    /// Σ strength × confidence over all signals.
    pub total_signal_weight: f64,
}

/// Raw signal statistics shared by several sub-signals.
#[derive(Debug, Default, Clone, Copy)]
struct SignalStats {
    count: usize,
    total_weight: f64,
    directional_weight: f64,
    net_weight: f64,
    max_weight: f64,
    newest_ms: Option<u64>,
}

/// Deterministic, stateless score aggregator.
///
/// Holds only configuration, so a single instance can be shared across
/// threads and invoked concurrently without coordination.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    config: ScoringConfig,
}

impl ScoreAggregator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Compute the score set for a snapshot.
    ///
    /// Fails only with a validation error for structurally malformed
    /// snapshots.
    pub fn compute_scores(&self, snapshot: &InputSnapshot) -> VerdictResult<ScoreSet> {
        Ok(self.aggregate(snapshot)?.scores)
    }

    /// Compute scores together with the sub-signal trace and per-signal
    /// contributions.
    pub fn aggregate(&self, snapshot: &InputSnapshot) -> VerdictResult<Aggregation> {
        snapshot.validate()?;
        let stats = Self::signal_stats(snapshot);
        let mut sub_scores = BTreeMap::new();

        // Evidence
        let ew = &self.config.evidence;
        let signal_strength = if stats.count > 0 {
            stats.total_weight / stats.count as f64 * 100.0
        } else {
            0.0
        };
        let context_strength = snapshot
            .context_strength
            .map_or(0.0, |c| clamp_score(c, 0.0, 100.0));
        let actor_quality = snapshot
            .actor
            .as_ref()
            .map_or(0.0, |a| clamp_score(a.quality_score, 0.0, 100.0));
        let consensus = Self::consensus(&stats);
        let evidence = ew.signal_strength * signal_strength
            + ew.context_strength * context_strength
            + ew.actor_quality * actor_quality
            + ew.signal_consensus * consensus;
        sub_scores.insert("evidence.signal_strength".into(), signal_strength);
        sub_scores.insert("evidence.context_strength".into(), context_strength);
        sub_scores.insert("evidence.actor_quality".into(), actor_quality);
        sub_scores.insert("evidence.signal_consensus".into(), consensus);

        // Coverage
        let cw = &self.config.coverage;
        let graph_edges = snapshot.graph.map_or(0.0, |g| g.edge_ratio() * 100.0);
        let graph_sources = snapshot.graph.map_or(0.0, |g| g.source_ratio() * 100.0);
        let density =
            (stats.count as f64 / self.config.target_signal_count as f64).min(1.0) * 100.0;
        let actor_presence = if snapshot.actor.is_some() { 100.0 } else { 0.0 };
        let coverage = cw.graph_edges * graph_edges
            + cw.graph_sources * graph_sources
            + cw.signal_density * density
            + cw.actor_presence * actor_presence;
        sub_scores.insert("coverage.graph_edges".into(), graph_edges);
        sub_scores.insert("coverage.graph_sources".into(), graph_sources);
        sub_scores.insert("coverage.signal_density".into(), density);
        sub_scores.insert("coverage.actor_presence".into(), actor_presence);

        // Risk
        let rw = &self.config.risk;
        let dispersion = if stats.directional_weight > 0.0 {
            100.0 - consensus
        } else {
            0.0
        };
        let actor_risk = self.actor_risk(snapshot);
        let staleness = Self::staleness(snapshot, &stats);
        let concentration = if stats.total_weight > 0.0 {
            stats.max_weight / stats.total_weight * 100.0
        } else {
            0.0
        };
        let risk = rw.signal_dispersion * dispersion
            + rw.actor_risk * actor_risk
            + rw.staleness * staleness
            + rw.concentration * concentration;
        sub_scores.insert("risk.signal_dispersion".into(), dispersion);
        sub_scores.insert("risk.actor_risk".into(), actor_risk);
        sub_scores.insert("risk.staleness".into(), staleness);
        sub_scores.insert("risk.concentration".into(), concentration);

        let direction = if stats.total_weight > 0.0 {
            stats.net_weight / stats.total_weight * 100.0
        } else {
            0.0
        };

        let scores = ScoreSet::new(
            to_unit_score(evidence),
            to_unit_score(coverage),
            to_unit_score(risk),
            to_direction(direction),
        );

        log::debug!(
            "scored {} ({}): evidence={} coverage={} risk={} direction={}",
            snapshot.subject,
            snapshot.window,
            scores.evidence,
            scores.coverage,
            scores.risk,
            scores.direction
        );

        Ok(Aggregation {
            scores,
            sub_scores,
            contributions: Self::contributions(snapshot, &stats),
            total_signal_weight: stats.total_weight,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    fn signal_stats(snapshot: &InputSnapshot) -> SignalStats {
        let mut stats = SignalStats::default();
        for signal in &snapshot.signals {
            let w = signal.weight();
            let sign = signal.polarity.sign();
            stats.count += 1;
            stats.total_weight += w;
            if sign != 0.0 {
                stats.directional_weight += w;
            }
            stats.net_weight += sign * w;
            stats.max_weight = stats.max_weight.max(w);
            let seen = signal.observed_at_ms.min(snapshot.as_of_ms);
            stats.newest_ms = Some(stats.newest_ms.map_or(seen, |n| n.max(seen)));
        }
        stats
    }

    /// Net directional margin: |Σ signed weight| / Σ directional weight.
    fn consensus(stats: &SignalStats) -> f64 {
        if stats.directional_weight > 0.0 {
            (stats.net_weight.abs() / stats.directional_weight * 100.0).min(100.0)
        } else {
            0.0
        }
    }

    /// Risk flags scaled against saturation, plus the unverified penalty.
    fn actor_risk(&self, snapshot: &InputSnapshot) -> f64 {
        match &snapshot.actor {
            Some(actor) => {
                let flags = (actor.risk_flags as f64
                    / self.config.risk_flag_saturation as f64)
                    .min(1.0)
                    * 100.0;
                let penalty = if actor.verified {
                    0.0
                } else {
                    self.config.unverified_actor_penalty
                };
                clamp_score(flags + penalty, 0.0, 100.0)
            }
            None => 0.0,
        }
    }

    /// Age of the freshest signal as a share of the window length.
    fn staleness(snapshot: &InputSnapshot, stats: &SignalStats) -> f64 {
        match stats.newest_ms {
            Some(newest) => {
                let age = snapshot.as_of_ms.saturating_sub(newest) as f64;
                (age / snapshot.window.duration_ms() as f64).min(1.0) * 100.0
            }
            None => 0.0,
        }
    }

    fn contributions(snapshot: &InputSnapshot, stats: &SignalStats) -> Vec<SignalContribution> {
        let mut by_name: BTreeMap<&str, f64> = BTreeMap::new();
        for signal in &snapshot.signals {
            let share = if stats.total_weight > 0.0 {
                signal.weight() / stats.total_weight * 100.0
            } else {
                0.0
            };
            *by_name.entry(signal.name.as_str()).or_insert(0.0) += share;
        }
        by_name
            .into_iter()
            .map(|(name, contribution)| SignalContribution {
                name: name.to_string(),
                contribution,
            })
            .collect()
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}
