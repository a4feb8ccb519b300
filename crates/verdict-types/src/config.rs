// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Configuration
// ─────────────────────────────────────────────────────────────────────
//! Typed policy configuration, loaded once at startup.
//!
//! Every threshold the engine applies lives here, named and with its
//! unit documented. The defaults are an illustrative starting policy,
//! not contractual constants; deployments override them via JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{VerdictError, VerdictResult};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerdictConfig {
    pub scoring: ScoringConfig,
    pub gates: GateConfig,
    pub confidence: ConfidenceConfig,
    pub attribution: AttributionConfig,
    pub shadow: ShadowConfig,
    pub kill_switch: KillSwitchConfig,
    pub health: HealthConfig,
}

// ─── Scoring ────────────────────────────────────────────────────────

/// Weights of the evidence sub-signals. Must sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceWeights {
    pub signal_strength: f64,
    pub context_strength: f64,
    pub actor_quality: f64,
    pub signal_consensus: f64,
}

impl Default for EvidenceWeights {
    fn default() -> Self {
        Self {
            signal_strength: 0.4,
            context_strength: 0.2,
            actor_quality: 0.2,
            signal_consensus: 0.2,
        }
    }
}

/// Weights of the coverage sub-signals. Must sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageWeights {
    pub graph_edges: f64,
    pub graph_sources: f64,
    pub signal_density: f64,
    pub actor_presence: f64,
}

impl Default for CoverageWeights {
    fn default() -> Self {
        Self {
            graph_edges: 0.35,
            graph_sources: 0.25,
            signal_density: 0.25,
            actor_presence: 0.15,
        }
    }
}

/// Weights of the risk sub-signals. Must sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub signal_dispersion: f64,
    pub actor_risk: f64,
    pub staleness: f64,
    pub concentration: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            signal_dispersion: 0.35,
            actor_risk: 0.25,
            staleness: 0.2,
            concentration: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub evidence: EvidenceWeights,
    pub coverage: CoverageWeights,
    pub risk: RiskWeights,
    /// Signal count at which signal density reaches 100.
    pub target_signal_count: u32,
    /// Risk-flag count at which the flag part of actor risk reaches 100.
    pub risk_flag_saturation: u32,
    /// Points (0–100) added to actor risk for an unverified actor.
    pub unverified_actor_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            evidence: EvidenceWeights::default(),
            coverage: CoverageWeights::default(),
            risk: RiskWeights::default(),
            target_signal_count: 5,
            risk_flag_saturation: 5,
            unverified_actor_penalty: 20.0,
        }
    }
}

// ─── Gates ──────────────────────────────────────────────────────────

/// Gate thresholds, all on the 0–100 score scale.
///
/// A band collapses to a plain pass/block gate when its warn and block
/// thresholds coincide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Coverage below this blocks.
    pub coverage_block_below: u8,
    /// Coverage below this (but not blocked) warns.
    pub coverage_warn_below: u8,
    /// Risk at or above this warns.
    pub risk_warn_at: u8,
    /// Risk at or above this blocks.
    pub risk_block_at: u8,
    /// Evidence below this (but not blocked) warns.
    pub evidence_warn_below: u8,
    /// Evidence below this blocks.
    pub evidence_block_below: u8,
    /// |direction| must exceed this for BUY/SELL (direction points).
    pub min_direction_magnitude: u8,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            coverage_block_below: 60,
            coverage_warn_below: 60,
            risk_warn_at: 60,
            risk_block_at: 80,
            evidence_warn_below: 60,
            evidence_block_below: 40,
            min_direction_magnitude: 20,
        }
    }
}

// ─── Confidence ─────────────────────────────────────────────────────

/// Weights of the confidence components. Must sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub coverage: f64,
    pub actor_quality: f64,
    pub flow_significance: f64,
    pub temporal_stability: f64,
    pub evidence_quality: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            coverage: 0.3,
            actor_quality: 0.2,
            flow_significance: 0.2,
            temporal_stability: 0.15,
            evidence_quality: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub weights: ConfidenceWeights,
    /// Score at or above which the label is HIGH.
    pub high_at: u8,
    /// Score at or above which the label is MEDIUM.
    pub medium_at: u8,
    /// Score at or above which the label is LOW; below is HIDDEN.
    pub low_at: u8,
    /// Total signal weight (Σ strength × confidence) at which flow
    /// significance reaches 100.
    pub flow_saturation: f64,
    /// Number of equal slices the window is cut into for temporal
    /// stability.
    pub stability_slices: u32,
    /// Components below this (0–100) are called out in the reasons.
    pub component_floor: u8,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            weights: ConfidenceWeights::default(),
            high_at: 70,
            medium_at: 40,
            low_at: 20,
            flow_saturation: 3.0,
            stability_slices: 6,
            component_floor: 30,
        }
    }
}

// ─── Attribution ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    /// Resolved occurrences below which a signal is LOW reliability.
    pub min_signal_samples: u64,
    /// Success rate (0–1) at or above which a signal is HIGH reliability.
    pub high_success_rate: f64,
    /// Success rate (0–1) at or above which a signal is MEDIUM reliability.
    pub medium_success_rate: f64,
    /// |actual − expected| (0–1) tolerated before a bucket is flagged.
    pub calibration_tolerance: f64,
    /// Resolved samples a bucket needs before it can be flagged.
    pub min_bucket_samples: u64,
    /// Width of a confidence range bucket, in confidence points.
    pub bucket_width: u8,
    /// Readiness: minimum resolved decisions.
    pub min_resolved_samples: u64,
    /// Readiness: maximum expected calibration error (0–1).
    pub max_calibration_error: f64,
    /// Readiness: minimum share (0–1) of signals above LOW reliability.
    pub min_reliable_signal_share: f64,
    /// Readiness: minimum span between first and last resolution, ms.
    pub min_data_span_ms: u64,
    /// Readiness (optional): minimum share (0–1) of the minority judgment.
    pub min_minority_outcome_share: f64,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            min_signal_samples: 10,
            high_success_rate: 0.6,
            medium_success_rate: 0.45,
            calibration_tolerance: 0.15,
            min_bucket_samples: 5,
            bucket_width: 20,
            min_resolved_samples: 200,
            max_calibration_error: 0.1,
            min_reliable_signal_share: 0.5,
            min_data_span_ms: 14 * 24 * 3_600_000,
            min_minority_outcome_share: 0.2,
        }
    }
}

// ─── Shadow / kill switch / health ──────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Keep at most this many samples in the trailing window.
    pub window_max_samples: Option<usize>,
    /// Drop samples older than this many ms relative to the newest one.
    pub window_max_age_ms: Option<u64>,
    /// Deadline for a single legacy-engine call, ms.
    pub legacy_deadline_ms: u64,
    /// Legacy calls allowed to run at once, timed-out ones included.
    /// Further compares are skipped until a worker finishes.
    pub legacy_max_in_flight: usize,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            window_max_samples: Some(500),
            window_max_age_ms: Some(24 * 3_600_000),
            legacy_deadline_ms: 250,
            legacy_max_in_flight: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KillSwitchConfig {
    /// Trigger when decision flip rate (0–1) is above this.
    pub max_flip_rate: f64,
    /// Trigger when agreement rate (0–1) is below this.
    pub min_agreement_rate: f64,
    /// Trigger when mean |risk delta| (score points) is above this.
    pub max_avg_risk_delta: f64,
    /// Compared samples required before any trigger is allowed.
    pub min_samples: usize,
    /// Flip rate (0–1) above which health reports a drift warning.
    pub warn_flip_rate: f64,
}

impl Default for KillSwitchConfig {
    fn default() -> Self {
        Self {
            max_flip_rate: 0.1,
            min_agreement_rate: 0.85,
            max_avg_risk_delta: 20.0,
            min_samples: 30,
            warn_flip_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Number of recent decisions the health averages cover.
    pub recent_decisions: usize,
    /// Warn when mean coverage of recent decisions falls below this.
    pub warn_avg_coverage: f64,
    /// Warn when mean risk of recent decisions reaches this.
    pub warn_avg_risk: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            recent_decisions: 200,
            warn_avg_coverage: 60.0,
            warn_avg_risk: 60.0,
        }
    }
}

// ─── Validation / loading ───────────────────────────────────────────

fn check_weights(section: &str, weights: &[(&str, f64)]) -> VerdictResult<()> {
    for (name, w) in weights {
        if !w.is_finite() || *w < 0.0 {
            return Err(VerdictError::Config(format!(
                "{section}.{name} must be a finite weight >= 0, got {w}"
            )));
        }
    }
    let sum: f64 = weights.iter().map(|(_, w)| w).sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(VerdictError::Config(format!(
            "{section} weights must sum to 1.0, got {sum}"
        )));
    }
    Ok(())
}

fn check_rate(name: &str, value: f64) -> VerdictResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(VerdictError::Config(format!(
            "{name} must be in [0, 1], got {value}"
        )));
    }
    Ok(())
}

fn check_score(name: &str, value: u8) -> VerdictResult<()> {
    if value > 100 {
        return Err(VerdictError::Config(format!(
            "{name} must be in [0, 100], got {value}"
        )));
    }
    Ok(())
}

impl VerdictConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> VerdictResult<()> {
        let s = &self.scoring;
        check_weights(
            "scoring.evidence",
            &[
                ("signal_strength", s.evidence.signal_strength),
                ("context_strength", s.evidence.context_strength),
                ("actor_quality", s.evidence.actor_quality),
                ("signal_consensus", s.evidence.signal_consensus),
            ],
        )?;
        check_weights(
            "scoring.coverage",
            &[
                ("graph_edges", s.coverage.graph_edges),
                ("graph_sources", s.coverage.graph_sources),
                ("signal_density", s.coverage.signal_density),
                ("actor_presence", s.coverage.actor_presence),
            ],
        )?;
        check_weights(
            "scoring.risk",
            &[
                ("signal_dispersion", s.risk.signal_dispersion),
                ("actor_risk", s.risk.actor_risk),
                ("staleness", s.risk.staleness),
                ("concentration", s.risk.concentration),
            ],
        )?;
        if s.target_signal_count == 0 {
            return Err(VerdictError::Config(
                "scoring.target_signal_count must be > 0".to_string(),
            ));
        }
        if s.risk_flag_saturation == 0 {
            return Err(VerdictError::Config(
                "scoring.risk_flag_saturation must be > 0".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&s.unverified_actor_penalty) {
            return Err(VerdictError::Config(format!(
                "scoring.unverified_actor_penalty must be in [0, 100], got {}",
                s.unverified_actor_penalty
            )));
        }

        let g = &self.gates;
        check_score("gates.coverage_block_below", g.coverage_block_below)?;
        check_score("gates.coverage_warn_below", g.coverage_warn_below)?;
        check_score("gates.risk_warn_at", g.risk_warn_at)?;
        check_score("gates.risk_block_at", g.risk_block_at)?;
        check_score("gates.evidence_warn_below", g.evidence_warn_below)?;
        check_score("gates.evidence_block_below", g.evidence_block_below)?;
        check_score("gates.min_direction_magnitude", g.min_direction_magnitude)?;
        if g.coverage_warn_below < g.coverage_block_below {
            return Err(VerdictError::Config(format!(
                "gates.coverage_warn_below ({}) must be >= coverage_block_below ({})",
                g.coverage_warn_below, g.coverage_block_below
            )));
        }
        if g.risk_warn_at > g.risk_block_at {
            return Err(VerdictError::Config(format!(
                "gates.risk_warn_at ({}) must be <= risk_block_at ({})",
                g.risk_warn_at, g.risk_block_at
            )));
        }
        if g.evidence_warn_below < g.evidence_block_below {
            return Err(VerdictError::Config(format!(
                "gates.evidence_warn_below ({}) must be >= evidence_block_below ({})",
                g.evidence_warn_below, g.evidence_block_below
            )));
        }

        let c = &self.confidence;
        check_weights(
            "confidence.weights",
            &[
                ("coverage", c.weights.coverage),
                ("actor_quality", c.weights.actor_quality),
                ("flow_significance", c.weights.flow_significance),
                ("temporal_stability", c.weights.temporal_stability),
                ("evidence_quality", c.weights.evidence_quality),
            ],
        )?;
        check_score("confidence.high_at", c.high_at)?;
        check_score("confidence.component_floor", c.component_floor)?;
        if !(c.high_at >= c.medium_at && c.medium_at >= c.low_at) {
            return Err(VerdictError::Config(format!(
                "confidence labels must satisfy high_at >= medium_at >= low_at, got {}/{}/{}",
                c.high_at, c.medium_at, c.low_at
            )));
        }
        if !(c.flow_saturation.is_finite() && c.flow_saturation > 0.0) {
            return Err(VerdictError::Config(format!(
                "confidence.flow_saturation must be > 0, got {}",
                c.flow_saturation
            )));
        }
        if c.stability_slices == 0 {
            return Err(VerdictError::Config(
                "confidence.stability_slices must be > 0".to_string(),
            ));
        }

        let a = &self.attribution;
        check_rate("attribution.high_success_rate", a.high_success_rate)?;
        check_rate("attribution.medium_success_rate", a.medium_success_rate)?;
        check_rate("attribution.calibration_tolerance", a.calibration_tolerance)?;
        check_rate("attribution.max_calibration_error", a.max_calibration_error)?;
        check_rate("attribution.min_reliable_signal_share", a.min_reliable_signal_share)?;
        check_rate("attribution.min_minority_outcome_share", a.min_minority_outcome_share)?;
        if a.medium_success_rate > a.high_success_rate {
            return Err(VerdictError::Config(format!(
                "attribution.medium_success_rate ({}) must be <= high_success_rate ({})",
                a.medium_success_rate, a.high_success_rate
            )));
        }
        if a.bucket_width == 0 || a.bucket_width > 100 {
            return Err(VerdictError::Config(format!(
                "attribution.bucket_width must be in [1, 100], got {}",
                a.bucket_width
            )));
        }

        let sh = &self.shadow;
        if sh.window_max_samples.is_none() && sh.window_max_age_ms.is_none() {
            return Err(VerdictError::Config(
                "shadow window needs window_max_samples and/or window_max_age_ms".to_string(),
            ));
        }
        if sh.window_max_samples == Some(0) {
            return Err(VerdictError::Config(
                "shadow.window_max_samples must be > 0".to_string(),
            ));
        }
        if sh.legacy_deadline_ms == 0 {
            return Err(VerdictError::Config(
                "shadow.legacy_deadline_ms must be > 0".to_string(),
            ));
        }
        if sh.legacy_max_in_flight == 0 {
            return Err(VerdictError::Config(
                "shadow.legacy_max_in_flight must be > 0".to_string(),
            ));
        }

        let k = &self.kill_switch;
        check_rate("kill_switch.max_flip_rate", k.max_flip_rate)?;
        check_rate("kill_switch.min_agreement_rate", k.min_agreement_rate)?;
        check_rate("kill_switch.warn_flip_rate", k.warn_flip_rate)?;
        if !(k.max_avg_risk_delta.is_finite() && k.max_avg_risk_delta >= 0.0) {
            return Err(VerdictError::Config(format!(
                "kill_switch.max_avg_risk_delta must be >= 0, got {}",
                k.max_avg_risk_delta
            )));
        }
        if k.min_samples == 0 {
            return Err(VerdictError::Config(
                "kill_switch.min_samples must be > 0".to_string(),
            ));
        }

        if self.health.recent_decisions == 0 {
            return Err(VerdictError::Config(
                "health.recent_decisions must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from JSON string. Missing sections fall back to defaults.
    pub fn from_json(json: &str) -> VerdictResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| VerdictError::Config(format!("JSON parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> VerdictResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            VerdictError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        VerdictConfig::default().validate().unwrap();
    }

    #[test]
    fn test_evidence_weights_must_sum_to_one() {
        let mut cfg = VerdictConfig::default();
        cfg.scoring.evidence.signal_strength = 0.5;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("scoring.evidence"));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut cfg = VerdictConfig::default();
        cfg.confidence.weights.coverage = -0.1;
        cfg.confidence.weights.actor_quality = 0.6;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_inverted_risk_band_rejected() {
        let mut cfg = VerdictConfig::default();
        cfg.gates.risk_warn_at = 90;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_label_order_enforced() {
        let mut cfg = VerdictConfig::default();
        cfg.confidence.low_at = 50;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_unbounded_shadow_window_rejected() {
        let mut cfg = VerdictConfig::default();
        cfg.shadow.window_max_samples = None;
        cfg.shadow.window_max_age_ms = None;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_legacy_in_flight_rejected() {
        let mut cfg = VerdictConfig::default();
        cfg.shadow.legacy_max_in_flight = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_min_samples_rejected() {
        let mut cfg = VerdictConfig::default();
        cfg.kill_switch.min_samples = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg = VerdictConfig::from_json(
            r#"{"kill_switch": {"max_flip_rate": 0.2}, "gates": {"min_direction_magnitude": 10}}"#,
        )
        .unwrap();
        assert!((cfg.kill_switch.max_flip_rate - 0.2).abs() < 1e-12);
        assert_eq!(cfg.kill_switch.min_samples, 30);
        assert_eq!(cfg.gates.min_direction_magnitude, 10);
        assert_eq!(cfg.gates.coverage_block_below, 60);
    }

    #[test]
    fn test_from_json_rejects_invalid_policy() {
        let err = VerdictConfig::from_json(r#"{"gates": {"evidence_block_below": 70}}"#);
        assert!(matches!(err, Err(VerdictError::Config(_))));
    }

    #[test]
    fn test_from_json_parse_error() {
        assert!(matches!(
            VerdictConfig::from_json("{not json"),
            Err(VerdictError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = VerdictConfig::from_json_file("/nonexistent/verdict.json").unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
