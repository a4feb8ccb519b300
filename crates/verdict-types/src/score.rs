// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Score Types
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

/// Clamp a value to [lo, hi], mapping NaN to lo and Inf to nearest bound.
#[inline]
pub fn clamp_score(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        log::warn!("clamp_score: NaN detected, clamping to {lo:.4}");
        return lo;
    }
    if value.is_infinite() {
        let boundary = if value > 0.0 { hi } else { lo };
        log::warn!("clamp_score: Inf detected, clamping to {boundary:.4}");
        return boundary;
    }
    value.clamp(lo, hi)
}

/// Round a 0–100 reading to the integer scale used by [`ScoreSet`].
#[inline]
pub fn to_unit_score(value: f64) -> u8 {
    clamp_score(value, 0.0, 100.0).round() as u8
}

/// Round a -100..100 reading to the signed direction scale.
///
/// NaN carries no lean and maps to 0.
#[inline]
pub fn to_direction(value: f64) -> i8 {
    if value.is_nan() {
        return 0;
    }
    clamp_score(value, -100.0, 100.0).round() as i8
}

/// The three gate-facing scores plus the signed directional lean.
///
/// Derived purely from an input snapshot: identical input always yields
/// an identical `ScoreSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreSet {
    /// Strength of the supporting evidence, 0–100.
    pub evidence: u8,
    /// How much of the expected data was actually available, 0–100.
    pub coverage: u8,
    /// Risk of acting on the evidence, 0–100 (higher is worse).
    pub risk: u8,
    /// Net directional lean, -100 (bearish) ..= 100 (bullish).
    pub direction: i8,
}

impl ScoreSet {
    pub fn new(evidence: u8, coverage: u8, risk: u8, direction: i8) -> Self {
        Self {
            evidence: evidence.min(100),
            coverage: coverage.min(100),
            risk: risk.min(100),
            direction: direction.clamp(-100, 100),
        }
    }
}
