// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Input Snapshot
// ─────────────────────────────────────────────────────────────────────
//! The frozen bundle of evidence for one subject and window.
//!
//! A snapshot is identified by `(subject, window, as_of_ms)` and is never
//! mutated once built; engines receive it by shared reference (or `Arc`)
//! so that the live decision and the shadow comparison see identical input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{VerdictError, VerdictResult};
use crate::score::clamp_score;

/// What a snapshot is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Actor,
    Token,
}

/// Actor or token identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub kind: SubjectKind,
    pub id: String,
}

impl Subject {
    pub fn actor(id: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Actor,
            id: id.into(),
        }
    }

    pub fn token(id: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Token,
            id: id.into(),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SubjectKind::Actor => write!(f, "actor:{}", self.id),
            SubjectKind::Token => write!(f, "token:{}", self.id),
        }
    }
}

/// Observation window a snapshot was assembled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "24h")]
    Hour24,
    #[serde(rename = "7d")]
    Day7,
    #[serde(rename = "30d")]
    Day30,
}

impl Window {
    const HOUR_MS: u64 = 3_600_000;

    /// Window length in milliseconds.
    pub fn duration_ms(self) -> u64 {
        match self {
            Window::Hour1 => Self::HOUR_MS,
            Window::Hour24 => 24 * Self::HOUR_MS,
            Window::Day7 => 7 * 24 * Self::HOUR_MS,
            Window::Day30 => 30 * 24 * Self::HOUR_MS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Window::Hour1 => "1h",
            Window::Hour24 => "24h",
            Window::Day7 => "7d",
            Window::Day30 => "30d",
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Window {
    type Err = VerdictError;

    fn from_str(s: &str) -> VerdictResult<Self> {
        match s.trim() {
            "1h" => Ok(Window::Hour1),
            "24h" | "1d" => Ok(Window::Hour24),
            "7d" => Ok(Window::Day7),
            "30d" => Ok(Window::Day30),
            other => Err(VerdictError::Validation(format!(
                "unknown window '{other}', expected one of 1h, 24h, 7d, 30d"
            ))),
        }
    }
}

/// Directional reading of a raw signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Bullish,
    Bearish,
    Neutral,
}

impl Polarity {
    pub fn sign(self) -> f64 {
        match self {
            Polarity::Bullish => 1.0,
            Polarity::Bearish => -1.0,
            Polarity::Neutral => 0.0,
        }
    }
}

/// One raw signal reading supplied by the ingestion layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSignal {
    pub name: String,
    pub polarity: Polarity,
    /// Signal strength in [0, 1].
    pub strength: f64,
    /// Producer's confidence in the reading, [0, 1].
    pub confidence: f64,
    /// Epoch milliseconds when the signal was observed.
    pub observed_at_ms: u64,
}

impl RawSignal {
    pub fn new(
        name: impl Into<String>,
        polarity: Polarity,
        strength: f64,
        confidence: f64,
        observed_at_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            polarity,
            strength,
            confidence,
            observed_at_ms,
        }
    }

    /// Effective weight = strength × confidence, both clamped to [0, 1].
    pub fn weight(&self) -> f64 {
        clamp_score(self.strength, 0.0, 1.0) * clamp_score(self.confidence, 0.0, 1.0)
    }
}

/// Facts about the actor behind the subject, when known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorFacts {
    /// Curated actor quality, 0–100.
    pub quality_score: f64,
    pub verified: bool,
    /// Number of past calls in the actor's track record.
    pub track_record_samples: u32,
    /// Historical hit rate in [0, 1], if the track record is long enough.
    #[serde(default)]
    pub historical_accuracy: Option<f64>,
    /// Count of risk flags raised against the actor (wash trading, etc.).
    #[serde(default)]
    pub risk_flags: u32,
}

/// How much of the relevant transfer graph was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphCoverage {
    pub resolved_edges: u32,
    pub total_edges: u32,
    pub covered_sources: u32,
    pub expected_sources: u32,
}

impl GraphCoverage {
    /// Resolved / total edges in [0, 1]; 0 when nothing was expected.
    pub fn edge_ratio(&self) -> f64 {
        ratio(self.resolved_edges, self.total_edges)
    }

    /// Covered / expected sources in [0, 1]; 0 when nothing was expected.
    pub fn source_ratio(&self) -> f64 {
        ratio(self.covered_sources, self.expected_sources)
    }
}

fn ratio(num: u32, den: u32) -> f64 {
    if den == 0 {
        0.0
    } else {
        (num as f64 / den as f64).min(1.0)
    }
}

/// Identity of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotKey {
    pub subject: Subject,
    pub window: Window,
    pub as_of_ms: u64,
}

/// Frozen evidence bundle used as input to scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSnapshot {
    pub subject: Subject,
    pub window: Window,
    /// Epoch milliseconds the snapshot was assembled at.
    pub as_of_ms: u64,
    /// Narrative/context strength reading, 0–100.
    #[serde(default)]
    pub context_strength: Option<f64>,
    #[serde(default)]
    pub signals: Vec<RawSignal>,
    #[serde(default)]
    pub actor: Option<ActorFacts>,
    #[serde(default)]
    pub graph: Option<GraphCoverage>,
}

impl InputSnapshot {
    pub fn new(subject: Subject, window: Window, as_of_ms: u64) -> Self {
        Self {
            subject,
            window,
            as_of_ms,
            context_strength: None,
            signals: Vec::new(),
            actor: None,
            graph: None,
        }
    }

    pub fn with_context_strength(mut self, strength: f64) -> Self {
        self.context_strength = Some(strength);
        self
    }

    pub fn with_signal(mut self, signal: RawSignal) -> Self {
        self.signals.push(signal);
        self
    }

    pub fn with_actor(mut self, actor: ActorFacts) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_graph(mut self, graph: GraphCoverage) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn key(&self) -> SnapshotKey {
        SnapshotKey {
            subject: self.subject.clone(),
            window: self.window,
            as_of_ms: self.as_of_ms,
        }
    }

    /// Parse a snapshot from JSON and validate it.
    pub fn from_json(json: &str) -> VerdictResult<Self> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| VerdictError::Validation(format!("malformed snapshot: {e}")))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Structural validation. Missing optional evidence is not an error;
    /// only absent identity fields and non-finite readings are.
    pub fn validate(&self) -> VerdictResult<()> {
        if self.subject.id.trim().is_empty() {
            return Err(VerdictError::Validation(
                "subject id must not be empty".to_string(),
            ));
        }
        if self.as_of_ms == 0 {
            return Err(VerdictError::Validation(format!(
                "as_of_ms must be > 0 for {}",
                self.subject
            )));
        }
        if let Some(ctx) = self.context_strength {
            if !ctx.is_finite() {
                return Err(VerdictError::Validation(format!(
                    "context_strength must be finite, got {ctx}"
                )));
            }
        }
        for (i, signal) in self.signals.iter().enumerate() {
            if signal.name.trim().is_empty() {
                return Err(VerdictError::Validation(format!(
                    "signal #{i} has an empty name"
                )));
            }
            if !signal.strength.is_finite() || !signal.confidence.is_finite() {
                return Err(VerdictError::Validation(format!(
                    "signal '{}' has non-finite strength/confidence",
                    signal.name
                )));
            }
        }
        if let Some(actor) = &self.actor {
            let accuracy_ok = actor.historical_accuracy.map_or(true, f64::is_finite);
            if !actor.quality_score.is_finite() || !accuracy_ok {
                return Err(VerdictError::Validation(format!(
                    "actor facts for {} contain non-finite values",
                    self.subject
                )));
            }
        }
        Ok(())
    }
}
