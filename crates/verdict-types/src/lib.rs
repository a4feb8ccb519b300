// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, and error hierarchy for the
//! Verdict Kernel, the decision engine and shadow-mode safety
//! controller behind the analytics dashboard.

pub mod attribution;
pub mod config;
pub mod decision;
pub mod error;
pub mod health;
pub mod score;
pub mod shadow;
pub mod snapshot;

pub use attribution::{
    AttributionDashboard, AttributionRecord, AttributionSummary, CalibrationBucket,
    CalibrationStatus, MlReadiness, OutcomeJudgment, ReadinessCheck, Reliability, Resolution,
    SignalEffectiveness,
};
pub use config::VerdictConfig;
pub use decision::{
    ConfidenceLabel, ConfidenceResult, Decision, DecisionOutcome, EngineVersion, GateStatus,
    GateVerdict, SignalContribution,
};
pub use error::{VerdictError, VerdictResult};
pub use health::{HealthReport, HealthStatus};
pub use score::ScoreSet;
pub use shadow::{
    ComparisonSample, DriftMetrics, KillSwitchState, KillSwitchStatus, SampleStatus,
    ShadowSummary, TransitionSource,
};
pub use snapshot::{
    ActorFacts, GraphCoverage, InputSnapshot, Polarity, RawSignal, SnapshotKey, Subject,
    SubjectKind, Window,
};
