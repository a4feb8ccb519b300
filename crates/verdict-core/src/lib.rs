// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Decision Engine & Shadow-Mode Safety Controller
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Turns labeled evidence snapshots into BUY/SELL/NEUTRAL decisions,
//! measures decision quality against resolved outcomes, and gates a
//! candidate engine behind a legacy one in shadow mode.
//!
//! # Safety Invariants
//!
//! 1. **Veto before direction**: a blocked gate forces NEUTRAL no matter
//!    how strong the direction is. Gate policy lives only in
//!    [`gates::GateEvaluator`].
//!
//! 2. **HIDDEN never publishes**: a decision labeled HIDDEN by the
//!    confidence calibrator is not publishable regardless of outcome.
//!
//! 3. **Kill switch is sticky**: once drift trips the switch, the
//!    candidate stays demoted until an operator re-arms it. Every
//!    transition goes through compare-and-swap on a versioned record
//!    and lands in an append-only history.
//!
//! 4. **Legacy failures are not drift**: errors, timeouts, and panics
//!    inside the legacy engine record skipped samples that never move
//!    the drift metrics.
//!
//! 5. **Exactly-once resolution**: a decision's outcome is attached once;
//!    repeats return the first resolution and leave counters untouched.

pub mod aggregator;
pub mod attribution;
pub mod backend;
pub mod clock;
pub mod confidence;
pub mod engine;
pub mod gates;
pub mod health;
pub mod killswitch;
pub mod provider;
pub mod service;
pub mod shadow;

pub use aggregator::{Aggregation, ScoreAggregator};
pub use attribution::AttributionTracker;
pub use backend::{DecisionBackend, ExternalBackend};
pub use confidence::ConfidenceCalibrator;
pub use engine::DecisionEngine;
pub use gates::GateEvaluator;
pub use health::{HealthMonitor, RecentDecisions};
pub use killswitch::{InMemoryKillSwitchStore, KillSwitch, KillSwitchStore};
pub use provider::{ExternalProvider, InMemorySnapshots, SnapshotProvider};
pub use service::DecisionService;
pub use shadow::ShadowComparator;
