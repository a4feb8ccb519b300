// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Decision Backend Interface
// ─────────────────────────────────────────────────────────────────────
//! Trait implemented by every engine version that can turn a snapshot
//! into a decision.
//!
//! The current engine ([`crate::DecisionEngine`]) implements it
//! in-process. The legacy engine usually lives elsewhere (a previous
//! deployment, a remote service, a Python implementation behind the
//! FFI layer) and is plugged in through [`ExternalBackend`].

use verdict_types::{Decision, EngineVersion, InputSnapshot, VerdictResult};

/// An engine version that can decide on a snapshot.
///
/// Implementations must be deterministic in the snapshot for shadow
/// comparison to mean anything, and must be callable from any thread.
pub trait DecisionBackend: Send + Sync {
    fn version(&self) -> EngineVersion;
    fn decide(&self, snapshot: &InputSnapshot) -> VerdictResult<Decision>;
}

type DecideFn = Box<dyn Fn(&InputSnapshot) -> VerdictResult<Decision> + Send + Sync>;

/// Backend that delegates to a closure.
///
/// Used by the PyO3 FFI layer to call a legacy engine implemented in
/// Python, and by tests to simulate failing or slow engines.
pub struct ExternalBackend {
    version: EngineVersion,
    decide_fn: DecideFn,
}

impl ExternalBackend {
    pub fn new(
        version: EngineVersion,
        decide_fn: impl Fn(&InputSnapshot) -> VerdictResult<Decision> + Send + Sync + 'static,
    ) -> Self {
        Self {
            version,
            decide_fn: Box::new(decide_fn),
        }
    }
}

impl DecisionBackend for ExternalBackend {
    fn version(&self) -> EngineVersion {
        self.version
    }

    fn decide(&self, snapshot: &InputSnapshot) -> VerdictResult<Decision> {
        (self.decide_fn)(snapshot)
    }
}
