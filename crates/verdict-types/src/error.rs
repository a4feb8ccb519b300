// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all Verdict Kernel failures.
///
/// A skipped shadow comparison and a tripped kill switch are deliberately
/// absent: both are status values that callers inspect, never errors.
#[derive(Error, Debug)]
pub enum VerdictError {
    /// Snapshot is structurally malformed. Nothing is scored or recorded.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration failed to parse or violates a range/weight constraint.
    #[error("config error: {0}")]
    Config(String),

    /// A referenced decision (or other keyed record) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The snapshot provider could not supply evidence for a subject.
    #[error("snapshot provider error: {0}")]
    Provider(String),

    /// A decision backend (usually the legacy engine) failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// A bounded call exceeded its deadline.
    #[error("timeout: call exceeded {deadline_ms}ms deadline")]
    Timeout { deadline_ms: u64 },

    /// Numerical error (NaN/Inf in computation).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Compare-and-swap lost against a concurrent writer.
    #[error("state conflict: expected version {expected}, found {actual}")]
    StateConflict { expected: u64, actual: u64 },
}

pub type VerdictResult<T> = Result<T, VerdictError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = VerdictError::Timeout { deadline_ms: 250 };
        assert_eq!(err.to_string(), "timeout: call exceeded 250ms deadline");
    }

    #[test]
    fn test_conflict_message() {
        let err = VerdictError::StateConflict { expected: 3, actual: 4 };
        assert!(err.to_string().contains("expected version 3"));
    }
}
