// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — Snapshot Provider Interface
// ─────────────────────────────────────────────────────────────────────
//! Seam to the ingestion layer that assembles evidence snapshots.
//!
//! The in-memory backend serves tests, replays, and small deployments.
//! Production plugs the document store in via [`SnapshotProvider`].

use std::collections::HashMap;

use parking_lot::RwLock;

use verdict_types::{InputSnapshot, Subject, VerdictError, VerdictResult, Window};

/// Supplies the evidence snapshot for a subject and window.
pub trait SnapshotProvider: Send + Sync {
    fn snapshot(&self, subject: &Subject, window: Window) -> VerdictResult<InputSnapshot>;
}

/// In-memory snapshot store keyed by (subject, window).
///
/// Holds the latest snapshot per key; `insert` replaces any earlier one.
#[derive(Default)]
pub struct InMemorySnapshots {
    snapshots: RwLock<HashMap<(Subject, Window), InputSnapshot>>,
}

impl InMemorySnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, snapshot: InputSnapshot) {
        let key = (snapshot.subject.clone(), snapshot.window);
        self.snapshots.write().insert(key, snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

impl SnapshotProvider for InMemorySnapshots {
    fn snapshot(&self, subject: &Subject, window: Window) -> VerdictResult<InputSnapshot> {
        self.snapshots
            .read()
            .get(&(subject.clone(), window))
            .cloned()
            .ok_or_else(|| VerdictError::Provider(format!("no snapshot for {subject} ({window})")))
    }
}

type SnapshotFn = Box<dyn Fn(&Subject, Window) -> VerdictResult<InputSnapshot> + Send + Sync>;

/// Provider that calls a function pointer.
///
/// Used by the PyO3 FFI layer to delegate snapshot assembly to Python.
pub struct ExternalProvider {
    snapshot_fn: SnapshotFn,
}

impl ExternalProvider {
    pub fn new(
        snapshot_fn: impl Fn(&Subject, Window) -> VerdictResult<InputSnapshot> + Send + Sync + 'static,
    ) -> Self {
        Self {
            snapshot_fn: Box::new(snapshot_fn),
        }
    }
}

impl SnapshotProvider for ExternalProvider {
    fn snapshot(&self, subject: &Subject, window: Window) -> VerdictResult<InputSnapshot> {
        (self.snapshot_fn)(subject, window)
    }
}
