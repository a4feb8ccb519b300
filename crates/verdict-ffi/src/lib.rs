// ─────────────────────────────────────────────────────────────────────
// Verdict Kernel — PyO3 FFI Bindings
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
// Note: #[deny(unsafe_code)] not applied. PyO3 proc macros generate
// unsafe blocks internally. All hand-written code in this crate is safe.
//! Python-callable wrappers around the Verdict Kernel.
//!
//! Exposes `VerdictConfig`, `DecisionService`, and the stateless
//! `decide_once` helper. Every response is a camelCase JSON string so
//! the dashboard backend can hand it straight to its HTTP layer.
//!
//! # FFI Safety
//!
//! - GIL acquired via `Python::with_gil` before every Python callback.
//! - Service calls release the GIL (`allow_threads`) so the legacy
//!   worker thread can call back into Python within its deadline.
//! - Python exceptions inside callbacks become provider/backend errors
//!   on the Rust side: a failing legacy callback yields a skipped shadow
//!   sample, a failing snapshot callback fails the request.
//! - All config validated before storage (`VerdictConfig::validate()`).
//!
//! Install: `pip install -e crates/verdict-ffi` (requires maturin).
//!
//! Usage from Python:
//! ```python
//! from verdict_kernel import DecisionService
//!
//! svc = DecisionService(lambda kind, id, window: load_snapshot_json(kind, id, window))
//! decision = json.loads(svc.decide("token", "WIF", "24h"))
//! ```

use std::sync::Arc;

use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyTimeoutError, PyValueError};
use pyo3::prelude::*;
use serde::Serialize;

use verdict_core::{
    DecisionBackend, DecisionEngine, ExternalBackend, ExternalProvider,
    DecisionService as CoreService,
};
use verdict_types::{
    Decision, EngineVersion, InputSnapshot, OutcomeJudgment, Subject, SubjectKind,
    VerdictConfig, VerdictError, VerdictResult, Window,
};

fn to_py_err(e: VerdictError) -> PyErr {
    match e {
        VerdictError::Validation(_) | VerdictError::Config(_) => PyValueError::new_err(e.to_string()),
        VerdictError::NotFound(_) => PyKeyError::new_err(e.to_string()),
        VerdictError::Timeout { .. } => PyTimeoutError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

fn to_json<T: Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

fn parse_subject(kind: &str, id: &str) -> PyResult<Subject> {
    let kind = match kind.trim().to_ascii_lowercase().as_str() {
        "actor" => SubjectKind::Actor,
        "token" => SubjectKind::Token,
        other => {
            return Err(PyValueError::new_err(format!(
                "unknown subject kind '{other}', expected 'actor' or 'token'"
            )))
        }
    };
    Ok(Subject {
        kind,
        id: id.to_string(),
    })
}

fn parse_judgment(judgment: &str) -> PyResult<OutcomeJudgment> {
    match judgment.trim().to_ascii_lowercase().as_str() {
        "success" => Ok(OutcomeJudgment::Success),
        "fail" | "failure" => Ok(OutcomeJudgment::Fail),
        other => Err(PyValueError::new_err(format!(
            "unknown judgment '{other}', expected 'success' or 'fail'"
        ))),
    }
}

fn subject_kind_str(kind: SubjectKind) -> &'static str {
    match kind {
        SubjectKind::Actor => "actor",
        SubjectKind::Token => "token",
    }
}

// ─── PyVerdictConfig ────────────────────────────────────────────────

/// Python-visible configuration for the Verdict Kernel.
#[pyclass(name = "VerdictConfig")]
#[derive(Clone)]
struct PyVerdictConfig {
    inner: VerdictConfig,
}

#[pymethods]
impl PyVerdictConfig {
    /// Default policy.
    #[new]
    fn new() -> Self {
        Self {
            inner: VerdictConfig::default(),
        }
    }

    /// Construct from JSON string. Missing sections keep their defaults.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = VerdictConfig::from_json(json).map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    fn to_json(&self) -> PyResult<String> {
        to_json(&self.inner)
    }

    fn __repr__(&self) -> String {
        let g = &self.inner.gates;
        let k = &self.inner.kill_switch;
        format!(
            "VerdictConfig(coverage_block_below={}, risk_block_at={}, evidence_block_below={}, max_flip_rate={}, min_samples={})",
            g.coverage_block_below, g.risk_block_at, g.evidence_block_below, k.max_flip_rate, k.min_samples
        )
    }
}

// ─── DecisionService ────────────────────────────────────────────────

/// Decision engine with shadow comparison and kill switch.
///
/// `snapshot_callback(kind, id, window) -> str` returns the snapshot
/// JSON for a subject. `legacy_callback(snapshot_json) -> str`, when
/// given, returns the legacy engine's decision JSON; otherwise an
/// in-process V1 engine with the same policy is used.
#[pyclass(name = "DecisionService")]
struct PyDecisionService {
    inner: CoreService,
}

#[pymethods]
impl PyDecisionService {
    #[new]
    #[pyo3(signature = (snapshot_callback, legacy_callback = None, config = None))]
    fn new(
        snapshot_callback: PyObject,
        legacy_callback: Option<PyObject>,
        config: Option<PyVerdictConfig>,
    ) -> PyResult<Self> {
        let config = config.map(|c| c.inner).unwrap_or_default();

        let provider = Arc::new(ExternalProvider::new(move |subject: &Subject, window: Window| {
            let json: VerdictResult<String> = Python::with_gil(|py| {
                snapshot_callback
                    .call1(py, (subject_kind_str(subject.kind), subject.id.as_str(), window.as_str()))
                    .and_then(|r| r.extract::<String>(py))
                    .map_err(|e| VerdictError::Provider(format!("snapshot callback failed: {e}")))
            });
            InputSnapshot::from_json(&json?)
        }));

        let legacy: Arc<dyn DecisionBackend> = match legacy_callback {
            Some(cb) => Arc::new(ExternalBackend::new(
                EngineVersion::V1,
                move |snapshot: &InputSnapshot| -> VerdictResult<Decision> {
                    let payload = serde_json::to_string(snapshot)
                        .map_err(|e| VerdictError::Backend(e.to_string()))?;
                    let json = Python::with_gil(|py| {
                        cb.call1(py, (payload,))
                            .and_then(|r| r.extract::<String>(py))
                            .map_err(|e| VerdictError::Backend(format!("legacy callback failed: {e}")))
                    })?;
                    serde_json::from_str(&json)
                        .map_err(|e| VerdictError::Backend(format!("malformed legacy decision: {e}")))
                },
            )),
            None => Arc::new(DecisionEngine::new(EngineVersion::V1, &config)),
        };

        let inner = CoreService::new(config, provider, legacy).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Decide for a subject; returns the served decision as JSON.
    fn decide(&self, py: Python<'_>, kind: &str, id: &str, window: &str) -> PyResult<String> {
        let subject = parse_subject(kind, id)?;
        let window: Window = window.parse().map_err(to_py_err)?;
        let decision = py
            .allow_threads(|| self.inner.decide(&subject, window))
            .map_err(to_py_err)?;
        to_json(&decision)
    }

    /// Decide on a caller-supplied snapshot JSON.
    fn decide_snapshot(&self, py: Python<'_>, snapshot_json: &str) -> PyResult<String> {
        let snapshot = InputSnapshot::from_json(snapshot_json).map_err(to_py_err)?;
        let decision = py
            .allow_threads(|| self.inner.decide_snapshot(snapshot))
            .map_err(to_py_err)?;
        to_json(&decision)
    }

    fn resolve_outcome(&self, decision_id: &str, judgment: &str) -> PyResult<String> {
        let judgment = parse_judgment(judgment)?;
        let resolution = self
            .inner
            .resolve_outcome(decision_id, judgment)
            .map_err(to_py_err)?;
        to_json(&resolution)
    }

    fn health(&self) -> PyResult<String> {
        to_json(&self.inner.health())
    }

    fn shadow_summary(&self) -> PyResult<String> {
        to_json(&self.inner.shadow_summary().map_err(to_py_err)?)
    }

    fn attribution_dashboard(&self) -> PyResult<String> {
        to_json(&self.inner.attribution_dashboard())
    }

    #[pyo3(signature = (operator, note = ""))]
    fn manual_reset(&self, operator: &str, note: &str) -> PyResult<String> {
        to_json(&self.inner.manual_reset(operator, note).map_err(to_py_err)?)
    }

    #[getter]
    fn is_candidate_authoritative(&self) -> bool {
        self.inner.is_candidate_authoritative()
    }
}

// ─── Stateless helper ───────────────────────────────────────────────

/// Run the V2 pipeline once on a snapshot JSON, without shadow mode or
/// attribution. Useful for previews and debugging policy changes.
#[pyfunction]
#[pyo3(signature = (snapshot_json, config = None))]
fn decide_once(snapshot_json: &str, config: Option<PyVerdictConfig>) -> PyResult<String> {
    let config = config.map(|c| c.inner).unwrap_or_default();
    let snapshot = InputSnapshot::from_json(snapshot_json).map_err(to_py_err)?;
    let decision = DecisionBackend::decide(&DecisionEngine::from_config(&config), &snapshot)
        .map_err(to_py_err)?;
    to_json(&decision)
}

/// Python module: `verdict_kernel`.
///
/// - `VerdictConfig`: policy configuration
/// - `DecisionService`: decisions, shadow mode, kill switch, attribution
/// - `decide_once`: stateless single decision
#[pymodule]
fn verdict_kernel(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyVerdictConfig>()?;
    m.add_class::<PyDecisionService>()?;
    m.add_function(wrap_pyfunction!(decide_once, m)?)?;
    Ok(())
}

