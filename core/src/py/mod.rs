use pyo3::exceptions::{PyConnectionError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

use serde_json as json;
use serde_path_to_error as spte;

use crate::config::load_config;
use crate::error::SourceError;
use crate::pipeline::ActivityPipeline;
use crate::sheets::SheetsClient;
use crate::types::RawRecord;

// ──────────────────────────────────────────────────────────────────────────────
// Feilmapping
// ──────────────────────────────────────────────────────────────────────────────

fn source_err(e: SourceError) -> PyErr {
    match e {
        SourceError::SourceUnavailable(m) => PyConnectionError::new_err(m),
        SourceError::QueryError(m) => PyValueError::new_err(m),
    }
}

fn to_json<T: serde::Serialize>(v: &T) -> PyResult<String> {
    json::to_string(v).map_err(|e| PyRuntimeError::new_err(format!("serialize error: {e}")))
}

/// JSON-liste med RawRecord inn → JSON-liste med ShapedRecord ut.
#[pyfunction]
#[pyo3(signature = (records_json, activity=None))]
fn shape_records_json(records_json: &str, activity: Option<&str>) -> PyResult<String> {
    let mut de = json::Deserializer::from_str(records_json);
    let records: Vec<RawRecord> = spte::deserialize(&mut de).map_err(|e| {
        let path = e.path().to_string();
        PyValueError::new_err(format!("parse error (records) at {}: {}", path, e))
    })?;

    to_json(&crate::shaper::shape(&records, activity))
}

/// Én instans per Streamlit-prosess; holder cachen mellom reruns.
#[pyclass(name = "Dashboard")]
struct PyDashboard {
    inner: ActivityPipeline<SheetsClient>,
}

#[pymethods]
impl PyDashboard {
    #[new]
    fn new(config_path: &str) -> PyResult<Self> {
        let mut cfg = load_config(config_path).map_err(|e| PyValueError::new_err(e.to_string()))?;
        cfg.apply_env_overrides()
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        let inner =
            ActivityPipeline::from_config(&cfg).map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Shaped datasett som JSON (liste av rader).
    fn load_json(&self, py: Python<'_>) -> PyResult<String> {
        let shaped = py.allow_threads(|| self.inner.load()).map_err(source_err)?;
        to_json(&shaped)
    }

    /// Prometheus-tellere i tekstformat.
    fn metrics_text(&self) -> PyResult<String> {
        self.inner
            .metrics()
            .encode_text()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    fn invalidate(&self) {
        self.inner.source().invalidate(self.inner.query());
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// PyO3-MODUL
// ──────────────────────────────────────────────────────────────────────────────

#[pymodule]
fn runlog_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(shape_records_json, m)?)?;
    m.add_class::<PyDashboard>()?;
    Ok(())
}
