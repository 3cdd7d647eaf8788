//! Python bindings
//!
//! Exposes `ProofSystem` as a Python class; every instance owns its keys, so
//! several systems with different configurations can live in one process.

use std::path::PathBuf;

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::config::ProofSystemConfig;
use crate::error::IvcError;
use crate::tx::TxId;

fn to_py_err(err: IvcError) -> PyErr {
    match err {
        IvcError::Decode(_) | IvcError::Shape(_) | IvcError::Tx(_) => {
            PyValueError::new_err(err.to_string())
        }
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Transaction chain proof system
#[pyclass(name = "ProofSystem")]
struct PyProofSystem {
    inner: crate::proof::ProofSystem,
}

#[pymethods]
impl PyProofSystem {
    /// Boot from a TOML config file (or defaults and `TXIVC_*` variables),
    /// loading keys from `key_dir` or running setup
    #[new]
    #[pyo3(signature = (config_path=None, key_dir=None))]
    fn new(py: Python<'_>, config_path: Option<PathBuf>, key_dir: Option<PathBuf>) -> PyResult<Self> {
        let mut config = ProofSystemConfig::load(config_path.as_deref()).map_err(to_py_err)?;
        if let Some(key_dir) = key_dir {
            config.key_dir = key_dir;
        }

        // Setup can take minutes
        let inner = py
            .allow_threads(|| crate::proof::ProofSystem::boot(config))
            .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Prove a genesis transaction
    fn create_base_case_proof(&self, py: Python<'_>, raw_tx: &str) -> PyResult<String> {
        py.allow_threads(|| self.inner.create_base_case_proof(raw_tx))
            .map_err(to_py_err)
    }

    /// Prove a spending transaction on top of its parent's proof
    #[pyo3(signature = (raw_tx, input_index, is_parent_base, proof))]
    fn create_normal_case_proof(
        &self,
        py: Python<'_>,
        raw_tx: &str,
        input_index: usize,
        is_parent_base: bool,
        proof: &str,
    ) -> PyResult<String> {
        py.allow_threads(|| {
            self.inner
                .create_normal_case_proof(raw_tx, input_index, is_parent_base, proof)
        })
        .map_err(to_py_err)
    }

    fn verify_base_proof(&self, tx_id: &str, proof: &str) -> bool {
        self.inner.verify_base_proof(tx_id, proof)
    }

    fn verify_normal_proof(&self, tx_id: &str, proof: &str) -> bool {
        self.inner.verify_normal_proof(tx_id, proof)
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }
}

/// Transaction id (double SHA-256, digest byte order) of a hex transaction
#[pyfunction]
fn tx_id(raw_tx: &str) -> PyResult<String> {
    let raw = hex::decode(raw_tx)
        .map_err(|e| PyValueError::new_err(format!("Invalid transaction hex: {}", e)))?;
    Ok(TxId::compute(&raw).to_hex())
}

/// Python module definition
#[pymodule]
fn txivc_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyProofSystem>()?;
    m.add_function(wrap_pyfunction!(tx_id, m)?)?;

    // Add version
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
