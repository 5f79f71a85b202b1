//! Python FFI bindings via PyO3.
//!
//! Exposes PCGrad to Python on plain nested lists of floats. Computation runs
//! in `f64`; convert framework tensors with `.tolist()` on the way in.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! from pcgrad_core import PCGrad, pcgrad_weights, compute_gramian
//!
//! A = PCGrad(seed=0)
//! J = [[-4.0, 1.0, 1.0], [6.0, 1.0, 1.0]]
//! print(A(J))                      # [0.5848, 3.8012, 3.8012]
//! print(A.weights(J))              # [2.2222, 1.5789]
//! print(pcgrad_weights(compute_gramian(J), seed=0))
//! ```

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::aggregator::{Aggregator, PcGrad as RustPcGrad, Weighting};
use crate::error::PcGradError;
use crate::gramian::{compute_gramian as rust_compute_gramian, Gramian};
use crate::matrix::Matrix;
use crate::permutation::RngPermutations;
use crate::weighting::PcGradWeighting;

fn to_py_err(err: PcGradError) -> PyErr {
    match err {
        PcGradError::NonDifferentiable { .. } => PyRuntimeError::new_err(err.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

fn source_for(seed: Option<u64>) -> RngPermutations {
    match seed {
        Some(seed) => RngPermutations::seeded(seed),
        None => RngPermutations::from_entropy(),
    }
}

// ── PCGrad ────────────────────────────────────────────────────────────────────

/// PCGrad aggregator.
///
/// Args:
///     seed: fixes the sequence of task orderings (default: OS entropy)
#[pyclass(name = "PCGrad")]
pub struct PyPcGrad {
    inner: RustPcGrad<RngPermutations>,
}

#[pymethods]
impl PyPcGrad {
    /// Create a new aggregator.
    #[new]
    #[pyo3(signature = (seed=None))]
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            inner: RustPcGrad::with_source(source_for(seed)),
        }
    }

    /// Aggregate a matrix whose rows are task gradients.
    ///
    /// Returns the combined gradient (one float per column).
    pub fn __call__(&mut self, matrix: Vec<Vec<f64>>) -> PyResult<Vec<f64>> {
        let matrix = Matrix::from_rows(&matrix).map_err(to_py_err)?;
        self.inner.aggregate(&matrix).map_err(to_py_err)
    }

    /// Per-task weights for a matrix whose rows are task gradients.
    pub fn weights(&mut self, matrix: Vec<Vec<f64>>) -> PyResult<Vec<f64>> {
        let matrix = Matrix::from_rows(&matrix).map_err(to_py_err)?;
        self.inner.weights(&matrix).map_err(to_py_err)
    }

    /// Always raises: PCGrad output cannot be back-propagated through.
    pub fn backward(&self) -> PyResult<()> {
        Aggregator::<f64>::backward_pre_hook(&self.inner).map_err(to_py_err)
    }

    /// Python repr string.
    pub fn __repr__(&self) -> &'static str {
        "PCGrad()"
    }
}

// ── free functions ────────────────────────────────────────────────────────────

/// PCGrad weights from a precomputed Gramian.
///
/// Args:
///     gramian: square symmetric list of lists
///     seed:    fixes the task orderings (default: OS entropy)
#[pyfunction]
#[pyo3(signature = (gramian, seed=None))]
pub fn pcgrad_weights(gramian: Vec<Vec<f64>>, seed: Option<u64>) -> PyResult<Vec<f64>> {
    let gramian = Gramian::from_rows(&gramian).map_err(to_py_err)?;
    PcGradWeighting::new()
        .compute_weights(&gramian, &mut source_for(seed))
        .map_err(to_py_err)
}

/// Pairwise inner products of the rows of `matrix`.
#[pyfunction]
pub fn compute_gramian(matrix: Vec<Vec<f64>>) -> PyResult<Vec<Vec<f64>>> {
    let matrix = Matrix::from_rows(&matrix).map_err(to_py_err)?;
    let gramian = rust_compute_gramian(&matrix).map_err(to_py_err)?;
    Ok((0..gramian.dim()).map(|j| gramian.row(j).to_vec()).collect())
}

// ── Module entry point ────────────────────────────────────────────────────────

/// PCGrad gradient surgery for multi-task learning.
#[pymodule]
pub fn pcgrad_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPcGrad>()?;
    m.add_function(wrap_pyfunction!(pcgrad_weights, m)?)?;
    m.add_function(wrap_pyfunction!(compute_gramian, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
