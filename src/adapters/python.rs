//! # Python Bindings
//!
//! PyO3 bindings so the adapter drops straight into a Python benchmark
//! harness.
//!
//! ## Python API
//!
//! ```python
//! from pgvector_ann import PGVector
//!
//! algo = PGVector("angular", {"M": 16, "efConstruction": 64})
//! algo.fit(X)                      # X: sequence of equal-length float rows
//! algo.set_query_arguments(40)
//! ids = algo.query(v, 10)          # nearest first
//! kib = algo.get_memory_usage()
//! print(algo)                      # PGVectorHNSW(m=16, ef_construction=64, ef_search=40)
//! algo.done()
//! ```
//!
//! Connection settings come from `ANN_BENCHMARKS_PG_*` environment variables.

use std::collections::HashMap;

use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::core::{AnnError, Dataset, HnswParams};
use crate::engine::PgVector;
use crate::ports::AnnAlgorithm;

fn to_py_err(err: AnnError) -> PyErr {
    match err {
        AnnError::UnsupportedMetric(_)
        | AnnError::NotFitted
        | AnnError::AlreadyFitted
        | AnnError::Done
        | AnnError::QueryArgumentsUnset
        | AnnError::Postgres(_)
        | AnnError::Engine(_) => PyRuntimeError::new_err(err.to_string()),
        AnnError::Io(_) => PyIOError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

fn param_value(params: &HashMap<String, u32>, key: &str) -> PyResult<u32> {
    params
        .get(key)
        .copied()
        .ok_or_else(|| PyValueError::new_err(format!("method_param is missing '{}'", key)))
}

/// pgvector HNSW index living in PostgreSQL
#[pyclass(name = "PGVector")]
pub struct PyPgVector {
    inner: PgVector,
}

#[pymethods]
impl PyPgVector {
    /// Create the adapter
    ///
    /// Args:
    ///     metric: "angular" or "euclidean"
    ///     method_param: dict with "M" and "efConstruction"
    #[new]
    fn new(metric: &str, method_param: HashMap<String, u32>) -> PyResult<Self> {
        let params = HnswParams::new(
            param_value(&method_param, "M")?,
            param_value(&method_param, "efConstruction")?,
        )
        .map_err(to_py_err)?;

        let inner = PgVector::new(metric, params).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Load the vectors and build the index
    ///
    /// Args:
    ///     X: rows of floats; row i gets id i
    #[allow(non_snake_case)]
    fn fit(&mut self, py: Python<'_>, X: Vec<Vec<f32>>) -> PyResult<()> {
        let dataset = Dataset::from_rows(&X).map_err(to_py_err)?;
        let inner = &mut self.inner;
        py.allow_threads(|| inner.fit(&dataset)).map_err(to_py_err)
    }

    /// Set hnsw.ef_search for later queries
    fn set_query_arguments(&mut self, ef_search: u32) -> PyResult<()> {
        self.inner.set_query_arguments(ef_search).map_err(to_py_err)
    }

    /// Ids of the n nearest rows, nearest first
    fn query(&mut self, v: Vec<f32>, n: usize) -> PyResult<Vec<usize>> {
        self.inner.query(&v, n).map_err(to_py_err)
    }

    /// Query each row of Q in turn
    #[allow(non_snake_case)]
    fn batch_query(&mut self, Q: Vec<Vec<f32>>, n: usize) -> PyResult<Vec<Vec<usize>>> {
        self.inner.batch_query(&Q, n).map_err(to_py_err)
    }

    /// Index size in KiB (0 before fit)
    fn get_memory_usage(&mut self) -> PyResult<f64> {
        self.inner.get_memory_usage().map_err(to_py_err)
    }

    /// Drop the table and close the connection
    fn done(&mut self) -> PyResult<()> {
        self.inner.done().map_err(to_py_err)
    }

    fn __str__(&self) -> PyResult<String> {
        self.inner.name().map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        let params = self.inner.params();
        format!(
            "PGVector(metric='{}', M={}, efConstruction={})",
            self.inner.metric(),
            params.m,
            params.ef_construction
        )
    }
}

/// pgvector-ann Python module
#[pymodule]
fn pgvector_ann(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPgVector>()?;

    m.add("__doc__", "pgvector HNSW adapter for ANN benchmarking")?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
