//! # pgvector-ann
//!
//! > Benchmark an HNSW index that lives inside PostgreSQL.
//!
//! This crate plugs the pgvector extension into an approximate nearest
//! neighbour benchmarking harness. The server does the real work: it stores
//! the vectors, builds the HNSW graph and answers k-NN queries. The crate
//! issues the SQL, over one session, in the right order.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       pgvector-ann                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  CORE (pure types, no I/O)                                   │
//! │    Metric, HnswParams, Dataset, distance, config, errors     │
//! │                                                              │
//! │  SQL (typed statements)                                      │
//! │    Statement, NearestQuery, TableRef                         │
//! │                                                              │
//! │  PORTS (trait contracts)                                     │
//! │    Connector, Session, AnnAlgorithm                          │
//! │                                                              │
//! │  ADAPTERS (swappable implementations)                        │
//! │    Session: PostgreSQL, Memory (exact)                       │
//! │    API: Python bindings                                      │
//! │                                                              │
//! │  ENGINE (orchestration)                                      │
//! │    PgVector - fit / query / measure / done                   │
//! │                                                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pgvector_ann::{AnnAlgorithm, Dataset, HnswParams, PgVector};
//!
//! # fn main() -> pgvector_ann::AnnResult<()> {
//! let mut algo = PgVector::new("euclidean", HnswParams::new(16, 64)?)?;
//!
//! let train = Dataset::from_rows(&[vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]])?;
//! algo.fit(&train)?;
//! algo.set_query_arguments(40)?;
//!
//! let ids = algo.query(&[0.0, 0.0], 2)?;
//! let kib = algo.get_memory_usage()?;
//! println!("{} -> {:?}, index {} KiB", algo.name()?, ids, kib);
//!
//! algo.done()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// MODULES
// ============================================================================

/// Core domain - pure types, no I/O
/// Contains: Metric, HnswParams, Dataset, distance, config, error
pub mod core;

/// Typed SQL statements and their rendering
pub mod sql;

/// Port definitions - trait contracts for adapters
/// Contains: Connector, Session, AnnAlgorithm
pub mod ports;

/// Adapter implementations - swappable components
/// Contains: postgres, memory, python submodules
pub mod adapters;

/// Engine - orchestration layer
/// Contains: PgVector
pub mod engine;

/// Harness-style sweeps with recall and latency
pub mod runner;

// ============================================================================
// PYTHON BINDINGS (when enabled)
// ============================================================================

#[cfg(feature = "python")]
pub use adapters::python::*;

// ============================================================================
// RE-EXPORTS (public API)
// ============================================================================

// Core types
pub use crate::core::config::{ConnectionConfig, PgVectorConfig};
pub use crate::core::{AnnError, AnnResult, Dataset, HnswParams, Metric};

// Port traits
pub use crate::ports::{AnnAlgorithm, Connector, Session};

// Adapters
pub use crate::adapters::memory::MemoryEngine;
pub use crate::adapters::postgres::PgConnector;

// Engine
pub use crate::engine::PgVector;

// Runner
pub use crate::runner::{run_sweep, RunReport, Sweep};
