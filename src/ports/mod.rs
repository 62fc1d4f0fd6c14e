//! # Ports
//!
//! Trait contracts between the adapter and the outside world.
//!
//! - `Connector` / `Session` - what the adapter needs from a database
//! - `AnnAlgorithm` - what the benchmark harness needs from the adapter
//!
//! Adapters implement `Connector` + `Session`; the engine implements
//! `AnnAlgorithm`.

use crate::core::{AnnResult, Dataset};
use crate::sql::{NearestQuery, Statement, TableRef};

/// Opens sessions against a vector-capable store
pub trait Connector: Send + Sync {
    /// Open one session; the adapter keeps it until `done`
    fn connect(&self) -> AnnResult<Box<dyn Session>>;

    /// Short description for logs (never includes credentials)
    fn describe(&self) -> String;
}

/// One open session
///
/// Not safe for concurrent use; every call is a blocking round-trip.
pub trait Session: Send {
    /// Run a statement that returns no rows (or whose rows are ignored)
    fn execute(&mut self, statement: &Statement) -> AnnResult<()>;

    /// Bulk-load every row of `dataset` into `table`, id = position
    ///
    /// Returns the number of rows written.
    fn copy_dataset(&mut self, table: &TableRef, dataset: &Dataset) -> AnnResult<u64>;

    /// Ids of the `limit` nearest rows, nearest first
    fn nearest(&mut self, query: &NearestQuery, vector: &[f32], limit: i64) -> AnnResult<Vec<i32>>;

    /// On-disk size of a relation in bytes
    fn relation_size(&mut self, relation: &str) -> AnnResult<i64>;
}

/// The interface a benchmark harness drives
///
/// Lifecycle: `fit` once, then any mix of `set_query_arguments` / `query`,
/// `get_memory_usage` at any point, `done` last.
pub trait AnnAlgorithm {
    /// Load and index the training set
    fn fit(&mut self, dataset: &Dataset) -> AnnResult<()>;

    /// Tune the search-time recall/latency trade-off
    fn set_query_arguments(&mut self, ef_search: u32) -> AnnResult<()>;

    /// Ids of the (approximate) `k` nearest neighbours, nearest first
    fn query(&mut self, vector: &[f32], k: usize) -> AnnResult<Vec<usize>>;

    /// `query` for each vector in turn
    fn batch_query(&mut self, queries: &[Vec<f32>], k: usize) -> AnnResult<Vec<Vec<usize>>> {
        queries.iter().map(|q| self.query(q, k)).collect()
    }

    /// Index size in KiB; 0 before `fit`
    fn get_memory_usage(&mut self) -> AnnResult<f64>;

    /// Drop stored data and release the session
    fn done(&mut self) -> AnnResult<()>;

    /// Label for results, e.g. `PGVectorHNSW(m=16, ef_construction=64, ef_search=40)`
    fn name(&self) -> AnnResult<String>;
}
