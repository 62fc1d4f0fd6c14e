//! # Engine
//!
//! The orchestration layer that wires everything together.
//!
//! This is where:
//! - The metric is turned into a query and an operator class
//! - A connector is asked for the one session the adapter uses
//! - The harness lifecycle is enforced

mod pgvector;

pub use pgvector::PgVector;
