//! # Adapters
//!
//! Swappable implementations of the session ports.
//!
//! - `postgres` - a live pgvector server
//! - `memory` - in-process exact engine for tests and ground truth
//! - Python bindings (when enabled)
//!
//! The engine only sees `Connector` and `Session`, so adapters can be
//! swapped without touching the lifecycle logic.

pub mod memory;
pub mod postgres;

#[cfg(feature = "python")]
pub mod python;
