//! Bounded-concurrency admission control.
//!
//! # Architecture
//!
//! - [`AdmissionGate`]: owns the FIFO queue and the set of in-flight entries
//! - [`Admission`]: future resolving once an entry is admitted
//! - [`GateConfig`]: capacity and scheduling configuration
//! - [`GateStats`]: counters for observing a gate

mod admission;
mod config;
mod stats;

pub use admission::{Admission, AdmissionGate, Admitted, EntryToken};
pub use config::{DEFAULT_MAX_CONCURRENT, GateConfig};
pub use stats::GateStats;
