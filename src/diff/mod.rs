//! Diff and build drivers.
//!
//! - [`DiffEngine`] - Compares a new stream against a loaded store
//! - [`build`] - First-time store population
//! - [`DiffSummary`] - Counts of the classifications a round produced

mod engine;

pub use engine::{DiffEngine, DiffSummary, build};
