//! Planning module for the provider.
//!
//! Computes attribute-level differences between declarative projections,
//! used to report drift and to prove that a state upgrade is a no-op.

mod diff;

pub use diff::{DiffDetail, DiffEngine, DiffResult, DiffType};
