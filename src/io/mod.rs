//! Input/output helpers.
//!
//! - record flattening into tabular batches (`flatten`)

pub mod flatten;

pub use flatten::*;
