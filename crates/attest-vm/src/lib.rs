//! The side-condition language: a simply-typed, call-by-value, first-order
//! language embedded in proof terms.
//!
//! - `check` - bottom-up static typing of code terms (`check_code`)
//! - `eval` - the tree-walking evaluator (`run_code`); failure is a value
//! - `compiled` - delegation seam for ahead-of-time compiled programs

pub mod check;
pub mod compiled;
pub mod eval;

#[cfg(test)]
mod check_tests;

pub use check::{StaticError, check_code};
pub use compiled::CompiledPrograms;
pub use eval::Evaluator;
