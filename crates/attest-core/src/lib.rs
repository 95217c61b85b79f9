//! Core data structures for the attest proof checker.
//!
//! - `term` - the shared term graph and its ownership discipline
//! - `symbol_table` - scoped name bindings over a prefix tree
//! - `reduce` - definitional equality and weak-head reduction
//! - `kind` - classifier computation for in-memory terms

pub mod kind;
pub mod reduce;
pub mod symbol_table;
pub mod term;

#[cfg(test)]
mod symbol_table_tests;
#[cfg(test)]
mod term_tests;

pub use kind::{KindError, compute_kind, proper_or_datatype};
pub use reduce::{defeq, follow_defs, weak_head_reduce};
pub use symbol_table::{Binding, SymbolTable};
pub use term::{Op, Term, TermRef, collect_args, free_in, head_of};
