//! Surface syntax, bidirectional checking, and the command driver.
//!
//! - `lexer` - tokens and the pull-based token source
//! - `code` - reading side-condition code into code terms
//! - `checker` - checking proof terms off the stream, with a trampoline for
//!   tail positions
//! - `session` - session state and the top-level commands
//! - `error` - source positions and the error taxonomy

pub mod error;
pub mod lexer;
pub mod session;

mod checker;
mod code;

#[cfg(test)]
mod lexer_tests;
#[cfg(test)]
mod session_tests;

pub use error::{Error, ErrorKind, Position, Result};
pub use session::{CheckConfig, Session, SideConditionEmitter, SymbolEmitter, check_source};
