//! Fatal checking errors.
//!
//! Every error here aborts the whole run. A checker that keeps going after an
//! inconsistency cannot be trusted, so there is no recovery path; the command
//! driver reports the first error and stops.

use std::fmt;
use std::ops::Range;

use attest_vm::StaticError;

/// Line and column of the offending token, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("scope error: {0}")]
    Scope(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("ill-typed side condition: {0}")]
    SideCondition(#[from] StaticError),
    #[error("a hole was left unfilled after checking an application")]
    Hole,
}

/// An error plus where it happened. `span` indexes the source text; `pos` is
/// the same place as line and column.
#[derive(Debug, thiserror::Error)]
#[error("{file}:{pos}: {kind}")]
pub struct Error {
    pub file: String,
    pub pos: Position,
    pub span: Range<usize>,
    pub kind: ErrorKind,
}

impl Error {
    pub fn is_scope(&self) -> bool {
        matches!(self.kind, ErrorKind::Scope(_))
    }

    pub fn is_type(&self) -> bool {
        matches!(self.kind, ErrorKind::Type(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
