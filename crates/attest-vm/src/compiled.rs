//! Delegation seam for ahead-of-time compiled side-condition programs.

use attest_core::term::TermRef;

/// A precompiled evaluator for named programs.
///
/// When one is installed and enabled, [`crate::Evaluator`] hands every
/// program application to it - the program's name plus the already-evaluated
/// arguments - instead of interpreting the tree-walked body. `None` means
/// runtime failure, exactly as for the interpreter.
pub trait CompiledPrograms {
    fn run(&self, name: &str, args: &[TermRef]) -> Option<TermRef>;
}
