//! Classifier computation for in-memory terms.
//!
//! Unlike the bidirectional checker, which works on serialized syntax, this
//! computes the kind (or type, for values - the system does not draw a hard
//! line between the two) of an already-constructed term. The `program`
//! command uses it to validate parameter and return types.

use crate::reduce::follow_defs;
use crate::symbol_table::SymbolTable;
use crate::term::{Op, Term, TermRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindError {
    /// Holes have no kind.
    Hole,
    /// An applied head reduced to a non-function with arguments left over.
    NotAFunction { term: String, head: String },
}

impl std::fmt::Display for KindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KindError::Hole => write!(f, "a hole has no kind"),
            KindError::NotAFunction { term, head } => write!(
                f,
                "when reducing {} the head {} is not a function but has arguments",
                term, head
            ),
        }
    }
}

/// Compute the classifier of `e`.
///
/// `type` for proper types such as `bool` or `(term Real)`; the declared
/// classifier for anything else; values yield themselves.
pub fn compute_kind(e: &TermRef, symbols: &SymbolTable) -> Result<TermRef, KindError> {
    let e = follow_defs(e);
    match &*e {
        Term::Mpz | Term::Mpq => Ok(std::rc::Rc::new(Term::Type)),
        Term::Int(_) | Term::Rat(_) | Term::Type | Term::Kind => Ok(e.clone()),
        Term::Hole(_) => Err(KindError::Hole),
        Term::Sym(s) => {
            let ty = symbols.get(&s.name).ty;
            Ok(ty.unwrap_or_else(|| e.clone()))
        }
        Term::Compound(c) => match c.op {
            Op::App => {
                let mut head = compute_kind(&c.kids[0], symbols)?;
                // substitute actuals through the pi chain, restoring after
                let mut saved = Vec::new();
                let mut result = Ok(());
                for arg in &c.kids[1..] {
                    let hf = follow_defs(&head);
                    let Some(pi) = hf.as_compound().filter(|p| p.op == Op::Pi) else {
                        result = Err(KindError::NotAFunction {
                            term: e.to_string(),
                            head: head.to_string(),
                        });
                        break;
                    };
                    if let Some(var) = pi.kids[0].as_sym() {
                        saved.push((pi.kids[0].clone(), var.swap_val(Some(follow_defs(arg)))));
                    }
                    head = compute_kind(&pi.kids[2], symbols)?;
                }
                for (var, old) in saved.into_iter().rev() {
                    var.as_sym().unwrap().set_val(old);
                }
                result.map(|()| head)
            }
            _ => Ok(e.clone()),
        },
    }
}

/// Whether a classifier describes a proper type or a (possibly still
/// unapplied) declared datatype: `type`, or a pi chain ending in `type`.
pub fn proper_or_datatype(kind: &TermRef) -> bool {
    let mut cur = follow_defs(kind);
    loop {
        match &*cur {
            Term::Type => return true,
            Term::Compound(c) if c.op == Op::Pi => cur = follow_defs(&c.kids[2]),
            _ => return false,
        }
    }
}
