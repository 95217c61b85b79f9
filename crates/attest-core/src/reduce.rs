//! Definitional equality and weak-head reduction.
//!
//! `defeq` is *not* a pure predicate: when either side contains an unresolved
//! hole it resolves it by unification (greedily, left to right, first
//! occurrence wins). Callers rely on this to fill argument holes while
//! checking applications.

use std::rc::Rc;

use crate::term::{Op, Term, TermRef};

/// Chase bound-symbol values and filled holes until reaching a term that is
/// neither.
pub fn follow_defs(t: &TermRef) -> TermRef {
    let mut cur = t.clone();
    loop {
        let next = match &*cur {
            Term::Sym(s) => s.val(),
            Term::Hole(h) => h.val(),
            _ => None,
        };
        match next {
            Some(n) => cur = n,
            None => return cur,
        }
    }
}

/// Unfold head-position definitions of an application just enough to expose
/// the true head constructor. Subterms are left untouched.
pub fn weak_head_reduce(t: &TermRef) -> TermRef {
    let mut cur = t.clone();
    loop {
        let Term::Compound(c) = &*cur else {
            return cur;
        };
        if c.op != Op::App {
            return cur;
        }
        let head = follow_defs(&c.kids[0]);
        if let Term::Compound(h) = &*head {
            if h.op == Op::App {
                // flatten a definition that expanded to an application
                let mut kids = h.kids.clone();
                kids.extend(c.kids[1..].iter().cloned());
                cur = Term::compound(Op::App, kids);
                continue;
            }
        }
        if Rc::ptr_eq(&head, &c.kids[0]) {
            return cur;
        }
        let mut kids = c.kids.clone();
        kids[0] = head;
        cur = Term::compound(Op::App, kids);
    }
}

/// Structural equality up to definition chasing, weak-head reduction, binder
/// identification, and hole unification.
pub fn defeq(a: &TermRef, b: &TermRef) -> bool {
    if Rc::ptr_eq(a, b) {
        return true;
    }
    let a = follow_defs(a);
    let b = follow_defs(b);
    if Rc::ptr_eq(&a, &b) {
        return true;
    }

    // unification of unresolved holes, left side first
    if let Term::Hole(h) = &*a {
        h.fill(b.clone());
        return true;
    }
    if let Term::Hole(h) = &*b {
        h.fill(a.clone());
        return true;
    }

    match (&*a, &*b) {
        (Term::Type, Term::Type)
        | (Term::Kind, Term::Kind)
        | (Term::Mpz, Term::Mpz)
        | (Term::Mpq, Term::Mpq) => true,
        (Term::Int(x), Term::Int(y)) => x == y,
        (Term::Rat(x), Term::Rat(y)) => x == y,
        // distinct unbound symbols are never equal
        (Term::Sym(_), Term::Sym(_)) => false,
        (Term::Compound(ca), Term::Compound(cb)) => {
            match (ca.op, cb.op) {
                (Op::Pi, Op::Pi) | (Op::Lam, Op::Lam) if ca.op == cb.op => {
                    binders_eq(&a, &b)
                }
                _ if ca.op == cb.op && ca.kids.len() == cb.kids.len() => ca
                    .kids
                    .iter()
                    .zip(&cb.kids)
                    .all(|(x, y)| defeq(x, y)),
                _ => whr_retry(&a, &b),
            }
        }
        _ => whr_retry(&a, &b),
    }
}

/// Compare two binder nodes after identifying their bound variables: the
/// right binder's value slot is aliased to the left binder for the duration
/// of the comparison.
fn binders_eq(a: &TermRef, b: &TermRef) -> bool {
    let (Term::Compound(ca), Term::Compound(cb)) = (&**a, &**b) else {
        unreachable!("binders_eq on non-compounds");
    };
    let (var_a, var_b) = (&ca.kids[0], &cb.kids[0]);
    if ca.op == Op::Pi && !defeq(&ca.kids[1], &cb.kids[1]) {
        return false;
    }
    let body = ca.kids.len() - 1;
    let Some(sb) = var_b.as_sym() else {
        return false;
    };
    let saved = sb.swap_val(Some(var_a.clone()));
    let eq = defeq(&ca.kids[body], &cb.kids[body]);
    sb.set_val(saved);
    eq
}

/// Heads disagree: try exposing the true constructors by weak-head reduction
/// and compare again. Gives up when reduction makes no progress.
fn whr_retry(a: &TermRef, b: &TermRef) -> bool {
    let ra = weak_head_reduce(a);
    let rb = weak_head_reduce(b);
    if Rc::ptr_eq(&ra, a) && Rc::ptr_eq(&rb, b) {
        return false;
    }
    defeq(&ra, &rb)
}
