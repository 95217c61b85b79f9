//! The term graph.
//!
//! Terms form a shared, acyclic graph: `TermRef` is an `Rc`, and every
//! function that returns a `TermRef` hands the caller one owning reference.
//! Mutable slots (a symbol's transparent value, a hole's resolution, mark
//! bits, the clone-on-write bit) use `Cell`/`RefCell`; the checker is
//! single-threaded, so the save/use/restore discipline on these slots is the
//! only synchronization there is.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use num_bigint::BigInt;
use num_rational::BigRational;

pub type TermRef = Rc<Term>;

/// Operator tag of a compound term.
///
/// The first four groups are the logical framework proper; the rest are the
/// side-condition language. `IfMarked`/`MarkVar` carry their mark slot
/// (0..=31) directly on the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Pi,
    Lam,
    App,
    Run,
    Prog,
    ProgVars,
    Case,
    Do,
    Let,
    Add,
    Mul,
    Div,
    Neg,
    ZToQ,
    IfNeg,
    IfZero,
    IfMarked(u8),
    MarkVar(u8),
    Compare,
    IfEqual,
    Match,
    Fail,
}

/// A compound node: operator tag plus a small array of children.
#[derive(Debug)]
pub struct Compound {
    pub op: Op,
    pub kids: Vec<TermRef>,
    /// For `Pi` nodes: whether the binder occurs free in the range.
    /// Computed once by [`Term::pi`], read on every application.
    free_in_range: Cell<bool>,
    /// Set while this node's binder may be under destructive substitution.
    /// A second substitution must copy the node first; see [`Term::cow`].
    cloned: Cell<bool>,
}

impl Compound {
    fn shallow_clone(&self) -> Compound {
        Compound {
            op: self.op,
            kids: self.kids.clone(),
            free_in_range: Cell::new(self.free_in_range.get()),
            cloned: Cell::new(false),
        }
    }
}

// Terms can right-nest to proof depth; the derived drop would recurse that
// deep. Drain children onto an explicit worklist instead.
impl Drop for Compound {
    fn drop(&mut self) {
        let mut pending: Vec<TermRef> = self.kids.drain(..).collect();
        while let Some(t) = pending.pop() {
            if let Ok(Term::Compound(mut c)) = Rc::try_unwrap(t) {
                pending.append(&mut c.kids);
            }
        }
    }
}

/// A named leaf: an unbound variable, a constant with a transparent
/// definition in `val`, or a program name bound to a `Prog` node.
///
/// Identity is `Rc` pointer identity; two symbols spelled the same are
/// distinct binders.
#[derive(Debug)]
pub struct Symbol {
    pub name: String,
    val: RefCell<Option<TermRef>>,
    marks: Cell<u32>,
}

impl Symbol {
    pub fn val(&self) -> Option<TermRef> {
        self.val.borrow().clone()
    }

    pub fn set_val(&self, v: Option<TermRef>) {
        *self.val.borrow_mut() = v;
    }

    /// Swap in a new value, returning the previous one (save/restore).
    pub fn swap_val(&self, v: Option<TermRef>) -> Option<TermRef> {
        self.val.replace(v)
    }

    pub fn mark(&self, slot: u8) -> bool {
        debug_assert!(slot < 32);
        self.marks.get() & (1 << slot) != 0
    }

    pub fn toggle_mark(&self, slot: u8) {
        debug_assert!(slot < 32);
        self.marks.set(self.marks.get() ^ (1 << slot));
    }
}

/// An unresolved placeholder, filled at most once by unification.
#[derive(Debug, Default)]
pub struct Hole {
    val: RefCell<Option<TermRef>>,
}

impl Hole {
    pub fn val(&self) -> Option<TermRef> {
        self.val.borrow().clone()
    }

    /// Resolve the hole. Re-resolution is a contract violation.
    pub fn fill(&self, v: TermRef) {
        let prev = self.val.replace(Some(v));
        assert!(prev.is_none(), "hole resolved twice");
    }
}

#[derive(Debug)]
pub enum Term {
    /// The universe of proper types.
    Type,
    /// The universe of kinds.
    Kind,
    /// The type of arbitrary-precision integers.
    Mpz,
    /// The type of arbitrary-precision rationals.
    Mpq,
    Int(BigInt),
    Rat(BigRational),
    Sym(Symbol),
    Hole(Hole),
    Compound(Compound),
}

impl Term {
    pub fn sym(name: impl Into<String>) -> TermRef {
        Rc::new(Term::Sym(Symbol {
            name: name.into(),
            val: RefCell::new(None),
            marks: Cell::new(0),
        }))
    }

    pub fn hole() -> TermRef {
        Rc::new(Term::Hole(Hole::default()))
    }

    pub fn int(n: BigInt) -> TermRef {
        Rc::new(Term::Int(n))
    }

    pub fn rat(q: BigRational) -> TermRef {
        Rc::new(Term::Rat(q))
    }

    pub fn compound(op: Op, kids: Vec<TermRef>) -> TermRef {
        Rc::new(Term::Compound(Compound {
            op,
            kids,
            free_in_range: Cell::new(false),
            cloned: Cell::new(false),
        }))
    }

    /// Build a dependent-function node, caching whether `var` occurs free in
    /// `range`.
    pub fn pi(var: TermRef, domain: TermRef, range: TermRef) -> TermRef {
        let free = free_in(&range, &var);
        let t = Term::compound(Op::Pi, vec![var, domain, range]);
        if let Term::Compound(c) = &*t {
            c.free_in_range.set(free);
        }
        t
    }

    pub fn lam(var: TermRef, body: TermRef) -> TermRef {
        Term::compound(Op::Lam, vec![var, body])
    }

    /// Append one argument to an application, flattening the spine.
    pub fn make_app(f: TermRef, arg: TermRef) -> TermRef {
        match &*f {
            Term::Compound(c) if c.op == Op::App => {
                let mut kids = c.kids.clone();
                kids.push(arg);
                Term::compound(Op::App, kids)
            }
            _ => Term::compound(Op::App, vec![f, arg]),
        }
    }

    pub fn as_sym(&self) -> Option<&Symbol> {
        match self {
            Term::Sym(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_hole(&self) -> Option<&Hole> {
        match self {
            Term::Hole(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Term::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn op(&self) -> Option<Op> {
        self.as_compound().map(|c| c.op)
    }

    /// Cached free-in-range bit of a `Pi` node.
    pub fn binder_free_in_range(&self) -> bool {
        match self {
            Term::Compound(c) if c.op == Op::Pi => c.free_in_range.get(),
            _ => false,
        }
    }

    /// Clone-on-write for a compound whose binder is about to be substituted.
    ///
    /// If the node is already under an in-flight substitution (`cloned` set),
    /// copy just this node, sharing its children; otherwise mark it and reuse
    /// it directly.
    pub fn cow(t: TermRef) -> TermRef {
        match &*t {
            Term::Compound(c) if c.cloned.get() => Rc::new(Term::Compound(c.shallow_clone())),
            Term::Compound(c) => {
                c.cloned.set(true);
                t
            }
            _ => t,
        }
    }
}

/// Head of an application spine (the term itself when not an application).
pub fn head_of(t: &TermRef) -> TermRef {
    match &**t {
        Term::Compound(c) if c.op == Op::App => c.kids[0].clone(),
        _ => t.clone(),
    }
}

/// Split an application into head and arguments.
pub fn collect_args(t: &TermRef) -> (TermRef, Vec<TermRef>) {
    match &**t {
        Term::Compound(c) if c.op == Op::App => (c.kids[0].clone(), c.kids[1..].to_vec()),
        _ => (t.clone(), Vec::new()),
    }
}

/// Occurrence check: does `var` (by identity) occur in `t`?
///
/// Chases filled holes and bound-symbol values so that substituted
/// occurrences are still seen.
pub fn free_in(t: &TermRef, var: &TermRef) -> bool {
    if Rc::ptr_eq(t, var) {
        return true;
    }
    match &**t {
        Term::Compound(c) => c.kids.iter().any(|k| free_in(k, var)),
        Term::Sym(s) => s.val().is_some_and(|v| free_in(&v, var)),
        Term::Hole(h) => h.val().is_some_and(|v| free_in(&v, var)),
        _ => false,
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Type => write!(f, "type"),
            Term::Kind => write!(f, "kind"),
            Term::Mpz => write!(f, "mpz"),
            Term::Mpq => write!(f, "mpq"),
            Term::Int(n) => write!(f, "{}", n),
            Term::Rat(q) => write!(f, "{}/{}", q.numer(), q.denom()),
            Term::Sym(s) => write!(f, "{}", s.name),
            Term::Hole(h) => match h.val() {
                Some(v) => write!(f, "{}", v),
                None => write!(f, "_"),
            },
            Term::Compound(c) => {
                let kid = |i: usize| &c.kids[i];
                match c.op {
                    Op::Pi => write!(f, "(! {} {} {})", kid(0), kid(1), kid(2)),
                    Op::Lam => write!(f, "(\\ {} {})", kid(0), kid(1)),
                    Op::App => {
                        write!(f, "({}", kid(0))?;
                        for a in &c.kids[1..] {
                            write!(f, " {}", a)?;
                        }
                        write!(f, ")")
                    }
                    Op::Run => write!(f, "(^ {} {})", kid(0), kid(1)),
                    Op::Prog => write!(f, "(program {} {})", kid(0), kid(2)),
                    Op::ProgVars => {
                        write!(f, "(")?;
                        for (i, v) in c.kids.iter().enumerate() {
                            if i > 0 {
                                write!(f, " ")?;
                            }
                            write!(f, "{}", v)?;
                        }
                        write!(f, ")")
                    }
                    Op::Case => write!(f, "({} {})", kid(0), kid(1)),
                    Op::Do => write!(f, "(do {} {})", kid(0), kid(1)),
                    Op::Let => write!(f, "(let {} {} {})", kid(0), kid(1), kid(2)),
                    Op::Add => write!(f, "(mp_add {} {})", kid(0), kid(1)),
                    Op::Mul => write!(f, "(mp_mul {} {})", kid(0), kid(1)),
                    Op::Div => write!(f, "(mp_div {} {})", kid(0), kid(1)),
                    Op::Neg => write!(f, "(mp_neg {})", kid(0)),
                    Op::ZToQ => write!(f, "(mpz_to_mpq {})", kid(0)),
                    Op::IfNeg => write!(f, "(mp_ifneg {} {} {})", kid(0), kid(1), kid(2)),
                    Op::IfZero => write!(f, "(mp_ifzero {} {} {})", kid(0), kid(1), kid(2)),
                    Op::IfMarked(slot) => write!(
                        f,
                        "(ifmarked{} {} {} {})",
                        slot + 1,
                        kid(0),
                        kid(1),
                        kid(2)
                    ),
                    Op::MarkVar(slot) => write!(f, "(markvar{} {})", slot + 1, kid(0)),
                    Op::Compare => write!(
                        f,
                        "(compare {} {} {} {})",
                        kid(0),
                        kid(1),
                        kid(2),
                        kid(3)
                    ),
                    Op::IfEqual => write!(
                        f,
                        "(ifequal {} {} {} {})",
                        kid(0),
                        kid(1),
                        kid(2),
                        kid(3)
                    ),
                    Op::Match => {
                        write!(f, "(match {}", kid(0))?;
                        for case in &c.kids[1..] {
                            write!(f, " {}", case)?;
                        }
                        write!(f, ")")
                    }
                    Op::Fail => write!(f, "(fail {})", kid(0)),
                }
            }
        }
    }
}
