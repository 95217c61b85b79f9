//! Static typing of side-condition code.
//!
//! Computes each sub-expression's type bottom-up. Applications must be
//! exactly saturated, numeric operators need matching operand kinds, and the
//! mark/compare family only works on values whose type is "simple": an
//! unbound symbol classified by `type`. Everything here is decided before a
//! single step of evaluation runs.

use std::rc::Rc;

use attest_core::symbol_table::{Binding, SymbolTable};
use attest_core::term::{Op, Term, TermRef, collect_args};
use attest_core::{compute_kind, defeq, follow_defs, free_in, proper_or_datatype};

#[derive(Debug, Clone, thiserror::Error)]
pub enum StaticError {
    #[error("a symbol is missing a type in code: {0}")]
    UntypedSymbol(String),
    #[error("encountered a hole in code")]
    Hole,
    #[error("the head of an application is neither a program nor a symbol: {0}")]
    BadHead(String),
    #[error("the head of an application does not have functional type in code: {0}")]
    NotAFunction(String),
    #[error("a function is not fully applied in code: {0}")]
    TooFewArguments(String),
    #[error("a function is applied to too many arguments in code: {0}")]
    TooManyArguments(String),
    #[error(
        "type mismatch for argument {index} in {app}: computed {computed}, expected {expected}"
    )]
    ArgumentMismatch {
        index: usize,
        app: String,
        computed: String,
        expected: String,
    },
    #[error("a dependently typed function is applied in code: {0}")]
    DependentApplication(String),
    #[error("numeric operands must both be mpz or both mpq in {0}")]
    NumericMismatch(String),
    #[error("mpz_to_mpq expects an mpz operand, got one of type {0}")]
    NotAnInteger(String),
    #[error("{form} is used with an expression that cannot be a lambda-bound variable: {term}")]
    NotSimple { form: &'static str, term: String },
    #[error("{form} branches do not share one type: {first} vs {second}")]
    BranchMismatch {
        form: &'static str,
        first: String,
        second: String,
    },
    #[error("the match scrutinee's type is neither proper nor a datatype: {0}")]
    BadScrutinee(String),
    #[error("too few arguments to a constructor in a pattern: {0}")]
    TooFewPatternArguments(String),
    #[error("too many arguments to a constructor in a pattern: {0}")]
    TooManyPatternArguments(String),
    #[error("types for bodies of match cases differ: {first} vs {second}")]
    CaseTypeMismatch { first: String, second: String },
    #[error("fail is used with an expression that is not a type: {0}")]
    FailNotType(String),
    #[error("{0}")]
    Kind(String),
    #[error("unrecognized form of code: {0}")]
    Unrecognized(String),
}

type Result<T> = std::result::Result<T, StaticError>;

/// Type-check a code term, returning its computed type.
pub fn check_code(code: &TermRef, symbols: &mut SymbolTable) -> Result<TermRef> {
    match &**code {
        Term::Int(_) => Ok(Rc::new(Term::Mpz)),
        Term::Rat(_) => Ok(Rc::new(Term::Mpq)),
        Term::Mpz | Term::Mpq => Ok(Rc::new(Term::Type)),
        Term::Hole(_) => Err(StaticError::Hole),
        Term::Sym(s) => symbols
            .get(&s.name)
            .ty
            .ok_or_else(|| StaticError::UntypedSymbol(s.name.clone())),
        Term::Type | Term::Kind => Err(StaticError::Unrecognized(code.to_string())),
        Term::Compound(c) => match c.op {
            Op::App => check_app(code, symbols),
            Op::Do => {
                check_code(&c.kids[0], symbols)?;
                check_code(&c.kids[1], symbols)
            }
            Op::Let => {
                let var = c.kids[0].as_sym().expect("let binds a symbol");
                let tp = check_code(&c.kids[1], symbols)?;
                let prev = symbols.insert(&var.name, Binding::new(None, Some(tp)));
                let body_tp = check_code(&c.kids[2], symbols);
                symbols.insert(&var.name, prev);
                body_tp
            }
            Op::Add | Op::Mul | Op::Div => {
                let tp0 = numeric_operand(&c.kids[0], code, symbols)?;
                let tp1 = numeric_operand(&c.kids[1], code, symbols)?;
                if std::mem::discriminant(&*tp0) != std::mem::discriminant(&*tp1) {
                    return Err(StaticError::NumericMismatch(code.to_string()));
                }
                Ok(tp0)
            }
            Op::Neg => numeric_operand(&c.kids[0], code, symbols),
            Op::ZToQ => {
                let tp = follow_defs(&check_code(&c.kids[0], symbols)?);
                if !matches!(&*tp, Term::Mpz) {
                    return Err(StaticError::NotAnInteger(tp.to_string()));
                }
                Ok(Rc::new(Term::Mpq))
            }
            Op::IfNeg | Op::IfZero => {
                numeric_operand(&c.kids[0], code, symbols)?;
                let tp1 = check_code(&c.kids[1], symbols)?;
                let tp2 = check_code(&c.kids[2], symbols)?;
                same_branch_type("mp_if", &tp1, &tp2)
            }
            Op::IfMarked(_) => {
                let tp = check_code(&c.kids[0], symbols)?;
                require_simple("ifmarked", &c.kids[0], &tp, symbols)?;
                let tp1 = check_code(&c.kids[1], symbols)?;
                let tp2 = check_code(&c.kids[2], symbols)?;
                require_simple("ifmarked", &c.kids[1], &tp1, symbols)?;
                same_branch_type("ifmarked", &tp1, &tp2)
            }
            Op::MarkVar(_) => {
                let tp = check_code(&c.kids[0], symbols)?;
                require_simple("markvar", &c.kids[0], &tp, symbols)?;
                Ok(tp)
            }
            Op::Compare => {
                let tp0 = check_code(&c.kids[0], symbols)?;
                require_simple("compare", &c.kids[0], &tp0, symbols)?;
                let tp1 = check_code(&c.kids[1], symbols)?;
                require_simple("compare", &c.kids[1], &tp1, symbols)?;
                let tp2 = check_code(&c.kids[2], symbols)?;
                let tp3 = check_code(&c.kids[3], symbols)?;
                require_simple("compare", &c.kids[2], &tp2, symbols)?;
                same_branch_type("compare", &tp2, &tp3)
            }
            Op::IfEqual => {
                let tp0 = check_code(&c.kids[0], symbols)?;
                let tp1 = check_code(&c.kids[1], symbols)?;
                if !defeq(&tp0, &tp1) {
                    return Err(StaticError::BranchMismatch {
                        form: "ifequal",
                        first: tp0.to_string(),
                        second: tp1.to_string(),
                    });
                }
                let tp2 = check_code(&c.kids[2], symbols)?;
                let tp3 = check_code(&c.kids[3], symbols)?;
                require_simple("ifequal", &c.kids[2], &tp2, symbols)?;
                same_branch_type("ifequal", &tp2, &tp3)
            }
            Op::Match => check_match(code, symbols),
            Op::Fail => {
                let tp = follow_defs(&check_code(&c.kids[0], symbols)?);
                if !matches!(&*tp, Term::Type) {
                    return Err(StaticError::FailNotType(c.kids[0].to_string()));
                }
                Ok(c.kids[0].clone())
            }
            _ => Err(StaticError::Unrecognized(code.to_string())),
        },
    }
}

fn numeric_operand(
    operand: &TermRef,
    whole: &TermRef,
    symbols: &mut SymbolTable,
) -> Result<TermRef> {
    let tp = follow_defs(&check_code(operand, symbols)?);
    if !matches!(&*tp, Term::Mpz | Term::Mpq) {
        return Err(StaticError::NumericMismatch(whole.to_string()));
    }
    Ok(tp)
}

/// A "simple" type is an unbound symbol classified by `type`: something a
/// lambda-bound variable could have, so runtime identity tests make sense.
fn require_simple(
    form: &'static str,
    term: &TermRef,
    tp: &TermRef,
    symbols: &SymbolTable,
) -> Result<()> {
    let tp = follow_defs(tp);
    let simple = tp.as_sym().is_some_and(|s| {
        s.val().is_none()
            && symbols
                .get(&s.name)
                .ty
                .is_some_and(|k| matches!(&*follow_defs(&k), Term::Type))
    });
    if simple {
        Ok(())
    } else {
        Err(StaticError::NotSimple {
            form,
            term: term.to_string(),
        })
    }
}

fn same_branch_type(form: &'static str, a: &TermRef, b: &TermRef) -> Result<TermRef> {
    if defeq(a, b) {
        Ok(a.clone())
    } else {
        Err(StaticError::BranchMismatch {
            form,
            first: a.to_string(),
            second: b.to_string(),
        })
    }
}

fn check_app(code: &TermRef, symbols: &mut SymbolTable) -> Result<TermRef> {
    let c = code.as_compound().expect("application");
    let mut arg_tps = Vec::with_capacity(c.kids.len() - 1);
    for arg in &c.kids[1..] {
        arg_tps.push(check_code(arg, symbols)?);
    }

    let head = follow_defs(&c.kids[0]);
    let tp = if head.op() == Some(Op::Prog) {
        Some(head.as_compound().unwrap().kids[0].clone())
    } else if let Some(s) = head.as_sym() {
        symbols.get(&s.name).ty
    } else if let Some(s) = c.kids[0].as_sym() {
        // the head was a transparent definition; back up to its name
        symbols.get(&s.name).ty
    } else {
        return Err(StaticError::BadHead(code.to_string()));
    };
    let tp = tp.ok_or_else(|| StaticError::UntypedSymbol(code.to_string()))?;

    let mut cur = follow_defs(&tp);
    if cur.op() != Some(Op::Pi) {
        return Err(StaticError::NotAFunction(code.to_string()));
    }
    let mut i = 0;
    loop {
        let next = {
            let Some(pi) = cur.as_compound().filter(|p| p.op == Op::Pi) else {
                break;
            };
            if i >= arg_tps.len() {
                return Err(StaticError::TooFewArguments(code.to_string()));
            }
            let domain = &pi.kids[1];
            // exact match, or one level of unwrapped application
            let matches_domain = defeq(&arg_tps[i], domain)
                || arg_tps[i]
                    .as_compound()
                    .filter(|a| a.op == Op::App)
                    .is_some_and(|a| defeq(&a.kids[0], domain));
            if !matches_domain {
                return Err(StaticError::ArgumentMismatch {
                    index: i,
                    app: code.to_string(),
                    computed: arg_tps[i].to_string(),
                    expected: domain.to_string(),
                });
            }
            if free_in(&pi.kids[2], &pi.kids[0]) {
                return Err(StaticError::DependentApplication(code.to_string()));
            }
            follow_defs(&pi.kids[2])
        };
        i += 1;
        cur = next;
    }
    if i < arg_tps.len() {
        return Err(StaticError::TooManyArguments(code.to_string()));
    }
    Ok(cur)
}

fn check_match(code: &TermRef, symbols: &mut SymbolTable) -> Result<TermRef> {
    let c = code.as_compound().expect("match");
    let scrut_tp = check_code(&c.kids[0], symbols)?;
    let kind =
        compute_kind(&scrut_tp, symbols).map_err(|e| StaticError::Kind(e.to_string()))?;
    if !matches!(&*follow_defs(&kind), Term::Type) && !proper_or_datatype(&kind) {
        return Err(StaticError::BadScrutinee(scrut_tp.to_string()));
    }

    let mut match_tp: Option<TermRef> = None;
    for case in &c.kids[1..] {
        let tp = if case.op() == Some(Op::Case) {
            let cc = case.as_compound().unwrap();
            let pat = &cc.kids[0];
            if pat.as_sym().is_some() {
                check_code(&cc.kids[1], symbols)?
            } else {
                check_pattern_case(pat, &cc.kids[1], symbols)?
            }
        } else {
            // the default
            check_code(case, symbols)?
        };
        match match_tp {
            None => match_tp = Some(tp),
            Some(ref m) => {
                if !defeq(m, &tp) {
                    return Err(StaticError::CaseTypeMismatch {
                        first: m.to_string(),
                        second: tp.to_string(),
                    });
                }
            }
        }
    }
    Ok(match_tp.expect("parser guarantees at least one case"))
}

/// Bind a constructor pattern's variables to the constructor's parameter
/// types, check the body, restore.
fn check_pattern_case(
    pat: &TermRef,
    body: &TermRef,
    symbols: &mut SymbolTable,
) -> Result<TermRef> {
    let (ctor, vars) = collect_args(pat);
    let ctor_name = &ctor.as_sym().expect("pattern head is a constructor").name;
    let ctor_tp = symbols
        .get(ctor_name)
        .ty
        .ok_or_else(|| StaticError::UntypedSymbol(ctor_name.clone()))?;

    let mut cur = follow_defs(&ctor_tp);
    let mut prevs = Vec::with_capacity(vars.len());
    for var in &vars {
        let next = {
            let Some(pi) = cur.as_compound().filter(|p| p.op == Op::Pi) else {
                // roll back what we bound before failing
                restore(symbols, &vars, prevs);
                return Err(StaticError::TooManyPatternArguments(pat.to_string()));
            };
            let name = &var.as_sym().expect("pattern variable").name;
            prevs.push(symbols.insert(name, Binding::new(None, Some(pi.kids[1].clone()))));
            follow_defs(&pi.kids[2])
        };
        cur = next;
    }
    if cur.op() == Some(Op::Pi) {
        restore(symbols, &vars, prevs);
        return Err(StaticError::TooFewPatternArguments(pat.to_string()));
    }

    let tp = check_code(body, symbols);
    restore(symbols, &vars, prevs);
    tp
}

fn restore(symbols: &mut SymbolTable, vars: &[TermRef], prevs: Vec<Binding>) {
    for (var, prev) in vars.iter().zip(prevs) {
        symbols.insert(&var.as_sym().unwrap().name, prev);
    }
}
