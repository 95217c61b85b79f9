//! Bidirectional checking of proof terms, straight off the token stream.
//!
//! `check_term` either checks the next term against an expected type or
//! infers one, materializing the term itself only when a caller needs it
//! (`create`). Binder forms in checking-mode return position do not recurse:
//! they rebind the goal and loop, so proofs written as long chains of `@`,
//! `\` and final-argument applications check in constant stack. Positions
//! trampolined this way leave their close paren unconsumed; callers sweep
//! them up with `eat_excess`.

use attest_core::symbol_table::Binding;
use attest_core::term::{Op, Term, TermRef, free_in, head_of};
use attest_core::{defeq, follow_defs};

use crate::error::Result;
use crate::lexer::{Tok, TokenSource};
use crate::session::Session;

/// What to do with the next term on the stream.
#[derive(Clone)]
pub(crate) struct Goal {
    /// Materialize the term (not just verify it).
    pub create: bool,
    /// Check against this type; `None` infers one.
    pub expected: Option<TermRef>,
    /// Permit a hole in this position.
    pub hole_ok: bool,
    /// This term ends its enclosing command, so binders may trampoline.
    pub return_pos: bool,
    /// Inside an ascription: escaping holes are collected, not fatal.
    pub in_asc: bool,
}

impl Goal {
    pub fn infer(create: bool) -> Self {
        Goal {
            create,
            expected: None,
            hole_ok: false,
            return_pos: false,
            in_asc: false,
        }
    }

    pub fn check(expected: TermRef, create: bool) -> Self {
        Goal {
            expected: Some(expected),
            ..Goal::infer(create)
        }
    }

    pub fn in_return_position(mut self) -> Self {
        self.return_pos = true;
        self
    }
}

/// Outcome of checking one term.
pub(crate) struct Checked {
    /// The materialized term, when the goal asked for one.
    pub term: Option<TermRef>,
    /// The inferred classifier, when no expected type was given.
    pub computed: Option<TermRef>,
    /// The term was a bare hole.
    pub is_hole: bool,
}

impl Checked {
    fn done(term: Option<TermRef>, computed: Option<TermRef>) -> Self {
        Checked {
            term,
            computed,
            is_hole: false,
        }
    }

    pub fn created(&self, ts: &TokenSource<'_>) -> Result<TermRef> {
        self.term
            .clone()
            .ok_or_else(|| ts.type_err("no term was materialized in this position".into()))
    }

    pub fn classifier(&self, ts: &TokenSource<'_>) -> Result<TermRef> {
        self.computed
            .clone()
            .ok_or_else(|| ts.type_err("no classifier was computed in this position".into()))
    }
}

impl Session<'_> {
    pub(crate) fn check_term(&mut self, ts: &mut TokenSource<'_>, goal: Goal) -> Result<Checked> {
        let Goal {
            mut create,
            mut expected,
            mut hole_ok,
            return_pos,
            in_asc,
        } = goal;
        // classifier committed by a trampolined application, reported once
        // the loop bottoms out
        let mut committed: Option<TermRef> = None;

        let result = 'tail: loop {
            // trampolining rewrites the goal of the enclosing check command;
            // every other command's terms recurse
            let tail_ok =
                self.in_check && !self.config.no_tail_calls && return_pos && !create;
            let t = ts.next()?;
            match t {
                Tok::Hole => {
                    if !hole_ok {
                        return Err(ts.hole_err());
                    }
                    break 'tail Checked {
                        term: Some(Term::hole()),
                        computed: None,
                        is_hole: true,
                    };
                }

                Tok::Natural | Tok::Rational => {
                    break 'tail self.check_literal(ts, t == Tok::Natural, expected.take())?;
                }

                Tok::Open => {
                    self.open_parens += 1;
                    let form = ts.next()?;
                    match form {
                        Tok::Bang => {
                            break 'tail self.check_pi(
                                ts,
                                create,
                                expected.take(),
                                return_pos,
                                in_asc,
                            )?;
                        }

                        // (-> d1 ... dn R), sugar for nested (! _ di ...)
                        Tok::Arrow => {
                            break 'tail self.check_arrow(
                                ts,
                                create,
                                expected.take(),
                                in_asc,
                            )?;
                        }

                        Tok::Pound => {
                            break 'tail self.check_annotated_lambda(
                                ts,
                                create,
                                expected.take(),
                                return_pos,
                                in_asc,
                            )?;
                        }

                        // (% x A t): binder usable only at the end of a check
                        Tok::Percent => {
                            if expected.is_some() || create || !return_pos || !self.in_check {
                                return Err(ts.type_err(
                                    "a big lambda may only end a check command".into(),
                                ));
                            }
                            self.begin_big_lambda(ts)?;
                            hole_ok = false;
                            continue 'tail;
                        }

                        // (\ x t): bare lambda, checking mode only
                        Tok::Backslash => {
                            let Some(exp) = expected.take() else {
                                return Err(ts.type_err(
                                    "cannot infer a type for a lambda; try inserting \
                                     an ascription"
                                        .into(),
                                ));
                            };
                            match self.check_lambda(ts, create, exp, return_pos, in_asc, tail_ok)? {
                                LambdaOutcome::Done(done) => break 'tail done,
                                LambdaOutcome::Tail(range) => {
                                    expected = Some(range);
                                    hole_ok = false;
                                    continue 'tail;
                                }
                            }
                        }

                        Tok::Caret => {
                            break 'tail self.check_run_gate(ts, create, expected.take())?;
                        }

                        Tok::Colon => {
                            break 'tail self.check_ascription(
                                ts,
                                create,
                                expected.take(),
                                return_pos,
                            )?;
                        }

                        // (@ x t u): transparent local definition
                        Tok::At => {
                            let upto = self.open_parens;
                            let (name, prev) = self.check_let_binding(ts, in_asc)?;
                            if tail_ok {
                                self.local_syms.push((name, prev));
                                continue 'tail;
                            }
                            let body = self.check_term(
                                ts,
                                Goal {
                                    create,
                                    expected: expected.clone(),
                                    hole_ok,
                                    return_pos,
                                    in_asc,
                                },
                            )?;
                            self.eat_excess(ts, upto)?;
                            self.eat_rparen(ts)?;
                            self.symbols.insert(&name, prev);
                            break 'tail body;
                        }

                        Tok::Tilde => {
                            break 'tail self.check_negation(
                                ts,
                                create,
                                expected.take(),
                                hole_ok,
                                return_pos,
                                in_asc,
                            )?;
                        }

                        // (f a1 a2 ...); the head may itself be
                        // parenthesized, e.g. ((: T f) a)
                        w if w == Tok::Open || w.is_wordlike() => {
                            ts.unread(w);
                            match self.check_app(ts, create, &mut expected, in_asc)? {
                                AppOutcome::Done(done) => break 'tail done,
                                AppOutcome::Tail {
                                    domain,
                                    range_inferred,
                                } => {
                                    if let Some(r) = range_inferred {
                                        committed = Some(r);
                                    }
                                    create = false;
                                    expected = Some(domain);
                                    hole_ok = false;
                                    continue 'tail;
                                }
                            }
                        }

                        _ => {
                            return Err(ts.syntax(format!(
                                "unexpected token {:?} at the start of a term",
                                ts.text()
                            )));
                        }
                    }
                }

                w if w.is_wordlike() => {
                    break 'tail self.check_ident(ts, expected.take())?;
                }

                _ => {
                    return Err(ts.syntax(format!(
                        "unexpected token {:?} at the start of a term",
                        ts.text()
                    )));
                }
            }
        };

        Ok(Checked {
            computed: committed.or(result.computed),
            ..result
        })
    }

    fn check_literal(
        &mut self,
        ts: &mut TokenSource<'_>,
        natural: bool,
        expected: Option<TermRef>,
    ) -> Result<Checked> {
        let (lit, cls) = if natural {
            (self.read_natural(ts)?, self.mpz_tm.clone())
        } else {
            (self.read_rational(ts)?, self.mpq_tm.clone())
        };
        match expected {
            Some(e) => {
                if !defeq(&e, &cls) {
                    return Err(ts.type_err(format!(
                        "a numeric literal of type {cls} where {e} is expected"
                    )));
                }
                Ok(Checked::done(Some(lit), None))
            }
            None => Ok(Checked::done(Some(lit), Some(cls))),
        }
    }

    fn check_ident(&mut self, ts: &mut TokenSource<'_>, expected: Option<TermRef>) -> Result<Checked> {
        let name = ts.text();
        let binding = self.symbols.get(name);
        let (Some(val), Some(ty)) = (binding.val, binding.ty) else {
            return Err(ts.scope(format!("undeclared identifier: {name}")));
        };
        match expected {
            Some(e) => {
                if !defeq(&e, &ty) {
                    return Err(ts.type_err(format!(
                        "the type of {name} is {ty}, but {e} is expected"
                    )));
                }
                Ok(Checked::done(Some(val), None))
            }
            None => Ok(Checked::done(Some(val), Some(ty))),
        }
    }

    /// `(! x A B)`: the dependent function type.
    fn check_pi(
        &mut self,
        ts: &mut TokenSource<'_>,
        create: bool,
        expected: Option<TermRef>,
        return_pos: bool,
        in_asc: bool,
    ) -> Result<Checked> {
        let name = ts.name()?;
        let var = Term::sym(&name);
        let upto = self.open_parens;
        self.allow_run = true;
        let dom = self
            .check_term(ts, Goal::check(self.type_tm.clone(), true))?
            .created(ts)?;
        self.allow_run = false;
        self.eat_excess(ts, upto)?;
        let prev = self
            .symbols
            .insert(&name, Binding::new(Some(var.clone()), Some(dom.clone())));
        let range = self.check_term(
            ts,
            Goal {
                create,
                expected: expected.clone(),
                hole_ok: false,
                return_pos,
                in_asc,
            },
        )?;
        self.eat_excess(ts, upto)?;
        self.eat_rparen(ts)?;
        self.symbols.insert(&name, prev);
        let computed = match &expected {
            Some(e) => {
                if !matches!(&*follow_defs(e), Term::Type | Term::Kind) {
                    return Err(ts.type_err(format!(
                        "the expected classifier for a function type is neither type \
                         nor kind: {e}"
                    )));
                }
                None
            }
            None => {
                let cls = range.classifier(ts)?;
                if !matches!(&*follow_defs(&cls), Term::Type | Term::Kind) {
                    return Err(ts.type_err(format!(
                        "the range of a function type classifies as {cls}, not type \
                         or kind"
                    )));
                }
                Some(cls)
            }
        };
        let term = if create {
            Some(Term::pi(var, dom, range.created(ts)?))
        } else {
            None
        };
        Ok(Checked::done(term, computed))
    }

    /// `(# x A t)`: a lambda annotated with its domain, so it can infer.
    fn check_annotated_lambda(
        &mut self,
        ts: &mut TokenSource<'_>,
        create: bool,
        expected: Option<TermRef>,
        return_pos: bool,
        in_asc: bool,
    ) -> Result<Checked> {
        let name = ts.name()?;
        let var = Term::sym(&name);
        let upto = self.open_parens;
        self.allow_run = true;
        let dom = self
            .check_term(ts, Goal::check(self.type_tm.clone(), true))?
            .created(ts)?;
        self.allow_run = false;
        self.eat_excess(ts, upto)?;
        let prev = self
            .symbols
            .insert(&name, Binding::new(Some(var.clone()), Some(dom.clone())));
        let body_expected = match &expected {
            Some(e) => {
                let f = follow_defs(e);
                let Some(pi) = f.as_compound().filter(|c| c.op == Op::Pi) else {
                    return Err(ts.type_err(format!(
                        "an annotated lambda against a non-function type: {e}"
                    )));
                };
                if !defeq(&pi.kids[1], &dom) {
                    return Err(ts.type_err(format!(
                        "an annotated lambda's domain is {dom}, but {} is expected",
                        pi.kids[1]
                    )));
                }
                Some(pi.kids[2].clone())
            }
            None => None,
        };
        let body = self.check_term(
            ts,
            Goal {
                create,
                expected: body_expected.clone(),
                hole_ok: false,
                return_pos,
                in_asc,
            },
        )?;
        self.eat_excess(ts, upto)?;
        self.eat_rparen(ts)?;
        self.symbols.insert(&name, prev);
        let computed = match expected {
            Some(_) => None,
            None => {
                let range_ty = body.classifier(ts)?;
                if free_in(&range_ty, &var) {
                    return Err(ts.type_err(format!(
                        "the type of an annotated lambda's body depends on its \
                         binder {name}"
                    )));
                }
                Some(Term::pi(Term::sym(&name), dom.clone(), range_ty))
            }
        };
        let term = if create {
            Some(Term::pi(var, dom, body.created(ts)?))
        } else {
            None
        };
        Ok(Checked::done(term, computed))
    }

    /// Assume the `x A` prefix of a `(% x A t)` for the rest of the command;
    /// unwound by `finish_check`.
    fn begin_big_lambda(&mut self, ts: &mut TokenSource<'_>) -> Result<()> {
        let name = ts.name()?;
        let var = Term::sym(&name);
        let upto = self.open_parens;
        let dom = self
            .check_term(ts, Goal::check(self.type_tm.clone(), true))?
            .created(ts)?;
        self.eat_excess(ts, upto)?;
        let prev = self
            .symbols
            .insert(&name, Binding::new(Some(var), Some(dom)));
        self.local_syms.push((name, prev));
        Ok(())
    }

    /// A `(\ x t)` checked against `exp`. In tail position the binding goes
    /// on `local_syms` and the caller's goal becomes the range; otherwise the
    /// body is checked in place.
    fn check_lambda(
        &mut self,
        ts: &mut TokenSource<'_>,
        create: bool,
        exp: TermRef,
        return_pos: bool,
        in_asc: bool,
        tail_ok: bool,
    ) -> Result<LambdaOutcome> {
        let f = follow_defs(&exp);
        let Some(pi) = f.as_compound().filter(|c| c.op == Op::Pi) else {
            return Err(ts.type_err(format!(
                "a lambda is checked against {exp}, which is not a function type"
            )));
        };
        let pivar = pi.kids[0].clone();
        let dom = pi.kids[1].clone();
        let range = pi.kids[2].clone();
        if matches!(&*follow_defs(&range), Term::Type) {
            return Err(ts.type_err(format!(
                "a lambda is checked against a kind: {exp}"
            )));
        }
        let name = ts.name()?;
        let var = Term::sym(&name);
        let prev = self
            .symbols
            .insert(&name, Binding::new(Some(var.clone()), Some(dom)));
        // identify the expected binder with ours, so holes unified under it
        // mention our variable
        let Some(pisym) = pivar.as_sym() else {
            return Err(ts.type_err(format!("a malformed function type: {exp}")));
        };
        let prev_pival = pisym.swap_val(Some(var.clone()));
        if tail_ok {
            self.local_syms.push((name, prev));
            return Ok(LambdaOutcome::Tail(range));
        }
        let upto = self.open_parens;
        let body = self.check_term(
            ts,
            Goal {
                create,
                expected: Some(range),
                hole_ok: false,
                return_pos,
                in_asc,
            },
        )?;
        self.eat_excess(ts, upto)?;
        self.eat_rparen(ts)?;
        self.symbols.insert(&name, prev);
        pisym.set_val(prev_pival);
        let term = if create {
            Some(Term::lam(var, body.created(ts)?))
        } else {
            None
        };
        Ok(LambdaOutcome::Done(Checked::done(term, None)))
    }

    /// `(^ code t)`: a computation gate in a binder domain.
    fn check_run_gate(
        &mut self,
        ts: &mut TokenSource<'_>,
        create: bool,
        expected: Option<TermRef>,
    ) -> Result<Checked> {
        if !self.allow_run || !create {
            return Err(ts.type_err(
                "a computation gate appears outside a binder domain".into(),
            ));
        }
        let Some(e) = expected else {
            return Err(ts.type_err(
                "a computation gate appears outside a binder domain".into(),
            ));
        };
        if !matches!(&*follow_defs(&e), Term::Type) {
            return Err(ts.type_err(format!(
                "a computation gate where {e} is expected, not type"
            )));
        }
        let code = self.read_code(ts)?;
        let result_expected = self.gate_result_type(&code);
        let upto = self.open_parens;
        let result = self
            .check_term(
                ts,
                Goal {
                    create: true,
                    expected: result_expected,
                    hole_ok: false,
                    return_pos: false,
                    in_asc: false,
                },
            )?
            .created(ts)?;
        self.eat_excess(ts, upto)?;
        self.eat_rparen(ts)?;
        Ok(Checked::done(
            Some(Term::compound(Op::Run, vec![code, result])),
            None,
        ))
    }

    /// `(: T t)`.
    fn check_ascription(
        &mut self,
        ts: &mut TokenSource<'_>,
        create: bool,
        expected: Option<TermRef>,
        return_pos: bool,
    ) -> Result<Checked> {
        let upto = self.open_parens;
        let ty = self
            .check_term(
                ts,
                Goal {
                    create: true,
                    expected: Some(self.type_tm.clone()),
                    hole_ok: false,
                    return_pos: false,
                    in_asc: true,
                },
            )?
            .created(ts)?;
        self.eat_excess(ts, upto)?;
        let trm = self.check_term(
            ts,
            Goal {
                create,
                expected: Some(ty.clone()),
                hole_ok: false,
                return_pos,
                in_asc: true,
            },
        )?;
        self.eat_excess(ts, upto)?;
        self.eat_rparen(ts)?;
        match expected {
            Some(e) => {
                if !defeq(&e, &ty) {
                    return Err(ts.type_err(format!(
                        "an ascription of {ty} where {e} is expected"
                    )));
                }
                Ok(Checked::done(trm.term, None))
            }
            None => Ok(Checked::done(trm.term, Some(ty))),
        }
    }

    /// The `x t` prefix of `(@ x t u)`: bind `x` transparently to `t`,
    /// returning the shadowed binding for the caller to restore.
    fn check_let_binding(
        &mut self,
        ts: &mut TokenSource<'_>,
        in_asc: bool,
    ) -> Result<(String, Binding)> {
        let name = ts.name()?;
        let upto = self.open_parens;
        let def = self.check_term(
            ts,
            Goal {
                create: true,
                expected: None,
                hole_ok: false,
                return_pos: false,
                in_asc,
            },
        )?;
        self.eat_excess(ts, upto)?;
        let var = Term::sym(&name);
        if let Some(s) = var.as_sym() {
            s.set_val(Some(def.created(ts)?));
        }
        let prev = self
            .symbols
            .insert(&name, Binding::new(Some(var), def.computed.clone()));
        Ok((name, prev))
    }

    /// `(~ t)`: a negated numeric literal.
    fn check_negation(
        &mut self,
        ts: &mut TokenSource<'_>,
        create: bool,
        expected: Option<TermRef>,
        hole_ok: bool,
        return_pos: bool,
        in_asc: bool,
    ) -> Result<Checked> {
        let upto = self.open_parens;
        let e = self.check_term(
            ts,
            Goal {
                create,
                expected: expected.clone(),
                hole_ok,
                return_pos,
                in_asc,
            },
        )?;
        self.eat_excess(ts, upto)?;
        self.eat_rparen(ts)?;
        let numeric = match (&expected, &e.computed) {
            (Some(x), _) => matches!(&*follow_defs(x), Term::Mpz | Term::Mpq),
            (None, Some(c)) => matches!(&*follow_defs(c), Term::Mpz | Term::Mpq),
            (None, None) => false,
        };
        if !numeric {
            return Err(ts.type_err(
                "a negative sign where a numeric expression is expected".into(),
            ));
        }
        let term = match &e.term {
            _ if !create => None,
            Some(t) => match &**t {
                Term::Int(n) => Some(Term::int(-n)),
                Term::Rat(q) => Some(Term::rat(-q)),
                _ => {
                    return Err(ts.type_err(
                        "a negative sign with a term that is not a numeric literal"
                            .into(),
                    ));
                }
            },
            None => None,
        };
        Ok(Checked::done(term, e.computed))
    }

    /// `(-> d1 ... dn R)`: right-nested function-type sugar. Each `di` is a
    /// bare type or a named `(: x Ti)` binder scoping over the rest.
    fn check_arrow(
        &mut self,
        ts: &mut TokenSource<'_>,
        create: bool,
        expected: Option<TermRef>,
        in_asc: bool,
    ) -> Result<Checked> {
        let mut binders: Vec<(TermRef, TermRef)> = Vec::new();
        let mut saved: Vec<(String, Binding)> = Vec::new();
        let (last, last_cls) = loop {
            let named = {
                let t = ts.next()?;
                if t == Tok::Open {
                    let t2 = ts.next()?;
                    if t2 == Tok::Colon {
                        Some(ts.name()?)
                    } else {
                        ts.unread(t2);
                        ts.unread(Tok::Open);
                        None
                    }
                } else {
                    ts.unread(t);
                    None
                }
            };
            let upto = self.open_parens;
            let item = self.check_term(
                ts,
                Goal {
                    create: true,
                    expected: None,
                    hole_ok: false,
                    return_pos: false,
                    in_asc,
                },
            )?;
            self.eat_excess(ts, upto)?;
            let cls = item.classifier(ts)?;
            let item = item.created(ts)?;
            if named.is_some() {
                ts.expect(Tok::Close, "to end a named arrow binder")?;
            }

            let t = ts.next()?;
            if t == Tok::Close {
                ts.unread(t);
                self.eat_rparen(ts)?;
                break (item, cls);
            }
            ts.unread(t);
            if !matches!(&*follow_defs(&cls), Term::Type) {
                return Err(ts.type_err(format!(
                    "an arrow domain classifies as {cls}, not type"
                )));
            }
            let var = match &named {
                Some(name) => {
                    let var = Term::sym(name);
                    let prev = self.symbols.insert(
                        name,
                        Binding::new(Some(var.clone()), Some(item.clone())),
                    );
                    saved.push((name.clone(), prev));
                    var
                }
                None => Term::sym("_"),
            };
            binders.push((var, item));
        };
        for (name, prev) in saved.into_iter().rev() {
            self.symbols.insert(&name, prev);
        }
        let computed = match &expected {
            Some(e) => {
                if !matches!(&*follow_defs(e), Term::Type | Term::Kind) {
                    return Err(ts.type_err(format!(
                        "the expected classifier for a function type is neither type \
                         nor kind: {e}"
                    )));
                }
                None
            }
            None => {
                if !matches!(&*follow_defs(&last_cls), Term::Type | Term::Kind) {
                    return Err(ts.type_err(format!(
                        "the range of a function type classifies as {last_cls}, not \
                         type or kind"
                    )));
                }
                Some(last_cls)
            }
        };
        let mut ty = last;
        for (var, dom) in binders.into_iter().rev() {
            ty = Term::pi(var, dom, ty);
        }
        Ok(Checked::done(if create { Some(ty) } else { None }, computed))
    }

    /// Declared result type of a computation gate's code, when one is
    /// recoverable: integer arithmetic yields `mpz`, a program call yields
    /// the program's declared return type.
    fn gate_result_type(&self, code: &TermRef) -> Option<TermRef> {
        match code.op() {
            Some(Op::Add | Op::Mul | Op::Div | Op::Neg) => Some(self.mpz_tm.clone()),
            Some(Op::App) => {
                let head = follow_defs(&head_of(code));
                let prog = head.as_compound().filter(|c| c.op == Op::Prog)?;
                let mut ret = follow_defs(&prog.kids[0]);
                loop {
                    let next = match ret.as_compound().filter(|c| c.op == Op::Pi) {
                        Some(pi) => follow_defs(&pi.kids[2]),
                        None => break,
                    };
                    ret = next;
                }
                Some(ret)
            }
            _ => None,
        }
    }

    fn check_app(
        &mut self,
        ts: &mut TokenSource<'_>,
        create: bool,
        expected: &mut Option<TermRef>,
        in_asc: bool,
    ) -> Result<AppOutcome> {
        let upto = self.open_parens;
        let head = self.check_term(
            ts,
            Goal {
                create,
                expected: None,
                hole_ok: false,
                return_pos: false,
                in_asc,
            },
        )?;
        self.eat_excess(ts, upto)?;
        // specializations mutate the type in place; take a copy if some
        // other application is already working on this node
        let mut headtp = Term::cow(follow_defs(&head.classifier(ts)?));
        let mut term = head.term;
        let mut holes: Vec<TermRef> = Vec::new();

        loop {
            let t = ts.next()?;
            if t == Tok::Close {
                self.open_parens -= 1;
                break;
            }
            ts.unread(t);

            let (var, domain, range, dependent) = {
                let Some(pi) = headtp.as_compound().filter(|c| c.op == Op::Pi) else {
                    return Err(ts.type_err(format!(
                        "the type of an applied term is not a function type: {headtp}"
                    )));
                };
                (
                    pi.kids[0].clone(),
                    pi.kids[1].clone(),
                    pi.kids[2].clone(),
                    headtp.binder_free_in_range(),
                )
            };

            if domain.op() == Some(Op::Run) {
                self.check_gate(ts, &domain)?;
                headtp = range;
                continue;
            }

            let create_arg = create || dependent;
            let tail_ok = !self.config.no_tail_calls
                && !create_arg
                && range.op() != Some(Op::Pi);
            if tail_ok {
                // final argument: resolve the application now and let the
                // caller's loop check the argument in place
                let range_inferred = match expected.take() {
                    Some(e) => {
                        if !defeq(&e, &range) {
                            return Err(ts.type_err(format!(
                                "an application produces {range}, but {e} is expected"
                            )));
                        }
                        None
                    }
                    None => Some(range),
                };
                for h in &holes {
                    let unresolved = h.as_hole().is_some_and(|x| x.val().is_none());
                    // a hole free in the domain gets filled when the final
                    // argument checks against it
                    if unresolved && !free_in(&domain, h) {
                        return Err(ts.hole_err());
                    }
                }
                return Ok(AppOutcome::Tail {
                    domain,
                    range_inferred,
                });
            }

            let arg = self.check_term(
                ts,
                Goal {
                    create: create_arg,
                    expected: Some(domain),
                    hole_ok: true,
                    return_pos: false,
                    in_asc,
                },
            )?;
            self.eat_excess(ts, upto)?;
            if create {
                let a = arg.created(ts)?;
                let f = term
                    .take()
                    .ok_or_else(|| ts.type_err("no term was materialized in this position".into()))?;
                term = Some(Term::make_app(f, a));
            }
            if dependent {
                if let Some(s) = var.as_sym() {
                    s.set_val(Some(follow_defs(&arg.created(ts)?)));
                }
            }
            if arg.is_hole {
                holes.push(arg.created(ts)?);
            }
            headtp = range;
        }

        // a trailing gate after the last syntactic argument
        if let Some(pi) = headtp.as_compound().filter(|c| c.op == Op::Pi)
            && pi.kids[1].op() == Some(Op::Run)
        {
            let domain = pi.kids[1].clone();
            let range = pi.kids[2].clone();
            self.check_gate(ts, &domain)?;
            headtp = range;
        }

        let computed = match expected.take() {
            Some(e) => {
                if !defeq(&e, &headtp) {
                    return Err(ts.type_err(format!(
                        "an application produces {headtp}, but {e} is expected"
                    )));
                }
                None
            }
            None => Some(headtp),
        };
        for h in holes {
            let unresolved = h.as_hole().is_some_and(|x| x.val().is_none());
            if unresolved {
                if in_asc {
                    self.asc_holes.push(h);
                } else {
                    return Err(ts.hole_err());
                }
            }
        }
        Ok(AppOutcome::Done(Checked::done(term, computed)))
    }

    /// Evaluate a `(^ code result)` domain and require the declared result.
    fn check_gate(&mut self, ts: &TokenSource<'_>, gate: &TermRef) -> Result<()> {
        let Some(run) = gate.as_compound().filter(|c| c.op == Op::Run) else {
            return Err(ts.type_err("a malformed computation gate".into()));
        };
        let code = follow_defs(&run.kids[0]);
        let declared = run.kids[1].clone();
        let Some(result) = self.run_gate(&code) else {
            return Err(ts.type_err(format!("a side condition failed: {code}")));
        };
        if !defeq(&declared, &result) {
            return Err(ts.type_err(format!(
                "a side condition computed {result}, but {declared} was declared"
            )));
        }
        Ok(())
    }
}

/// How a bare lambda resolved: fully checked, or trampolined into its body
/// with the range as the new goal.
enum LambdaOutcome {
    Done(Checked),
    Tail(TermRef),
}

/// How an application resolved: fully checked, or trampolined into its final
/// argument.
pub(crate) enum AppOutcome {
    Done(Checked),
    Tail {
        /// Expected type for the final, as-yet-unread argument.
        domain: TermRef,
        /// Range committed as the application's inferred type, when the
        /// caller asked for inference.
        range_inferred: Option<TermRef>,
    },
}
