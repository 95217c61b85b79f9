//! Surface syntax for side-condition code.
//!
//! `read_code` builds the code-term representation the static checker and
//! evaluator consume. Binding forms (`let`, match patterns) resolve their
//! variables here, scoping them over the subterm and restoring the previous
//! binding on the way out, so code terms reference symbols directly and never
//! carry names.

use attest_core::symbol_table::Binding;
use attest_core::term::{Op, Term, TermRef};
use num_bigint::BigInt;
use num_rational::BigRational;

use crate::error::Result;
use crate::lexer::{Tok, TokenSource};
use crate::session::Session;

/// Highest mark slot addressable from source (`markvar32`).
const MARK_SLOTS: u32 = 32;

/// Slot index from a `markvar`/`ifmarked` spelling. A bare keyword means
/// slot 1; explicit indices run 1 through 32.
fn mark_slot(text: &str, keyword: &str) -> Option<u8> {
    let suffix = text.strip_prefix(keyword)?;
    let n: u32 = if suffix.is_empty() {
        1
    } else {
        suffix.parse().ok()?
    };
    if (1..=MARK_SLOTS).contains(&n) {
        Some((n - 1) as u8)
    } else {
        None
    }
}

impl Session<'_> {
    /// Read one code term from the stream.
    pub(crate) fn read_code(&mut self, ts: &mut TokenSource<'_>) -> Result<TermRef> {
        let t = ts.next()?;
        match t {
            Tok::Open => self.read_code_form(ts),
            Tok::Natural => self.read_natural(ts),
            Tok::Rational => self.read_rational(ts),
            w if w.is_wordlike() => {
                let name = ts.text();
                // in argument position, constants shadow programs
                self.symbols
                    .get(name)
                    .val
                    .or_else(|| self.progs.get(name).cloned())
                    .ok_or_else(|| ts.scope(format!("undeclared identifier: {name}")))
            }
            _ => Err(ts.syntax(format!("unexpected token {:?} in code", ts.text()))),
        }
    }

    /// A parenthesized code form; the `(` is already consumed.
    fn read_code_form(&mut self, ts: &mut TokenSource<'_>) -> Result<TermRef> {
        let head = ts.next()?;
        match head {
            Tok::Do => {
                let mut ret = self.read_code(ts)?;
                loop {
                    let t = ts.next()?;
                    if t == Tok::Close {
                        break;
                    }
                    ts.unread(t);
                    let next = self.read_code(ts)?;
                    ret = Term::compound(Op::Do, vec![ret, next]);
                }
                Ok(ret)
            }
            // `@` is the historical spelling; `let` also works
            Tok::At | Tok::Let => {
                let name = ts.name()?;
                let var = Term::sym(&name);
                // non-recursive: the bound expression sees the outer binding
                let bound = self.read_code(ts)?;
                let prev = self
                    .symbols
                    .insert(&name, Binding::new(Some(var.clone()), None));
                let body = self.read_code(ts)?;
                self.symbols.insert(&name, prev);
                ts.expect(Tok::Close, "to end a let")?;
                Ok(Term::compound(Op::Let, vec![var, bound, body]))
            }
            Tok::Fail => {
                let ty = self.read_code(ts)?;
                ts.expect(Tok::Close, "to end a fail")?;
                Ok(Term::compound(Op::Fail, vec![ty]))
            }
            Tok::Tilde => {
                let e = self.read_code(ts)?;
                ts.expect(Tok::Close, "to end a negation")?;
                match &*e {
                    Term::Int(n) => Ok(Term::int(-n)),
                    Term::Rat(q) => Ok(Term::rat(-q)),
                    _ => Err(ts.syntax(
                        "the negation sign in code applies to numeric literals only".into(),
                    )),
                }
            }
            Tok::MpAdd => self.read_nary(ts, Op::Add, 2),
            Tok::MpMul => self.read_nary(ts, Op::Mul, 2),
            Tok::MpDiv => self.read_nary(ts, Op::Div, 2),
            Tok::MpNeg => self.read_nary(ts, Op::Neg, 1),
            Tok::MpzToMpq => self.read_nary(ts, Op::ZToQ, 1),
            Tok::MpIfNeg => self.read_nary(ts, Op::IfNeg, 3),
            Tok::MpIfZero => self.read_nary(ts, Op::IfZero, 3),
            Tok::Compare => self.read_nary(ts, Op::Compare, 4),
            Tok::IfEqual => self.read_nary(ts, Op::IfEqual, 4),
            Tok::MarkVar => {
                let slot = mark_slot(ts.text(), "markvar")
                    .ok_or_else(|| ts.syntax(format!("bad mark index in {:?}", ts.text())))?;
                self.read_nary(ts, Op::MarkVar(slot), 1)
            }
            Tok::IfMarked => {
                let slot = mark_slot(ts.text(), "ifmarked")
                    .ok_or_else(|| ts.syntax(format!("bad mark index in {:?}", ts.text())))?;
                self.read_nary(ts, Op::IfMarked(slot), 3)
            }
            Tok::Match => {
                let scrutinee = self.read_code(ts)?;
                let mut kids = vec![scrutinee];
                loop {
                    let t = ts.next()?;
                    if t == Tok::Close {
                        break;
                    }
                    ts.unread(t);
                    kids.push(self.read_case(ts)?);
                }
                if kids.len() == 1 {
                    return Err(ts.syntax("a match has no cases".into()));
                }
                Ok(Term::compound(Op::Match, kids))
            }
            w if w.is_wordlike() => {
                let name = ts.text();
                // in head position, programs shadow constants
                let head = self
                    .progs
                    .get(name)
                    .cloned()
                    .or_else(|| self.symbols.get(name).val)
                    .ok_or_else(|| {
                        ts.scope(format!("undeclared identifier applied in code: {name}"))
                    })?;
                let mut ret = head;
                loop {
                    let t = ts.next()?;
                    if t == Tok::Close {
                        break;
                    }
                    ts.unread(t);
                    let arg = self.read_code(ts)?;
                    ret = Term::make_app(ret, arg);
                }
                Ok(ret)
            }
            _ => Err(ts.syntax(format!(
                "unexpected token {:?} at the head of a code form",
                ts.text()
            ))),
        }
    }

    fn read_nary(&mut self, ts: &mut TokenSource<'_>, op: Op, arity: usize) -> Result<TermRef> {
        let mut kids = Vec::with_capacity(arity);
        for _ in 0..arity {
            kids.push(self.read_code(ts)?);
        }
        ts.expect(Tok::Close, "to end a code form")?;
        Ok(Term::compound(op, kids))
    }

    /// One `(pattern body)` case, or the `(default body)` case, of a match.
    /// A default case contributes its body directly, with no `Case` wrapper.
    fn read_case(&mut self, ts: &mut TokenSource<'_>) -> Result<TermRef> {
        ts.expect(Tok::Open, "to begin a match case")?;
        let t = ts.next()?;
        let (pattern, bound) = match t {
            Tok::Open => {
                let ctor = self.read_ctor(ts)?;
                let mut pattern = ctor;
                let mut bound: Vec<(String, Binding)> = Vec::new();
                loop {
                    let t = ts.next()?;
                    if t == Tok::Close {
                        break;
                    }
                    if !t.is_wordlike() {
                        return Err(
                            ts.syntax("patterns bind variables only, not nested patterns".into())
                        );
                    }
                    let name = ts.text().to_owned();
                    let var = Term::sym(&name);
                    let prev = self
                        .symbols
                        .insert(&name, Binding::new(Some(var.clone()), None));
                    bound.push((name, prev));
                    pattern = Term::make_app(pattern, var);
                }
                (Some(pattern), bound)
            }
            Tok::Default => (None, Vec::new()),
            w if w.is_wordlike() => {
                ts.unread(w);
                (Some(self.read_ctor(ts)?), Vec::new())
            }
            _ => {
                return Err(ts.syntax(format!(
                    "unexpected token {:?} in a match pattern",
                    ts.text()
                )));
            }
        };
        let body = self.read_code(ts)?;
        for (name, prev) in bound.into_iter().rev() {
            self.symbols.insert(&name, prev);
        }
        ts.expect(Tok::Close, "to end a match case")?;
        Ok(match pattern {
            Some(p) => Term::compound(Op::Case, vec![p, body]),
            None => body,
        })
    }

    /// A pattern head: a declared constant with no definition body.
    fn read_ctor(&mut self, ts: &mut TokenSource<'_>) -> Result<TermRef> {
        let name = ts.name()?;
        let binding = self.symbols.get(&name);
        let head = binding
            .val
            .filter(|_| binding.ty.is_some())
            .ok_or_else(|| ts.scope(format!("undeclared identifier in a pattern: {name}")))?;
        let is_ctor = head.as_sym().is_some_and(|s| s.val().is_none());
        if !is_ctor {
            return Err(ts.type_err(format!("the head of a pattern is not a constructor: {name}")));
        }
        Ok(head)
    }

    pub(crate) fn read_natural(&mut self, ts: &mut TokenSource<'_>) -> Result<TermRef> {
        let n: BigInt = ts
            .text()
            .parse()
            .map_err(|_| ts.syntax(format!("bad numeral {:?}", ts.text())))?;
        Ok(Term::int(n))
    }

    pub(crate) fn read_rational(&mut self, ts: &mut TokenSource<'_>) -> Result<TermRef> {
        let text = ts.text();
        let (n, d) = text
            .split_once('/')
            .ok_or_else(|| ts.syntax(format!("bad rational {text:?}")))?;
        let numer: BigInt = n
            .parse()
            .map_err(|_| ts.syntax(format!("bad rational {text:?}")))?;
        let denom: BigInt = d
            .parse()
            .map_err(|_| ts.syntax(format!("bad rational {text:?}")))?;
        if denom == BigInt::from(0) {
            return Err(ts.syntax(format!("zero denominator in {text:?}")));
        }
        Ok(Term::rat(BigRational::new(numer, denom)))
    }
}
