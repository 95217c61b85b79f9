//! The side-condition evaluator.
//!
//! Call-by-value over checked code terms. Failure is an ordinary value
//! (`None`), short-circuiting every composing construct; the evaluator never
//! aborts for it. The right-recursive forms (`do`, the `if*` family, `match`
//! defaults) iterate by reassigning the head of the loop instead of
//! recursing, so deep chains cost no stack.

use std::rc::Rc;

use num_bigint::BigInt;
use num_rational::BigRational;

use attest_core::reduce::{defeq, follow_defs, weak_head_reduce};
use attest_core::term::{Op, Term, TermRef, collect_args};

use crate::compiled::CompiledPrograms;

pub struct Evaluator<'a> {
    show_runs: bool,
    compiled: Option<&'a dyn CompiledPrograms>,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new() -> Self {
        Evaluator {
            show_runs: false,
            compiled: None,
            depth: 0,
        }
    }

    /// Print each program call and its result while evaluating.
    pub fn show_runs(mut self, on: bool) -> Self {
        self.show_runs = on;
        self
    }

    /// Install a precompiled evaluator for program applications.
    pub fn compiled(mut self, compiled: &'a dyn CompiledPrograms) -> Self {
        self.compiled = Some(compiled);
        self
    }

    /// Reduce a checked code term to a value, or to failure (`None`).
    pub fn run_code(&mut self, code: &TermRef) -> Option<TermRef> {
        let mut cur = code.clone();
        loop {
            let c = match &*cur {
                Term::Int(_) | Term::Rat(_) => return Some(cur.clone()),
                Term::Sym(_) | Term::Hole(_) => {
                    let followed = follow_defs(&cur);
                    if matches!(&*followed, Term::Hole(_)) {
                        log::warn!("unfilled hole reached the evaluator");
                        return None;
                    }
                    return Some(followed);
                }
                Term::Type | Term::Kind | Term::Mpz | Term::Mpq => return None,
                Term::Compound(c) => c,
            };
            match c.op {
                Op::Fail => return None,
                Op::Do => {
                    self.run_code(&c.kids[0])?;
                    let next = c.kids[1].clone();
                    cur = next;
                }
                Op::Let => {
                    let bound = self.run_code(&c.kids[1])?;
                    let var = c.kids[0].as_sym().expect("let binds a symbol");
                    let saved = var.swap_val(Some(bound));
                    let result = self.run_code(&c.kids[2]);
                    var.set_val(saved);
                    return result;
                }
                Op::Add | Op::Mul | Op::Div => {
                    let lhs = self.run_code(&c.kids[0])?;
                    let rhs = self.run_code(&c.kids[1])?;
                    return arith(c.op, &lhs, &rhs);
                }
                Op::Neg => {
                    let v = self.run_code(&c.kids[0])?;
                    return match &*v {
                        Term::Int(n) => Some(Term::int(-n)),
                        Term::Rat(q) => Some(Term::rat(-q)),
                        _ => None,
                    };
                }
                Op::ZToQ => {
                    let v = self.run_code(&c.kids[0])?;
                    return match &*v {
                        Term::Int(n) => Some(Term::rat(BigRational::from_integer(n.clone()))),
                        _ => None,
                    };
                }
                Op::IfNeg | Op::IfZero => {
                    let v = self.run_code(&c.kids[0])?;
                    let taken = match (&*v, c.op) {
                        (Term::Int(n), Op::IfNeg) => n.sign() == num_bigint::Sign::Minus,
                        (Term::Int(n), Op::IfZero) => n.sign() == num_bigint::Sign::NoSign,
                        (Term::Rat(q), Op::IfNeg) => q < &BigRational::from_integer(BigInt::ZERO),
                        (Term::Rat(q), Op::IfZero) => q == &BigRational::from_integer(BigInt::ZERO),
                        _ => return None,
                    };
                    let next = if taken {
                        c.kids[1].clone()
                    } else {
                        c.kids[2].clone()
                    };
                    cur = next;
                }
                Op::IfMarked(slot) => {
                    let v = self.run_code(&c.kids[0])?;
                    let sym = v.as_sym()?;
                    let next = if sym.mark(slot) {
                        c.kids[1].clone()
                    } else {
                        c.kids[2].clone()
                    };
                    cur = next;
                }
                Op::MarkVar(slot) => {
                    let v = self.run_code(&c.kids[0])?;
                    v.as_sym()?.toggle_mark(slot);
                    return Some(v);
                }
                Op::Compare => {
                    let a = self.run_code(&c.kids[0])?;
                    a.as_sym()?;
                    let b = self.run_code(&c.kids[1])?;
                    b.as_sym()?;
                    // identity-based total order
                    let next = if Rc::as_ptr(&a) < Rc::as_ptr(&b) {
                        c.kids[2].clone()
                    } else {
                        c.kids[3].clone()
                    };
                    cur = next;
                }
                Op::IfEqual => {
                    let a = self.run_code(&c.kids[0])?;
                    let b = self.run_code(&c.kids[1])?;
                    let next = if defeq(&a, &b) {
                        c.kids[2].clone()
                    } else {
                        c.kids[3].clone()
                    };
                    cur = next;
                }
                Op::Match => {
                    match self.run_match(&cur)? {
                        Tail::Done(v) => return Some(v),
                        Tail::Continue(next) => cur = next,
                    }
                }
                Op::App => return self.run_app(&cur),
                Op::Pi
                | Op::Lam
                | Op::Run
                | Op::Prog
                | Op::ProgVars
                | Op::Case => return None,
            }
        }
    }

    fn run_match(&mut self, code: &TermRef) -> Option<Tail> {
        let c = code.as_compound().expect("match");
        let scrut = self.run_code(&c.kids[0])?;
        // expose the true head constructor before dispatching
        let scrut = weak_head_reduce(&scrut);
        let (head, args) = collect_args(&scrut);

        for case in &c.kids[1..] {
            if case.op() != Some(Op::Case) {
                // the default
                return Some(Tail::Continue(case.clone()));
            }
            let cc = case.as_compound().unwrap();
            let (pat_head, vars) = collect_args(&cc.kids[0]);
            if !Rc::ptr_eq(&head, &pat_head) {
                continue;
            }
            let mut saved = Vec::with_capacity(vars.len());
            for (var, arg) in vars.iter().zip(&args) {
                let sym = var.as_sym().expect("pattern variable");
                saved.push(sym.swap_val(Some(arg.clone())));
            }
            let result = self.run_code(&cc.kids[1]);
            for (var, old) in vars.iter().zip(saved) {
                var.as_sym().unwrap().set_val(old);
            }
            return result.map(Tail::Done);
        }
        None
    }

    fn run_app(&mut self, code: &TermRef) -> Option<TermRef> {
        let (head, args) = collect_args(code);
        let mut vals = Vec::with_capacity(args.len());
        for arg in &args {
            vals.push(self.run_code(arg)?);
        }

        let prog = follow_defs(&head);
        let Some(pc) = prog.as_compound().filter(|p| p.op == Op::Prog) else {
            // not a program: rebuild the application over evaluated arguments
            let mut kids = Vec::with_capacity(vals.len() + 1);
            kids.push(head);
            kids.extend(vals);
            return Some(Term::compound(Op::App, kids));
        };

        if let (Some(compiled), Some(sym)) = (self.compiled, head.as_sym()) {
            return compiled.run(&sym.name, &vals);
        }

        let formals = &pc.kids[1].as_compound().expect("program parameter list").kids;
        if formals.len() != vals.len() {
            return None;
        }

        if self.show_runs {
            println!("{:1$}[{2}", "", self.depth, code);
        }
        log::debug!("running program {}", head);

        let mut saved = Vec::with_capacity(formals.len());
        for (formal, val) in formals.iter().zip(&vals) {
            let sym = formal.as_sym().expect("program formal");
            saved.push(sym.swap_val(Some(val.clone())));
        }
        self.depth += 1;
        let result = self.run_code(&pc.kids[2]);
        self.depth -= 1;
        for (formal, old) in formals.iter().zip(saved) {
            formal.as_sym().unwrap().set_val(old);
        }

        if self.show_runs {
            match &result {
                Some(v) => println!("{:1$}= {2}]", "", self.depth, v),
                None => println!("{:1$}= fail]", "", self.depth),
            }
        }
        result
    }
}

impl Default for Evaluator<'_> {
    fn default() -> Self {
        Evaluator::new()
    }
}

enum Tail {
    Done(TermRef),
    Continue(TermRef),
}

fn arith(op: Op, lhs: &TermRef, rhs: &TermRef) -> Option<TermRef> {
    use num_traits::Zero;
    match (&**lhs, &**rhs) {
        (Term::Int(a), Term::Int(b)) => {
            let r = match op {
                Op::Add => a + b,
                Op::Mul => a * b,
                Op::Div if b.is_zero() => return None,
                Op::Div => ceil_div(a, b),
                _ => unreachable!(),
            };
            Some(Term::int(r))
        }
        (Term::Rat(a), Term::Rat(b)) => {
            let r = match op {
                Op::Add => a + b,
                Op::Mul => a * b,
                Op::Div if b.is_zero() => return None,
                Op::Div => a / b,
                _ => unreachable!(),
            };
            Some(Term::rat(r))
        }
        _ => None,
    }
}

/// Integer division rounding toward positive infinity (the original's
/// `mpz_cdiv_q`).
fn ceil_div(a: &BigInt, b: &BigInt) -> BigInt {
    use num_integer::Integer;
    -(-a).div_floor(b)
}
