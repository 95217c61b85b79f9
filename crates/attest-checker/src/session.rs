//! Checking session: global state plus the command driver.
//!
//! A session owns the symbol and program tables and processes a stream of
//! top-level commands. Commands either extend the tables (`declare`,
//! `define`, `program`, ...) or check a closed proof term (`check`,
//! `check-assuming`); checking succeeds silently and fails with the first
//! error.

use attest_core::symbol_table::{Binding, SymbolTable};
use attest_core::term::{Op, Term, TermRef};
use attest_core::{compute_kind, defeq, follow_defs, proper_or_datatype};
use attest_vm::{CompiledPrograms, Evaluator, check_code};
use indexmap::IndexMap;

use crate::checker::Goal;
use crate::error::Result;
use crate::lexer::{Tok, TokenSource};

/// Knobs for one checking session.
#[derive(Debug, Clone, Default)]
pub struct CheckConfig {
    /// Trace side-condition evaluation to stdout.
    pub show_runs: bool,
    /// Check every subterm recursively instead of trampolining tail
    /// positions; verdicts are unchanged, only stack use differs.
    pub no_tail_calls: bool,
    /// Route side-condition calls through the registered compiled programs.
    pub use_compiled: bool,
}

/// Receives every top-level symbol as it is declared.
pub trait SymbolEmitter {
    fn add_symbol(&mut self, name: &str, ty: &TermRef);
}

/// Receives every side-condition program as it is defined.
pub trait SideConditionEmitter {
    fn add_side_condition(&mut self, name: &str, program: &TermRef);
}

pub struct Session<'e> {
    pub(crate) config: CheckConfig,
    pub(crate) symbols: SymbolTable,
    /// Program namespace, separate from term constants.
    pub(crate) progs: IndexMap<String, TermRef>,
    pub(crate) compiled: Option<&'e dyn CompiledPrograms>,
    symbol_emitter: Option<&'e mut dyn SymbolEmitter>,
    side_condition_emitter: Option<&'e mut dyn SideConditionEmitter>,
    /// Holes escaping an ascription in the current `check`, printed and
    /// cleared when the command finishes.
    pub(crate) asc_holes: Vec<TermRef>,
    /// Bindings introduced by `%` and by trampolined binders, restored when
    /// the current `check` finishes.
    pub(crate) local_syms: Vec<(String, Binding)>,
    /// Set while checking a `!`/`#` domain, where `^` is meaningful.
    pub(crate) allow_run: bool,
    /// Set for the extent of a `check`/`check-assuming` command. Only there
    /// may `%` appear and binders trampoline onto `local_syms`; no other
    /// command drains that stack.
    pub(crate) in_check: bool,
    /// Open parentheses consumed by term checking but not yet matched;
    /// trampolined positions leave theirs for the caller to eat.
    pub(crate) open_parens: usize,
    pub(crate) type_tm: TermRef,
    pub(crate) kind_tm: TermRef,
    pub(crate) mpz_tm: TermRef,
    pub(crate) mpq_tm: TermRef,
}

impl<'e> Session<'e> {
    pub fn new(config: CheckConfig) -> Self {
        let type_tm = std::rc::Rc::new(Term::Type);
        let kind_tm = std::rc::Rc::new(Term::Kind);
        let mpz_tm = std::rc::Rc::new(Term::Mpz);
        let mpq_tm = std::rc::Rc::new(Term::Mpq);
        let mut symbols = SymbolTable::new();
        symbols.insert(
            "type",
            Binding::new(Some(type_tm.clone()), Some(kind_tm.clone())),
        );
        symbols.insert(
            "mpz",
            Binding::new(Some(mpz_tm.clone()), Some(type_tm.clone())),
        );
        symbols.insert(
            "mpq",
            Binding::new(Some(mpq_tm.clone()), Some(type_tm.clone())),
        );
        Session {
            config,
            symbols,
            progs: IndexMap::new(),
            compiled: None,
            symbol_emitter: None,
            side_condition_emitter: None,
            asc_holes: Vec::new(),
            local_syms: Vec::new(),
            allow_run: false,
            in_check: false,
            open_parens: 0,
            type_tm,
            kind_tm,
            mpz_tm,
            mpq_tm,
        }
    }

    pub fn with_compiled(mut self, compiled: &'e dyn CompiledPrograms) -> Self {
        self.compiled = Some(compiled);
        self
    }

    pub fn with_symbol_emitter(mut self, emitter: &'e mut dyn SymbolEmitter) -> Self {
        self.symbol_emitter = Some(emitter);
        self
    }

    pub fn with_side_condition_emitter(
        mut self,
        emitter: &'e mut dyn SideConditionEmitter,
    ) -> Self {
        self.side_condition_emitter = Some(emitter);
        self
    }

    /// Check one source unit; `file` names it in errors.
    pub fn check_file(&mut self, src: &str, file: &str) -> Result<()> {
        log::debug!("checking {file}");
        let mut ts = TokenSource::new(src, file);
        self.check_stream(&mut ts)
    }

    /// Drive the command loop until end of input.
    fn check_stream(&mut self, ts: &mut TokenSource<'_>) -> Result<()> {
        while let Some(t) = ts.next_opt()? {
            if t != Tok::Open {
                return Err(ts.syntax(format!(
                    "expected a command, found {:?}",
                    ts.text()
                )));
            }
            let cmd = ts.next()?;
            match cmd {
                Tok::Declare => self.cmd_declare(ts)?,
                Tok::Define => self.cmd_define(ts)?,
                Tok::DeclareRule => self.cmd_declare_rule(ts)?,
                Tok::DeclareType => self.cmd_declare_type(ts)?,
                Tok::DefineConst => self.cmd_define_const(ts)?,
                Tok::Opaque => self.cmd_opaque(ts)?,
                Tok::Run => self.cmd_run(ts)?,
                Tok::Program => self.cmd_program(ts)?,
                Tok::Check => self.cmd_check(ts)?,
                Tok::CheckAssuming => self.cmd_check_assuming(ts)?,
                _ => {
                    return Err(ts.syntax(format!("unknown command {:?}", ts.text())));
                }
            }
            ts.expect(Tok::Close, "to end a command")?;
        }
        Ok(())
    }

    /// Evaluate side-condition code under the session's run settings.
    pub(crate) fn run_gate(&self, code: &TermRef) -> Option<TermRef> {
        let mut ev = Evaluator::new().show_runs(self.config.show_runs);
        if self.config.use_compiled
            && let Some(c) = self.compiled
        {
            ev = ev.compiled(c);
        }
        ev.run_code(code)
    }

    pub(crate) fn eat_rparen(&mut self, ts: &mut TokenSource<'_>) -> Result<()> {
        ts.expect(Tok::Close, "to close a term")?;
        self.open_parens -= 1;
        Ok(())
    }

    /// Consume the close parens trampolined positions left behind.
    pub(crate) fn eat_excess(&mut self, ts: &mut TokenSource<'_>, upto: usize) -> Result<()> {
        while self.open_parens > upto {
            self.eat_rparen(ts)?;
        }
        Ok(())
    }

    fn fresh_name(&mut self, ts: &mut TokenSource<'_>, what: &str) -> Result<String> {
        let name = ts.name()?;
        if !self.symbols.get(&name).is_empty() {
            return Err(ts.scope(format!("redeclaration of {what} {name}")));
        }
        Ok(name)
    }

    fn emit_symbol(&mut self, name: &str, ty: &TermRef) {
        if let Some(em) = self.symbol_emitter.as_deref_mut() {
            em.add_symbol(name, ty);
        }
    }

    /// `(declare name T)` where `T` classifies as a type or kind.
    fn cmd_declare(&mut self, ts: &mut TokenSource<'_>) -> Result<()> {
        let name = self.fresh_name(ts, "symbol")?;
        let upto = self.open_parens;
        let ty = self.checked_classifier(ts, "declared symbol")?;
        self.eat_excess(ts, upto)?;
        self.emit_symbol(&name, &ty);
        self.symbols
            .insert(&name, Binding::new(Some(Term::sym(&name)), Some(ty)));
        Ok(())
    }

    /// Check a term, requiring its computed classifier to be `type` or
    /// `kind`, and return the term itself.
    fn checked_classifier(&mut self, ts: &mut TokenSource<'_>, what: &str) -> Result<TermRef> {
        let r = self.check_term(ts, Goal::infer(true).in_return_position())?;
        let cls = r.classifier(ts)?;
        if !matches!(&*follow_defs(&cls), Term::Type | Term::Kind) {
            return Err(ts.type_err(format!(
                "the expression for a {what} is neither a type nor a kind: {cls}"
            )));
        }
        r.created(ts)
    }

    /// `(define name t)`; the definition is transparent to `follow_defs`.
    fn cmd_define(&mut self, ts: &mut TokenSource<'_>) -> Result<()> {
        let name = self.fresh_name(ts, "definition")?;
        let upto = self.open_parens;
        let r = self.check_term(ts, Goal::infer(true).in_return_position())?;
        self.eat_excess(ts, upto)?;
        let ty = r.classifier(ts)?;
        if matches!(&*follow_defs(&ty), Term::Kind) {
            return Err(ts.type_err(format!("kind-level definitions are not supported: {name}")));
        }
        let sym = Term::sym(&name);
        if let Some(s) = sym.as_sym() {
            s.set_val(Some(r.created(ts)?));
        }
        self.symbols.insert(&name, Binding::new(Some(sym), Some(ty)));
        Ok(())
    }

    /// `(opaque name t)`: bind `name` at the type of `t` without exposing a
    /// definition.
    fn cmd_opaque(&mut self, ts: &mut TokenSource<'_>) -> Result<()> {
        let name = self.fresh_name(ts, "opaque definition")?;
        let upto = self.open_parens;
        let r = self.check_term(ts, Goal::infer(false).in_return_position())?;
        self.eat_excess(ts, upto)?;
        let ty = r.classifier(ts)?;
        if matches!(&*follow_defs(&ty), Term::Kind) {
            return Err(ts.type_err(format!("kind-level definitions are not supported: {name}")));
        }
        self.symbols
            .insert(&name, Binding::new(Some(Term::sym(&name)), Some(ty)));
        Ok(())
    }

    /// `(declare-rule name ((x1 T1) ...) R)`, sugar for declaring `name` at
    /// the nested function type `(! x1 T1 (... R))`.
    fn cmd_declare_rule(&mut self, ts: &mut TokenSource<'_>) -> Result<()> {
        let name = self.fresh_name(ts, "rule")?;
        let (binders, saved) = self.read_binder_list(ts)?;
        let upto = self.open_parens;
        let result = self.checked_classifier(ts, "rule conclusion")?;
        self.eat_excess(ts, upto)?;
        self.restore(saved);
        let mut ty = result;
        for (var, dom) in binders.into_iter().rev() {
            ty = Term::pi(var, dom, ty);
        }
        self.emit_symbol(&name, &ty);
        self.symbols
            .insert(&name, Binding::new(Some(Term::sym(&name)), Some(ty)));
        Ok(())
    }

    /// `(declare-type name (T1 ... Tn))`, sugar for declaring a type
    /// constructor of kind `T1 -> ... -> Tn -> type`.
    fn cmd_declare_type(&mut self, ts: &mut TokenSource<'_>) -> Result<()> {
        let name = self.fresh_name(ts, "type constructor")?;
        ts.expect(Tok::Open, "to begin the argument list")?;
        let mut args = Vec::new();
        loop {
            let t = ts.next()?;
            if t == Tok::Close {
                break;
            }
            ts.unread(t);
            let upto = self.open_parens;
            let arg = self.checked_classifier(ts, "type-constructor argument")?;
            self.eat_excess(ts, upto)?;
            args.push(arg);
        }
        let mut kind = self.type_tm.clone();
        for arg in args.into_iter().rev() {
            kind = Term::pi(Term::sym("_"), arg, kind);
        }
        self.emit_symbol(&name, &kind);
        self.symbols
            .insert(&name, Binding::new(Some(Term::sym(&name)), Some(kind)));
        Ok(())
    }

    /// `(define-const name ((x1 T1) ...) t)`, sugar for defining the
    /// lambda-abstraction of `t` over the binders.
    fn cmd_define_const(&mut self, ts: &mut TokenSource<'_>) -> Result<()> {
        let name = self.fresh_name(ts, "definition")?;
        let (binders, saved) = self.read_binder_list(ts)?;
        let upto = self.open_parens;
        let r = self.check_term(ts, Goal::infer(true).in_return_position())?;
        self.eat_excess(ts, upto)?;
        self.restore(saved);
        let ty = r.classifier(ts)?;
        if matches!(&*follow_defs(&ty), Term::Kind) {
            return Err(ts.type_err(format!("kind-level definitions are not supported: {name}")));
        }
        let mut body = r.created(ts)?;
        let mut ty = ty;
        for (var, dom) in binders.into_iter().rev() {
            body = Term::lam(var.clone(), body);
            ty = Term::pi(var, dom, ty);
        }
        let sym = Term::sym(&name);
        if let Some(s) = sym.as_sym() {
            s.set_val(Some(body));
        }
        self.symbols.insert(&name, Binding::new(Some(sym), Some(ty)));
        Ok(())
    }

    /// A `((x1 T1) (x2 T2) ...)` binder list; each binder scopes over the
    /// rest of the list and whatever follows, until `restore`.
    fn read_binder_list(
        &mut self,
        ts: &mut TokenSource<'_>,
    ) -> Result<(Vec<(TermRef, TermRef)>, Vec<(String, Binding)>)> {
        ts.expect(Tok::Open, "to begin a binder list")?;
        let mut binders = Vec::new();
        let mut saved = Vec::new();
        loop {
            let t = ts.next()?;
            if t == Tok::Close {
                break;
            }
            if t != Tok::Open {
                return Err(ts.syntax(format!("expected a binder, found {:?}", ts.text())));
            }
            let name = ts.name()?;
            let upto = self.open_parens;
            let ty = self.checked_classifier(ts, "binder type")?;
            self.eat_excess(ts, upto)?;
            ts.expect(Tok::Close, "to end a binder")?;
            let var = Term::sym(&name);
            let prev = self
                .symbols
                .insert(&name, Binding::new(Some(var.clone()), Some(ty.clone())));
            saved.push((name, prev));
            binders.push((var, ty));
        }
        Ok((binders, saved))
    }

    fn restore(&mut self, saved: Vec<(String, Binding)>) {
        for (name, prev) in saved.into_iter().rev() {
            self.symbols.insert(&name, prev);
        }
    }

    /// `(run code)`: evaluate and print, for scripting and debugging.
    fn cmd_run(&mut self, ts: &mut TokenSource<'_>) -> Result<()> {
        let code = self.read_code(ts)?;
        check_code(&code, &mut self.symbols).map_err(|e| ts.side_condition(e))?;
        println!("[Running-sc {code}] = ");
        match self.run_gate(&code) {
            Some(v) => println!("{v}"),
            None => println!("fail"),
        }
        Ok(())
    }

    /// `(program name ((x1 T1) ...) T body)`.
    fn cmd_program(&mut self, ts: &mut TokenSource<'_>) -> Result<()> {
        let name = ts.name()?;
        if self.progs.contains_key(&name) {
            return Err(ts.scope(format!("redeclaration of program {name}")));
        }
        let prog_sym = Term::sym(&name);
        // visible immediately so the body can recurse
        self.progs.insert(name.clone(), prog_sym.clone());

        ts.expect(Tok::Open, "to begin program parameters")?;
        let mut vars = Vec::new();
        let mut doms = Vec::new();
        let mut names = Vec::new();
        loop {
            let t = ts.next()?;
            if t == Tok::Close {
                break;
            }
            if t != Tok::Open {
                return Err(ts.syntax(format!(
                    "expected a program parameter, found {:?}",
                    ts.text()
                )));
            }
            let vname = self.fresh_name(ts, "program variable")?;
            let upto = self.open_parens;
            // inferred, not checked against `type`: datatype-kinded parameter
            // types are legal and validated below
            let tp = self
                .check_term(ts, Goal::infer(true))?
                .created(ts)?;
            self.eat_excess(ts, upto)?;
            ts.expect(Tok::Close, "to end a program parameter")?;
            self.require_runnable(ts, &tp, "program parameter")?;
            let var = Term::sym(&vname);
            self.symbols
                .insert(&vname, Binding::new(Some(var.clone()), Some(tp.clone())));
            vars.push(var);
            doms.push(tp);
            names.push(vname);
        }
        if vars.is_empty() {
            return Err(ts.syntax(format!("program {name} has no parameters")));
        }

        let upto = self.open_parens;
        let ret = self
            .check_term(ts, Goal::check(self.type_tm.clone(), true).in_return_position())?
            .created(ts)?;
        self.eat_excess(ts, upto)?;
        self.require_runnable(ts, &ret, "program return")?;

        let mut progtp = ret.clone();
        for (var, dom) in vars.iter().cloned().zip(doms.into_iter()).rev() {
            progtp = Term::pi(var, dom, progtp);
        }
        // the body typechecks against a signature-only placeholder
        if let Some(s) = prog_sym.as_sym() {
            s.set_val(Some(Term::compound(Op::Prog, vec![progtp.clone()])));
        }

        let code = self.read_code(ts)?;
        let body_ty = check_code(&code, &mut self.symbols).map_err(|e| ts.side_condition(e))?;
        if !defeq(&body_ty, &ret) {
            return Err(ts.type_err(format!(
                "the body of program {name} returns {body_ty}, not the declared {ret}"
            )));
        }

        let full = Term::compound(
            Op::Prog,
            vec![progtp, Term::compound(Op::ProgVars, vars), code],
        );
        if let Some(em) = self.side_condition_emitter.as_deref_mut() {
            em.add_side_condition(&name, &full);
        }
        if let Some(s) = prog_sym.as_sym() {
            s.set_val(Some(full));
        }
        for vname in names {
            self.symbols.insert(&vname, Binding::default());
        }
        Ok(())
    }

    /// Program parameter and return types must be proper types or datatypes.
    fn require_runnable(
        &self,
        ts: &TokenSource<'_>,
        tp: &TermRef,
        what: &str,
    ) -> Result<()> {
        let kind = compute_kind(tp, &self.symbols)
            .map_err(|e| ts.type_err(format!("in a {what} type: {e}")))?;
        if !proper_or_datatype(&kind) {
            return Err(ts.type_err(format!(
                "a {what} type must be a proper type or a datatype: {tp}"
            )));
        }
        Ok(())
    }

    /// `(check t)`: infer a type for the closed proof term `t`.
    fn cmd_check(&mut self, ts: &mut TokenSource<'_>) -> Result<()> {
        let upto = self.open_parens;
        self.in_check = true;
        let outcome = self.check_term(ts, Goal::infer(false).in_return_position());
        self.finish_check();
        let _ = outcome?;
        self.eat_excess(ts, upto)?;
        Ok(())
    }

    /// `(check-assuming ((x1 T1) ...) t)`.
    fn cmd_check_assuming(&mut self, ts: &mut TokenSource<'_>) -> Result<()> {
        let (_, saved) = self.read_binder_list(ts)?;
        let upto = self.open_parens;
        self.in_check = true;
        let outcome = self.check_term(ts, Goal::infer(false).in_return_position());
        self.finish_check();
        self.restore(saved);
        let _ = outcome?;
        self.eat_excess(ts, upto)?;
        Ok(())
    }

    /// Print holes deferred by ascriptions and unwind `%`-introduced
    /// bindings, in either outcome.
    fn finish_check(&mut self) {
        let holes: Vec<TermRef> = self.asc_holes.drain(..).collect();
        for h in &holes {
            println!("{h}");
        }
        if !holes.is_empty() {
            println!();
        }
        let locals: Vec<(String, Binding)> = self.local_syms.drain(..).collect();
        for (name, prev) in locals.into_iter().rev() {
            self.symbols.insert(&name, prev);
        }
        self.allow_run = false;
        self.in_check = false;
    }
}

/// Check a whole source unit under `config` in a fresh session.
pub fn check_source(src: &str, file: &str, config: CheckConfig) -> Result<()> {
    Session::new(config).check_file(src, file)
}
