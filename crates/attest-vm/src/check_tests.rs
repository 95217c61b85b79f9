use std::rc::Rc;

use num_bigint::BigInt;

use attest_core::symbol_table::{Binding, SymbolTable};
use attest_core::term::{Op, Term, TermRef};

use super::check::{StaticError, check_code};

/// A little signature: `bool : type` with `tt ff : bool`, `nat : type` with
/// `zero : nat` and `succ : (! _ nat nat)`.
fn fixture() -> (SymbolTable, Fixture) {
    let mut symbols = SymbolTable::new();
    let type_tm: TermRef = Rc::new(Term::Type);
    let mpz: TermRef = Rc::new(Term::Mpz);

    let bool_ty = Term::sym("bool");
    let tt = Term::sym("tt");
    let ff = Term::sym("ff");
    let nat = Term::sym("nat");
    let zero = Term::sym("zero");
    let succ = Term::sym("succ");

    symbols.insert("bool", Binding::new(None, Some(type_tm.clone())));
    symbols.insert("tt", Binding::new(None, Some(bool_ty.clone())));
    symbols.insert("ff", Binding::new(None, Some(bool_ty.clone())));
    symbols.insert("nat", Binding::new(None, Some(type_tm.clone())));
    symbols.insert("zero", Binding::new(None, Some(nat.clone())));
    let succ_ty = Term::pi(Term::sym("x"), nat.clone(), nat.clone());
    symbols.insert("succ", Binding::new(None, Some(succ_ty)));

    let fx = Fixture {
        mpz,
        bool_ty,
        tt,
        ff,
        nat,
        zero,
        succ,
    };
    (symbols, fx)
}

struct Fixture {
    mpz: TermRef,
    bool_ty: TermRef,
    tt: TermRef,
    ff: TermRef,
    nat: TermRef,
    zero: TermRef,
    succ: TermRef,
}

fn int(n: i64) -> TermRef {
    Term::int(BigInt::from(n))
}

#[test]
fn numerals_have_numeric_types() {
    let (mut symbols, _) = fixture();
    let tp = check_code(&int(5), &mut symbols).unwrap();
    assert!(matches!(&*tp, Term::Mpz));
}

#[test]
fn arithmetic_requires_matching_kinds() {
    let (mut symbols, _) = fixture();
    let ok = Term::compound(Op::Add, vec![int(1), int(2)]);
    assert!(matches!(
        &*check_code(&ok, &mut symbols).unwrap(),
        Term::Mpz
    ));

    let rat = Term::rat(num_rational::BigRational::from_integer(BigInt::from(2)));
    let bad = Term::compound(Op::Add, vec![int(1), rat]);
    assert!(matches!(
        check_code(&bad, &mut symbols),
        Err(StaticError::NumericMismatch(_))
    ));
}

#[test]
fn mpz_to_mpq_rejects_rationals() {
    let (mut symbols, _) = fixture();
    let ok = Term::compound(Op::ZToQ, vec![int(3)]);
    assert!(matches!(
        &*check_code(&ok, &mut symbols).unwrap(),
        Term::Mpq
    ));

    let rat = Term::rat(num_rational::BigRational::from_integer(BigInt::from(3)));
    let bad = Term::compound(Op::ZToQ, vec![rat]);
    assert!(matches!(
        check_code(&bad, &mut symbols),
        Err(StaticError::NotAnInteger(_))
    ));
}

#[test]
fn let_scopes_its_variable() {
    let (mut symbols, _) = fixture();
    let x = Term::sym("x");
    let code = Term::compound(Op::Let, vec![x.clone(), int(1), x.clone()]);
    let tp = check_code(&code, &mut symbols).unwrap();
    assert!(matches!(&*tp, Term::Mpz));
    // the binding does not leak
    assert!(symbols.get("x").ty.is_none());
}

#[test]
fn markvar_wants_a_simple_type() {
    let (mut symbols, fx) = fixture();
    let ok = Term::compound(Op::MarkVar(0), vec![fx.tt.clone()]);
    let tp = check_code(&ok, &mut symbols).unwrap();
    assert!(Rc::ptr_eq(&tp, &fx.bool_ty));

    let bad = Term::compound(Op::MarkVar(0), vec![int(0)]);
    assert!(matches!(
        check_code(&bad, &mut symbols),
        Err(StaticError::NotSimple { form: "markvar", .. })
    ));
}

#[test]
fn branches_must_agree() {
    let (mut symbols, fx) = fixture();
    let bad = Term::compound(
        Op::IfNeg,
        vec![int(-1), int(0), fx.tt.clone()],
    );
    assert!(matches!(
        check_code(&bad, &mut symbols),
        Err(StaticError::BranchMismatch { .. })
    ));
}

#[test]
fn applications_are_exactly_saturated() {
    let (mut symbols, fx) = fixture();
    let one = Term::make_app(fx.succ.clone(), fx.zero.clone());
    let tp = check_code(&one, &mut symbols).unwrap();
    assert!(Rc::ptr_eq(&tp, &fx.nat));

    let over = Term::compound(
        Op::App,
        vec![fx.succ.clone(), fx.zero.clone(), fx.zero.clone()],
    );
    assert!(matches!(
        check_code(&over, &mut symbols),
        Err(StaticError::TooManyArguments(_))
    ));
}

#[test]
fn program_heads_use_the_declared_signature() {
    let (mut symbols, fx) = fixture();
    let n = Term::sym("n");
    let prog_ty = Term::pi(Term::sym("a"), fx.mpz.clone(), fx.mpz.clone());
    let body = Term::compound(Op::Add, vec![n.clone(), int(1)]);
    let prog = Term::compound(
        Op::Prog,
        vec![prog_ty, Term::compound(Op::ProgVars, vec![n]), body],
    );

    let call = Term::compound(Op::App, vec![prog, int(41)]);
    let tp = check_code(&call, &mut symbols).unwrap();
    assert!(matches!(&*tp, Term::Mpz));
}

#[test]
fn match_checks_pattern_arity() {
    let (mut symbols, fx) = fixture();
    let x = Term::sym("x");
    let good = Term::compound(
        Op::Match,
        vec![
            fx.zero.clone(),
            Term::compound(Op::Case, vec![fx.zero.clone(), fx.tt.clone()]),
            Term::compound(
                Op::Case,
                vec![Term::make_app(fx.succ.clone(), x.clone()), fx.ff.clone()],
            ),
        ],
    );
    let tp = check_code(&good, &mut symbols).unwrap();
    assert!(Rc::ptr_eq(&tp, &fx.bool_ty));

    let bare = Term::compound(
        Op::Match,
        vec![
            fx.zero.clone(),
            Term::compound(Op::Case, vec![fx.succ.clone(), fx.tt.clone()]),
        ],
    );
    // `succ` used as a nullary pattern binds nothing; its body still checks
    assert!(check_code(&bare, &mut symbols).is_ok());

    let over = Term::compound(
        Op::Match,
        vec![
            fx.zero.clone(),
            Term::compound(
                Op::Case,
                vec![
                    Term::compound(Op::App, vec![fx.succ.clone(), x.clone(), Term::sym("y")]),
                    fx.tt.clone(),
                ],
            ),
        ],
    );
    assert!(matches!(
        check_code(&over, &mut symbols),
        Err(StaticError::TooManyPatternArguments(_))
    ));
}

#[test]
fn match_case_bodies_share_a_type() {
    let (mut symbols, fx) = fixture();
    let bad = Term::compound(
        Op::Match,
        vec![
            fx.zero.clone(),
            Term::compound(Op::Case, vec![fx.zero.clone(), fx.tt.clone()]),
            int(0),
        ],
    );
    assert!(matches!(
        check_code(&bad, &mut symbols),
        Err(StaticError::CaseTypeMismatch { .. })
    ));
}

#[test]
fn fail_takes_a_type() {
    let (mut symbols, fx) = fixture();
    let ok = Term::compound(Op::Fail, vec![fx.bool_ty.clone()]);
    let tp = check_code(&ok, &mut symbols).unwrap();
    assert!(Rc::ptr_eq(&tp, &fx.bool_ty));

    let bad = Term::compound(Op::Fail, vec![fx.tt.clone()]);
    assert!(matches!(
        check_code(&bad, &mut symbols),
        Err(StaticError::FailNotType(_))
    ));
}

#[test]
fn untyped_symbols_are_rejected() {
    let (mut symbols, _) = fixture();
    let loose = Term::sym("mystery");
    assert!(matches!(
        check_code(&loose, &mut symbols),
        Err(StaticError::UntypedSymbol(_))
    ));
}
