use std::rc::Rc;

use num_bigint::BigInt;

use super::term::{Op, Term, collect_args, free_in};

#[test]
fn app_spine_is_flat() {
    let f = Term::sym("f");
    let a = Term::sym("a");
    let b = Term::sym("b");
    let app = Term::make_app(Term::make_app(f.clone(), a.clone()), b.clone());

    let (head, args) = collect_args(&app);
    assert!(Rc::ptr_eq(&head, &f));
    assert_eq!(args.len(), 2);
    assert!(Rc::ptr_eq(&args[0], &a));
    assert!(Rc::ptr_eq(&args[1], &b));
}

#[test]
fn pi_caches_free_in_range() {
    let x = Term::sym("x");
    let a = Term::sym("A");
    let dependent = Term::pi(x.clone(), a.clone(), Term::make_app(a.clone(), x.clone()));
    assert!(dependent.binder_free_in_range());

    let y = Term::sym("y");
    let constant = Term::pi(y, a.clone(), a.clone());
    assert!(!constant.binder_free_in_range());
}

#[test]
fn free_in_sees_through_definitions() {
    let x = Term::sym("x");
    let d = Term::sym("d");
    d.as_sym().unwrap().set_val(Some(x.clone()));
    assert!(free_in(&d, &x));

    d.as_sym().unwrap().set_val(None);
    assert!(!free_in(&d, &x));
}

#[test]
fn cow_marks_then_copies() {
    let x = Term::sym("x");
    let a = Term::sym("A");
    let pi = Term::pi(x, a.clone(), a);

    // first user mutates in place
    let first = Term::cow(pi.clone());
    assert!(Rc::ptr_eq(&first, &pi));

    // second user gets a copy sharing the children
    let second = Term::cow(pi.clone());
    assert!(!Rc::ptr_eq(&second, &pi));
    let orig = pi.as_compound().unwrap();
    let copy = second.as_compound().unwrap();
    assert!(Rc::ptr_eq(&orig.kids[1], &copy.kids[1]));
}

#[test]
fn hole_fills_once() {
    let h = Term::hole();
    h.as_hole().unwrap().fill(Term::int(BigInt::from(1)));
    assert!(h.as_hole().unwrap().val().is_some());
}

#[test]
#[should_panic(expected = "hole resolved twice")]
fn hole_refill_panics() {
    let h = Term::hole();
    h.as_hole().unwrap().fill(Term::int(BigInt::from(1)));
    h.as_hole().unwrap().fill(Term::int(BigInt::from(2)));
}

#[test]
fn marks_toggle_independently() {
    let s = Term::sym("v");
    let sym = s.as_sym().unwrap();
    assert!(!sym.mark(0));
    sym.toggle_mark(0);
    sym.toggle_mark(31);
    assert!(sym.mark(0));
    assert!(sym.mark(31));
    assert!(!sym.mark(5));
    sym.toggle_mark(0);
    assert!(!sym.mark(0));
    assert!(sym.mark(31));
}

#[test]
fn display_round_trips_surface_syntax() {
    let x = Term::sym("x");
    let bool_ty = Term::sym("bool");
    let pi = Term::pi(x.clone(), bool_ty.clone(), bool_ty.clone());
    assert_eq!(pi.to_string(), "(! x bool bool)");

    let app = Term::make_app(Term::sym("holds"), Term::sym("a"));
    assert_eq!(app.to_string(), "(holds a)");

    assert_eq!(
        Term::compound(Op::MarkVar(6), vec![x]).to_string(),
        "(markvar7 x)"
    );
}
