use indoc::indoc;

use super::error::{Error, ErrorKind};
use super::session::{CheckConfig, check_source};

fn check(src: &str) -> Result<(), Error> {
    check_source(src, "test.plf", CheckConfig::default())
}

fn check_no_tails(src: &str) -> Result<(), Error> {
    let config = CheckConfig {
        no_tail_calls: true,
        ..CheckConfig::default()
    };
    check_source(src, "test.plf", config)
}

const BOOL: &str = "(declare bool type)(declare tt bool)(declare ff bool)";

#[test]
fn declarations_and_a_trivial_check() {
    check("(declare bool type)(declare tt bool)(check tt)").unwrap();
}

#[test]
fn an_undeclared_identifier_is_a_scope_error() {
    let err = check("(check foo)").unwrap_err();
    assert!(err.is_scope(), "{err}");
}

#[test]
fn every_declaring_command_rejects_redeclaration() {
    let seconds = [
        "(declare bool type)",
        "(define bool type)",
        "(opaque bool tt)",
        "(declare-rule bool () bool)",
        "(declare-type bool ())",
        "(define-const bool () tt)",
    ];
    for second in seconds {
        let src = format!("{BOOL}{second}");
        let err = check(&src).unwrap_err();
        assert!(err.is_scope(), "{second}: {err}");
    }
}

#[test]
fn programs_have_their_own_namespace() {
    check(indoc! {"
        (declare bool type)(declare tt bool)(declare ff bool)
        (program not ((b bool)) bool (match b (tt ff) (ff tt)))
        (declare not type)
    "})
    .unwrap();
    let err = check(indoc! {"
        (declare bool type)(declare tt bool)(declare ff bool)
        (program not ((b bool)) bool (match b (tt ff) (ff tt)))
        (program not ((b bool)) bool b)
    "})
    .unwrap_err();
    assert!(err.is_scope(), "{err}");
}

#[test]
fn ascription_must_match_the_inferred_type() {
    check(&format!("{BOOL}(check (: bool tt))")).unwrap();
    let err = check(&format!(
        "{BOOL}(declare nat type)(check (: nat tt))"
    ))
    .unwrap_err();
    assert!(err.is_type(), "{err}");
}

#[test]
fn applications_check_against_declared_signatures() {
    let sig = format!("{BOOL}(declare and (-> bool bool bool))");
    check(&format!("{sig}(check (: bool (and tt ff)))")).unwrap();
    let err = check(&format!("{sig}(check (: bool (and tt)))")).unwrap_err();
    assert!(err.is_type(), "{err}");
    assert!(check(&format!("{sig}(check (and tt ff tt))")).is_err());
    assert!(check_no_tails(&format!("{sig}(check (and tt ff tt))")).is_err());
}

#[test]
fn arrow_sugar_agrees_with_the_spelled_out_binder() {
    // an (-> ...) type in an argument position must be interchangeable
    // with the equivalent (! ...) spelling
    check(indoc! {"
        (declare bool type)
        (declare P (! f (-> bool bool) type))
        (declare id (! x bool bool))
        (check (P id))
    "})
    .unwrap();
}

#[test]
fn named_arrow_binders_scope_over_later_domains() {
    check(indoc! {"
        (declare bool type)(declare tt bool)
        (declare holds (! b bool type))
        (declare all (-> (: p bool) (holds p) type))
        (check-assuming ((h (holds tt))) (all tt h))
    "})
    .unwrap();
}

#[test]
fn dependent_applications_substitute_arguments() {
    check(indoc! {"
        (declare bool type)(declare tt bool)
        (declare eq (! a bool (! b bool type)))
        (declare refl (! a bool (eq a a)))
        (declare symm (! a bool (! b bool (! u (eq a b) (eq b a)))))
        (check (symm _ _ (refl tt)))
    "})
    .unwrap();
}

#[test]
fn an_unresolved_hole_outside_an_ascription_is_fatal() {
    let src = format!(
        "{BOOL}(declare eq (! a bool (! b bool type)))\
         (declare refl (! a bool (eq a a)))(check (refl _))"
    );
    let err = check(&src).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Hole), "{err}");
}

#[test]
fn ascriptions_collect_escaping_holes() {
    check(indoc! {"
        (declare bool type)(declare tt bool)
        (declare holds (! b bool type))
        (check-assuming ((h (holds tt))) (: (holds _) h))
    "})
    .unwrap();
}

#[test]
fn lambdas_check_against_function_types() {
    check(indoc! {"
        (declare bool type)(declare tt bool)
        (define id (: (! x bool bool) (\\ x x)))
        (check (: bool (id tt)))
    "})
    .unwrap();
    let err = check("(check (\\ x x))").unwrap_err();
    assert!(err.is_type(), "{err}");
}

#[test]
fn annotated_lambdas_infer_their_own_type() {
    check(indoc! {"
        (declare bool type)(declare tt bool)
        (define id (# x bool x))
        (check (: bool (id tt)))
    "})
    .unwrap();
}

#[test]
fn big_lambdas_assume_locally_and_unwind() {
    let src = indoc! {"
        (declare bool type)
        (declare holds (! b bool type))
        (check (% p bool (% h (holds p) h)))
        (check p)
    "};
    let err = check(src).unwrap_err();
    assert!(err.is_scope(), "{err}");
}

#[test]
fn numeric_literals_take_their_own_types() {
    check("(define five (: mpz 5))").unwrap();
    check("(define half (: mpq 1/2))").unwrap();
    check("(define mfive (: mpz (~ 5)))").unwrap();
    let err = check("(define bad (: mpq 5))").unwrap_err();
    assert!(err.is_type(), "{err}");
}

#[test]
fn kind_level_definitions_are_rejected() {
    let err = check("(define t type)").unwrap_err();
    assert!(err.is_type(), "{err}");
}

#[test]
fn opaque_definitions_hide_their_body() {
    check(&format!("{BOOL}(opaque o tt)(check (: bool o))")).unwrap();
}

#[test]
fn opaque_bodies_do_not_leak_local_bindings() {
    let err = check(&format!("{BOOL}(opaque o (@ y tt y))(check y)")).unwrap_err();
    assert!(err.is_scope(), "{err}");
}

#[test]
fn a_big_lambda_outside_a_check_is_rejected() {
    let err = check(&format!("{BOOL}(opaque o (% p bool p))")).unwrap_err();
    assert!(err.is_type(), "{err}");
}

#[test]
fn declare_rule_builds_the_nested_signature() {
    check(indoc! {"
        (declare bool type)(declare tt bool)
        (declare holds (! b bool type))
        (declare-rule mp ((p bool) (q bool) (u (holds p)) (v (holds q))) (holds q))
        (check-assuming ((h (holds tt))) (mp tt tt h h))
    "})
    .unwrap();
}

#[test]
fn declare_type_builds_the_constructor_kind() {
    check(indoc! {"
        (declare bool type)
        (declare-type pair (type type))
        (check-assuming ((p (pair bool bool))) p)
    "})
    .unwrap();
}

#[test]
fn define_const_abstracts_over_its_binders() {
    check(indoc! {"
        (declare bool type)(declare tt bool)
        (declare holds (! b bool type))
        (define-const weaken ((x (holds tt))) x)
        (check-assuming ((h (holds tt))) (: (holds tt) (weaken h)))
    "})
    .unwrap();
}

#[test]
fn side_condition_gates_pass_and_fail() {
    let sig = indoc! {"
        (declare bool type)(declare tt bool)(declare ff bool)
        (program not ((b bool)) bool (match b (tt ff) (ff tt)))
        (declare holds (! b bool type))
        (declare flipped (! b bool (! r (^ (not b) tt) (holds b))))
    "};
    check(&format!("{sig}(check (flipped ff))")).unwrap();
    let err = check(&format!("{sig}(check (flipped tt))")).unwrap_err();
    assert!(err.is_type(), "{err}");
}

#[test]
fn gates_between_arguments_run_in_order() {
    check(indoc! {"
        (declare bool type)(declare tt bool)(declare ff bool)
        (program not ((b bool)) bool (match b (tt ff) (ff tt)))
        (declare holds (! b bool type))
        (declare lemma (! b bool (! r (^ (not b) tt) (! u (holds b) bool))))
        (check-assuming ((h (holds ff))) (lemma ff h))
    "})
    .unwrap();
}

#[test]
fn run_commands_evaluate_and_report() {
    check("(run (mp_add 3 4))").unwrap();
    check("(run (mp_div 7 2))").unwrap();
    check(&format!(
        "{BOOL}(program not ((b bool)) bool (match b (tt ff) (ff tt)))(run (not tt))"
    ))
    .unwrap();
}

#[test]
fn program_bodies_are_statically_typed() {
    let err = check(&format!(
        "{BOOL}(program bad ((b bool)) bool (mp_add b 1))"
    ))
    .unwrap_err();
    assert!(
        matches!(err.kind, ErrorKind::SideCondition(_)),
        "{err}"
    );
}

#[test]
fn program_return_types_match_their_bodies() {
    let err = check(&format!(
        "{BOOL}(declare nat type)(program bad ((b bool)) nat b)"
    ))
    .unwrap_err();
    assert!(err.is_type(), "{err}");
}

#[test]
fn nested_match_patterns_are_rejected() {
    let err = check(&format!(
        "{BOOL}(program f ((b bool)) bool (match b ((tt (x)) tt)))"
    ))
    .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Syntax(_)), "{err}");
}

#[test]
fn tail_positions_check_deep_chains_in_constant_stack() {
    const N: usize = 100_000;
    let mut src = String::from("(declare bool type)(declare tt bool)(check ");
    for i in 0..N {
        src.push_str("(@ x");
        src.push_str(&i.to_string());
        src.push_str(" tt ");
    }
    src.push_str("tt");
    for _ in 0..N {
        src.push(')');
    }
    src.push(')');
    check(&src).unwrap();
}

#[test]
fn disabling_tail_calls_keeps_the_verdict() {
    let mut src = String::from("(declare bool type)(declare tt bool)(check ");
    for i in 0..64 {
        src.push_str("(@ x");
        src.push_str(&i.to_string());
        src.push_str(" tt ");
    }
    src.push_str("tt");
    for _ in 0..64 {
        src.push(')');
    }
    src.push(')');
    check(&src).unwrap();
    check_no_tails(&src).unwrap();

    let bad = format!("{BOOL}(check (: ff (: bool tt)))");
    assert!(check(&bad).is_err());
    assert!(check_no_tails(&bad).is_err());
}

#[test]
fn mismatched_commands_are_syntax_errors() {
    let err = check("declare").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Syntax(_)), "{err}");
    let err = check("(elaborate x)").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Syntax(_)), "{err}");
}

#[test]
fn errors_carry_file_and_position() {
    let err = check("(check\n  foo)").unwrap_err();
    assert_eq!(err.file, "test.plf");
    assert_eq!((err.pos.line, err.pos.col), (2, 3));
}
