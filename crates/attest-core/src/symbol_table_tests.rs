use super::symbol_table::{Binding, SymbolTable};
use super::term::Term;

#[test]
fn get_unknown_is_empty() {
    let table = SymbolTable::new();
    assert!(table.get("missing").is_empty());
}

#[test]
fn insert_returns_previous() {
    let mut table = SymbolTable::new();
    let bool_ty = Term::sym("bool");

    let prev = table.insert("t", Binding::new(None, Some(bool_ty.clone())));
    assert!(prev.is_empty());

    let prev = table.insert("t", Binding::new(None, None));
    assert!(prev.ty.is_some());
    assert!(table.get("t").is_empty());
}

#[test]
fn save_restore_round_trip() {
    let mut table = SymbolTable::new();
    let outer = Term::sym("outer");
    let inner = Term::sym("inner");

    table.insert("x", Binding::new(Some(outer.clone()), None));
    let saved = table.insert("x", Binding::new(Some(inner), None));
    table.insert("x", saved);

    let restored = table.get("x").val.unwrap();
    assert!(std::rc::Rc::ptr_eq(&restored, &outer));
}

#[test]
fn prefixes_are_distinct_names() {
    let mut table = SymbolTable::new();
    table.insert("foo", Binding::new(Some(Term::sym("a")), None));
    table.insert("foobar", Binding::new(Some(Term::sym("b")), None));

    assert_eq!(table.get("foo").val.unwrap().to_string(), "a");
    assert_eq!(table.get("foobar").val.unwrap().to_string(), "b");
    assert!(table.get("fo").is_empty());
    assert!(table.get("foob").is_empty());
}
