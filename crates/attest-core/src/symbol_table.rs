//! Scoped name bindings over a prefix tree.
//!
//! `insert` always returns the previous binding for the name, which is what
//! every binder construct uses to implement save/restore scoping: bind on
//! entry, re-insert the returned binding on exit.

use std::collections::BTreeMap;

use crate::term::TermRef;

/// A `(value, type)` pair for one name. Either slot may be absent: local
/// pattern and program variables are bound with a type only, transparent
/// definitions carry both.
#[derive(Debug, Clone, Default)]
pub struct Binding {
    pub val: Option<TermRef>,
    pub ty: Option<TermRef>,
}

impl Binding {
    pub fn new(val: Option<TermRef>, ty: Option<TermRef>) -> Self {
        Binding { val, ty }
    }

    pub fn is_empty(&self) -> bool {
        self.val.is_none() && self.ty.is_none()
    }
}

#[derive(Debug, Default)]
struct Node {
    binding: Binding,
    kids: BTreeMap<u8, Node>,
}

/// Byte-keyed prefix tree from names to bindings.
#[derive(Debug, Default)]
pub struct SymbolTable {
    root: Node,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Bind `name`, returning whatever was there before (possibly empty).
    pub fn insert(&mut self, name: &str, binding: Binding) -> Binding {
        let mut node = &mut self.root;
        for b in name.bytes() {
            node = node.kids.entry(b).or_default();
        }
        std::mem::replace(&mut node.binding, binding)
    }

    /// Current binding for `name`; empty if unknown.
    pub fn get(&self, name: &str) -> Binding {
        let mut node = &self.root;
        for b in name.bytes() {
            match node.kids.get(&b) {
                Some(n) => node = n,
                None => return Binding::default(),
            }
        }
        node.binding.clone()
    }
}
