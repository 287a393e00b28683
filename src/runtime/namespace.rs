//! Namespaces: ordered declaration maps with an enclosing pointer.
//!
//! Lookup walks up the enclosing chain; class namespaces carry the class
//! identifier and instance namespaces form the superclass chain used for
//! `super` dispatch.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::runtime::declaration::Declaration;

/// What scope a namespace represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceKind {
    /// The interpreter-global scope.
    Global,
    /// One module's top-level scope.
    Module,
    /// A lexical block.
    Block,
    /// A function call scope.
    Call,
    /// A class's static scope; carries the class identifier.
    Class { class_id: String },
    /// One inheritance level of an instance; carries the class identifier.
    Instance { class_id: String },
}

/// An ordered mapping of identifier → declaration with an optional
/// enclosing (parent) namespace.
#[derive(Debug)]
pub struct Namespace {
    pub id: String,
    pub kind: NamespaceKind,
    declarations: IndexMap<String, Rc<RefCell<Declaration>>>,
    enclosing: Option<Rc<RefCell<Namespace>>>,
}

impl Namespace {
    pub fn new(id: impl Into<String>, kind: NamespaceKind) -> Rc<RefCell<Namespace>> {
        Rc::new(RefCell::new(Self {
            id: id.into(),
            kind,
            declarations: IndexMap::new(),
            enclosing: None,
        }))
    }

    /// A scoped child of `enclosing`.
    pub fn child(
        enclosing: &Rc<RefCell<Namespace>>,
        id: impl Into<String>,
        kind: NamespaceKind,
    ) -> Rc<RefCell<Namespace>> {
        Rc::new(RefCell::new(Self {
            id: id.into(),
            kind,
            declarations: IndexMap::new(),
            enclosing: Some(enclosing.clone()),
        }))
    }

    pub fn enclosing(&self) -> Option<Rc<RefCell<Namespace>>> {
        self.enclosing.clone()
    }

    /// Define a declaration in this namespace. Returns `false` when the
    /// identifier is already taken here.
    pub fn define(&mut self, decl: Rc<RefCell<Declaration>>) -> bool {
        let id = decl.borrow().id.clone();
        if self.declarations.contains_key(&id) {
            return false;
        }
        self.declarations.insert(id, decl);
        true
    }

    /// Define, replacing any existing declaration of the same name.
    pub fn define_or_replace(&mut self, decl: Rc<RefCell<Declaration>>) {
        let id = decl.borrow().id.clone();
        self.declarations.insert(id, decl);
    }

    /// Look up in this namespace only.
    pub fn lookup_local(&self, name: &str) -> Option<Rc<RefCell<Declaration>>> {
        self.declarations.get(name).cloned()
    }

    /// Look up, walking the enclosing chain.
    pub fn lookup(&self, name: &str) -> Option<Rc<RefCell<Declaration>>> {
        if let Some(decl) = self.declarations.get(name) {
            return Some(decl.clone());
        }
        if let Some(ref enclosing) = self.enclosing {
            return enclosing.borrow().lookup(name);
        }
        None
    }

    /// Iterate this namespace's own declarations in definition order.
    pub fn declarations(&self) -> impl Iterator<Item = (&String, &Rc<RefCell<Declaration>>)> {
        self.declarations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::value::Value;

    fn decl(name: &str, value: Value) -> Rc<RefCell<Declaration>> {
        Rc::new(RefCell::new(Declaration::variable(name, value)))
    }

    #[test]
    fn test_define_and_lookup() {
        let ns = Namespace::new("test", NamespaceKind::Module);
        assert!(ns.borrow_mut().define(decl("x", Value::Int(1))));
        assert!(!ns.borrow_mut().define(decl("x", Value::Int(2))));
        assert!(ns.borrow().lookup("x").is_some());
        assert!(ns.borrow().lookup("y").is_none());
    }

    #[test]
    fn test_lookup_walks_up_and_shadows() {
        let outer = Namespace::new("outer", NamespaceKind::Module);
        outer.borrow_mut().define(decl("x", Value::Int(1)));
        outer.borrow_mut().define(decl("y", Value::Int(10)));
        let inner = Namespace::child(&outer, "inner", NamespaceKind::Block);
        inner.borrow_mut().define(decl("x", Value::Int(2)));

        let found = inner.borrow().lookup("x").expect("x");
        assert!(matches!(found.borrow().value, Value::Int(2)));
        let found = inner.borrow().lookup("y").expect("y");
        assert!(matches!(found.borrow().value, Value::Int(10)));
    }
}
