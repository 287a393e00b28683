//! Classes and instances.
//!
//! A class owns its static namespace and the templates for instance
//! members. An instance owns one namespace per inheritance level; the
//! chain's length equals the depth of the class's inheritance chain, and
//! `super` dispatch walks it.

use std::cell::RefCell;
use std::rc::Rc;

use crate::runtime::function::Function;
use crate::runtime::namespace::{Namespace, NamespaceKind};
use crate::runtime::value::{TypeValue, Value};

/// An instance field template: evaluated per instance at construction.
#[derive(Debug, Clone)]
pub struct InstanceField {
    pub id: String,
    pub is_mutable: bool,
    pub declared_type: Option<TypeValue>,
    /// Entry of the initializer sub-program, run in the owning level's
    /// instance namespace.
    pub init_ip: Option<usize>,
    /// The image the initializer lives in.
    pub image: Option<Rc<crate::compiler::BytecodeImage>>,
}

/// A runtime class.
#[derive(Debug)]
pub struct Class {
    pub id: String,
    /// Declared superclass type; unresolved until link.
    pub super_type: Option<TypeValue>,
    /// Linked superclass.
    pub super_class: Option<Rc<RefCell<Class>>>,
    pub generic_params: Vec<String>,
    /// `implements` clause, stored but not semantically enforced.
    pub implements: Vec<TypeValue>,
    /// `with` clause, stored but not semantically enforced.
    pub mixes: Vec<TypeValue>,
    pub is_external: bool,
    pub is_abstract: bool,
    pub is_enum: bool,
    /// Whether a user-defined constructor exists.
    pub has_user_ctor: bool,
    /// Static members and constructors.
    pub namespace: Rc<RefCell<Namespace>>,
    pub instance_fields: Vec<InstanceField>,
    /// Method/accessor templates, bound to a level namespace per instance.
    pub instance_methods: Vec<Rc<Function>>,
}

impl Class {
    /// The inheritance chain, most-derived first, starting at `class`.
    pub fn chain(class: &Rc<RefCell<Class>>) -> Vec<Rc<RefCell<Class>>> {
        let mut chain = vec![class.clone()];
        let mut cursor = class.borrow().super_class.clone();
        while let Some(next) = cursor {
            cursor = next.borrow().super_class.clone();
            chain.push(next);
        }
        chain
    }

    /// Whether `self` is `id` or inherits from it.
    pub fn is_kind_of(&self, id: &str) -> bool {
        if self.id == id {
            return true;
        }
        match &self.super_class {
            Some(super_class) => super_class.borrow().is_kind_of(id),
            None => false,
        }
    }
}

/// A class instance, or a superclass view of one. A view shares the
/// underlying namespaces from its level downward, so member writes through
/// `super` hit the same object.
#[derive(Debug)]
pub struct Instance {
    pub class: Rc<RefCell<Class>>,
    /// One namespace per inheritance level, most-derived first.
    pub namespaces: Vec<Rc<RefCell<Namespace>>>,
    pub type_args: Vec<TypeValue>,
}

impl Instance {
    /// The `super` view one level up, if any.
    pub fn super_view(instance: &Rc<Instance>) -> Option<Rc<Instance>> {
        let super_class = instance.class.borrow().super_class.clone()?;
        if instance.namespaces.len() < 2 {
            return None;
        }
        Some(Rc::new(Instance {
            class: super_class,
            namespaces: instance.namespaces[1..].to_vec(),
            type_args: Vec::new(),
        }))
    }

    /// Whether this instance's class chain includes `id`.
    pub fn is_kind_of(&self, id: &str) -> bool {
        self.class.borrow().is_kind_of(id)
    }
}

/// Build the namespace chain for a fresh instance of `class`, one level
/// per inheritance step, each enclosing its class's static namespace.
/// `this` and `super` views are installed into every level.
pub fn build_instance(class: &Rc<RefCell<Class>>) -> Rc<Instance> {
    let chain = Class::chain(class);
    let namespaces: Vec<Rc<RefCell<Namespace>>> = chain
        .iter()
        .map(|level_class| {
            let borrowed = level_class.borrow();
            Namespace::child(
                &borrowed.namespace,
                format!("instance of {}", borrowed.id),
                NamespaceKind::Instance {
                    class_id: borrowed.id.clone(),
                },
            )
        })
        .collect();

    let instance = Rc::new(Instance {
        class: class.clone(),
        namespaces: namespaces.clone(),
        type_args: Vec::new(),
    });

    for (level, namespace) in namespaces.iter().enumerate() {
        let this_view = Rc::new(Instance {
            class: chain[level].clone(),
            namespaces: namespaces[level..].to_vec(),
            type_args: Vec::new(),
        });
        let this_decl = crate::runtime::declaration::Declaration::immutable(
            "this",
            Value::Instance(this_view.clone()),
        );
        namespace.borrow_mut().define(Rc::new(RefCell::new(this_decl)));

        if let Some(super_view) = Instance::super_view(&this_view) {
            let super_decl = crate::runtime::declaration::Declaration::immutable(
                "super",
                Value::Instance(super_view),
            );
            namespace
                .borrow_mut()
                .define(Rc::new(RefCell::new(super_decl)));
        }
    }

    instance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_class(id: &str, super_class: Option<Rc<RefCell<Class>>>) -> Rc<RefCell<Class>> {
        let namespace = Namespace::new(
            id,
            NamespaceKind::Class {
                class_id: id.to_string(),
            },
        );
        Rc::new(RefCell::new(Class {
            id: id.to_string(),
            super_type: None,
            super_class,
            generic_params: Vec::new(),
            implements: Vec::new(),
            mixes: Vec::new(),
            is_external: false,
            is_abstract: false,
            is_enum: false,
            has_user_ctor: false,
            namespace,
            instance_fields: Vec::new(),
            instance_methods: Vec::new(),
        }))
    }

    #[test]
    fn test_chain_depth_matches_inheritance() {
        let a = test_class("A", None);
        let b = test_class("B", Some(a.clone()));
        let c = test_class("C", Some(b.clone()));

        assert_eq!(Class::chain(&c).len(), 3);
        let instance = build_instance(&c);
        assert_eq!(instance.namespaces.len(), 3);
        assert!(instance.is_kind_of("A"));
        assert!(instance.is_kind_of("C"));
        assert!(!instance.is_kind_of("D"));
    }

    #[test]
    fn test_super_view_shares_namespaces() {
        let a = test_class("A", None);
        let b = test_class("B", Some(a));
        let instance = build_instance(&b);
        let view = Instance::super_view(&instance).expect("super view");
        assert_eq!(view.class.borrow().id, "A");
        assert!(Rc::ptr_eq(&view.namespaces[0], &instance.namespaces[1]));
    }

    #[test]
    fn test_this_bound_in_every_level() {
        let a = test_class("A", None);
        let b = test_class("B", Some(a));
        let instance = build_instance(&b);
        for namespace in &instance.namespaces {
            assert!(namespace.borrow().lookup_local("this").is_some());
        }
        assert!(instance.namespaces[0].borrow().lookup_local("super").is_some());
        assert!(instance.namespaces[1].borrow().lookup_local("super").is_none());
    }
}
