//! The external binding surface: host-registered classes, functions and
//! function typedefs.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::runtime::function::Function;
use crate::runtime::value::{TypeValue, Value};

/// Structured convention: positional list, named map, type arguments.
pub type StructuredFn =
    dyn Fn(&[Value], &IndexMap<String, Value>, &[TypeValue]) -> Result<Value, String>;
/// Positional-only convention.
pub type PositionalFn = dyn Fn(&[Value]) -> Result<Value, String>;
/// External-method convention: receiver plus structured arguments.
pub type MethodFn = dyn Fn(&Value, &[Value], &IndexMap<String, Value>) -> Result<Value, String>;
/// A typedef unwrapper: wraps a script function into a host-ready callable.
pub type TypedefUnwrapper = dyn Fn(Rc<Function>) -> ExternFunction;

/// A host-provided callable, in one of the three supported conventions.
#[derive(Clone)]
pub enum ExternFunction {
    Structured(Rc<StructuredFn>),
    Positional(Rc<PositionalFn>),
    Method(Rc<MethodFn>),
}

impl ExternFunction {
    pub fn structured<F>(f: F) -> Self
    where
        F: Fn(&[Value], &IndexMap<String, Value>, &[TypeValue]) -> Result<Value, String> + 'static,
    {
        ExternFunction::Structured(Rc::new(f))
    }

    pub fn positional<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + 'static,
    {
        ExternFunction::Positional(Rc::new(f))
    }

    pub fn method<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value], &IndexMap<String, Value>) -> Result<Value, String> + 'static,
    {
        ExternFunction::Method(Rc::new(f))
    }
}

impl std::fmt::Debug for ExternFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExternFunction::Structured(_) => write!(f, "<extern fn (structured)>"),
            ExternFunction::Positional(_) => write!(f, "<extern fn (positional)>"),
            ExternFunction::Method(_) => write!(f, "<extern fn (method)>"),
        }
    }
}

/// A host object carried through script code. Member access on it
/// delegates to the external class registered under `type_id`.
pub struct ExternObject {
    pub type_id: String,
    pub data: Rc<dyn Any>,
}

impl ExternObject {
    pub fn new(type_id: impl Into<String>, data: Rc<dyn Any>) -> Self {
        Self {
            type_id: type_id.into(),
            data,
        }
    }
}

impl std::fmt::Debug for ExternObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExternObject({})", self.type_id)
    }
}

/// A host-registered class: static and instance member reflection.
pub trait ExternClassBinding {
    /// Static members, constructors, namespaced values.
    fn member_get(&self, name: &str) -> Result<Value, String>;

    /// Static member write; immutable by default.
    fn member_set(&self, name: &str, _value: Value) -> Result<(), String> {
        Err(format!("member '{}' is immutable", name))
    }

    /// Member read on an object of this class.
    fn instance_member_get(&self, object: &Value, name: &str) -> Result<Value, String>;

    /// Member write on an object of this class; immutable by default.
    fn instance_member_set(
        &self,
        _object: &Value,
        name: &str,
        _value: Value,
    ) -> Result<(), String> {
        Err(format!("member '{}' is immutable", name))
    }
}

/// Everything the host has registered with the engine. Classes are stored
/// under their script name; functions under their script identifier or
/// `ClassId.member` form.
#[derive(Default, Clone)]
pub struct ExternRegistry {
    classes: HashMap<String, Rc<dyn ExternClassBinding>>,
    functions: HashMap<String, ExternFunction>,
    typedefs: HashMap<String, Rc<TypedefUnwrapper>>,
}

impl ExternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_class(&mut self, id: impl Into<String>, binding: Rc<dyn ExternClassBinding>) {
        self.classes.insert(id.into(), binding);
    }

    pub fn register_function(&mut self, id: impl Into<String>, function: ExternFunction) {
        self.functions.insert(id.into(), function);
    }

    pub fn register_typedef<F>(&mut self, id: impl Into<String>, unwrapper: F)
    where
        F: Fn(Rc<Function>) -> ExternFunction + 'static,
    {
        self.typedefs.insert(id.into(), Rc::new(unwrapper));
    }

    pub fn has_function(&self, id: &str) -> bool {
        self.functions.contains_key(id)
    }

    pub fn fetch_class(&self, id: &str) -> Option<Rc<dyn ExternClassBinding>> {
        self.classes.get(id).cloned()
    }

    /// Fetch by exact id, or by `ClassId.member` form.
    pub fn fetch_function(&self, id: &str) -> Option<ExternFunction> {
        self.functions.get(id).cloned()
    }

    /// Unwrap a script function through a registered typedef.
    pub fn unwrap_function_type(
        &self,
        typedef_id: &str,
        function: Rc<Function>,
    ) -> Option<ExternFunction> {
        self.typedefs
            .get(typedef_id)
            .map(|unwrapper| unwrapper(function))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_registry() {
        let mut registry = ExternRegistry::new();
        registry.register_function(
            "add",
            ExternFunction::positional(|args| {
                if let (Some(Value::Int(a)), Some(Value::Int(b))) = (args.first(), args.get(1)) {
                    Ok(Value::Int(a + b))
                } else {
                    Err("expected two ints".to_string())
                }
            }),
        );
        assert!(registry.has_function("add"));
        let f = registry.fetch_function("add").expect("registered");
        match f {
            ExternFunction::Positional(f) => {
                let out = f(&[Value::Int(2), Value::Int(3)]).unwrap();
                assert!(matches!(out, Value::Int(5)));
            }
            _ => panic!("expected positional convention"),
        }
    }

    struct Fixed;
    impl ExternClassBinding for Fixed {
        fn member_get(&self, name: &str) -> Result<Value, String> {
            match name {
                "answer" => Ok(Value::Int(42)),
                _ => Err(format!("unknown member '{}'", name)),
            }
        }
        fn instance_member_get(&self, _object: &Value, name: &str) -> Result<Value, String> {
            Err(format!("unknown member '{}'", name))
        }
    }

    #[test]
    fn test_class_registry_defaults() {
        let mut registry = ExternRegistry::new();
        registry.register_class("Fixed", Rc::new(Fixed));
        let binding = registry.fetch_class("Fixed").expect("registered");
        assert!(matches!(binding.member_get("answer"), Ok(Value::Int(42))));
        assert!(binding.member_set("answer", Value::Int(1)).is_err());
    }
}
