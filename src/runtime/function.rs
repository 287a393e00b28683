//! Runtime functions: script functions with bytecode entry points,
//! external callables, and builtin methods bound to receivers.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

pub use crate::ast::{FunctionCategory, RedirectTarget};
use crate::compiler::BytecodeImage;
use crate::runtime::class::Class;
use crate::runtime::external::ExternFunction;
use crate::runtime::namespace::Namespace;
use crate::runtime::value::{TypeValue, Value};

/// One declared parameter. Named and optional are mutually exclusive with
/// positional requirement; a variadic parameter is terminal.
#[derive(Debug, Clone)]
pub struct ParameterDef {
    pub id: String,
    pub declared_type: Option<TypeValue>,
    /// Entry of the default-value sub-program, evaluated in the call
    /// namespace when the argument is absent.
    pub default_ip: Option<usize>,
    pub is_optional: bool,
    pub is_named: bool,
    pub is_variadic: bool,
}

/// A redirecting constructor: target tag, optional named-constructor key,
/// and the captured byte offsets of its argument sub-programs, evaluated
/// in the redirecting call's closure.
#[derive(Debug, Clone)]
pub struct RedirectRecord {
    pub target: RedirectTarget,
    pub key: Option<String>,
    pub positional_ips: Vec<usize>,
    pub named_ips: Vec<(String, usize)>,
}

/// How a function executes.
#[derive(Clone)]
pub enum FunctionBodyKind {
    /// No body (abstract methods, signatures).
    None,
    /// Script bytecode entry point.
    Bytecode {
        image: Rc<BytecodeImage>,
        module: String,
        entry: usize,
        line: u16,
        column: u16,
    },
    /// Host callable.
    Extern(ExternFunction),
    /// Engine-provided method on a primitive value, dispatched by name.
    Builtin(String),
}

impl std::fmt::Debug for FunctionBodyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionBodyKind::None => write!(f, "None"),
            FunctionBodyKind::Bytecode { module, entry, .. } => {
                write!(f, "Bytecode({}@{})", module, entry)
            }
            FunctionBodyKind::Extern(_) => write!(f, "Extern"),
            FunctionBodyKind::Builtin(name) => write!(f, "Builtin({})", name),
        }
    }
}

/// A function value.
#[derive(Debug)]
pub struct Function {
    /// Name used in stack traces; `$construct`-prefixed for constructors.
    pub internal_name: String,
    pub id: Option<String>,
    pub category: FunctionCategory,
    pub class_id: Option<String>,
    /// The defining class, for constructor dispatch. Weak: the class
    /// namespace owns the constructor.
    pub owning_class: Option<Weak<RefCell<Class>>>,
    pub is_external: bool,
    pub is_static: bool,
    pub is_variadic: bool,
    pub min_arity: usize,
    pub max_arity: usize,
    /// Order-preserving parameter mapping.
    pub params: IndexMap<String, Rc<ParameterDef>>,
    pub declared_return_type: Option<TypeValue>,
    /// Namespace captured at definition time; instance namespace for bound
    /// methods.
    pub closure: Option<Rc<RefCell<Namespace>>>,
    pub redirect: Option<RedirectRecord>,
    pub body: FunctionBodyKind,
    /// External-type tag used by the host to unwrap into a native
    /// function.
    pub external_type_id: Option<String>,
    /// Receiver captured when a builtin method is read off a value.
    pub bound_receiver: Option<Value>,
}

impl Function {
    /// The internal name for a constructor with the given key.
    pub fn construct_name(key: Option<&str>) -> String {
        match key {
            Some(key) => format!("$construct${}", key),
            None => "$construct".to_string(),
        }
    }

    /// The internal namespace key for a getter/setter.
    pub fn getter_name(id: &str) -> String {
        format!("$get${}", id)
    }

    pub fn setter_name(id: &str) -> String {
        format!("$set${}", id)
    }

    /// A builtin method bound to its receiver.
    pub fn builtin(
        name: &str,
        receiver: Value,
        min_arity: usize,
        max_arity: usize,
        variadic: bool,
    ) -> Function {
        Function {
            internal_name: name.to_string(),
            id: Some(name.to_string()),
            category: FunctionCategory::Method,
            class_id: None,
            owning_class: None,
            is_external: false,
            is_static: false,
            is_variadic: variadic,
            min_arity,
            max_arity,
            params: IndexMap::new(),
            declared_return_type: None,
            closure: None,
            redirect: None,
            body: FunctionBodyKind::Builtin(name.to_string()),
            external_type_id: None,
            bound_receiver: Some(receiver),
        }
    }

    /// A clone of this function bound to a different closure namespace.
    /// Used when instance method templates are installed on a fresh
    /// instance namespace chain.
    pub fn bind(&self, closure: Rc<RefCell<Namespace>>) -> Function {
        Function {
            internal_name: self.internal_name.clone(),
            id: self.id.clone(),
            category: self.category,
            class_id: self.class_id.clone(),
            owning_class: self.owning_class.clone(),
            is_external: self.is_external,
            is_static: self.is_static,
            is_variadic: self.is_variadic,
            min_arity: self.min_arity,
            max_arity: self.max_arity,
            params: self.params.clone(),
            declared_return_type: self.declared_return_type.clone(),
            closure: Some(closure),
            redirect: self.redirect.clone(),
            body: self.body.clone(),
            external_type_id: self.external_type_id.clone(),
            bound_receiver: self.bound_receiver.clone(),
        }
    }

    /// Whether `positional_count` satisfies this function's arity bounds.
    pub fn accepts_positional(&self, count: usize) -> bool {
        count >= self.min_arity && (self.is_variadic || count <= self.max_arity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_names() {
        assert_eq!(Function::construct_name(None), "$construct");
        assert_eq!(Function::construct_name(Some("named")), "$construct$named");
        assert_eq!(Function::getter_name("x"), "$get$x");
    }

    #[test]
    fn test_arity_bounds() {
        let mut func = Function::builtin("f", Value::Null, 1, 2, false);
        assert!(!func.accepts_positional(0));
        assert!(func.accepts_positional(1));
        assert!(func.accepts_positional(2));
        assert!(!func.accepts_positional(3));
        func.is_variadic = true;
        assert!(func.accepts_positional(9));
    }
}
