//! Runtime declarations: one named slot in a namespace.

use std::cell::RefCell;
use std::rc::Rc;

use crate::compiler::BytecodeImage;
use crate::runtime::namespace::Namespace;
use crate::runtime::value::{TypeValue, Value};

/// A lazily evaluated initializer: the byte range of the initializer
/// sub-program plus the namespace captured at declaration time. Fires once
/// on first read.
#[derive(Clone)]
pub struct LateInit {
    pub image: Rc<BytecodeImage>,
    pub ip: usize,
    pub line: u16,
    pub column: u16,
    pub namespace: Rc<RefCell<Namespace>>,
}

impl std::fmt::Debug for LateInit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LateInit(ip: {}, at {}:{})", self.ip, self.line, self.column)
    }
}

/// A named declaration: identifier, modifiers, advisory declared type,
/// current value, and an optional pending lazy initializer.
#[derive(Debug)]
pub struct Declaration {
    pub id: String,
    pub class_id: Option<String>,
    pub value: Value,
    pub declared_type: Option<TypeValue>,
    pub is_mutable: bool,
    pub is_external: bool,
    pub is_static: bool,
    pub is_const: bool,
    pub is_top_level: bool,
    pub late_init: Option<LateInit>,
}

impl Declaration {
    /// A plain mutable variable.
    pub fn variable(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            class_id: None,
            value,
            declared_type: None,
            is_mutable: true,
            is_external: false,
            is_static: false,
            is_const: false,
            is_top_level: false,
            late_init: None,
        }
    }

    /// An immutable binding (functions, classes, types, imports).
    pub fn immutable(id: impl Into<String>, value: Value) -> Self {
        Self {
            is_mutable: false,
            ..Self::variable(id, value)
        }
    }

    /// Whether a read must first run the lazy initializer.
    pub fn needs_late_init(&self) -> bool {
        self.late_init.is_some()
    }

    /// Take the pending initializer, marking it fired.
    pub fn take_late_init(&mut self) -> Option<LateInit> {
        self.late_init.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_late_init_fires_once() {
        let mut decl = Declaration::variable("x", Value::Null);
        assert!(!decl.needs_late_init());
        assert!(decl.take_late_init().is_none());
    }

    #[test]
    fn test_modifiers() {
        let decl = Declaration::immutable("f", Value::Null);
        assert!(!decl.is_mutable);
        let decl = Declaration::variable("x", Value::Int(1));
        assert!(decl.is_mutable);
    }
}
