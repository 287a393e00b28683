//! Struct objects: ordered key/value fields with a prototype chain.
//!
//! Reads walk the prototype chain until a match or the root; writes always
//! target the receiver and may create new keys.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::runtime::value::Value;

/// A prototype-based struct object.
#[derive(Debug, Default)]
pub struct StructObject {
    /// Declared name for named structs.
    pub id: Option<String>,
    pub prototype: Option<Rc<RefCell<StructObject>>>,
    fields: IndexMap<String, Value>,
}

impl StructObject {
    pub fn new(id: Option<String>, prototype: Option<Rc<RefCell<StructObject>>>) -> Self {
        Self {
            id,
            prototype,
            fields: IndexMap::new(),
        }
    }

    /// Read a field, walking the prototype chain.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.fields.get(key) {
            return Some(value.clone());
        }
        if let Some(ref prototype) = self.prototype {
            return prototype.borrow().get(key);
        }
        None
    }

    /// Whether the key exists on the receiver or anywhere up the chain.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Whether the key exists on the receiver itself.
    pub fn contains_own_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Write a field on the receiver, creating the key when absent.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Remove an own key; prototype fields are untouched.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    /// The receiver's own keys, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.fields.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The `toString` rendering: own fields, one per line, two-space
    /// indented.
    pub fn to_display(&self) -> String {
        self.render(1)
    }

    fn render(&self, depth: usize) -> String {
        if self.fields.is_empty() {
            return "{}".to_string();
        }
        let indent = "  ".repeat(depth);
        let closing_indent = "  ".repeat(depth - 1);
        let mut out = String::from("{\n");
        let last = self.fields.len() - 1;
        for (index, (key, value)) in self.fields.iter().enumerate() {
            let rendered = match value {
                Value::Struct(nested) => nested.borrow().render(depth + 1),
                other => other.to_display(),
            };
            out.push_str(&indent);
            out.push_str(key);
            out.push_str(": ");
            out.push_str(&rendered);
            if index != last {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str(&closing_indent);
        out.push('}');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn struct_rc(fields: &[(&str, Value)]) -> Rc<RefCell<StructObject>> {
        let mut object = StructObject::new(None, None);
        for (key, value) in fields {
            object.set(*key, value.clone());
        }
        Rc::new(RefCell::new(object))
    }

    #[test]
    fn test_prototype_read_and_receiver_write() {
        let proto = struct_rc(&[("greeting", Value::Str("hi".to_string()))]);
        let object = Rc::new(RefCell::new(StructObject::new(None, Some(proto.clone()))));

        // Read falls through to the prototype.
        assert!(matches!(object.borrow().get("greeting"), Some(Value::Str(_))));

        // Write targets the receiver, not the prototype.
        object.borrow_mut().set("greeting", Value::Str("yo".to_string()));
        assert_eq!(
            proto.borrow().get("greeting").unwrap().to_display(),
            "hi"
        );
        assert_eq!(
            object.borrow().get("greeting").unwrap().to_display(),
            "yo"
        );
        assert!(!proto.borrow().contains_own_key("missing"));
    }

    #[test]
    fn test_write_creates_keys() {
        let object = struct_rc(&[]);
        assert!(!object.borrow().contains_key("fresh"));
        object.borrow_mut().set("fresh", Value::Int(1));
        assert!(object.borrow().contains_own_key("fresh"));
    }

    #[test]
    fn test_display_format() {
        let object = struct_rc(&[
            ("value", Value::Str("ha!".to_string())),
            ("greeting", Value::Str("hi!".to_string())),
            ("world", Value::Str("everything".to_string())),
        ]);
        let expected = "{\n  value: ha!,\n  greeting: hi!,\n  world: everything\n}";
        assert_eq!(object.borrow().to_display(), expected);
        assert_eq!(struct_rc(&[]).borrow().to_display(), "{}");
    }
}
