//! Member resolution and the builtin members on primitive values.
//!
//! Instance reads walk the namespace chain, then the external delegate.
//! Struct reads walk the prototype chain; writes always target the
//! receiver. Lists, strings and numbers expose the engine-provided members
//! the lowerings and the standard surface rely on.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::FunctionCategory;
use crate::error::{ErrorCode, VmResult};
use crate::runtime::function::Function;
use crate::runtime::structs::StructObject;
use crate::runtime::value::Value;
use crate::runtime::vm::Vm;

impl Vm {
    /// Member read. Resolution order for instances: own namespace levels
    /// (fields, methods, getters), then the external-class delegate.
    pub(crate) fn member_get(&mut self, receiver: &Value, key: &str) -> VmResult<Value> {
        match receiver {
            Value::Null => Err(self.err_here(
                ErrorCode::NullObject,
                format!("member '{}' accessed on null", key),
            )),
            Value::Instance(instance) => {
                for namespace in &instance.namespaces {
                    let plain = namespace.borrow().lookup_local(key);
                    if let Some(decl) = plain {
                        return self.fetch_decl_value(&decl);
                    }
                    let getter = namespace.borrow().lookup_local(&Function::getter_name(key));
                    if let Some(decl) = getter {
                        let value = self.fetch_decl_value(&decl)?;
                        return self.call_getter(value);
                    }
                }
                if instance.class.borrow().is_external {
                    let class_id = instance.class.borrow().id.clone();
                    if let Some(binding) = self.externs.fetch_class(&class_id) {
                        return binding
                            .instance_member_get(receiver, key)
                            .map_err(|message| self.err_here(ErrorCode::External, message));
                    }
                }
                if key == "toString" {
                    return Ok(self.builtin_fn("toString", receiver, 0, 0));
                }
                Err(self.err_here(
                    ErrorCode::UndefinedMember,
                    format!(
                        "undefined member '{}' on {}",
                        key,
                        instance.class.borrow().id
                    ),
                ))
            }
            Value::Class(class) => {
                let (plain, getter, ctor) = {
                    let borrowed = class.borrow();
                    let namespace = borrowed.namespace.borrow();
                    (
                        namespace.lookup_local(key),
                        namespace.lookup_local(&Function::getter_name(key)),
                        namespace.lookup_local(&Function::construct_name(Some(key))),
                    )
                };
                if let Some(decl) = plain {
                    return self.fetch_decl_value(&decl);
                }
                if let Some(decl) = getter {
                    let value = self.fetch_decl_value(&decl)?;
                    return self.call_getter(value);
                }
                if let Some(decl) = ctor {
                    return self.fetch_decl_value(&decl);
                }
                let (is_external, class_id) = {
                    let borrowed = class.borrow();
                    (borrowed.is_external, borrowed.id.clone())
                };
                if is_external {
                    if let Some(binding) = self.externs.fetch_class(&class_id) {
                        return binding
                            .member_get(key)
                            .map_err(|message| self.err_here(ErrorCode::External, message));
                    }
                }
                Err(self.err_here(
                    ErrorCode::UndefinedMember,
                    format!("undefined member '{}' on class {}", key, class_id),
                ))
            }
            Value::Struct(object) => {
                if let Some(value) = object.borrow().get(key) {
                    return Ok(value);
                }
                self.struct_builtin(object, receiver, key)
            }
            Value::List(items) => self.list_member(items, receiver, key),
            Value::Str(text) => self.str_member(text, receiver, key),
            Value::Int(_) | Value::Float(_) | Value::Bool(_) => {
                self.scalar_member(receiver, key)
            }
            Value::Function(_) | Value::Type(_) => match key {
                "toString" => Ok(self.builtin_fn("toString", receiver, 0, 0)),
                _ => Err(self.err_here(
                    ErrorCode::UndefinedMember,
                    format!("undefined member '{}' on {}", key, receiver.type_name()),
                )),
            },
            Value::ExternObject(object) => {
                let binding = self.externs.fetch_class(&object.type_id).ok_or_else(|| {
                    self.err_here(
                        ErrorCode::UndefinedExternal,
                        format!("no external class registered as '{}'", object.type_id),
                    )
                })?;
                binding
                    .instance_member_get(receiver, key)
                    .map_err(|message| self.err_here(ErrorCode::External, message))
            }
        }
    }

    /// Member write. Instances accept new fields on the receiver's own
    /// namespace; structs always write the receiver.
    pub(crate) fn member_set(&mut self, receiver: &Value, key: &str, value: Value) -> VmResult<()> {
        match receiver {
            Value::Null => Err(self.err_here(
                ErrorCode::NullObject,
                format!("member '{}' assigned on null", key),
            )),
            Value::Instance(instance) => {
                for namespace in &instance.namespaces {
                    let plain = namespace.borrow().lookup_local(key);
                    if let Some(decl) = plain {
                        if !decl.borrow().is_mutable {
                            return Err(self.err_here(
                                ErrorCode::Immutable,
                                format!("cannot assign to immutable '{}'", key),
                            ));
                        }
                        let mut borrowed = decl.borrow_mut();
                        borrowed.value = value;
                        borrowed.late_init = None;
                        return Ok(());
                    }
                    let setter = namespace.borrow().lookup_local(&Function::setter_name(key));
                    if let Some(decl) = setter {
                        let setter = self.fetch_decl_value(&decl)?;
                        if let Value::Function(f) = setter {
                            self.call_function(f, vec![value], IndexMap::new(), None)?;
                            return Ok(());
                        }
                    }
                }
                if instance.class.borrow().is_external {
                    let class_id = instance.class.borrow().id.clone();
                    if let Some(binding) = self.externs.fetch_class(&class_id) {
                        return binding
                            .instance_member_set(receiver, key, value)
                            .map_err(|message| self.err_here(ErrorCode::External, message));
                    }
                }
                // New fields may be created on the receiver.
                let decl = crate::runtime::declaration::Declaration::variable(key, value);
                instance.namespaces[0]
                    .borrow_mut()
                    .define(Rc::new(RefCell::new(decl)));
                Ok(())
            }
            Value::Class(class) => {
                let (plain, setter) = {
                    let borrowed = class.borrow();
                    let namespace = borrowed.namespace.borrow();
                    (
                        namespace.lookup_local(key),
                        namespace.lookup_local(&Function::setter_name(key)),
                    )
                };
                if let Some(decl) = plain {
                    if !decl.borrow().is_mutable {
                        return Err(self.err_here(
                            ErrorCode::Immutable,
                            format!("cannot assign to immutable '{}'", key),
                        ));
                    }
                    let mut borrowed = decl.borrow_mut();
                    borrowed.value = value;
                    borrowed.late_init = None;
                    return Ok(());
                }
                if let Some(decl) = setter {
                    let setter = self.fetch_decl_value(&decl)?;
                    if let Value::Function(f) = setter {
                        self.call_function(f, vec![value], IndexMap::new(), None)?;
                        return Ok(());
                    }
                }
                let (is_external, class_id) = {
                    let borrowed = class.borrow();
                    (borrowed.is_external, borrowed.id.clone())
                };
                if is_external {
                    if let Some(binding) = self.externs.fetch_class(&class_id) {
                        return binding
                            .member_set(key, value)
                            .map_err(|message| self.err_here(ErrorCode::External, message));
                    }
                }
                Err(self.err_here(
                    ErrorCode::UndefinedMember,
                    format!("undefined member '{}' on class {}", key, class_id),
                ))
            }
            Value::Struct(object) => {
                object.borrow_mut().set(key, value);
                Ok(())
            }
            Value::ExternObject(object) => {
                let binding = self.externs.fetch_class(&object.type_id).ok_or_else(|| {
                    self.err_here(
                        ErrorCode::UndefinedExternal,
                        format!("no external class registered as '{}'", object.type_id),
                    )
                })?;
                binding
                    .instance_member_set(receiver, key, value)
                    .map_err(|message| self.err_here(ErrorCode::External, message))
            }
            other => Err(self.err_here(
                ErrorCode::NotA,
                format!("cannot assign member on '{}'", other.type_name()),
            )),
        }
    }

    /// Subscript read: list/str index or struct key.
    pub(crate) fn sub_get(&mut self, receiver: &Value, key: &Value) -> VmResult<Value> {
        match receiver {
            Value::List(items) => {
                let index = self.list_index(key, items.borrow().len())?;
                Ok(items.borrow()[index].clone())
            }
            Value::Str(text) => {
                let index = self.list_index(key, text.chars().count())?;
                Ok(Value::Str(
                    text.chars().nth(index).map(String::from).unwrap_or_default(),
                ))
            }
            Value::Struct(object) => match key {
                Value::Str(name) => Ok(object.borrow().get(name).unwrap_or(Value::Null)),
                other => Err(self.err_here(
                    ErrorCode::SubGetKey,
                    format!("struct keys are strings, found '{}'", other.type_name()),
                )),
            },
            Value::Null => Err(self.err_here(ErrorCode::NullObject, "subscript on null")),
            other => Err(self.err_here(
                ErrorCode::NotA,
                format!("value of type '{}' is not subscriptable", other.type_name()),
            )),
        }
    }

    /// Subscript write.
    pub(crate) fn sub_set(&mut self, receiver: &Value, key: &Value, value: Value) -> VmResult<()> {
        match receiver {
            Value::List(items) => {
                let index = self.list_index(key, items.borrow().len())?;
                items.borrow_mut()[index] = value;
                Ok(())
            }
            Value::Struct(object) => match key {
                Value::Str(name) => {
                    object.borrow_mut().set(name.clone(), value);
                    Ok(())
                }
                other => Err(self.err_here(
                    ErrorCode::SubGetKey,
                    format!("struct keys are strings, found '{}'", other.type_name()),
                )),
            },
            Value::Null => Err(self.err_here(ErrorCode::NullObject, "subscript on null")),
            other => Err(self.err_here(
                ErrorCode::NotA,
                format!("value of type '{}' is not subscriptable", other.type_name()),
            )),
        }
    }

    fn list_index(&self, key: &Value, length: usize) -> VmResult<usize> {
        let index = match key {
            Value::Int(n) => *n,
            other => {
                return Err(self.err_here(
                    ErrorCode::SubGetKey,
                    format!("index must be an int, found '{}'", other.type_name()),
                ))
            }
        };
        if index < 0 || index as usize >= length {
            return Err(self.err_here(
                ErrorCode::OutOfRange,
                format!("index {} out of range (length {})", index, length),
            ));
        }
        Ok(index as usize)
    }

    fn call_getter(&mut self, value: Value) -> VmResult<Value> {
        match value {
            Value::Function(f) if f.category == FunctionCategory::Getter => {
                self.call_function(f, Vec::new(), IndexMap::new(), None)
            }
            other => Ok(other),
        }
    }

    fn builtin_fn(&self, name: &str, receiver: &Value, min: usize, max: usize) -> Value {
        Value::Function(Rc::new(Function::builtin(
            name,
            receiver.clone(),
            min,
            max,
            false,
        )))
    }

    fn variadic_builtin_fn(&self, name: &str, receiver: &Value) -> Value {
        Value::Function(Rc::new(Function::builtin(name, receiver.clone(), 0, 0, true)))
    }

    // ===== Builtin members =====

    fn list_member(
        &mut self,
        items: &Rc<RefCell<Vec<Value>>>,
        receiver: &Value,
        key: &str,
    ) -> VmResult<Value> {
        let value = match key {
            "length" => Value::Int(items.borrow().len() as i64),
            "isEmpty" => Value::Bool(items.borrow().is_empty()),
            "isNotEmpty" => Value::Bool(!items.borrow().is_empty()),
            "first" => items.borrow().first().cloned().unwrap_or(Value::Null),
            "last" => items.borrow().last().cloned().unwrap_or(Value::Null),
            "elementAt" => self.builtin_fn("elementAt", receiver, 1, 1),
            "add" => self.variadic_builtin_fn("add", receiver),
            "addAll" => self.builtin_fn("addAll", receiver, 1, 1),
            "contains" => self.builtin_fn("contains", receiver, 1, 1),
            "indexOf" => self.builtin_fn("indexOf", receiver, 1, 1),
            "removeAt" => self.builtin_fn("removeAt", receiver, 1, 1),
            "clear" => self.builtin_fn("clear", receiver, 0, 0),
            "join" => self.builtin_fn("join", receiver, 0, 1),
            "toString" => self.builtin_fn("toString", receiver, 0, 0),
            _ => {
                return Err(self.err_here(
                    ErrorCode::UndefinedMember,
                    format!("undefined member '{}' on List", key),
                ))
            }
        };
        Ok(value)
    }

    fn str_member(&mut self, text: &str, receiver: &Value, key: &str) -> VmResult<Value> {
        let value = match key {
            "length" => Value::Int(text.chars().count() as i64),
            "isEmpty" => Value::Bool(text.is_empty()),
            "isNotEmpty" => Value::Bool(!text.is_empty()),
            "toUpperCase" => self.builtin_fn("toUpperCase", receiver, 0, 0),
            "toLowerCase" => self.builtin_fn("toLowerCase", receiver, 0, 0),
            "trim" => self.builtin_fn("trim", receiver, 0, 0),
            "contains" => self.builtin_fn("contains", receiver, 1, 1),
            "startsWith" => self.builtin_fn("startsWith", receiver, 1, 1),
            "endsWith" => self.builtin_fn("endsWith", receiver, 1, 1),
            "indexOf" => self.builtin_fn("indexOf", receiver, 1, 1),
            "split" => self.builtin_fn("split", receiver, 1, 1),
            "replaceAll" => self.builtin_fn("replaceAll", receiver, 2, 2),
            "substring" => self.builtin_fn("substring", receiver, 1, 2),
            "elementAt" => self.builtin_fn("elementAt", receiver, 1, 1),
            "toString" => self.builtin_fn("toString", receiver, 0, 0),
            _ => {
                return Err(self.err_here(
                    ErrorCode::UndefinedMember,
                    format!("undefined member '{}' on str", key),
                ))
            }
        };
        Ok(value)
    }

    fn scalar_member(&mut self, receiver: &Value, key: &str) -> VmResult<Value> {
        let value = match (receiver, key) {
            (Value::Float(n), "isNaN") => Value::Bool(n.is_nan()),
            (_, "abs") => self.builtin_fn("abs", receiver, 0, 0),
            (Value::Float(_), "floor") => self.builtin_fn("floor", receiver, 0, 0),
            (Value::Float(_), "ceil") => self.builtin_fn("ceil", receiver, 0, 0),
            (Value::Float(_), "round") => self.builtin_fn("round", receiver, 0, 0),
            (Value::Float(_), "truncate") => self.builtin_fn("truncate", receiver, 0, 0),
            (Value::Int(_), "toFloat") => self.builtin_fn("toFloat", receiver, 0, 0),
            (_, "toString") => self.builtin_fn("toString", receiver, 0, 0),
            _ => {
                return Err(self.err_here(
                    ErrorCode::UndefinedMember,
                    format!(
                        "undefined member '{}' on {}",
                        key,
                        receiver.type_name()
                    ),
                ))
            }
        };
        Ok(value)
    }

    fn struct_builtin(
        &mut self,
        object: &Rc<RefCell<StructObject>>,
        receiver: &Value,
        key: &str,
    ) -> VmResult<Value> {
        let value = match key {
            "length" => Value::Int(object.borrow().len() as i64),
            "isEmpty" => Value::Bool(object.borrow().is_empty()),
            "isNotEmpty" => Value::Bool(!object.borrow().is_empty()),
            "keys" => Value::list(
                object
                    .borrow()
                    .keys()
                    .into_iter()
                    .map(Value::Str)
                    .collect(),
            ),
            "values" => Value::list(object.borrow().values()),
            "prototype" => match &object.borrow().prototype {
                Some(prototype) => Value::Struct(prototype.clone()),
                None => Value::Null,
            },
            "containsKey" => self.builtin_fn("containsKey", receiver, 1, 1),
            "remove" => self.builtin_fn("remove", receiver, 1, 1),
            "toString" => self.builtin_fn("toString", receiver, 0, 0),
            // Reads of absent keys fall through to null, prototype
            // semantics.
            _ => Value::Null,
        };
        Ok(value)
    }

    /// Dispatch a builtin method call on its receiver.
    pub(crate) fn call_builtin(
        &mut self,
        receiver: &Value,
        name: &str,
        args: &[Value],
    ) -> VmResult<Value> {
        match receiver {
            Value::List(items) => self.call_list_builtin(items, name, args),
            Value::Str(text) => self.call_str_builtin(text, name, args),
            Value::Int(n) => match name {
                "abs" => Ok(Value::Int(n.wrapping_abs())),
                "toFloat" => Ok(Value::Float(*n as f64)),
                "toString" => Ok(Value::Str(n.to_string())),
                _ => self.unknown_builtin(receiver, name),
            },
            Value::Float(n) => match name {
                "abs" => Ok(Value::Float(n.abs())),
                "floor" => Ok(Value::Int(n.floor() as i64)),
                "ceil" => Ok(Value::Int(n.ceil() as i64)),
                "round" => Ok(Value::Int(n.round() as i64)),
                "truncate" => Ok(Value::Int(n.trunc() as i64)),
                "toString" => Ok(Value::Str(n.to_string())),
                _ => self.unknown_builtin(receiver, name),
            },
            Value::Struct(object) => self.call_struct_builtin(object, name, args),
            other => match name {
                "toString" => Ok(Value::Str(other.to_display())),
                _ => self.unknown_builtin(receiver, name),
            },
        }
    }

    fn call_list_builtin(
        &mut self,
        items: &Rc<RefCell<Vec<Value>>>,
        name: &str,
        args: &[Value],
    ) -> VmResult<Value> {
        match name {
            "elementAt" => {
                let index = self.list_index(&args[0], items.borrow().len())?;
                Ok(items.borrow()[index].clone())
            }
            "add" => {
                items.borrow_mut().extend(args.iter().cloned());
                Ok(Value::Null)
            }
            "addAll" => match &args[0] {
                Value::List(other) => {
                    let values: Vec<Value> = other.borrow().clone();
                    items.borrow_mut().extend(values);
                    Ok(Value::Null)
                }
                other => Err(self.err_here(
                    ErrorCode::NotA,
                    format!("addAll expects a List, found '{}'", other.type_name()),
                )),
            },
            "contains" => Ok(Value::Bool(
                items.borrow().iter().any(|v| v.equals(&args[0])),
            )),
            "indexOf" => Ok(Value::Int(
                items
                    .borrow()
                    .iter()
                    .position(|v| v.equals(&args[0]))
                    .map(|i| i as i64)
                    .unwrap_or(-1),
            )),
            "removeAt" => {
                let index = self.list_index(&args[0], items.borrow().len())?;
                Ok(items.borrow_mut().remove(index))
            }
            "clear" => {
                items.borrow_mut().clear();
                Ok(Value::Null)
            }
            "join" => {
                let separator = match args.first() {
                    Some(Value::Str(s)) => s.clone(),
                    Some(other) => other.to_display(),
                    None => String::new(),
                };
                let parts: Vec<String> = items
                    .borrow()
                    .iter()
                    .map(|v| v.to_display())
                    .collect();
                Ok(Value::Str(parts.join(&separator)))
            }
            "toString" => Ok(Value::Str(Value::List(items.clone()).to_display())),
            _ => self.unknown_builtin(&Value::List(items.clone()), name),
        }
    }

    fn call_str_builtin(&mut self, text: &str, name: &str, args: &[Value]) -> VmResult<Value> {
        let expect_str = |vm: &Self, value: &Value| -> VmResult<String> {
            match value {
                Value::Str(s) => Ok(s.clone()),
                other => Err(vm.err_here(
                    ErrorCode::NotA,
                    format!("expected a str argument, found '{}'", other.type_name()),
                )),
            }
        };
        match name {
            "toUpperCase" => Ok(Value::Str(text.to_uppercase())),
            "toLowerCase" => Ok(Value::Str(text.to_lowercase())),
            "trim" => Ok(Value::Str(text.trim().to_string())),
            "contains" => Ok(Value::Bool(text.contains(&expect_str(self, &args[0])?))),
            "startsWith" => Ok(Value::Bool(text.starts_with(&expect_str(self, &args[0])?))),
            "endsWith" => Ok(Value::Bool(text.ends_with(&expect_str(self, &args[0])?))),
            "indexOf" => {
                let needle = expect_str(self, &args[0])?;
                Ok(Value::Int(
                    text.find(&needle).map(|i| i as i64).unwrap_or(-1),
                ))
            }
            "split" => {
                let separator = expect_str(self, &args[0])?;
                let parts: Vec<Value> = if separator.is_empty() {
                    text.chars().map(|c| Value::Str(c.to_string())).collect()
                } else {
                    text.split(&separator)
                        .map(|part| Value::Str(part.to_string()))
                        .collect()
                };
                Ok(Value::list(parts))
            }
            "replaceAll" => {
                let from = expect_str(self, &args[0])?;
                let to = expect_str(self, &args[1])?;
                Ok(Value::Str(text.replace(&from, &to)))
            }
            "substring" => {
                let chars: Vec<char> = text.chars().collect();
                let start = self.list_index(&args[0], chars.len() + 1)?;
                let end = match args.get(1) {
                    Some(value) => self.list_index(value, chars.len() + 1)?,
                    None => chars.len(),
                };
                if start > end {
                    return Err(self.err_here(
                        ErrorCode::OutOfRange,
                        format!("substring range {}..{} is inverted", start, end),
                    ));
                }
                Ok(Value::Str(chars[start..end].iter().collect()))
            }
            "elementAt" => {
                let index = self.list_index(&args[0], text.chars().count())?;
                Ok(Value::Str(
                    text.chars().nth(index).map(String::from).unwrap_or_default(),
                ))
            }
            "toString" => Ok(Value::Str(text.to_string())),
            _ => self.unknown_builtin(&Value::Str(text.to_string()), name),
        }
    }

    fn call_struct_builtin(
        &mut self,
        object: &Rc<RefCell<StructObject>>,
        name: &str,
        args: &[Value],
    ) -> VmResult<Value> {
        match name {
            "containsKey" => match &args[0] {
                Value::Str(key) => Ok(Value::Bool(object.borrow().contains_key(key))),
                other => Err(self.err_here(
                    ErrorCode::SubGetKey,
                    format!("struct keys are strings, found '{}'", other.type_name()),
                )),
            },
            "remove" => match &args[0] {
                Value::Str(key) => Ok(object.borrow_mut().remove(key).unwrap_or(Value::Null)),
                other => Err(self.err_here(
                    ErrorCode::SubGetKey,
                    format!("struct keys are strings, found '{}'", other.type_name()),
                )),
            },
            "toString" => Ok(Value::Str(object.borrow().to_display())),
            _ => self.unknown_builtin(&Value::Struct(object.clone()), name),
        }
    }

    fn unknown_builtin(&self, receiver: &Value, name: &str) -> VmResult<Value> {
        Err(self.err_here(
            ErrorCode::UndefinedMember,
            format!(
                "undefined member '{}' on {}",
                name,
                receiver.type_name()
            ),
        ))
    }
}
