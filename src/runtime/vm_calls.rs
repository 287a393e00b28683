//! Function invocation: arity validation, instance allocation, namespace
//! binding, constructor redirection, parameter binding, and the external
//! calling conventions.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::FunctionCategory;
use crate::compiler::Register;
use crate::error::{ErrorCode, QuillError, VmResult};
use crate::runtime::class::{build_instance, Class, Instance};
use crate::runtime::declaration::Declaration;
use crate::runtime::external::ExternFunction;
use crate::runtime::function::{Function, FunctionBodyKind, RedirectTarget};
use crate::runtime::namespace::{Namespace, NamespaceKind};
use crate::runtime::structs::StructObject;
use crate::runtime::value::Value;
use crate::runtime::vm::{FrameRecord, Vm, FRAMES_MAX};
use crate::span::Span;

impl Vm {
    /// `call` opcode: read the argument sub-programs (evaluated in the
    /// caller's current namespace) and invoke the callee parked in the
    /// postfix-object register.
    pub(crate) fn op_call(&mut self) -> VmResult<()> {
        let callee = self.reg(Register::PostfixObject);

        let positional_count = self.read_u8()? as usize;
        let mut positional = Vec::with_capacity(positional_count);
        for _ in 0..positional_count {
            positional.push(self.run_sub()?);
        }
        let named_count = self.read_u8()? as usize;
        let mut named = IndexMap::with_capacity(named_count);
        for _ in 0..named_count {
            let name = self.read_short_str()?;
            let value = self.run_sub()?;
            named.insert(name, value);
        }

        self.cur_value = self.call_value(&callee, positional, named)?;
        Ok(())
    }

    /// Invoke any callable value.
    pub fn call_value(
        &mut self,
        callee: &Value,
        positional: Vec<Value>,
        named: IndexMap<String, Value>,
    ) -> VmResult<Value> {
        match callee {
            Value::Function(function) => {
                self.call_function(function.clone(), positional, named, None)
            }
            Value::Class(class) => self.construct(class.clone(), positional, named, None),
            Value::Struct(prototype) => {
                // Calling a struct spawns an empty object with the callee
                // as its prototype.
                if !positional.is_empty() || !named.is_empty() {
                    return Err(self
                        .err_here(ErrorCode::Arity, "struct constructors take no arguments"));
                }
                Ok(Value::Struct(Rc::new(RefCell::new(StructObject::new(
                    None,
                    Some(prototype.clone()),
                )))))
            }
            other => Err(self.err_here(
                ErrorCode::NotCallable,
                format!("value of type '{}' is not callable", other.type_name()),
            )),
        }
    }

    /// The function call protocol.
    pub(crate) fn call_function(
        &mut self,
        function: Rc<Function>,
        positional: Vec<Value>,
        named: IndexMap<String, Value>,
        ctor_instance: Option<Rc<Instance>>,
    ) -> VmResult<Value> {
        // 1. Arity validation.
        if !function.accepts_positional(positional.len()) {
            return Err(QuillError::arity(
                function.min_arity,
                function.max_arity,
                positional.len(),
                self.here(),
            )
            .in_module(self.cur_module.clone()));
        }
        for name in named.keys() {
            let valid = function
                .params
                .get(name)
                .map(|p| p.is_named)
                .unwrap_or(false);
            if !valid {
                return Err(
                    QuillError::named_arg(name, self.here()).in_module(self.cur_module.clone())
                );
            }
        }

        match &function.body {
            FunctionBodyKind::Builtin(name) => {
                let receiver = function.bound_receiver.clone().unwrap_or(Value::Null);
                self.call_builtin(&receiver, name, &positional)
            }
            FunctionBodyKind::Extern(callable) => {
                self.call_extern(&function, callable.clone(), &positional, &named)
            }
            FunctionBodyKind::None => Err(self.err_here(
                ErrorCode::Unsupported,
                format!("'{}' has no body to execute", function.internal_name),
            )),
            FunctionBodyKind::Bytecode {
                image,
                module,
                entry,
                ..
            } => {
                let image = Rc::clone(image);
                let module = module.clone();
                let entry = *entry;
                self.call_bytecode(function, image, module, entry, positional, named, ctor_instance)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn call_bytecode(
        &mut self,
        function: Rc<Function>,
        image: Rc<crate::compiler::BytecodeImage>,
        module: String,
        entry: usize,
        positional: Vec<Value>,
        named: IndexMap<String, Value>,
        ctor_instance: Option<Rc<Instance>>,
    ) -> VmResult<Value> {
        if self.frames.len() >= FRAMES_MAX {
            return Err(self.err_here(ErrorCode::StackOverflow, "call stack overflow"));
        }

        // 2. Constructors allocate the instance unless a redirecting call
        // already supplied one.
        let is_ctor = function.category == FunctionCategory::Constructor;
        let created_here = is_ctor && ctor_instance.is_none();
        let instance_view = if is_ctor {
            match ctor_instance {
                Some(view) => Some(view),
                None => {
                    let class = function
                        .owning_class
                        .as_ref()
                        .and_then(|weak| weak.upgrade())
                        .ok_or_else(|| {
                            self.err_here(
                                ErrorCode::NotA,
                                "constructor invoked without an owning class",
                            )
                        })?;
                    Some(self.instantiate(&class)?)
                }
            }
        } else {
            None
        };

        // 3. Fresh call namespace over the captured closure (or the
        // instance namespace for constructors and bound methods).
        let enclosing = match &instance_view {
            Some(view) => view.namespaces[0].clone(),
            None => function
                .closure
                .clone()
                .unwrap_or_else(|| self.global.clone()),
        };
        let call_ns = Namespace::child(
            &enclosing,
            function.internal_name.clone(),
            NamespaceKind::Call,
        );

        // 4. `this`/`super` live in the instance namespaces, which the
        // call namespace now encloses.

        // 6. Bind parameters: positional in order, named from the
        // named-argument map, defaults for the absent, the variadic
        // parameter packing the remaining positionals.
        let mut positional_iter = positional.into_iter();
        for (name, param) in function.params.iter() {
            let value = if param.is_variadic {
                Value::list(positional_iter.by_ref().collect())
            } else if param.is_named {
                match named.get(name) {
                    Some(value) => value.clone(),
                    None => self.eval_default(&image, param.default_ip, &call_ns)?,
                }
            } else {
                match positional_iter.next() {
                    Some(value) => value,
                    None => self.eval_default(&image, param.default_ip, &call_ns)?,
                }
            };
            let mut decl = Declaration::variable(name.clone(), value);
            decl.declared_type = param.declared_type.clone();
            call_ns.borrow_mut().define(Rc::new(RefCell::new(decl)));
        }

        // 5. A redirecting constructor delegates before its own body runs;
        // the captured argument sub-programs evaluate in this call's
        // closure.
        if let (Some(redirect), Some(view)) = (&function.redirect, &instance_view) {
            let mut redirect_positional = Vec::with_capacity(redirect.positional_ips.len());
            for ip in &redirect.positional_ips {
                redirect_positional.push(self.run_expr_at(image.clone(), *ip, call_ns.clone())?);
            }
            let mut redirect_named = IndexMap::with_capacity(redirect.named_ips.len());
            for (name, ip) in &redirect.named_ips {
                redirect_named.insert(
                    name.clone(),
                    self.run_expr_at(image.clone(), *ip, call_ns.clone())?,
                );
            }

            let (target_class, target_view) = match redirect.target {
                RedirectTarget::Super => {
                    let super_class =
                        view.class.borrow().super_class.clone().ok_or_else(|| {
                            self.err_here(
                                ErrorCode::Undefined,
                                "redirect to super in a class without a superclass",
                            )
                        })?;
                    let super_view = Instance::super_view(view).ok_or_else(|| {
                        self.err_here(
                            ErrorCode::Undefined,
                            "redirect to super without a superclass namespace",
                        )
                    })?;
                    (super_class, super_view)
                }
                RedirectTarget::This => (view.class.clone(), view.clone()),
            };

            let ctor_name = Function::construct_name(redirect.key.as_deref());
            let target_decl = target_class
                .borrow()
                .namespace
                .borrow()
                .lookup_local(&ctor_name);
            let target_ctor = match target_decl {
                Some(decl) => match self.fetch_decl_value(&decl)? {
                    Value::Function(ctor) => ctor,
                    other => {
                        return Err(self.err_here(
                            ErrorCode::NotCallable,
                            format!("'{}' is not a constructor", other.type_name()),
                        ))
                    }
                },
                None => {
                    return Err(self.err_here(
                        ErrorCode::Undefined,
                        format!(
                            "no constructor '{}' on class {}",
                            redirect.key.as_deref().unwrap_or("default"),
                            target_class.borrow().id
                        ),
                    ))
                }
            };
            self.call_function(
                target_ctor,
                redirect_positional,
                redirect_named,
                Some(target_view),
            )?;
        }

        // 7. Transfer control to the entry point.
        self.frames.push(FrameRecord {
            name: function.internal_name.clone(),
            module: self.cur_module.clone(),
            line: self.cur_line,
            column: self.cur_column,
        });
        let saved_ns = self.cur_ns.clone();
        let saved_ns_depth = self.ns_depth;
        let saved_loops = self.loops.len();
        let saved_anchors = self.anchors.len();
        let saved_module = std::mem::replace(&mut self.cur_module, module);
        self.cur_ns = call_ns;

        let result = self.run_func_at(image, entry);

        self.cur_ns = saved_ns;
        self.ns_depth = saved_ns_depth;
        self.loops.truncate(saved_loops);
        self.anchors.truncate(saved_anchors);
        self.cur_module = saved_module;
        let frame = self.frames.pop().expect("frame pushed above");

        match result {
            Ok(value) => {
                if created_here {
                    // A plain constructor call yields the instance.
                    Ok(Value::Instance(instance_view.expect("constructor instance")))
                } else {
                    Ok(value)
                }
            }
            Err(mut err) => {
                err.push_frame(format!(
                    "{} ({}:{}:{})",
                    frame.name, frame.module, frame.line, frame.column
                ));
                Err(err)
            }
        }
    }

    fn eval_default(
        &mut self,
        image: &Rc<crate::compiler::BytecodeImage>,
        default_ip: Option<usize>,
        call_ns: &Rc<RefCell<Namespace>>,
    ) -> VmResult<Value> {
        match default_ip {
            Some(ip) => self.run_expr_at(image.clone(), ip, call_ns.clone()),
            None => Ok(Value::Null),
        }
    }

    /// External functions execute synchronously within the dispatch loop,
    /// in one of the three conventions.
    fn call_extern(
        &mut self,
        function: &Rc<Function>,
        callable: ExternFunction,
        positional: &[Value],
        named: &IndexMap<String, Value>,
    ) -> VmResult<Value> {
        let result = match callable {
            ExternFunction::Structured(f) => f(positional, named, &[]),
            ExternFunction::Positional(f) => f(positional),
            ExternFunction::Method(f) => {
                let receiver = function.bound_receiver.clone().unwrap_or(Value::Null);
                f(&receiver, positional, named)
            }
        };
        result.map_err(|message| {
            self.err_here(
                ErrorCode::External,
                format!("external function '{}': {}", function.internal_name, message),
            )
        })
    }

    /// Calling a class invokes its constructor, allocating the instance.
    pub(crate) fn construct(
        &mut self,
        class: Rc<RefCell<Class>>,
        positional: Vec<Value>,
        named: IndexMap<String, Value>,
        key: Option<&str>,
    ) -> VmResult<Value> {
        {
            let borrowed = class.borrow();
            if borrowed.is_abstract {
                return Err(self.err_here(
                    ErrorCode::AbstractClass,
                    format!("cannot instantiate abstract class {}", borrowed.id),
                ));
            }
            if borrowed.is_external {
                let binding = self.externs.fetch_class(&borrowed.id).ok_or_else(|| {
                    self.err_here(
                        ErrorCode::UndefinedExternal,
                        format!("no external class registered as '{}'", borrowed.id),
                    )
                })?;
                let ctor = binding
                    .member_get(&Function::construct_name(key))
                    .map_err(|message| self.err_here(ErrorCode::External, message))?;
                drop(borrowed);
                return self.call_value(&ctor, positional, named);
            }
        }

        let ctor_name = Function::construct_name(key);
        let ctor_decl = class.borrow().namespace.borrow().lookup_local(&ctor_name);
        match ctor_decl {
            Some(decl) => {
                let ctor = match self.fetch_decl_value(&decl)? {
                    Value::Function(ctor) => ctor,
                    other => {
                        return Err(self.err_here(
                            ErrorCode::NotCallable,
                            format!("'{}' is not a constructor", other.type_name()),
                        ))
                    }
                };
                // Factories build their own value; plain constructors
                // allocate inside the call protocol.
                self.call_function(ctor, positional, named, None)
            }
            None if key.is_none() && !class.borrow().has_user_ctor => {
                // Implicit default constructor.
                if !positional.is_empty() || !named.is_empty() {
                    return Err(QuillError::arity(0, 0, positional.len(), self.here())
                        .in_module(self.cur_module.clone()));
                }
                let instance = self.instantiate(&class)?;
                Ok(Value::Instance(instance))
            }
            None => Err(self.err_here(
                ErrorCode::Undefined,
                format!(
                    "no constructor '{}' on class {}",
                    key.unwrap_or("default"),
                    class.borrow().id
                ),
            )),
        }
    }

    /// Allocate an instance: build the namespace chain, run the field
    /// initializers base-first, and install bound method clones.
    pub(crate) fn instantiate(&mut self, class: &Rc<RefCell<Class>>) -> VmResult<Rc<Instance>> {
        let instance = build_instance(class);
        let chain = Class::chain(class);

        for level in (0..chain.len()).rev() {
            let level_ns = instance.namespaces[level].clone();
            let level_class = chain[level].clone();

            let fields = level_class.borrow().instance_fields.clone();
            for field in fields {
                let value = match (field.init_ip, &field.image) {
                    (Some(ip), Some(image)) => {
                        self.run_expr_at(image.clone(), ip, level_ns.clone())?
                    }
                    _ => Value::Null,
                };
                let mut decl = Declaration::variable(field.id.clone(), value);
                decl.is_mutable = field.is_mutable;
                decl.declared_type = field.declared_type.clone();
                decl.class_id = Some(level_class.borrow().id.clone());
                level_ns.borrow_mut().define(Rc::new(RefCell::new(decl)));
            }

            let methods = level_class.borrow().instance_methods.clone();
            for template in methods {
                let bound = template.bind(level_ns.clone());
                let key = match bound.category {
                    FunctionCategory::Getter => {
                        Function::getter_name(bound.id.as_deref().unwrap_or(""))
                    }
                    FunctionCategory::Setter => {
                        Function::setter_name(bound.id.as_deref().unwrap_or(""))
                    }
                    _ => bound.id.clone().unwrap_or_else(|| "$anonymous".to_string()),
                };
                let mut decl = Declaration::immutable(key, Value::Function(Rc::new(bound)));
                decl.class_id = Some(level_class.borrow().id.clone());
                level_ns.borrow_mut().define_or_replace(Rc::new(RefCell::new(decl)));
            }
        }

        Ok(instance)
    }

    /// Call a named function/class in the entry module (or the globals).
    pub fn invoke(
        &mut self,
        name: &str,
        positional: Vec<Value>,
        named: IndexMap<String, Value>,
    ) -> VmResult<Value> {
        let decl = self
            .entry_ns
            .as_ref()
            .and_then(|ns| ns.borrow().lookup(name))
            .or_else(|| self.global.borrow().lookup(name))
            .ok_or_else(|| {
                self.err_here(ErrorCode::Undefined, format!("undefined symbol '{}'", name))
            })?;
        let callee = self.fetch_decl_value(&decl)?;
        self.call_value(&callee, positional, named)
    }

    /// The rendering used by `print` and string interpolation: instances
    /// and structs may carry their own `toString`.
    pub(crate) fn display_value(&mut self, value: &Value) -> VmResult<String> {
        match value {
            Value::Instance(_) => {
                let to_string = self.member_get(value, "toString")?;
                match to_string {
                    Value::Function(f) => {
                        let rendered =
                            self.call_function(f, Vec::new(), IndexMap::new(), None)?;
                        Ok(rendered.to_display())
                    }
                    other => Ok(other.to_display()),
                }
            }
            Value::Struct(object) => {
                let user_to_string = object.borrow().get("toString");
                match user_to_string {
                    Some(Value::Function(f)) => {
                        let rendered =
                            self.call_function(f, Vec::new(), IndexMap::new(), None)?;
                        Ok(rendered.to_display())
                    }
                    _ => Ok(value.to_display()),
                }
            }
            other => Ok(other.to_display()),
        }
    }

    pub(crate) fn here(&self) -> Span {
        Span::new(0, 0, self.cur_line as usize, self.cur_column as usize)
    }
}
