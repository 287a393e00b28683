//! Quill: a small, embeddable scripting language.
//!
//! Source text is lexed, parsed into an AST, compiled to compact bytecode,
//! and executed by a register-augmented stack virtual machine. The
//! language is dynamically typed with optional (advisory) type
//! annotations, and supports imperative control flow, first-class
//! functions and closures, classes with single inheritance, enumerations,
//! and prototype-based struct objects.
//!
//! # Embedding
//!
//! ```no_run
//! use quill_script::Quill;
//!
//! let mut quill = Quill::new();
//! let value = quill.eval("fun add(a, b) => a + b  add(2, 3)").unwrap();
//! assert_eq!(value.to_display(), "5");
//! ```

pub mod ast;
pub mod compiler;
pub mod error;
pub mod lexer;
pub mod module;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod span;

use std::rc::Rc;

use indexmap::IndexMap;

use crate::compiler::{BytecodeImage, Compiler};
use crate::error::{ErrorCode, QuillError};
use crate::module::{FileSystemResolver, ModuleLoader, SourceResolver};
use crate::runtime::{
    ExternClassBinding, ExternFunction, ExternRegistry, Function, Value, Vm,
};
use crate::span::Span;

/// Host-supplied bindings and preincluded modules, applied by
/// [`Quill::init`].
#[derive(Default)]
pub struct InitOptions {
    pub external_classes: Vec<(String, Rc<dyn ExternClassBinding>)>,
    pub external_functions: Vec<(String, ExternFunction)>,
    pub external_typedefs: Vec<(String, Rc<dyn Fn(Rc<Function>) -> ExternFunction>)>,
    /// `(key, source)` modules evaluated into the global namespace before
    /// any user code.
    pub preincludes: Vec<(String, String)>,
}

/// The embedding facade: one interpreter instance with its module-loader
/// cache, external bindings and persistent VM state.
pub struct Quill {
    loader: ModuleLoader,
    externs: ExternRegistry,
    vm: Option<Vm>,
    eval_counter: usize,
}

impl Quill {
    /// An engine resolving imports from the current directory.
    pub fn new() -> Self {
        Self::with_resolver(Box::new(FileSystemResolver::new(".")))
    }

    /// An engine with a custom source resolver.
    pub fn with_resolver(resolver: Box<dyn SourceResolver>) -> Self {
        let mut externs = ExternRegistry::new();
        externs.register_function(
            "print",
            ExternFunction::positional(|args| {
                let parts: Vec<String> = args.iter().map(|v| v.to_display()).collect();
                println!("{}", parts.join(" "));
                Ok(Value::Null)
            }),
        );
        Self {
            loader: ModuleLoader::new(resolver),
            externs,
            vm: None,
            eval_counter: 0,
        }
    }

    /// Register host bindings and evaluate preincluded modules into the
    /// global namespace.
    pub fn init(&mut self, options: InitOptions) -> Result<(), QuillError> {
        for (id, binding) in options.external_classes {
            self.externs.register_class(id, binding);
        }
        for (id, function) in options.external_functions {
            self.externs.register_function(id, function);
        }
        for (id, unwrapper) in options.external_typedefs {
            self.externs
                .register_typedef(id, move |function| unwrapper(function));
        }
        if let Some(vm) = &mut self.vm {
            vm.externs = self.externs.clone();
        }

        for (key, source) in options.preincludes {
            let image = self.compile_source(&key, &source)?;
            let vm = self.vm_mut();
            vm.preinclude_mode = true;
            let result = vm.execute_image(image);
            vm.preinclude_mode = false;
            result?;
        }
        Ok(())
    }

    fn vm_mut(&mut self) -> &mut Vm {
        if self.vm.is_none() {
            self.vm = Some(Vm::new(self.externs.clone()));
        }
        self.vm.as_mut().expect("vm created above")
    }

    fn compile_source(&mut self, key: &str, source: &str) -> Result<Rc<BytecodeImage>, QuillError> {
        let compilation = self.loader.parse_to_compilation(key, source);
        if let Some(err) = compilation.errors().into_iter().next() {
            return Err(err);
        }
        let bytes = Compiler::new().compile(&compilation)?;
        let image = BytecodeImage::load(bytes)?;
        Ok(Rc::new(image))
    }

    /// Parse, compile and run a source string; returns the entry module's
    /// final value.
    pub fn eval(&mut self, source: &str) -> Result<Value, QuillError> {
        self.eval_with(source, None, Vec::new(), IndexMap::new())
    }

    /// Like [`Quill::eval`], optionally invoking a named function
    /// afterwards with the given arguments.
    pub fn eval_with(
        &mut self,
        source: &str,
        invoke_func: Option<&str>,
        positional: Vec<Value>,
        named: IndexMap<String, Value>,
    ) -> Result<Value, QuillError> {
        self.eval_counter += 1;
        let key = format!("eval:{}", self.eval_counter);
        let image = self.compile_source(&key, source)?;
        let vm = self.vm_mut();
        let value = vm.execute_image(image)?;
        match invoke_func {
            Some(name) => vm.invoke(name, positional, named),
            None => Ok(value),
        }
    }

    /// Compile a source string to a portable bytecode image.
    pub fn compile(&mut self, source: &str) -> Result<Vec<u8>, QuillError> {
        self.eval_counter += 1;
        let key = format!("eval:{}", self.eval_counter);
        let compilation = self.loader.parse_to_compilation(&key, source);
        if let Some(err) = compilation.errors().into_iter().next() {
            return Err(err);
        }
        Compiler::new().compile(&compilation)
    }

    /// Load and run a bytecode image produced by [`Quill::compile`].
    pub fn load_bytecode(&mut self, bytes: &[u8]) -> Result<Value, QuillError> {
        let image = Rc::new(BytecodeImage::load(bytes.to_vec())?);
        self.vm_mut().execute_image(image)
    }

    /// Invoke a function declared by previously evaluated code.
    pub fn invoke(
        &mut self,
        name: &str,
        positional: Vec<Value>,
        named: IndexMap<String, Value>,
    ) -> Result<Value, QuillError> {
        match &mut self.vm {
            Some(vm) => vm.invoke(name, positional, named),
            None => Err(QuillError::new(
                ErrorCode::Undefined,
                format!("undefined symbol '{}' (nothing evaluated yet)", name),
                Span::default(),
            )),
        }
    }

    /// A registered external function, host-ready.
    pub fn fetch_external_function(&self, id: &str) -> Option<ExternFunction> {
        self.externs.fetch_function(id)
    }

    /// A registered external class binding.
    pub fn fetch_external_class(&self, id: &str) -> Option<Rc<dyn ExternClassBinding>> {
        self.externs.fetch_class(id)
    }

    /// Wrap a script function value into a host-ready callable through a
    /// registered typedef.
    pub fn unwrap_external_function_type(
        &self,
        typedef_id: &str,
        function: &Value,
    ) -> Result<ExternFunction, QuillError> {
        let function = match function {
            Value::Function(function) => function.clone(),
            other => {
                return Err(QuillError::new(
                    ErrorCode::NotA,
                    format!("expected a function, found '{}'", other.type_name()),
                    Span::default(),
                ))
            }
        };
        self.externs
            .unwrap_function_type(typedef_id, function)
            .ok_or_else(|| {
                QuillError::new(
                    ErrorCode::UndefinedExternal,
                    format!("no external function typedef registered as '{}'", typedef_id),
                    Span::default(),
                )
            })
    }
}

impl Default for Quill {
    fn default() -> Self {
        Self::new()
    }
}
