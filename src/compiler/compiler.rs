//! The bytecode compiler: walks per-module ASTs and emits one image.

use std::collections::HashMap;

use crate::ast::{Expr, SourceKind, TypeExpr, TypeExprKind};
use crate::compiler::consts::ConstTable;
use crate::compiler::emitter::Emitter;
use crate::compiler::image::frame_image;
use crate::compiler::opcode::OpCode;
use crate::error::{CompileResult, QuillError};
use crate::module::{Compilation, ParsedModule};
use crate::span::Span;

/// AST → bytecode. One compiler instance owns one constant table and
/// produces one image for a whole compilation bundle.
pub struct Compiler {
    pub(crate) consts: ConstTable,
    /// Rename scopes for loop-header variables: the user-visible name maps
    /// to the internal marker name while compiling the loop header.
    pub(crate) markers: Vec<HashMap<String, String>>,
    /// Synthetic lowerings (enums) may touch `_`-prefixed members.
    pub(crate) allow_private_access: bool,
    /// 0 at module top level; top-level module declarations and class
    /// statics initialize lazily.
    pub(crate) scope_depth: usize,
    pub(crate) module_kind: SourceKind,
    /// Set while emitting a class body stream; non-static declarations
    /// become instance member templates.
    pub(crate) in_class_body: bool,
    pub(crate) anon_counter: usize,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            consts: ConstTable::new(),
            markers: Vec::new(),
            allow_private_access: false,
            scope_depth: 0,
            module_kind: SourceKind::Script,
            in_class_body: false,
            anon_counter: 0,
        }
    }

    /// Compile every module of the bundle into a framed bytecode image.
    /// Module blocks keep the loader's dependency order; the entry module
    /// carries the library-entry flag.
    pub fn compile(mut self, compilation: &Compilation) -> CompileResult<Vec<u8>> {
        let mut modules = Vec::with_capacity(compilation.modules.len());

        for (key, module) in &compilation.modules {
            let module = module.borrow();
            let is_entry = key == &compilation.entry_key;
            let code = self
                .compile_module(&module)
                .map_err(|e| e.in_module(key.clone()))?;
            modules.push((key.clone(), is_entry, code));
        }

        frame_image(&self.consts, modules)
    }

    fn compile_module(&mut self, module: &ParsedModule) -> CompileResult<Emitter> {
        let mut out = Emitter::new();
        self.module_kind = module.kind;
        self.scope_depth = 0;

        for stmt in &module.statements {
            self.compile_statement(stmt, &mut out)?;
        }
        Ok(out)
    }

    // ===== Shared emission helpers =====

    pub(crate) fn emit_line_info(&mut self, span: Span, out: &mut Emitter) {
        out.write_op(OpCode::LineInfo);
        out.write_u16(span.line.min(u16::MAX as usize) as u16);
        out.write_u16(span.column.min(u16::MAX as usize) as u16);
    }

    /// Compile an expression into a length-prefixed sub-program terminated
    /// by `endOfExec`.
    pub(crate) fn emit_sub_expr(&mut self, expr: &Expr, out: &mut Emitter) -> CompileResult<()> {
        let mut inner = Emitter::new();
        self.compile_expression(expr, &mut inner)?;
        inner.write_op(OpCode::EndOfExec);
        out.write_sub_program(inner, expr.span)
    }

    /// A fresh internal name for lowered temporaries.
    pub(crate) fn next_internal_name(&mut self, prefix: &str) -> String {
        let name = format!("${}{}", prefix, self.anon_counter);
        self.anon_counter += 1;
        name
    }

    /// Resolve a name through the active loop-header rename scopes.
    pub(crate) fn resolve_marker(&self, name: &str) -> String {
        for scope in self.markers.iter().rev() {
            if let Some(renamed) = scope.get(name) {
                return renamed.clone();
            }
        }
        name.to_string()
    }

    /// Emit a type expression block: `u8` kind + payload.
    pub(crate) fn emit_type_expr(&mut self, ty: &TypeExpr, out: &mut Emitter) -> CompileResult<()> {
        match &ty.kind {
            TypeExprKind::Nominal { id, args, nullable } => {
                out.write_u8(0);
                out.write_short_str(id, ty.span)?;
                out.write_bool(*nullable);
                if args.len() > u8::MAX as usize {
                    return Err(QuillError::new(
                        crate::error::ErrorCode::ConstantTooLarge,
                        "too many type arguments",
                        ty.span,
                    ));
                }
                out.write_u8(args.len() as u8);
                for arg in args {
                    self.emit_type_expr(arg, out)?;
                }
            }
            TypeExprKind::Function {
                params,
                return_type,
            } => {
                out.write_u8(1);
                out.write_u8(params.len().min(u8::MAX as usize) as u8);
                for param in params {
                    out.write_bool(param.is_variadic);
                    self.emit_type_expr(&param.ty, out)?;
                }
                match return_type {
                    Some(ret) => {
                        out.write_bool(true);
                        self.emit_type_expr(ret, out)?;
                    }
                    None => out.write_bool(false),
                }
            }
            TypeExprKind::GenericParam { id } => {
                out.write_u8(2);
                out.write_short_str(id, ty.span)?;
            }
        }
        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
