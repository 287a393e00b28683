//! Declaration compilation: variables, function definitions, classes,
//! the enum-to-class lowering, structs.

use crate::ast::{
    ClassDecl, EnumDecl, Expr, ExprKind, FunctionBody, FunctionCategory, FunctionDecl, ParamDecl,
    RedirectTarget, SourceKind, Stmt, StmtKind, StructDecl, TypeExpr, VarDecl,
};
use crate::compiler::compiler::Compiler;
use crate::compiler::emitter::Emitter;
use crate::compiler::opcode::{FunctionKindByte, LocalKind, OpCode};
use crate::error::CompileResult;
use crate::span::Span;

impl Compiler {
    /// Whether a declaration's initializer should run lazily on first read
    /// rather than at declaration time: class statics and module top-level
    /// declarations.
    fn is_lazy(&self, decl: &VarDecl) -> bool {
        if decl.initializer.is_none() {
            return false;
        }
        decl.lazy_initialize
            || (self.in_class_body && decl.is_static)
            || (!self.in_class_body
                && self.scope_depth == 0
                && self.module_kind == SourceKind::Module)
    }

    pub(crate) fn compile_var_decl(
        &mut self,
        decl: &VarDecl,
        out: &mut Emitter,
    ) -> CompileResult<()> {
        out.write_op(OpCode::VarDecl);
        out.write_short_str(&decl.id, decl.span)?;
        out.write_bool(self.in_class_body && !decl.is_static);
        out.write_bool(decl.is_static);
        out.write_bool(decl.is_mutable);
        out.write_bool(decl.is_external);

        match &decl.declared_type {
            Some(ty) => {
                out.write_bool(true);
                self.emit_type_expr(ty, out)?;
            }
            None => out.write_bool(false),
        }

        match &decl.initializer {
            None => out.write_u8(0),
            Some(init) => {
                if self.is_lazy(decl) {
                    out.write_u8(2);
                    out.write_u16(init.span.line.min(u16::MAX as usize) as u16);
                    out.write_u16(init.span.column.min(u16::MAX as usize) as u16);
                } else {
                    out.write_u8(1);
                }
                self.emit_sub_expr(init, out)?;
            }
        }
        Ok(())
    }

    /// Emit a function-definition block, shared by declarations and
    /// literals. Parameter defaults, redirecting-constructor arguments and
    /// the body are embedded as skippable sub-programs whose entry offsets
    /// the VM records while reading the block.
    pub(crate) fn emit_function_def(
        &mut self,
        decl: &FunctionDecl,
        out: &mut Emitter,
    ) -> CompileResult<()> {
        let id = decl.id.clone().unwrap_or_default();
        out.write_short_str(&id, decl.span)?;
        out.write_u8(category_byte(decl.category) as u8);
        out.write_bool(decl.is_external);
        out.write_bool(decl.is_static);
        out.write_bool(
            self.in_class_body
                && !decl.is_static
                && matches!(
                    decl.category,
                    FunctionCategory::Method
                        | FunctionCategory::Getter
                        | FunctionCategory::Setter
                ),
        );
        out.write_bool(decl.is_variadic());
        out.write_u8(decl.min_arity().min(u8::MAX as usize) as u8);
        out.write_u8(decl.max_arity().min(u8::MAX as usize) as u8);

        out.write_u8(decl.params.len().min(u8::MAX as usize) as u8);
        for param in &decl.params {
            self.emit_parameter(param, out)?;
        }

        match &decl.declared_return_type {
            Some(ty) => {
                out.write_bool(true);
                self.emit_type_expr(ty, out)?;
            }
            None => out.write_bool(false),
        }

        match &decl.redirecting {
            Some(redirect) => {
                out.write_bool(true);
                out.write_u8(match redirect.target {
                    RedirectTarget::Super => 0,
                    RedirectTarget::This => 1,
                });
                match &redirect.key {
                    Some(key) => {
                        out.write_bool(true);
                        out.write_short_str(key, redirect.span)?;
                    }
                    None => out.write_bool(false),
                }
                out.write_u8(redirect.positional.len().min(u8::MAX as usize) as u8);
                for arg in &redirect.positional {
                    self.emit_sub_expr(arg, out)?;
                }
                out.write_u8(redirect.named.len().min(u8::MAX as usize) as u8);
                for (name, arg) in &redirect.named {
                    out.write_short_str(name, arg.span)?;
                    self.emit_sub_expr(arg, out)?;
                }
            }
            None => out.write_bool(false),
        }

        match &decl.body {
            Some(body) => {
                out.write_bool(true);
                let mut inner = Emitter::new();
                let saved_class_body = self.in_class_body;
                let saved_depth = self.scope_depth;
                self.in_class_body = false;
                self.scope_depth += 1;
                match body {
                    FunctionBody::Block(statements) => {
                        for stmt in statements {
                            self.compile_statement(stmt, &mut inner)?;
                        }
                        inner.write_local(LocalKind::Null);
                        inner.write_op(OpCode::EndOfFunc);
                    }
                    FunctionBody::Expression(expr) => {
                        self.compile_expression(expr, &mut inner)?;
                        inner.write_op(OpCode::EndOfFunc);
                    }
                }
                self.in_class_body = saved_class_body;
                self.scope_depth = saved_depth;
                out.write_sub_program(inner, decl.span)?;
            }
            None => out.write_bool(false),
        }
        Ok(())
    }

    fn emit_parameter(&mut self, param: &ParamDecl, out: &mut Emitter) -> CompileResult<()> {
        out.write_short_str(&param.id, param.span)?;
        out.write_bool(param.is_optional);
        out.write_bool(param.is_named);
        out.write_bool(param.is_variadic);
        match &param.declared_type {
            Some(ty) => {
                out.write_bool(true);
                self.emit_type_expr(ty, out)?;
            }
            None => out.write_bool(false),
        }
        match &param.default {
            Some(default) => {
                out.write_bool(true);
                self.emit_sub_expr(default, out)?;
            }
            None => out.write_bool(false),
        }
        Ok(())
    }

    pub(crate) fn compile_class_decl(
        &mut self,
        decl: &ClassDecl,
        out: &mut Emitter,
    ) -> CompileResult<()> {
        out.write_op(OpCode::ClassDecl);
        out.write_short_str(&decl.id, decl.span)?;
        out.write_u8(decl.generic_params.len().min(u8::MAX as usize) as u8);
        for generic in &decl.generic_params {
            out.write_short_str(generic, decl.span)?;
        }
        out.write_bool(decl.is_external);
        out.write_bool(decl.is_abstract);
        out.write_bool(decl.is_enum);

        match &decl.super_type {
            Some(super_type) => {
                out.write_bool(true);
                self.emit_type_expr(super_type, out)?;
            }
            None => out.write_bool(false),
        }
        out.write_u8(decl.implements.len().min(u8::MAX as usize) as u8);
        for ty in &decl.implements {
            self.emit_type_expr(ty, out)?;
        }
        out.write_u8(decl.mixes.len().min(u8::MAX as usize) as u8);
        for ty in &decl.mixes {
            self.emit_type_expr(ty, out)?;
        }
        out.write_bool(decl.has_user_constructor());

        let mut body = Emitter::new();
        let saved = self.in_class_body;
        self.in_class_body = true;
        for member in &decl.members {
            self.compile_statement(member, &mut body)?;
        }
        self.in_class_body = saved;
        body.write_op(OpCode::EndOfExec);
        out.write_sub_program(body, decl.span)?;
        Ok(())
    }

    /// Enum lowering: `enum E { a, b }` compiles as a class with a private
    /// name field, a private one-argument constructor, an interpolated
    /// `toString`, one lazily initialized static field per enumerator, and
    /// a static `values` list in declaration order.
    pub(crate) fn compile_enum_decl(
        &mut self,
        decl: &EnumDecl,
        out: &mut Emitter,
    ) -> CompileResult<()> {
        let span = decl.span;
        let lowered = lower_enum(decl, span);

        let saved = self.allow_private_access;
        self.allow_private_access = true;
        let result = self.compile_class_decl(&lowered, out);
        self.allow_private_access = saved;
        result
    }

    pub(crate) fn compile_struct_decl(
        &mut self,
        decl: &StructDecl,
        out: &mut Emitter,
    ) -> CompileResult<()> {
        out.write_op(OpCode::StructDecl);
        out.write_short_str(&decl.id, decl.span)?;
        match &decl.prototype {
            Some(proto) => {
                out.write_bool(true);
                out.write_short_str(proto, decl.span)?;
            }
            None => out.write_bool(false),
        }
        out.write_u8(decl.fields.len().min(u8::MAX as usize) as u8);
        for (key, value) in &decl.fields {
            out.write_short_str(key, decl.span)?;
            self.emit_sub_expr(value, out)?;
        }
        Ok(())
    }
}

fn category_byte(category: FunctionCategory) -> FunctionKindByte {
    match category {
        FunctionCategory::Normal => FunctionKindByte::Normal,
        FunctionCategory::Literal => FunctionKindByte::Literal,
        FunctionCategory::Method => FunctionKindByte::Method,
        FunctionCategory::Getter => FunctionKindByte::Getter,
        FunctionCategory::Setter => FunctionKindByte::Setter,
        FunctionCategory::Constructor => FunctionKindByte::Constructor,
        FunctionCategory::Factory => FunctionKindByte::Factory,
    }
}

/// Build the synthetic class AST an enum lowers to.
fn lower_enum(decl: &EnumDecl, span: Span) -> ClassDecl {
    let ident = |name: &str| Expr::new(ExprKind::Identifier(name.to_string()), span);
    let enum_member = |value: &str| {
        Expr::new(
            ExprKind::Member {
                object: Box::new(ident(&decl.id)),
                name: value.to_string(),
            },
            span,
        )
    };

    let mut members: Vec<Stmt> = Vec::new();

    // var _name
    members.push(Stmt::new(
        StmtKind::Var(VarDecl {
            id: "_name".to_string(),
            class_id: Some(decl.id.clone()),
            declared_type: Some(TypeExpr::nominal("str", span)),
            initializer: None,
            is_mutable: true,
            is_const: false,
            is_static: false,
            is_external: decl.is_external,
            lazy_initialize: false,
            span,
        }),
        span,
    ));

    // construct _(name) { _name = name }
    let assign = Expr::new(
        ExprKind::Assign {
            target: Box::new(ident("_name")),
            value: Box::new(ident("name")),
        },
        span,
    );
    members.push(Stmt::new(
        StmtKind::Function(FunctionDecl {
            id: Some("_".to_string()),
            category: FunctionCategory::Constructor,
            class_id: Some(decl.id.clone()),
            generic_params: Vec::new(),
            params: vec![ParamDecl {
                id: "name".to_string(),
                declared_type: Some(TypeExpr::nominal("str", span)),
                default: None,
                is_optional: false,
                is_named: false,
                is_variadic: false,
                span,
            }],
            declared_return_type: None,
            is_external: decl.is_external,
            is_static: false,
            redirecting: None,
            body: Some(FunctionBody::Block(vec![Stmt::new(
                StmtKind::Expression(assign),
                span,
            )])),
            span,
        }),
        span,
    ));

    // fun toString -> str => '<E>.${_name}'
    members.push(Stmt::new(
        StmtKind::Function(FunctionDecl {
            id: Some("toString".to_string()),
            category: FunctionCategory::Method,
            class_id: Some(decl.id.clone()),
            generic_params: Vec::new(),
            params: Vec::new(),
            declared_return_type: Some(TypeExpr::nominal("str", span)),
            is_external: decl.is_external,
            is_static: false,
            redirecting: None,
            body: Some(FunctionBody::Expression(Box::new(Expr::new(
                ExprKind::Interpolation {
                    pattern: format!("{}.{{0}}", decl.id),
                    segments: vec![ident("_name")],
                },
                span,
            )))),
            span,
        }),
        span,
    ));

    // static final <v> = E._('<v>'), lazily initialized
    for value in &decl.values {
        let call = Expr::new(
            ExprKind::Call {
                callee: Box::new(Expr::new(
                    ExprKind::Member {
                        object: Box::new(ident(&decl.id)),
                        name: "_".to_string(),
                    },
                    span,
                )),
                positional: vec![Expr::new(ExprKind::StringLiteral(value.clone()), span)],
                named: Vec::new(),
            },
            span,
        );
        members.push(Stmt::new(
            StmtKind::Var(VarDecl {
                id: value.clone(),
                class_id: Some(decl.id.clone()),
                declared_type: None,
                initializer: Some(call),
                is_mutable: false,
                is_const: false,
                is_static: true,
                is_external: decl.is_external,
                lazy_initialize: true,
                span,
            }),
            span,
        ));
    }

    // static final values = [E.a, E.b, …]
    let values_list = Expr::new(
        ExprKind::ListLiteral(decl.values.iter().map(|v| enum_member(v)).collect()),
        span,
    );
    members.push(Stmt::new(
        StmtKind::Var(VarDecl {
            id: "values".to_string(),
            class_id: Some(decl.id.clone()),
            declared_type: None,
            initializer: Some(values_list),
            is_mutable: false,
            is_const: false,
            is_static: true,
            is_external: decl.is_external,
            lazy_initialize: true,
            span,
        }),
        span,
    ));

    ClassDecl {
        id: decl.id.clone(),
        generic_params: Vec::new(),
        super_type: None,
        implements: Vec::new(),
        mixes: Vec::new(),
        is_external: decl.is_external,
        is_abstract: false,
        is_enum: true,
        members,
        span,
    }
}
