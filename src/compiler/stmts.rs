//! Statement compilation: control-flow lowerings and loop bookkeeping.

use std::collections::HashMap;

use crate::ast::{Expr, ExprKind, Stmt, StmtKind, VarDecl};
use crate::compiler::compiler::Compiler;
use crate::compiler::emitter::Emitter;
use crate::compiler::opcode::{LocalKind, OpCode, Register};
use crate::error::CompileResult;
use crate::span::Span;

impl Compiler {
    pub(crate) fn compile_statement(
        &mut self,
        stmt: &Stmt,
        out: &mut Emitter,
    ) -> CompileResult<()> {
        self.emit_line_info(stmt.span, out);

        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.compile_expression(expr, out)?;
                out.write_op(OpCode::EndOfStmt);
            }
            StmtKind::Block(statements) => {
                self.compile_block("block", statements, out)?;
            }
            StmtKind::Return(value) => {
                match value {
                    Some(expr) => self.compile_expression(expr, out)?,
                    None => out.write_local(LocalKind::Null),
                }
                out.write_op(OpCode::EndOfFunc);
            }
            StmtKind::Break => out.write_op(OpCode::BreakLoop),
            StmtKind::Continue => out.write_op(OpCode::ContinueLoop),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.compile_expression(condition, out)?;
                out.write_op(OpCode::IfStmt);
                let then_slot = out.reserve_u16();
                self.compile_scoped_statement(then_branch, out)?;
                out.write_op(OpCode::Skip);
                let skip_slot = out.reserve_u16();
                out.patch_forward_jump(then_slot, stmt.span)?;
                if let Some(else_branch) = else_branch {
                    self.compile_scoped_statement(else_branch, out)?;
                }
                out.patch_forward_jump(skip_slot, stmt.span)?;
            }
            StmtKind::While { condition, body } => {
                let loop_pos = out.position();
                out.write_op(OpCode::LoopPoint);
                let continue_slot = out.reserve_u16();
                let break_slot = out.reserve_u16();

                let condition_pos = out.position();
                self.compile_expression(condition, out)?;
                out.write_op(OpCode::WhileStmt);
                self.compile_scoped_statement(body, out)?;
                self.emit_skip_back(out, condition_pos, stmt.span)?;

                out.patch_u16(continue_slot, (condition_pos - loop_pos) as u16);
                out.patch_u16(break_slot, (out.position() - loop_pos) as u16);
            }
            StmtKind::DoWhile { body, condition } => {
                let loop_pos = out.position();
                out.write_op(OpCode::LoopPoint);
                let continue_slot = out.reserve_u16();
                let break_slot = out.reserve_u16();

                self.compile_scoped_statement(body, out)?;
                let condition_pos = out.position();
                self.compile_expression(condition, out)?;
                out.write_op(OpCode::DoStmt);

                out.patch_u16(continue_slot, (condition_pos - loop_pos) as u16);
                out.patch_u16(break_slot, (out.position() - loop_pos) as u16);
            }
            StmtKind::For {
                init,
                condition,
                increment,
                body,
            } => {
                self.compile_c_style_for(
                    init.as_deref(),
                    condition.as_ref(),
                    increment.as_ref(),
                    body,
                    stmt.span,
                    out,
                )?;
            }
            StmtKind::ForIn {
                variable,
                iterable,
                body,
            } => {
                let lowered = self.lower_for_in(variable, iterable, body, stmt.span);
                self.compile_statement(&lowered, out)?;
            }
            StmtKind::When {
                subject,
                cases,
                else_branch,
            } => {
                self.compile_when(subject.as_ref(), cases, else_branch.as_deref(), out)?;
            }
            StmtKind::Var(decl) => self.compile_var_decl(decl, out)?,
            StmtKind::Function(decl) => {
                out.write_op(OpCode::FuncDecl);
                self.emit_function_def(decl, out)?;
            }
            StmtKind::Class(decl) => self.compile_class_decl(decl, out)?,
            StmtKind::Enum(decl) => self.compile_enum_decl(decl, out)?,
            StmtKind::Struct(decl) => self.compile_struct_decl(decl, out)?,
            StmtKind::TypeAlias { id, ty, .. } => {
                out.write_op(OpCode::TypeAliasDecl);
                out.write_short_str(id, stmt.span)?;
                self.emit_type_expr(ty, out)?;
            }
            StmtKind::Import(decl) => {
                out.write_op(OpCode::ImportDecl);
                let key = decl.resolved_key.as_ref().unwrap_or(&decl.key);
                out.write_short_str(key, stmt.span)?;
                match &decl.alias {
                    Some(alias) => {
                        out.write_bool(true);
                        out.write_short_str(alias, stmt.span)?;
                    }
                    None => out.write_bool(false),
                }
            }
            // The library name travels in the module block header.
            StmtKind::Library { .. } => {}
        }
        Ok(())
    }

    /// Compile a branch/loop body inside its own scope depth.
    fn compile_scoped_statement(&mut self, stmt: &Stmt, out: &mut Emitter) -> CompileResult<()> {
        self.scope_depth += 1;
        let result = self.compile_statement(stmt, out);
        self.scope_depth -= 1;
        result
    }

    pub(crate) fn compile_block(
        &mut self,
        id: &str,
        statements: &[Stmt],
        out: &mut Emitter,
    ) -> CompileResult<()> {
        out.write_op(OpCode::Block);
        out.write_short_str(id, Span::default())?;
        self.scope_depth += 1;
        for stmt in statements {
            self.compile_statement(stmt, out)?;
        }
        self.scope_depth -= 1;
        out.write_op(OpCode::EndOfBlock);
        Ok(())
    }

    /// A backwards `skip` from the current position to `target`.
    fn emit_skip_back(
        &mut self,
        out: &mut Emitter,
        target: usize,
        span: Span,
    ) -> CompileResult<()> {
        out.write_op(OpCode::Skip);
        // Offset is relative to the position after the i16 operand.
        let from = out.position() + 2;
        let distance = target as i64 - from as i64;
        if distance < i16::MIN as i64 || distance > i16::MAX as i64 {
            return Err(crate::error::QuillError::new(
                crate::error::ErrorCode::JumpTooLarge,
                "loop body exceeds the 16-bit jump range",
                span,
            ));
        }
        out.write_i16(distance as i16);
        Ok(())
    }

    /// C-style `for`: the loop variable is declared in an enclosing block
    /// under an internal marker name; header references compile through the
    /// rename, and the user-visible name is re-declared inside the body so
    /// its lifetime is per-iteration.
    fn compile_c_style_for(
        &mut self,
        init: Option<&Stmt>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &Stmt,
        span: Span,
        out: &mut Emitter,
    ) -> CompileResult<()> {
        out.write_op(OpCode::Block);
        out.write_short_str("for", span)?;
        self.scope_depth += 1;

        let mut renamed: Option<(String, String)> = None;
        match init {
            Some(Stmt {
                kind: StmtKind::Var(decl),
                ..
            }) => {
                let marker = format!("${}", decl.id);
                renamed = Some((decl.id.clone(), marker.clone()));
                let internal = VarDecl {
                    id: marker,
                    ..decl.clone()
                };
                self.compile_var_decl(&internal, out)?;
            }
            Some(other) => self.compile_statement(other, out)?,
            None => {}
        }

        // Header expressions see the marker name.
        if let Some((user, marker)) = &renamed {
            let mut scope = HashMap::new();
            scope.insert(user.clone(), marker.clone());
            self.markers.push(scope);
        }

        let loop_pos = out.position();
        out.write_op(OpCode::LoopPoint);
        let continue_slot = out.reserve_u16();
        let break_slot = out.reserve_u16();

        let condition_pos = out.position();
        match condition {
            Some(condition) => self.compile_expression(condition, out)?,
            None => {
                out.write_local(LocalKind::Boolean);
                out.write_bool(true);
            }
        }
        out.write_op(OpCode::WhileStmt);

        // The body must see the user name, not the marker.
        if renamed.is_some() {
            self.markers.pop();
        }
        out.write_op(OpCode::Block);
        out.write_short_str("for-body", span)?;
        self.scope_depth += 1;
        if let Some((user, marker)) = &renamed {
            // var <user> = <marker>
            self.emit_copy_decl(user, marker, span, out)?;
        }
        self.compile_statement(body, out)?;
        self.scope_depth -= 1;
        out.write_op(OpCode::EndOfBlock);
        if let Some((user, marker)) = &renamed {
            let mut scope = HashMap::new();
            scope.insert(user.clone(), marker.clone());
            self.markers.push(scope);
        }

        let increment_pos = out.position();
        if let Some(increment) = increment {
            self.compile_expression(increment, out)?;
            out.write_op(OpCode::EndOfStmt);
        }
        self.emit_skip_back(out, condition_pos, span)?;

        out.patch_u16(continue_slot, (increment_pos - loop_pos) as u16);
        out.patch_u16(break_slot, (out.position() - loop_pos) as u16);

        if renamed.is_some() {
            self.markers.pop();
        }
        self.scope_depth -= 1;
        out.write_op(OpCode::EndOfBlock);
        Ok(())
    }

    /// `var <user> = <marker>` — the per-iteration copy at body entry.
    fn emit_copy_decl(
        &mut self,
        user: &str,
        marker: &str,
        span: Span,
        out: &mut Emitter,
    ) -> CompileResult<()> {
        let decl = VarDecl {
            id: user.to_string(),
            class_id: None,
            declared_type: None,
            initializer: Some(Expr::new(ExprKind::Identifier(marker.to_string()), span)),
            is_mutable: true,
            is_const: false,
            is_static: false,
            is_external: false,
            lazy_initialize: false,
            span,
        };
        self.compile_var_decl(&decl, out)
    }

    /// `for (var x in e)` lowers into an index loop over a snapshot:
    ///
    /// ```text
    /// {
    ///   var $iterN = e
    ///   for (var $idxN = 0;
    ///        $iterN.isNotEmpty && $idxN < $iterN.length;
    ///        $idxN = $idxN + 1) {
    ///     var x = $iterN.elementAt($idxN)
    ///     …body…
    ///   }
    /// }
    /// ```
    fn lower_for_in(
        &mut self,
        variable: &str,
        iterable: &Expr,
        body: &Stmt,
        span: Span,
    ) -> Stmt {
        let iter_name = self.next_internal_name("iter");
        let idx_name = self.next_internal_name("idx");

        let ident = |name: &str| Expr::new(ExprKind::Identifier(name.to_string()), span);
        let member = |object: Expr, name: &str| {
            Expr::new(
                ExprKind::Member {
                    object: Box::new(object),
                    name: name.to_string(),
                },
                span,
            )
        };
        let var_decl = |id: &str, init: Expr| {
            Stmt::new(
                StmtKind::Var(VarDecl {
                    id: id.to_string(),
                    class_id: None,
                    declared_type: None,
                    initializer: Some(init),
                    is_mutable: true,
                    is_const: false,
                    is_static: false,
                    is_external: false,
                    lazy_initialize: false,
                    span,
                }),
                span,
            )
        };

        let snapshot = var_decl(&iter_name, iterable.clone());

        let condition = Expr::new(
            ExprKind::LogicalAnd {
                left: Box::new(member(ident(&iter_name), "isNotEmpty")),
                right: Box::new(Expr::new(
                    ExprKind::Binary {
                        left: Box::new(ident(&idx_name)),
                        operator: crate::ast::BinaryOp::Less,
                        right: Box::new(member(ident(&iter_name), "length")),
                    },
                    span,
                )),
            },
            span,
        );

        let increment = Expr::new(
            ExprKind::Assign {
                target: Box::new(ident(&idx_name)),
                value: Box::new(Expr::new(
                    ExprKind::Binary {
                        left: Box::new(ident(&idx_name)),
                        operator: crate::ast::BinaryOp::Add,
                        right: Box::new(Expr::new(ExprKind::IntLiteral(1), span)),
                    },
                    span,
                )),
            },
            span,
        );

        let element = var_decl(
            variable,
            Expr::new(
                ExprKind::Call {
                    callee: Box::new(member(ident(&iter_name), "elementAt")),
                    positional: vec![ident(&idx_name)],
                    named: Vec::new(),
                },
                span,
            ),
        );

        let loop_body = Stmt::new(StmtKind::Block(vec![element, body.clone()]), span);
        let for_loop = Stmt::new(
            StmtKind::For {
                init: Some(Box::new(var_decl(
                    &idx_name,
                    Expr::new(ExprKind::IntLiteral(0), span),
                ))),
                condition: Some(condition),
                increment: Some(increment),
                body: Box::new(loop_body),
            },
            span,
        );

        Stmt::new(StmtKind::Block(vec![snapshot, for_loop]), span)
    }

    /// `when`: anchored branch table. Case payloads evaluate in order until
    /// one matches the subject (or is truthy without one); every branch
    /// ends with a `goto` to the end offset.
    fn compile_when(
        &mut self,
        subject: Option<&Expr>,
        cases: &[crate::ast::WhenCase],
        else_branch: Option<&Stmt>,
        out: &mut Emitter,
    ) -> CompileResult<()> {
        let anchor_pos = out.position();
        out.write_op(OpCode::Anchor);

        if let Some(subject) = subject {
            self.compile_expression(subject, out)?;
            out.write_register(Register::Value);
        }

        out.write_op(OpCode::WhenStmt);
        out.write_bool(subject.is_some());
        out.write_u8(cases.len().min(u8::MAX as usize) as u8);
        let branch_slots: Vec<usize> = cases.iter().map(|_| out.reserve_u16()).collect();
        let else_slot = out.reserve_u16();
        let end_slot = out.reserve_u16();

        for case in cases {
            self.emit_sub_expr(&case.condition, out)?;
        }

        let mut goto_slots = Vec::with_capacity(cases.len());
        for (case, slot) in cases.iter().zip(&branch_slots) {
            out.patch_u16(*slot, (out.position() - anchor_pos) as u16);
            self.compile_scoped_statement(&case.branch, out)?;
            out.write_op(OpCode::Goto);
            goto_slots.push(out.reserve_u16());
        }

        match else_branch {
            Some(else_branch) => {
                out.patch_u16(else_slot, (out.position() - anchor_pos) as u16);
                self.compile_scoped_statement(else_branch, out)?;
                out.write_op(OpCode::Goto);
                goto_slots.push(out.reserve_u16());
            }
            None => out.patch_u16(else_slot, u16::MAX),
        }

        let end_offset = (out.position() - anchor_pos) as u16;
        out.patch_u16(end_slot, end_offset);
        for slot in goto_slots {
            out.patch_u16(slot, end_offset);
        }
        Ok(())
    }
}
