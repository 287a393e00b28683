//! Expression compilation.
//!
//! Binary operations follow the register-index convention: evaluate the
//! left operand, park it in the level's register, evaluate the right
//! operand in place, then emit the operator opcode which consumes the
//! parked left and the current value.

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::compiler::compiler::Compiler;
use crate::compiler::emitter::Emitter;
use crate::compiler::opcode::{LocalKind, OpCode, Register};
use crate::error::{CompileResult, ErrorCode, QuillError};

impl Compiler {
    pub(crate) fn compile_expression(
        &mut self,
        expr: &Expr,
        out: &mut Emitter,
    ) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::NullLiteral => {
                out.write_local(LocalKind::Null);
            }
            ExprKind::BoolLiteral(value) => {
                out.write_local(LocalKind::Boolean);
                out.write_bool(*value);
            }
            ExprKind::IntLiteral(value) => {
                let index = self.consts.intern_int(*value);
                out.write_local(LocalKind::ConstInt);
                out.write_u16(index);
            }
            ExprKind::FloatLiteral(value) => {
                let index = self.consts.intern_float(*value);
                out.write_local(LocalKind::ConstFloat);
                out.write_u16(index);
            }
            ExprKind::StringLiteral(value) => {
                let index = self.consts.intern_string(value);
                out.write_local(LocalKind::ConstString);
                out.write_u16(index);
            }
            ExprKind::Interpolation { pattern, segments } => {
                let index = self.consts.intern_string(pattern);
                out.write_local(LocalKind::StringInterpolation);
                out.write_u16(index);
                out.write_u8(segments.len().min(u8::MAX as usize) as u8);
                for segment in segments {
                    self.emit_sub_expr(segment, out)?;
                }
            }
            ExprKind::Identifier(name) => {
                let resolved = self.resolve_marker(name);
                out.write_local(LocalKind::Identifier);
                out.write_short_str(&resolved, expr.span)?;
            }
            ExprKind::This => {
                out.write_local(LocalKind::Identifier);
                out.write_short_str("this", expr.span)?;
            }
            ExprKind::Super => {
                out.write_local(LocalKind::Identifier);
                out.write_short_str("super", expr.span)?;
            }
            ExprKind::Group(inner) => {
                out.write_local(LocalKind::Group);
                self.emit_sub_expr(inner, out)?;
            }
            ExprKind::ListLiteral(elements) => {
                out.write_local(LocalKind::List);
                out.write_u16(elements.len().min(u16::MAX as usize) as u16);
                for element in elements {
                    self.emit_sub_expr(element, out)?;
                }
            }
            ExprKind::StructLiteral {
                id,
                prototype,
                fields,
            } => {
                out.write_local(LocalKind::Struct);
                match id {
                    Some(id) => {
                        out.write_bool(true);
                        out.write_short_str(id, expr.span)?;
                    }
                    None => out.write_bool(false),
                }
                match prototype {
                    Some(proto) => {
                        out.write_bool(true);
                        out.write_short_str(proto, expr.span)?;
                    }
                    None => out.write_bool(false),
                }
                out.write_u8(fields.len().min(u8::MAX as usize) as u8);
                for (key, value) in fields {
                    out.write_short_str(key, expr.span)?;
                    self.emit_sub_expr(value, out)?;
                }
            }
            ExprKind::FunctionLiteral(decl) => {
                out.write_local(LocalKind::Function);
                self.emit_function_def(decl, out)?;
            }
            ExprKind::Unary { operator, operand } => {
                self.compile_expression(operand, out)?;
                out.write_op(match operator {
                    UnaryOp::Negate => OpCode::Negative,
                    UnaryOp::Not => OpCode::LogicalNot,
                    UnaryOp::TypeOf => OpCode::TypeOf,
                });
            }
            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                let (register, op) = match operator {
                    BinaryOp::Equal => (Register::EqualLeft, OpCode::Equal),
                    BinaryOp::NotEqual => (Register::EqualLeft, OpCode::NotEqual),
                    BinaryOp::Less => (Register::RelationLeft, OpCode::Lesser),
                    BinaryOp::Greater => (Register::RelationLeft, OpCode::Greater),
                    BinaryOp::LessEqual => (Register::RelationLeft, OpCode::LesserOrEqual),
                    BinaryOp::GreaterEqual => (Register::RelationLeft, OpCode::GreaterOrEqual),
                    BinaryOp::Add => (Register::AddLeft, OpCode::Add),
                    BinaryOp::Subtract => (Register::AddLeft, OpCode::Subtract),
                    BinaryOp::Multiply => (Register::MultiplyLeft, OpCode::Multiply),
                    BinaryOp::Divide => (Register::MultiplyLeft, OpCode::Divide),
                    BinaryOp::Modulo => (Register::MultiplyLeft, OpCode::Modulo),
                };
                self.compile_expression(left, out)?;
                out.write_register(register);
                self.compile_expression(right, out)?;
                out.write_op(op);
            }
            ExprKind::LogicalOr { left, right } => {
                self.compile_expression(left, out)?;
                out.write_register(Register::OrLeft);
                out.write_op(OpCode::LogicalOr);
                self.emit_sub_expr(right, out)?;
            }
            ExprKind::LogicalAnd { left, right } => {
                self.compile_expression(left, out)?;
                out.write_register(Register::AndLeft);
                out.write_op(OpCode::LogicalAnd);
                self.emit_sub_expr(right, out)?;
            }
            ExprKind::Ternary {
                condition,
                then_value,
                else_value,
            } => {
                self.compile_expression(condition, out)?;
                out.write_op(OpCode::IfStmt);
                let then_slot = out.reserve_u16();
                self.compile_expression(then_value, out)?;
                out.write_op(OpCode::Skip);
                let skip_slot = out.reserve_u16();
                out.patch_forward_jump(then_slot, expr.span)?;
                self.compile_expression(else_value, out)?;
                out.patch_forward_jump(skip_slot, expr.span)?;
            }
            ExprKind::TypeCheck {
                object,
                ty,
                negated,
            } => {
                self.compile_expression(object, out)?;
                out.write_register(Register::RelationLeft);
                out.write_local(LocalKind::TypeValue);
                self.emit_type_expr(ty, out)?;
                out.write_op(if *negated {
                    OpCode::TypeIsNot
                } else {
                    OpCode::TypeIs
                });
            }
            ExprKind::TypeCast { object, ty } => {
                self.compile_expression(object, out)?;
                out.write_register(Register::RelationLeft);
                out.write_local(LocalKind::TypeValue);
                self.emit_type_expr(ty, out)?;
                out.write_op(OpCode::TypeAs);
            }
            ExprKind::Member { object, name } => {
                self.check_private_access(object, name, expr)?;
                self.compile_expression(object, out)?;
                out.write_register(Register::PostfixObject);
                self.emit_line_info(expr.span, out);
                out.write_op(OpCode::MemberGet);
                out.write_short_str(name, expr.span)?;
            }
            ExprKind::Subscript { object, key } => {
                self.compile_expression(object, out)?;
                out.write_register(Register::PostfixObject);
                self.emit_line_info(expr.span, out);
                out.write_op(OpCode::SubGet);
                self.emit_sub_expr(key, out)?;
            }
            ExprKind::Call {
                callee,
                positional,
                named,
            } => {
                self.compile_expression(callee, out)?;
                out.write_register(Register::PostfixObject);
                self.emit_line_info(expr.span, out);
                out.write_op(OpCode::Call);
                out.write_u8(positional.len().min(u8::MAX as usize) as u8);
                for arg in positional {
                    self.emit_sub_expr(arg, out)?;
                }
                out.write_u8(named.len().min(u8::MAX as usize) as u8);
                for (name, arg) in named {
                    out.write_short_str(name, arg.span)?;
                    self.emit_sub_expr(arg, out)?;
                }
            }
            ExprKind::Assign { target, value } => {
                self.compile_assignment(target, value, out)?;
            }
        }
        Ok(())
    }

    /// Assignments: read/compute/write sequences were produced by the
    /// parser; here the write targets split into symbol, member and
    /// subscript forms.
    fn compile_assignment(
        &mut self,
        target: &Expr,
        value: &Expr,
        out: &mut Emitter,
    ) -> CompileResult<()> {
        match &target.kind {
            ExprKind::Identifier(name) => {
                let resolved = self.resolve_marker(name);
                self.compile_expression(value, out)?;
                out.write_register(Register::Assign);
                self.emit_line_info(target.span, out);
                out.write_op(OpCode::Assign);
                out.write_short_str(&resolved, target.span)?;
            }
            ExprKind::Member { object, name } => {
                self.check_private_access(object, name, target)?;
                self.compile_expression(object, out)?;
                out.write_register(Register::PostfixObject);
                self.emit_line_info(target.span, out);
                out.write_op(OpCode::MemberSet);
                out.write_short_str(name, target.span)?;
                self.emit_sub_expr(value, out)?;
            }
            ExprKind::Subscript { object, key } => {
                self.compile_expression(object, out)?;
                out.write_register(Register::PostfixObject);
                self.emit_line_info(target.span, out);
                out.write_op(OpCode::SubSet);
                self.emit_sub_expr(key, out)?;
                self.emit_sub_expr(value, out)?;
            }
            _ => {
                return Err(QuillError::new(
                    ErrorCode::InvalidLeftValue,
                    "illegal assignment target",
                    target.span,
                ))
            }
        }
        Ok(())
    }

    /// Leading-underscore members are private: accessible only through
    /// `this`/`super` (or synthetic lowerings).
    fn check_private_access(
        &self,
        object: &Expr,
        name: &str,
        site: &Expr,
    ) -> CompileResult<()> {
        if name.starts_with('_')
            && !self.allow_private_access
            && !matches!(object.kind, ExprKind::This | ExprKind::Super)
        {
            return Err(QuillError::new(
                ErrorCode::PrivateMember,
                format!("member '{}' is private", name),
                site.span,
            ));
        }
        Ok(())
    }
}
