//! Abstract syntax tree node definitions.

pub mod expr;
pub mod stmt;
pub mod types;

pub use expr::{BinaryOp, Expr, ExprKind, UnaryOp};
pub use stmt::{
    ClassDecl, EnumDecl, FunctionBody, FunctionCategory, FunctionDecl, ImportDecl, ParamDecl,
    RedirectTarget, RedirectingCtor, StmtKind, Stmt, StructDecl, VarDecl, WhenCase,
};
pub use types::{ParamTypeExpr, TypeExpr, TypeExprKind};

/// What grammar a piece of source is parsed under. Top-level statement
/// forms are allowed only where appropriate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Statements and declarations at the top level.
    #[default]
    Script,
    /// Declarations only (imported modules).
    Module,
    /// Class member declarations, constructor/factory/accessor forms.
    ClassBody,
    /// Struct member declarations.
    StructBody,
    /// Statements inside a function body.
    FunctionBody,
    /// Exactly one expression (interpolation segments, eval snippets).
    Expression,
}
