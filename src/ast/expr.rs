//! Expression AST nodes.

use crate::ast::stmt::FunctionDecl;
use crate::ast::types::TypeExpr;
use crate::span::Span;

/// An expression in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// True for forms that may appear on the left of an assignment.
    pub fn is_left_value(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Identifier(_) | ExprKind::Member { .. } | ExprKind::Subscript { .. }
        )
    }
}

/// All expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// `null`
    NullLiteral,
    /// `true`, `false`
    BoolLiteral(bool),
    /// Integer literal: `42`
    IntLiteral(i64),
    /// Float literal: `3.14`
    FloatLiteral(f64),
    /// String literal: `'hello'`
    StringLiteral(String),
    /// Interpolated string: the pattern carries `{N}` placeholders, one per
    /// parsed segment expression.
    Interpolation {
        pattern: String,
        segments: Vec<Expr>,
    },

    /// Variable reference: `foo`
    Identifier(String),

    /// Unary prefix operation: `-x`, `!x`, `typeof x`
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
    },

    /// Binary operation: `a + b`
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },

    /// Short-circuit and: `a && b`
    LogicalAnd { left: Box<Expr>, right: Box<Expr> },

    /// Short-circuit or: `a || b`
    LogicalOr { left: Box<Expr>, right: Box<Expr> },

    /// Conditional: `cond ? a : b`, and the `if (cond) a else b` expression
    /// form which parses to the same node.
    Ternary {
        condition: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },

    /// Runtime type test: `x is T`, `x is! T`
    TypeCheck {
        object: Box<Expr>,
        ty: TypeExpr,
        negated: bool,
    },

    /// Runtime cast: `x as T`
    TypeCast { object: Box<Expr>, ty: TypeExpr },

    /// Member access: `obj.field`
    Member { object: Box<Expr>, name: String },

    /// Subscript: `obj[key]`
    Subscript { object: Box<Expr>, key: Box<Expr> },

    /// Call: `f(a, b, name: c)`
    Call {
        callee: Box<Expr>,
        positional: Vec<Expr>,
        named: Vec<(String, Expr)>,
    },

    /// Parenthesized group: `(expr)`
    Group(Box<Expr>),

    /// List literal: `[1, 2, 3]`
    ListLiteral(Vec<Expr>),

    /// Struct object literal: `{ key: value }`, optionally named and with a
    /// prototype (used by the named-struct lowering).
    StructLiteral {
        id: Option<String>,
        prototype: Option<String>,
        fields: Vec<(String, Expr)>,
    },

    /// Function literal: `fun (x) { … }`, `(x) => x + 1`
    FunctionLiteral(Box<FunctionDecl>),

    /// Assignment: `target = value`. Compound forms are lowered to this
    /// during parsing.
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },

    /// `this`
    This,

    /// `super`
    Super,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
        };
        write!(f, "{}", s)
    }
}

/// Unary prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
    TypeOf,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Negate => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::TypeOf => write!(f, "typeof "),
        }
    }
}
