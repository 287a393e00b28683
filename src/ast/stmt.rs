//! Statement and declaration AST nodes.

use crate::ast::expr::Expr;
use crate::ast::types::TypeExpr;
use crate::span::Span;

/// A statement in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Statement variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression statement.
    Expression(Expr),

    /// Block: `{ statements }`
    Block(Vec<Stmt>),

    /// `return expr;`
    Return(Option<Expr>),

    /// `break;`
    Break,

    /// `continue;`
    Continue,

    /// `if (cond) { … } else { … }`
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// `while (cond) { … }`
    While { condition: Expr, body: Box<Stmt> },

    /// `do { … } while (cond)`
    DoWhile { body: Box<Stmt>, condition: Expr },

    /// C-style loop: `for (init; cond; increment) { … }`
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Box<Stmt>,
    },

    /// `for (var x in iterable) { … }`
    ForIn {
        variable: String,
        iterable: Expr,
        body: Box<Stmt>,
    },

    /// `when (subject) { case -> stmt … else -> stmt }`
    When {
        subject: Option<Expr>,
        cases: Vec<WhenCase>,
        else_branch: Option<Box<Stmt>>,
    },

    /// Variable declaration.
    Var(VarDecl),

    /// Function declaration.
    Function(FunctionDecl),

    /// Class declaration.
    Class(ClassDecl),

    /// Enum declaration (lowered to a class by the compiler).
    Enum(EnumDecl),

    /// Named struct declaration.
    Struct(StructDecl),

    /// `type Alias = T`
    TypeAlias {
        id: String,
        generic_params: Vec<String>,
        ty: TypeExpr,
    },

    /// `import 'key'` / `import 'key' as name`
    Import(ImportDecl),

    /// `library 'name'` — marks the module as a library entry.
    Library { name: String },
}

/// One arm of a `when` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenCase {
    pub condition: Expr,
    pub branch: Stmt,
    pub span: Span,
}

/// Variable declaration: `var x: T = expr`, `final y = expr`, `const Z = 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub id: String,
    /// Owning class identifier, set for class members.
    pub class_id: Option<String>,
    pub declared_type: Option<TypeExpr>,
    pub initializer: Option<Expr>,
    pub is_mutable: bool,
    pub is_const: bool,
    pub is_static: bool,
    pub is_external: bool,
    /// Top-level and static declarations initialize lazily on first read.
    pub lazy_initialize: bool,
    pub span: Span,
}

/// What kind of function a declaration introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCategory {
    Normal,
    Literal,
    Method,
    Getter,
    Setter,
    Constructor,
    Factory,
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub id: String,
    pub declared_type: Option<TypeExpr>,
    pub default: Option<Expr>,
    pub is_optional: bool,
    pub is_named: bool,
    pub is_variadic: bool,
    pub span: Span,
}

/// The body of a function declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    /// `=> expr` shorthand.
    Expression(Box<Expr>),
}

/// Where a redirecting constructor delegates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    Super,
    This,
}

/// `construct (…) : super.key(args)` — the argument expressions are
/// captured and evaluated in the redirecting call's closure at run time.
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectingCtor {
    pub target: RedirectTarget,
    pub key: Option<String>,
    pub positional: Vec<Expr>,
    pub named: Vec<(String, Expr)>,
    pub span: Span,
}

/// Function declaration (also used for literals, methods, accessors,
/// constructors and factories).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// Declared name; `None` for anonymous literals. Constructors use the
    /// optional name as their constructor key.
    pub id: Option<String>,
    pub category: FunctionCategory,
    pub class_id: Option<String>,
    pub generic_params: Vec<String>,
    pub params: Vec<ParamDecl>,
    pub declared_return_type: Option<TypeExpr>,
    pub is_external: bool,
    pub is_static: bool,
    pub redirecting: Option<RedirectingCtor>,
    pub body: Option<FunctionBody>,
    pub span: Span,
}

impl FunctionDecl {
    /// Number of positional parameters that must be supplied.
    pub fn min_arity(&self) -> usize {
        self.params
            .iter()
            .filter(|p| !p.is_optional && !p.is_named && !p.is_variadic)
            .count()
    }

    /// Number of positional parameters that may be supplied.
    pub fn max_arity(&self) -> usize {
        self.params
            .iter()
            .filter(|p| !p.is_named && !p.is_variadic)
            .count()
    }

    pub fn is_variadic(&self) -> bool {
        self.params.iter().any(|p| p.is_variadic)
    }
}

/// Class declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub id: String,
    pub generic_params: Vec<String>,
    pub super_type: Option<TypeExpr>,
    /// `implements` clause; stored, not enforced.
    pub implements: Vec<TypeExpr>,
    /// `with` clause; stored, not enforced.
    pub mixes: Vec<TypeExpr>,
    pub is_external: bool,
    pub is_abstract: bool,
    pub is_enum: bool,
    /// Member declarations: `Var` and `Function` statements.
    pub members: Vec<Stmt>,
    pub span: Span,
}

impl ClassDecl {
    /// Whether any member is a user-defined constructor.
    pub fn has_user_constructor(&self) -> bool {
        self.members.iter().any(|m| {
            matches!(
                &m.kind,
                StmtKind::Function(f) if f.category == FunctionCategory::Constructor
            )
        })
    }
}

/// Enum declaration: `enum E { a, b }`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub id: String,
    pub values: Vec<String>,
    pub is_external: bool,
    pub span: Span,
}

/// Named struct declaration: `struct S extends P { var a = 1 … }`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub id: String,
    pub prototype: Option<String>,
    pub fields: Vec<(String, Expr)>,
    pub span: Span,
}

/// Import declaration. The loader annotates it with the resolved absolute
/// key before compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub key: String,
    pub alias: Option<String>,
    pub resolved_key: Option<String>,
    pub span: Span,
}
