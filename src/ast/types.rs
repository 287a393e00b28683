//! Type expression AST nodes.
//!
//! Declared types are advisory at runtime; the checks that do exist
//! (`is`, `is!`, `as`, `typeof`) work on these expressions reified as
//! runtime type values.

use crate::span::Span;

/// A type expression with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

impl TypeExpr {
    pub fn new(kind: TypeExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn nominal(id: impl Into<String>, span: Span) -> Self {
        Self::new(
            TypeExprKind::Nominal {
                id: id.into(),
                args: Vec::new(),
                nullable: false,
            },
            span,
        )
    }

    /// The nominal identifier, when this is a plain named type.
    pub fn nominal_id(&self) -> Option<&str> {
        match &self.kind {
            TypeExprKind::Nominal { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// Type expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    /// A named type with optional type arguments: `List<num>`, `str?`.
    /// Primitive type names (`num`, `int`, `float`, `bool`, `str`, `any`)
    /// are ordinary nominals.
    Nominal {
        id: String,
        args: Vec<TypeExpr>,
        nullable: bool,
    },
    /// A function type: `(num, [str]) -> bool`.
    Function {
        params: Vec<ParamTypeExpr>,
        return_type: Option<Box<TypeExpr>>,
    },
    /// A generic parameter introduced by the enclosing declaration.
    GenericParam { id: String },
}

/// A parameter position inside a function type.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTypeExpr {
    pub ty: TypeExpr,
    pub id: Option<String>,
    pub is_optional: bool,
    pub is_named: bool,
    pub is_variadic: bool,
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TypeExprKind::Nominal { id, args, nullable } => {
                write!(f, "{}", id)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")?;
                }
                if *nullable {
                    write!(f, "?")?;
                }
                Ok(())
            }
            TypeExprKind::Function {
                params,
                return_type,
            } => {
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if param.is_variadic {
                        write!(f, "...")?;
                    }
                    write!(f, "{}", param.ty)?;
                }
                write!(f, ")")?;
                if let Some(ret) = return_type {
                    write!(f, " -> {}", ret)?;
                }
                Ok(())
            }
            TypeExprKind::GenericParam { id } => write!(f, "{}", id),
        }
    }
}
