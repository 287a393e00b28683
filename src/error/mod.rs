//! Error taxonomy shared by every phase.
//!
//! All phases report through one [`QuillError`] carrying an [`ErrorCode`],
//! the [`ErrorKind`] derived from it, the module key and the source span.
//! The lexer and the parser accumulate errors and keep going; the compiler
//! and the VM fail fast with the first one.

use thiserror::Error;

use crate::span::Span;

/// Severity-class of an error. Every [`ErrorCode`] maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Todo,
    Hint,
    Lint,
    SyntacticError,
    StaticTypeWarning,
    StaticWarning,
    CompileTimeError,
    RuntimeError,
    ExternalError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Todo => "todo",
            ErrorKind::Hint => "hint",
            ErrorKind::Lint => "lint",
            ErrorKind::SyntacticError => "syntactic error",
            ErrorKind::StaticTypeWarning => "static type warning",
            ErrorKind::StaticWarning => "static warning",
            ErrorKind::CompileTimeError => "compile time error",
            ErrorKind::RuntimeError => "runtime error",
            ErrorKind::ExternalError => "external error",
        };
        write!(f, "{}", name)
    }
}

/// Every condition the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Lexical
    UnexpectedChar,
    UnterminatedString,
    InvalidEscape,
    InvalidNumber,

    // Syntactic
    UnexpectedToken,
    InvalidLeftValue,
    StringInterpolation,
    OutsideReturn,
    MisplacedBreak,
    MisplacedContinue,
    CtorOutsideClass,
    DuplicateParameter,
    ParameterOrder,
    ExternalConstruct,

    // Compile time
    PrivateMember,
    ConstantTooLarge,
    JumpTooLarge,

    // Runtime
    Undefined,
    UndefinedMember,
    DefinedRuntime,
    NotCallable,
    Arity,
    NamedArg,
    NullObject,
    SubGetKey,
    OutOfRange,
    Immutable,
    NotA,
    TypeCast,
    AbstractClass,
    StackOverflow,
    UnknownOpCode,
    BytecodeSignature,
    BytecodeVersion,

    // External
    UndefinedExternal,
    SourceProviderError,
    External,
    Unsupported,
}

impl ErrorCode {
    /// The kind this code belongs to.
    pub fn kind(self) -> ErrorKind {
        use ErrorCode::*;
        match self {
            UnexpectedChar | UnterminatedString | InvalidEscape | InvalidNumber
            | UnexpectedToken | InvalidLeftValue | StringInterpolation | OutsideReturn
            | MisplacedBreak | MisplacedContinue | CtorOutsideClass | DuplicateParameter
            | ParameterOrder | ExternalConstruct => ErrorKind::SyntacticError,

            PrivateMember | ConstantTooLarge | JumpTooLarge => ErrorKind::CompileTimeError,

            Undefined | UndefinedMember | DefinedRuntime | NotCallable | Arity | NamedArg
            | NullObject | SubGetKey | OutOfRange | Immutable | NotA | TypeCast
            | AbstractClass | StackOverflow | UnknownOpCode | BytecodeSignature
            | BytecodeVersion => ErrorKind::RuntimeError,

            UndefinedExternal | SourceProviderError | External | Unsupported => {
                ErrorKind::ExternalError
            }
        }
    }
}

/// One reported error: code, derived kind, module key, position, message.
#[derive(Debug, Clone, Error)]
#[error("{}:{}: [{}] {message}", module.as_deref().unwrap_or("<eval>"), span, code.kind())]
pub struct QuillError {
    pub code: ErrorCode,
    pub module: Option<String>,
    pub span: Span,
    pub message: String,
    /// Call frames recorded while unwinding, innermost first.
    pub trace: Vec<String>,
}

impl QuillError {
    pub fn new(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            module: None,
            span,
            message: message.into(),
            trace: Vec::new(),
        }
    }

    pub fn in_module(mut self, key: impl Into<String>) -> Self {
        if self.module.is_none() {
            self.module = Some(key.into());
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Append a call frame while unwinding.
    pub fn push_frame(&mut self, frame: String) {
        self.trace.push(frame);
    }

    /// The full report: header line plus the accumulated stack trace.
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        for frame in &self.trace {
            out.push_str("\n  at ");
            out.push_str(frame);
        }
        out
    }

    // Constructors for the common conditions.

    pub fn unexpected_token(expected: &str, found: &str, span: Span) -> Self {
        Self::new(
            ErrorCode::UnexpectedToken,
            format!("expected {}, found '{}'", expected, found),
            span,
        )
    }

    pub fn undefined(name: &str, span: Span) -> Self {
        Self::new(
            ErrorCode::Undefined,
            format!("undefined symbol '{}'", name),
            span,
        )
    }

    pub fn undefined_member(name: &str, span: Span) -> Self {
        Self::new(
            ErrorCode::UndefinedMember,
            format!("undefined member '{}'", name),
            span,
        )
    }

    pub fn not_callable(what: &str, span: Span) -> Self {
        Self::new(
            ErrorCode::NotCallable,
            format!("value of type '{}' is not callable", what),
            span,
        )
    }

    pub fn arity(expected_min: usize, expected_max: usize, got: usize, span: Span) -> Self {
        let expected = if expected_min == expected_max {
            format!("{}", expected_min)
        } else {
            format!("{}..{}", expected_min, expected_max)
        };
        Self::new(
            ErrorCode::Arity,
            format!(
                "wrong number of positional arguments: expected {}, got {}",
                expected, got
            ),
            span,
        )
    }

    pub fn named_arg(name: &str, span: Span) -> Self {
        Self::new(
            ErrorCode::NamedArg,
            format!("no parameter named '{}'", name),
            span,
        )
    }

    pub fn null_object(member: &str, span: Span) -> Self {
        Self::new(
            ErrorCode::NullObject,
            format!("member '{}' accessed on null", member),
            span,
        )
    }

    pub fn immutable(name: &str, span: Span) -> Self {
        Self::new(
            ErrorCode::Immutable,
            format!("cannot assign to immutable '{}'", name),
            span,
        )
    }

    pub fn type_cast(from: &str, to: &str, span: Span) -> Self {
        Self::new(
            ErrorCode::TypeCast,
            format!("cannot cast value of type '{}' to '{}'", from, to),
            span,
        )
    }
}

/// Result alias used by the parser.
pub type ParseResult<T> = Result<T, QuillError>;
/// Result alias used by the compiler.
pub type CompileResult<T> = Result<T, QuillError>;
/// Result alias used by the VM.
pub type VmResult<T> = Result<T, QuillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_kind_partition() {
        assert_eq!(ErrorCode::UnexpectedChar.kind(), ErrorKind::SyntacticError);
        assert_eq!(ErrorCode::Arity.kind(), ErrorKind::RuntimeError);
        assert_eq!(
            ErrorCode::SourceProviderError.kind(),
            ErrorKind::ExternalError
        );
        assert_eq!(ErrorCode::PrivateMember.kind(), ErrorKind::CompileTimeError);
    }

    #[test]
    fn test_report_includes_trace() {
        let mut err = QuillError::undefined("x", Span::new(0, 1, 3, 7)).in_module("main.ql");
        err.push_frame("f (main.ql:3:7)".to_string());
        let report = err.report();
        assert!(report.contains("main.ql:3:7"));
        assert!(report.contains("undefined symbol 'x'"));
        assert!(report.contains("at f (main.ql:3:7)"));
    }
}
