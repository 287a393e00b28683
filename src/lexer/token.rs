//! Token model and lexicon for the Quill lexer.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::span::Span;

/// All token kinds, literal payloads included.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    /// Interpolated string: the stored literal has each `${…}` segment
    /// replaced with a `{N}` placeholder; `segments[N]` holds the tokens of
    /// segment N, produced by re-running the lexer over the inner source.
    InterpolatedString {
        pattern: String,
        segments: Vec<Vec<Token>>,
    },
    BoolLiteral(bool),

    Identifier(String),

    // Keywords
    Var,
    Final,
    Const,
    Fun,
    Construct,
    Factory,
    Get,
    Set,
    Class,
    Enum,
    Struct,
    Extends,
    Implements,
    With,
    External,
    Static,
    Abstract,
    Return,
    Break,
    Continue,
    If,
    Else,
    While,
    Do,
    For,
    In,
    When,
    Import,
    Library,
    TypeAlias,
    As,
    Is,
    TypeOf,
    Null,
    This,
    Super,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Bang,
    And,
    Or,
    PlusPlus,
    MinusMinus,
    Question,
    Arrow,    // ->
    FatArrow, // =>
    Spread,   // ...

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,

    // Trivia: preserved so the parser can anchor synthetic nodes and
    // attach documentation.
    Comment {
        content: String,
        is_doc: bool,
        is_block: bool,
    },
    EmptyLine,

    Eof,
}

lazy_static! {
    /// Keyword lexeme → token kind.
    pub static ref KEYWORDS: HashMap<&'static str, TokenKind> = {
        let mut map = HashMap::new();
        map.insert("var", TokenKind::Var);
        map.insert("final", TokenKind::Final);
        map.insert("const", TokenKind::Const);
        map.insert("fun", TokenKind::Fun);
        map.insert("construct", TokenKind::Construct);
        map.insert("factory", TokenKind::Factory);
        map.insert("get", TokenKind::Get);
        map.insert("set", TokenKind::Set);
        map.insert("class", TokenKind::Class);
        map.insert("enum", TokenKind::Enum);
        map.insert("struct", TokenKind::Struct);
        map.insert("extends", TokenKind::Extends);
        map.insert("implements", TokenKind::Implements);
        map.insert("with", TokenKind::With);
        map.insert("external", TokenKind::External);
        map.insert("static", TokenKind::Static);
        map.insert("abstract", TokenKind::Abstract);
        map.insert("return", TokenKind::Return);
        map.insert("break", TokenKind::Break);
        map.insert("continue", TokenKind::Continue);
        map.insert("if", TokenKind::If);
        map.insert("else", TokenKind::Else);
        map.insert("while", TokenKind::While);
        map.insert("do", TokenKind::Do);
        map.insert("for", TokenKind::For);
        map.insert("in", TokenKind::In);
        map.insert("when", TokenKind::When);
        map.insert("import", TokenKind::Import);
        map.insert("library", TokenKind::Library);
        map.insert("type", TokenKind::TypeAlias);
        map.insert("as", TokenKind::As);
        map.insert("is", TokenKind::Is);
        map.insert("typeof", TokenKind::TypeOf);
        map.insert("null", TokenKind::Null);
        map.insert("true", TokenKind::BoolLiteral(true));
        map.insert("false", TokenKind::BoolLiteral(false));
        map.insert("this", TokenKind::This);
        map.insert("super", TokenKind::Super);
        map
    };
}

impl TokenKind {
    /// Look a lexeme up in the keyword table.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        KEYWORDS.get(ident).cloned()
    }

    /// True for comment and empty-line tokens the parser skips over.
    pub fn is_trivia(&self) -> bool {
        matches!(self, TokenKind::Comment { .. } | TokenKind::EmptyLine)
    }

    /// Short name used in "expected X, found Y" messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::IntLiteral(n) => n.to_string(),
            TokenKind::FloatLiteral(n) => n.to_string(),
            TokenKind::StringLiteral(_) | TokenKind::InterpolatedString { .. } => {
                "string literal".to_string()
            }
            TokenKind::BoolLiteral(b) => b.to_string(),
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::Comment { .. } => "comment".to_string(),
            TokenKind::EmptyLine => "empty line".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            other => other.fixed_lexeme().unwrap_or("token").to_string(),
        }
    }

    /// The lexeme of tokens whose spelling is fixed.
    pub fn fixed_lexeme(&self) -> Option<&'static str> {
        let lexeme = match self {
            TokenKind::Var => "var",
            TokenKind::Final => "final",
            TokenKind::Const => "const",
            TokenKind::Fun => "fun",
            TokenKind::Construct => "construct",
            TokenKind::Factory => "factory",
            TokenKind::Get => "get",
            TokenKind::Set => "set",
            TokenKind::Class => "class",
            TokenKind::Enum => "enum",
            TokenKind::Struct => "struct",
            TokenKind::Extends => "extends",
            TokenKind::Implements => "implements",
            TokenKind::With => "with",
            TokenKind::External => "external",
            TokenKind::Static => "static",
            TokenKind::Abstract => "abstract",
            TokenKind::Return => "return",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::When => "when",
            TokenKind::Import => "import",
            TokenKind::Library => "library",
            TokenKind::TypeAlias => "type",
            TokenKind::As => "as",
            TokenKind::Is => "is",
            TokenKind::TypeOf => "typeof",
            TokenKind::Null => "null",
            TokenKind::This => "this",
            TokenKind::Super => "super",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Equal => "=",
            TokenKind::PlusEqual => "+=",
            TokenKind::MinusEqual => "-=",
            TokenKind::StarEqual => "*=",
            TokenKind::SlashEqual => "/=",
            TokenKind::EqualEqual => "==",
            TokenKind::BangEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Bang => "!",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Question => "?",
            TokenKind::Arrow => "->",
            TokenKind::FatArrow => "=>",
            TokenKind::Spread => "...",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            _ => return None,
        };
        Some(lexeme)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// A token: lexeme, kind and source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub lexeme: String,
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(lexeme: impl Into<String>, kind: TokenKind, span: Span) -> Self {
        Self {
            lexeme: lexeme.into(),
            kind,
            span,
        }
    }

    pub fn eof(span: Span) -> Self {
        Self {
            lexeme: String::new(),
            kind: TokenKind::Eof,
            span,
        }
    }
}

/// Comment recognition patterns. The defaults match the surface syntax; an
/// embedder may swap the documentation prefixes.
#[derive(Debug, Clone)]
pub struct LexerConfig {
    pub line_comment: &'static str,
    pub doc_line_comment: &'static str,
    pub block_comment_start: &'static str,
    pub doc_block_comment_start: &'static str,
    pub block_comment_end: &'static str,
}

impl Default for LexerConfig {
    fn default() -> Self {
        Self {
            line_comment: "//",
            doc_line_comment: "///",
            block_comment_start: "/*",
            doc_block_comment_start: "/**",
            block_comment_end: "*/",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(TokenKind::keyword("fun"), Some(TokenKind::Fun));
        assert_eq!(TokenKind::keyword("when"), Some(TokenKind::When));
        assert_eq!(
            TokenKind::keyword("true"),
            Some(TokenKind::BoolLiteral(true))
        );
        assert_eq!(TokenKind::keyword("funky"), None);
    }

    #[test]
    fn test_trivia() {
        assert!(TokenKind::EmptyLine.is_trivia());
        assert!(TokenKind::Comment {
            content: "x".to_string(),
            is_doc: false,
            is_block: false
        }
        .is_trivia());
        assert!(!TokenKind::Eof.is_trivia());
    }
}
