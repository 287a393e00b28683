//! The lexer: UTF-8 source → token stream.
//!
//! Interpolated segments (`${…}`) are captured by re-running the lexer over
//! the inner source, so each segment carries a complete nested token list
//! with positions relative to the original source. Blank lines between
//! statements are preserved as explicit empty-line tokens.

use crate::error::{ErrorCode, QuillError};
use crate::lexer::token::{LexerConfig, Token, TokenKind};
use crate::span::Span;

/// The lexer transforms source code into a stream of tokens.
pub struct Lexer<'a> {
    source: &'a str,
    config: LexerConfig,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    /// Global byte offset of `source`'s first byte (non-zero for
    /// interpolation segments).
    origin: usize,
    current_pos: usize,
    line: usize,
    column: usize,
    start_pos: usize,
    start_line: usize,
    start_column: usize,
    errors: Vec<QuillError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_origin(source, 0, 1, 1)
    }

    /// A lexer whose positions are offset into an enclosing source. Used
    /// when re-lexing the inner source of an interpolation segment.
    pub fn with_origin(source: &'a str, origin: usize, line: usize, column: usize) -> Self {
        Self {
            source,
            config: LexerConfig::default(),
            chars: source.char_indices().peekable(),
            origin,
            current_pos: 0,
            line,
            column,
            start_pos: 0,
            start_line: line,
            start_column: column,
            errors: Vec::new(),
        }
    }

    /// Scan the whole source. Errors are accumulated, not fatal; scanning
    /// resumes at the character after the offending one.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<QuillError>) {
        let mut tokens = Vec::new();

        loop {
            match self.next_token() {
                Ok(token) => {
                    let is_eof = token.kind == TokenKind::Eof;
                    tokens.push(token);
                    if is_eof {
                        break;
                    }
                }
                Err(err) => self.errors.push(err),
            }
        }

        (tokens, self.errors)
    }

    fn next_token(&mut self) -> Result<Token, QuillError> {
        if let Some(token) = self.skip_whitespace() {
            return Ok(token);
        }
        self.mark_start();

        let Some((_, c)) = self.advance() else {
            return Ok(Token::eof(self.current_span()));
        };

        match c {
            '(' => Ok(self.make_token(TokenKind::LeftParen)),
            ')' => Ok(self.make_token(TokenKind::RightParen)),
            '{' => Ok(self.make_token(TokenKind::LeftBrace)),
            '}' => Ok(self.make_token(TokenKind::RightBrace)),
            '[' => Ok(self.make_token(TokenKind::LeftBracket)),
            ']' => Ok(self.make_token(TokenKind::RightBracket)),
            ',' => Ok(self.make_token(TokenKind::Comma)),
            ';' => Ok(self.make_token(TokenKind::Semicolon)),
            ':' => Ok(self.make_token(TokenKind::Colon)),
            '?' => Ok(self.make_token(TokenKind::Question)),
            '.' => {
                if self.peek() == Some('.') && self.peek_next() == Some('.') {
                    self.advance();
                    self.advance();
                    Ok(self.make_token(TokenKind::Spread))
                } else {
                    Ok(self.make_token(TokenKind::Dot))
                }
            }
            '+' => {
                if self.match_char('+') {
                    Ok(self.make_token(TokenKind::PlusPlus))
                } else if self.match_char('=') {
                    Ok(self.make_token(TokenKind::PlusEqual))
                } else {
                    Ok(self.make_token(TokenKind::Plus))
                }
            }
            '-' => {
                if self.match_char('-') {
                    Ok(self.make_token(TokenKind::MinusMinus))
                } else if self.match_char('=') {
                    Ok(self.make_token(TokenKind::MinusEqual))
                } else if self.match_char('>') {
                    Ok(self.make_token(TokenKind::Arrow))
                } else {
                    Ok(self.make_token(TokenKind::Minus))
                }
            }
            '*' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::StarEqual))
                } else {
                    Ok(self.make_token(TokenKind::Star))
                }
            }
            '/' => {
                // Comments were consumed by skip_whitespace; this is division.
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::SlashEqual))
                } else {
                    Ok(self.make_token(TokenKind::Slash))
                }
            }
            '%' => Ok(self.make_token(TokenKind::Percent)),
            '=' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::EqualEqual))
                } else if self.match_char('>') {
                    Ok(self.make_token(TokenKind::FatArrow))
                } else {
                    Ok(self.make_token(TokenKind::Equal))
                }
            }
            '!' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::BangEqual))
                } else {
                    Ok(self.make_token(TokenKind::Bang))
                }
            }
            '<' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::LessEqual))
                } else {
                    Ok(self.make_token(TokenKind::Less))
                }
            }
            '>' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::GreaterEqual))
                } else {
                    Ok(self.make_token(TokenKind::Greater))
                }
            }
            '&' => {
                if self.match_char('&') {
                    Ok(self.make_token(TokenKind::And))
                } else {
                    Err(self.unexpected_char(c))
                }
            }
            '|' => {
                if self.match_char('|') {
                    Ok(self.make_token(TokenKind::Or))
                } else {
                    Err(self.unexpected_char(c))
                }
            }
            '"' | '\'' => self.scan_string(c),
            c if c.is_ascii_digit() => self.scan_number(c),
            c if c.is_alphabetic() || c == '_' => Ok(self.scan_identifier(c)),
            _ => Err(self.unexpected_char(c)),
        }
    }

    /// Skip spaces and newlines. Returns an empty-line or comment token when
    /// one is found, so trivia survives into the stream.
    fn skip_whitespace(&mut self) -> Option<Token> {
        let mut newlines = 0usize;
        let mut blank_span = self.current_span();

        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.advance();
                }
                Some('\n') => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                    newlines += 1;
                    if newlines == 2 {
                        blank_span = Span::new(self.origin + self.current_pos, 0, self.line, 1);
                    }
                }
                Some('/') => {
                    if newlines >= 2 {
                        return Some(Token::new("", TokenKind::EmptyLine, blank_span));
                    }
                    if self.peek_next() == Some('/') {
                        return Some(self.scan_line_comment());
                    } else if self.peek_next() == Some('*') {
                        return Some(self.scan_block_comment());
                    } else {
                        return None;
                    }
                }
                _ => {
                    if newlines >= 2 {
                        return Some(Token::new("", TokenKind::EmptyLine, blank_span));
                    }
                    return None;
                }
            }
        }
    }

    fn scan_line_comment(&mut self) -> Token {
        self.mark_start();
        while self.peek().is_some() && self.peek() != Some('\n') {
            self.advance();
        }
        let lexeme = &self.source[self.start_pos..self.current_pos];
        let is_doc = lexeme.starts_with(self.config.doc_line_comment);
        let marker = if is_doc {
            self.config.doc_line_comment
        } else {
            self.config.line_comment
        };
        let content = lexeme[marker.len()..].trim().to_string();
        Token::new(
            lexeme,
            TokenKind::Comment {
                content,
                is_doc,
                is_block: false,
            },
            self.current_span(),
        )
    }

    fn scan_block_comment(&mut self) -> Token {
        self.mark_start();
        self.advance(); // /
        self.advance(); // *
        while let Some(c) = self.peek() {
            if c == '*' && self.peek_next() == Some('/') {
                self.advance();
                self.advance();
                break;
            }
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            }
            self.advance();
        }
        let lexeme = &self.source[self.start_pos..self.current_pos];
        let is_doc = lexeme.starts_with(self.config.doc_block_comment_start)
            && lexeme.len() > self.config.doc_block_comment_start.len() + 1;
        let body = lexeme
            .trim_start_matches('/')
            .trim_matches('*')
            .trim_end_matches('/')
            .trim()
            .to_string();
        Token::new(
            lexeme,
            TokenKind::Comment {
                content: body,
                is_doc,
                is_block: true,
            },
            self.current_span(),
        )
    }

    fn scan_string(&mut self, quote: char) -> Result<Token, QuillError> {
        let mut value = String::new();
        let mut segments: Vec<Vec<Token>> = Vec::new();

        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(QuillError::new(
                        ErrorCode::UnterminatedString,
                        "unterminated string literal",
                        self.current_span(),
                    ));
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = self.peek();
                    match escaped {
                        Some('n') => value.push('\n'),
                        Some('r') => value.push('\r'),
                        Some('t') => value.push('\t'),
                        Some('\\') => value.push('\\'),
                        Some('\'') => value.push('\''),
                        Some('"') => value.push('"'),
                        Some(c) => {
                            self.advance();
                            return Err(QuillError::new(
                                ErrorCode::InvalidEscape,
                                format!("invalid escape sequence '\\{}'", c),
                                self.current_span(),
                            ));
                        }
                        None => continue, // loop reports unterminated
                    }
                    self.advance();
                }
                Some('$') => {
                    if self.peek_next() == Some('{') {
                        self.advance(); // $
                        self.advance(); // {
                        let tokens = self.scan_interpolation_segment()?;
                        value.push('{');
                        value.push_str(&segments.len().to_string());
                        value.push('}');
                        segments.push(tokens);
                    } else {
                        self.advance();
                        value.push('$');
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        let lexeme = &self.source[self.start_pos..self.current_pos];
        let kind = if segments.is_empty() {
            TokenKind::StringLiteral(value)
        } else {
            TokenKind::InterpolatedString {
                pattern: value,
                segments,
            }
        };
        Ok(Token::new(lexeme, kind, self.current_span()))
    }

    /// Capture the source between `${` and its matching `}` and re-run the
    /// lexer over it, keeping global positions intact.
    fn scan_interpolation_segment(&mut self) -> Result<Vec<Token>, QuillError> {
        let inner_start = self.current_pos;
        let inner_line = self.line;
        let inner_column = self.column;
        let mut depth = 1usize;

        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(QuillError::new(
                        ErrorCode::UnterminatedString,
                        "unterminated interpolation segment",
                        self.current_span(),
                    ));
                }
                Some('{') => {
                    depth += 1;
                    self.advance();
                }
                Some('}') => {
                    depth -= 1;
                    self.advance();
                    if depth == 0 {
                        break;
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }

        let inner_end = self.current_pos - 1; // exclude the closing brace
        let inner = &self.source[inner_start..inner_end];
        let sub = Lexer::with_origin(
            inner,
            self.origin + inner_start,
            inner_line,
            inner_column,
        );
        let (tokens, errors) = sub.tokenize();
        self.errors.extend(errors);
        Ok(tokens)
    }

    fn scan_number(&mut self, first: char) -> Result<Token, QuillError> {
        let mut value = String::from(first);
        let mut is_float = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                value.push(c);
                self.advance();
            } else if c == '.' && !is_float {
                // A digit must follow, otherwise this dot is a member access.
                match self.peek_next() {
                    Some(next) if next.is_ascii_digit() => {
                        is_float = true;
                        value.push(c);
                        self.advance();
                    }
                    _ => break,
                }
            } else if c == 'e' || c == 'E' {
                let mut lookahead = 1;
                if matches!(self.peek_at(1), Some('+') | Some('-')) {
                    lookahead = 2;
                }
                match self.peek_at(lookahead) {
                    Some(d) if d.is_ascii_digit() => {
                        is_float = true;
                        value.push(c);
                        self.advance();
                        if let Some(sign @ ('+' | '-')) = self.peek() {
                            value.push(sign);
                            self.advance();
                        }
                        while let Some(d) = self.peek() {
                            if d.is_ascii_digit() {
                                value.push(d);
                                self.advance();
                            } else {
                                break;
                            }
                        }
                        break;
                    }
                    _ => break,
                }
            } else {
                break;
            }
        }

        let lexeme = &self.source[self.start_pos..self.current_pos];
        if is_float {
            let n: f64 = value.parse().map_err(|_| {
                QuillError::new(
                    ErrorCode::InvalidNumber,
                    format!("invalid number '{}'", value),
                    self.current_span(),
                )
            })?;
            Ok(Token::new(lexeme, TokenKind::FloatLiteral(n), self.current_span()))
        } else {
            let n: i64 = value.parse().map_err(|_| {
                QuillError::new(
                    ErrorCode::InvalidNumber,
                    format!("invalid number '{}'", value),
                    self.current_span(),
                )
            })?;
            Ok(Token::new(lexeme, TokenKind::IntLiteral(n), self.current_span()))
        }
    }

    fn scan_identifier(&mut self, first: char) -> Token {
        let mut value = String::from(first);

        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let kind = TokenKind::keyword(&value).unwrap_or(TokenKind::Identifier(value));
        let lexeme = &self.source[self.start_pos..self.current_pos];
        Token::new(lexeme, kind, self.current_span())
    }

    fn make_token(&mut self, kind: TokenKind) -> Token {
        let lexeme = &self.source[self.start_pos..self.current_pos];
        Token::new(lexeme, kind, self.current_span())
    }

    // ===== Cursor helpers =====

    fn advance(&mut self) -> Option<(usize, char)> {
        if let Some((pos, c)) = self.chars.next() {
            self.current_pos = pos + c.len_utf8();
            self.column += 1;
            Some((pos, c))
        } else {
            None
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next(&self) -> Option<char> {
        self.peek_at(1)
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.current_pos..].chars().nth(n)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn mark_start(&mut self) {
        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;
    }

    fn current_span(&self) -> Span {
        Span::new(
            self.origin + self.start_pos,
            self.current_pos - self.start_pos,
            self.start_line,
            self.start_column,
        )
    }

    fn unexpected_char(&self, c: char) -> QuillError {
        QuillError::new(
            ErrorCode::UnexpectedChar,
            format!("unexpected character '{}'", c),
            self.current_span(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = Lexer::new(source).tokenize();
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    fn scan_meaningful(source: &str) -> Vec<TokenKind> {
        scan(source)
            .into_iter()
            .filter(|k| !k.is_trivia())
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            scan("(){}"),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            scan("42 3.14 1e3"),
            vec![
                TokenKind::IntLiteral(42),
                TokenKind::FloatLiteral(3.14),
                TokenKind::FloatLiteral(1000.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_member_dot_after_int() {
        assert_eq!(
            scan("1.toString"),
            vec![
                TokenKind::IntLiteral(1),
                TokenKind::Dot,
                TokenKind::Identifier("toString".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            scan("fun construct whenever"),
            vec![
                TokenKind::Fun,
                TokenKind::Construct,
                TokenKind::Identifier("whenever".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            scan("+= -= *= /= ++ -- -> => ..."),
            vec![
                TokenKind::PlusEqual,
                TokenKind::MinusEqual,
                TokenKind::StarEqual,
                TokenKind::SlashEqual,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::Arrow,
                TokenKind::FatArrow,
                TokenKind::Spread,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            scan(r#"'a\n\t\'b'"#),
            vec![
                TokenKind::StringLiteral("a\n\t'b".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_interpolation_segments() {
        let kinds = scan(r#"'a ${x + 1} b'"#);
        match &kinds[0] {
            TokenKind::InterpolatedString { pattern, segments } => {
                assert_eq!(pattern, "a {0} b");
                assert_eq!(segments.len(), 1);
                let inner: Vec<_> = segments[0].iter().map(|t| t.kind.clone()).collect();
                assert_eq!(
                    inner,
                    vec![
                        TokenKind::Identifier("x".to_string()),
                        TokenKind::Plus,
                        TokenKind::IntLiteral(1),
                        TokenKind::Eof,
                    ]
                );
            }
            other => panic!("expected interpolated string, got {:?}", other),
        }
    }

    #[test]
    fn test_interpolation_segment_positions() {
        let (tokens, _) = Lexer::new("'${ab}'").tokenize();
        if let TokenKind::InterpolatedString { segments, .. } = &tokens[0].kind {
            // 'a' of "ab" sits at byte 3 of the whole source
            assert_eq!(segments[0][0].span.offset, 3);
        } else {
            panic!("expected interpolated string");
        }
    }

    #[test]
    fn test_empty_line_token() {
        let kinds = scan("1\n\n2");
        assert_eq!(
            kinds,
            vec![
                TokenKind::IntLiteral(1),
                TokenKind::EmptyLine,
                TokenKind::IntLiteral(2),
                TokenKind::Eof,
            ]
        );
        // A single newline is not an empty line.
        assert_eq!(
            scan("1\n2"),
            vec![
                TokenKind::IntLiteral(1),
                TokenKind::IntLiteral(2),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_comment_tokens() {
        let kinds = scan("1 // plain\n/// doc\n2");
        assert!(matches!(
            kinds[1],
            TokenKind::Comment {
                is_doc: false,
                is_block: false,
                ..
            }
        ));
        assert!(matches!(
            kinds[2],
            TokenKind::Comment {
                is_doc: true,
                is_block: false,
                ..
            }
        ));
        assert_eq!(scan_meaningful("1 /* x */ 2").len(), 3);
    }

    #[test]
    fn test_unexpected_char_accumulates() {
        let (tokens, errors) = Lexer::new("1 @ 2").tokenize();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::UnexpectedChar);
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::IntLiteral(1),
                TokenKind::IntLiteral(2),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_line_and_column() {
        let (tokens, _) = Lexer::new("a\nbb").tokenize();
        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[1].span.line, 2);
        assert_eq!(tokens[1].span.column, 1);
        assert_eq!(tokens[1].span.length, 2);
    }
}
