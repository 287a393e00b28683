//! Core parser state and token-stream helpers.

use crate::ast::SourceKind;
use crate::error::{ParseResult, QuillError};
use crate::lexer::{Token, TokenKind};
use crate::span::Span;

/// The recursive-descent parser.
///
/// One parser instance parses one token stream; interpolation segments are
/// parsed by instantiating a fresh parser over the segment's token list in
/// expression mode. Errors are accumulated rather than thrown; recovery
/// advances one token past the error site.
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) current: usize,
    pub(crate) source_kind: SourceKind,
    pub(crate) errors: Vec<QuillError>,
    /// Whether the expression just parsed is a legal assignment target.
    /// Updated at every primary and postfix step.
    pub(crate) left_value_legal: bool,
    pub(crate) function_depth: usize,
    pub(crate) loop_depth: usize,
    pub(crate) class_ids: Vec<String>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, source_kind: SourceKind) -> Self {
        let mut parser = Self {
            tokens,
            current: 0,
            source_kind,
            errors: Vec::new(),
            left_value_legal: false,
            function_depth: 0,
            loop_depth: 0,
            class_ids: Vec::new(),
        };
        parser.skip_trivia();
        parser
    }

    // ===== Token manipulation =====

    pub(crate) fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
            self.skip_trivia();
        }
        self.previous().clone()
    }

    /// Comments and empty lines survive lexing but take no part in the
    /// grammar.
    pub(crate) fn skip_trivia(&mut self) {
        while self.current < self.tokens.len() - 1 && self.tokens[self.current].kind.is_trivia() {
            self.current += 1;
        }
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    pub(crate) fn previous(&self) -> &Token {
        let mut index = self.current.saturating_sub(1);
        while index > 0 && self.tokens[index].kind.is_trivia() {
            index -= 1;
        }
        &self.tokens[index]
    }

    /// Peek `n` meaningful tokens ahead of the current one.
    pub(crate) fn peek_nth(&self, n: usize) -> &Token {
        let mut index = self.current;
        let mut remaining = n;
        while remaining > 0 && index < self.tokens.len() - 1 {
            index += 1;
            while index < self.tokens.len() - 1 && self.tokens[index].kind.is_trivia() {
                index += 1;
            }
            remaining -= 1;
        }
        &self.tokens[index.min(self.tokens.len() - 1)]
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        if self.is_at_end() {
            false
        } else {
            std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
        }
    }

    pub(crate) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(QuillError::unexpected_token(
                &kind.describe(),
                &self.peek().kind.describe(),
                self.current_span(),
            ))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(QuillError::unexpected_token(
                "identifier",
                &self.peek().kind.describe(),
                self.current_span(),
            )),
        }
    }

    pub(crate) fn expect_string_literal(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::StringLiteral(value) => {
                let value = value.clone();
                self.advance();
                Ok(value)
            }
            _ => Err(QuillError::unexpected_token(
                "string literal",
                &self.peek().kind.describe(),
                self.current_span(),
            )),
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn previous_span(&self) -> Span {
        self.previous().span
    }

    /// Record an error and keep parsing.
    pub(crate) fn report(&mut self, err: QuillError) {
        self.errors.push(err);
    }
}
