//! Statement parsing: control flow, blocks, and the source-kind-sensitive
//! top-level dispatch.

use crate::ast::{Expr, SourceKind, Stmt, StmtKind, WhenCase};
use crate::error::{ErrorCode, ParseResult, QuillError};
use crate::lexer::TokenKind;
use crate::parser::core::Parser;

impl Parser {
    /// Parse the whole token stream under the parser's source kind,
    /// accumulating errors and recovering one token past each error site.
    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.report(err);
                    self.advance();
                }
            }
        }

        statements
    }

    /// One statement, gated on the source kind.
    pub(crate) fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match self.source_kind {
            SourceKind::Module => self.parse_module_statement(),
            SourceKind::Expression => {
                let expr = self.parse_expression()?;
                let span = expr.span;
                Ok(Stmt::new(StmtKind::Expression(expr), span))
            }
            _ => self.parse_script_statement(),
        }
    }

    /// Modules admit declarations only.
    fn parse_module_statement(&mut self) -> ParseResult<Stmt> {
        match self.peek().kind {
            TokenKind::Import => self.parse_import(),
            TokenKind::Library => self.parse_library(),
            TokenKind::Var | TokenKind::Final | TokenKind::Const => self.parse_var_statement(),
            TokenKind::Fun => self.parse_function_statement(),
            TokenKind::Class | TokenKind::Abstract => self.parse_class_statement(),
            TokenKind::Enum => self.parse_enum_statement(),
            TokenKind::Struct => self.parse_struct_statement(),
            TokenKind::TypeAlias => self.parse_type_alias(),
            TokenKind::External => self.parse_external_declaration(),
            _ => Err(QuillError::unexpected_token(
                "declaration",
                &self.peek().kind.describe(),
                self.current_span(),
            )),
        }
    }

    /// Scripts and function bodies admit the full statement set.
    fn parse_script_statement(&mut self) -> ParseResult<Stmt> {
        match self.peek().kind {
            // An opening brace in statement position is always a block; a
            // struct literal only appears behind an expression context.
            TokenKind::LeftBrace => self.parse_block(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::When => self.parse_when(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => self.parse_break(),
            TokenKind::Continue => self.parse_continue(),
            TokenKind::Var | TokenKind::Final | TokenKind::Const => self.parse_var_statement(),
            TokenKind::Fun if self.starts_function_declaration() => {
                self.parse_function_statement()
            }
            TokenKind::Class | TokenKind::Abstract => self.parse_class_statement(),
            TokenKind::Enum => self.parse_enum_statement(),
            TokenKind::Struct => self.parse_struct_statement(),
            TokenKind::TypeAlias => self.parse_type_alias(),
            TokenKind::Import => self.parse_import(),
            TokenKind::Library => self.parse_library(),
            TokenKind::External => self.parse_external_declaration(),
            _ => {
                let expr = self.parse_expression()?;
                let span = expr.span;
                self.match_token(&TokenKind::Semicolon);
                Ok(Stmt::new(StmtKind::Expression(expr), span))
            }
        }
    }

    /// `fun name …` declares; `fun (…) { … }` in expression position is a
    /// literal.
    fn starts_function_declaration(&self) -> bool {
        matches!(self.peek_nth(1).kind, TokenKind::Identifier(_))
    }

    pub(crate) fn parse_block(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::LeftBrace)?;
        let mut statements = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.report(err);
                    self.advance();
                }
            }
        }
        self.expect(&TokenKind::RightBrace)?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Block(statements), span))
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::If)?;
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            span,
        ))
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;

        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        let body = Box::new(body?);

        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::While { condition, body }, span))
    }

    fn parse_do_while(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::Do)?;

        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        let body = Box::new(body?);

        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        self.match_token(&TokenKind::Semicolon);
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::DoWhile { body, condition }, span))
    }

    /// Both loop forms: `for (init; cond; inc) body` and
    /// `for (var x in iterable) body`.
    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::For)?;
        self.expect(&TokenKind::LeftParen)?;

        // `for (var x in …)` — identifier followed by `in`.
        let is_for_in = matches!(
            self.peek().kind,
            TokenKind::Var | TokenKind::Final
        ) && matches!(self.peek_nth(1).kind, TokenKind::Identifier(_))
            && self.peek_nth(2).kind == TokenKind::In;

        if is_for_in {
            self.advance(); // var / final
            let variable = self.expect_identifier()?;
            self.expect(&TokenKind::In)?;
            let iterable = self.parse_expression()?;
            self.expect(&TokenKind::RightParen)?;

            self.loop_depth += 1;
            let body = self.parse_statement();
            self.loop_depth -= 1;
            let body = Box::new(body?);

            let span = start.merge(self.previous_span());
            return Ok(Stmt::new(
                StmtKind::ForIn {
                    variable,
                    iterable,
                    body,
                },
                span,
            ));
        }

        let init = if self.match_token(&TokenKind::Semicolon) {
            None
        } else {
            let stmt = if matches!(
                self.peek().kind,
                TokenKind::Var | TokenKind::Final | TokenKind::Const
            ) {
                self.parse_var_statement()?
            } else {
                let expr = self.parse_expression()?;
                let span = expr.span;
                self.match_token(&TokenKind::Semicolon);
                Stmt::new(StmtKind::Expression(expr), span)
            };
            Some(Box::new(stmt))
        };

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let increment = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RightParen)?;

        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        let body = Box::new(body?);

        let span = start.merge(self.previous_span());
        Ok(Stmt::new(
            StmtKind::For {
                init,
                condition,
                increment,
                body,
            },
            span,
        ))
    }

    /// `when (subject)? { case -> stmt … else -> stmt }`
    fn parse_when(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::When)?;

        let subject = if self.match_token(&TokenKind::LeftParen) {
            let expr = self.parse_expression()?;
            self.expect(&TokenKind::RightParen)?;
            Some(expr)
        } else {
            None
        };

        self.expect(&TokenKind::LeftBrace)?;
        let mut cases: Vec<WhenCase> = Vec::new();
        let mut else_branch: Option<Box<Stmt>> = None;

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::Else) {
                self.expect(&TokenKind::Arrow)?;
                let branch = self.parse_statement()?;
                if else_branch.is_some() {
                    self.report(QuillError::unexpected_token(
                        "'}'",
                        "else",
                        branch.span,
                    ));
                }
                else_branch = Some(Box::new(branch));
            } else {
                let case_start = self.current_span();
                let condition = self.parse_expression()?;
                self.expect(&TokenKind::Arrow)?;
                let branch = self.parse_statement()?;
                let span = case_start.merge(self.previous_span());
                cases.push(WhenCase {
                    condition,
                    branch,
                    span,
                });
            }
            self.match_token(&TokenKind::Comma);
        }
        self.expect(&TokenKind::RightBrace)?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(
            StmtKind::When {
                subject,
                cases,
                else_branch,
            },
            span,
        ))
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::Return)?;

        if self.function_depth == 0 {
            self.report(QuillError::new(
                ErrorCode::OutsideReturn,
                "return outside a function body",
                start,
            ));
        }

        let value = if self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RightBrace)
            || self.is_at_end()
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.match_token(&TokenKind::Semicolon);
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Return(value), span))
    }

    fn parse_break(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.expect(&TokenKind::Break)?;
        if self.loop_depth == 0 {
            self.report(QuillError::new(
                ErrorCode::MisplacedBreak,
                "break outside a loop",
                span,
            ));
        }
        self.match_token(&TokenKind::Semicolon);
        Ok(Stmt::new(StmtKind::Break, span))
    }

    fn parse_continue(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.expect(&TokenKind::Continue)?;
        if self.loop_depth == 0 {
            self.report(QuillError::new(
                ErrorCode::MisplacedContinue,
                "continue outside a loop",
                span,
            ));
        }
        self.match_token(&TokenKind::Semicolon);
        Ok(Stmt::new(StmtKind::Continue, span))
    }

    pub(crate) fn parse_import(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::Import)?;
        let key = self.expect_string_literal()?;
        let alias = if self.match_token(&TokenKind::As) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        self.match_token(&TokenKind::Semicolon);
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(
            StmtKind::Import(crate::ast::ImportDecl {
                key,
                alias,
                resolved_key: None,
                span,
            }),
            span,
        ))
    }

    fn parse_library(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::Library)?;
        let name = self.expect_string_literal()?;
        self.match_token(&TokenKind::Semicolon);
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Library { name }, span))
    }

    /// The expression at the top of an expression-mode stream, used for
    /// interpolation and eval snippets.
    pub fn parse_single_expression(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_expression()?;
        if !self.is_at_end() {
            return Err(QuillError::unexpected_token(
                "end of expression",
                &self.peek().kind.describe(),
                self.current_span(),
            ));
        }
        Ok(expr)
    }
}
