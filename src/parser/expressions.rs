//! Expression parsing: precedence climbing over the operator levels, with
//! parse-time lowering of compound assignment and increment/decrement.

use crate::ast::{BinaryOp, Expr, ExprKind, SourceKind, UnaryOp};
use crate::error::{ErrorCode, ParseResult, QuillError};
use crate::lexer::{Token, TokenKind};
use crate::parser::core::Parser;
use crate::parser::precedence::{binary_precedence, Precedence};

impl Parser {
    /// Parse one full expression.
    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_assignment()
    }

    /// assignment := ternary (('=' | '+=' | '-=' | '*=' | '/=') assignment)?
    ///
    /// `x op= y` lowers into an assignment whose right-hand side is the
    /// binary expression against the original left value.
    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        let target = self.parse_ternary()?;
        let target_legal = self.left_value_legal;

        let compound = match self.peek().kind {
            TokenKind::Equal => None,
            TokenKind::PlusEqual => Some(BinaryOp::Add),
            TokenKind::MinusEqual => Some(BinaryOp::Subtract),
            TokenKind::StarEqual => Some(BinaryOp::Multiply),
            TokenKind::SlashEqual => Some(BinaryOp::Divide),
            _ => return Ok(target),
        };
        let op_span = self.current_span();
        self.advance();

        if !target_legal {
            // Keep parsing; the error is accumulated.
            self.report(QuillError::new(
                ErrorCode::InvalidLeftValue,
                "illegal assignment target",
                target.span,
            ));
        }

        let value = self.parse_assignment()?;
        let span = target.span.merge(value.span);
        let value = match compound {
            Some(op) => Expr::new(
                ExprKind::Binary {
                    left: Box::new(target.clone()),
                    operator: op,
                    right: Box::new(value),
                },
                op_span.merge(span),
            ),
            None => value,
        };

        self.left_value_legal = false;
        Ok(Expr::new(
            ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        ))
    }

    /// ternary := binary ('?' expression ':' ternary)?
    fn parse_ternary(&mut self) -> ParseResult<Expr> {
        let condition = self.parse_binary(Precedence::Or)?;

        if !self.match_token(&TokenKind::Question) {
            return Ok(condition);
        }

        let then_value = self.parse_expression()?;
        self.expect(&TokenKind::Colon)?;
        let else_value = self.parse_ternary()?;
        let span = condition.span.merge(else_value.span);
        self.left_value_legal = false;
        Ok(Expr::new(
            ExprKind::Ternary {
                condition: Box::new(condition),
                then_value: Box::new(then_value),
                else_value: Box::new(else_value),
            },
            span,
        ))
    }

    /// Precedence climbing for the binary levels (`||` through `* / %`),
    /// including the relational/type level (`< > <= >= as is is!`).
    fn parse_binary(&mut self, min_precedence: Precedence) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        // A non-associative level may not chain; a repeat at the same level
        // is left unconsumed for the caller to flag.
        let mut banned_level = Precedence::None;

        loop {
            let precedence = binary_precedence(&self.peek().kind);
            if precedence < min_precedence
                || precedence == Precedence::None
                || precedence == banned_level
            {
                return Ok(left);
            }

            let op_token = self.advance();
            left = match op_token.kind {
                TokenKind::Or => {
                    let right = self.parse_binary(precedence.next())?;
                    let span = left.span.merge(right.span);
                    Expr::new(
                        ExprKind::LogicalOr {
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                        span,
                    )
                }
                TokenKind::And => {
                    let right = self.parse_binary(precedence.next())?;
                    let span = left.span.merge(right.span);
                    Expr::new(
                        ExprKind::LogicalAnd {
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                        span,
                    )
                }
                TokenKind::As => {
                    let ty = self.parse_type_expr()?;
                    let span = left.span.merge(ty.span);
                    Expr::new(
                        ExprKind::TypeCast {
                            object: Box::new(left),
                            ty,
                        },
                        span,
                    )
                }
                TokenKind::Is => {
                    // `is!` is sugar for `is` followed by `!`.
                    let negated = self.match_token(&TokenKind::Bang);
                    let ty = self.parse_type_expr()?;
                    let span = left.span.merge(ty.span);
                    Expr::new(
                        ExprKind::TypeCheck {
                            object: Box::new(left),
                            ty,
                            negated,
                        },
                        span,
                    )
                }
                kind => {
                    let operator = match kind {
                        TokenKind::EqualEqual => BinaryOp::Equal,
                        TokenKind::BangEqual => BinaryOp::NotEqual,
                        TokenKind::Less => BinaryOp::Less,
                        TokenKind::LessEqual => BinaryOp::LessEqual,
                        TokenKind::Greater => BinaryOp::Greater,
                        TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                        TokenKind::Plus => BinaryOp::Add,
                        TokenKind::Minus => BinaryOp::Subtract,
                        TokenKind::Star => BinaryOp::Multiply,
                        TokenKind::Slash => BinaryOp::Divide,
                        TokenKind::Percent => BinaryOp::Modulo,
                        _ => unreachable!("not a binary operator: {:?}", kind),
                    };
                    let right = self.parse_binary(precedence.next())?;
                    let span = left.span.merge(right.span);
                    Expr::new(
                        ExprKind::Binary {
                            left: Box::new(left),
                            operator,
                            right: Box::new(right),
                        },
                        span,
                    )
                }
            };
            self.left_value_legal = false;

            if !precedence.is_left_associative() {
                banned_level = precedence;
            }
        }
    }

    /// unary := ('-' | '!' | 'typeof' | '++' | '--') unary | postfix
    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let operator = match self.peek().kind {
            TokenKind::Minus => Some(UnaryOp::Negate),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::TypeOf => Some(UnaryOp::TypeOf),
            _ => None,
        };
        if let Some(operator) = operator {
            let start = self.current_span();
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span);
            self.left_value_legal = false;
            return Ok(Expr::new(
                ExprKind::Unary {
                    operator,
                    operand: Box::new(operand),
                },
                span,
            ));
        }

        // Pre-increment/-decrement lower to an assignment against 1.
        if self.check(&TokenKind::PlusPlus) || self.check(&TokenKind::MinusMinus) {
            let op = if self.check(&TokenKind::PlusPlus) {
                BinaryOp::Add
            } else {
                BinaryOp::Subtract
            };
            let start = self.current_span();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(self.lower_increment(operand, op, start));
        }

        self.parse_postfix()
    }

    /// postfix := primary ('.' id | '[' expr ']' | '(' args ')' | '++' | '--')*
    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            name,
                        },
                        span,
                    );
                    self.left_value_legal = true;
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let key = self.parse_expression()?;
                    self.expect(&TokenKind::RightBracket)?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Subscript {
                            object: Box::new(expr),
                            key: Box::new(key),
                        },
                        span,
                    );
                    self.left_value_legal = true;
                }
                TokenKind::LeftParen => {
                    self.advance();
                    let (positional, named) = self.parse_arguments()?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            positional,
                            named,
                        },
                        span,
                    );
                    self.left_value_legal = false;
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let op = if self.check(&TokenKind::PlusPlus) {
                        BinaryOp::Add
                    } else {
                        BinaryOp::Subtract
                    };
                    let op_span = self.current_span();
                    self.advance();
                    expr = self.lower_increment(expr, op, op_span);
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `x++` / `++x` become `x = x + 1` (likewise `--` with `-`).
    fn lower_increment(
        &mut self,
        operand: Expr,
        op: BinaryOp,
        op_span: crate::span::Span,
    ) -> Expr {
        if !self.left_value_legal {
            self.report(QuillError::new(
                ErrorCode::InvalidLeftValue,
                "illegal assignment target",
                operand.span,
            ));
        }
        let one = Expr::new(ExprKind::IntLiteral(1), op_span);
        let span = operand.span.merge(op_span);
        let value = Expr::new(
            ExprKind::Binary {
                left: Box::new(operand.clone()),
                operator: op,
                right: Box::new(one),
            },
            span,
        );
        self.left_value_legal = false;
        Expr::new(
            ExprKind::Assign {
                target: Box::new(operand),
                value: Box::new(value),
            },
            span,
        )
    }

    /// Positional arguments followed by `name: value` named arguments.
    pub(crate) fn parse_arguments(&mut self) -> ParseResult<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut positional = Vec::new();
        let mut named = Vec::new();

        while !self.check(&TokenKind::RightParen) && !self.is_at_end() {
            let is_named = matches!(self.peek().kind, TokenKind::Identifier(_))
                && self.peek_nth(1).kind == TokenKind::Colon;
            if is_named {
                let name = self.expect_identifier()?;
                self.expect(&TokenKind::Colon)?;
                let value = self.parse_expression()?;
                named.push((name, value));
            } else {
                positional.push(self.parse_expression()?);
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightParen)?;
        Ok((positional, named))
    }

    /// primary := literal | interpolation | 'this' | 'super' | group |
    ///            arrow function | list | struct literal | function literal |
    ///            identifier | if-expression
    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let span = self.current_span();
        self.left_value_legal = false;

        let kind = self.peek().kind.clone();
        match kind {
            TokenKind::Null => {
                self.advance();
                Ok(Expr::new(ExprKind::NullLiteral, span))
            }
            TokenKind::BoolLiteral(b) => {
                self.advance();
                Ok(Expr::new(ExprKind::BoolLiteral(b), span))
            }
            TokenKind::IntLiteral(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::IntLiteral(n), span))
            }
            TokenKind::FloatLiteral(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::FloatLiteral(n), span))
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::StringLiteral(s), span))
            }
            TokenKind::InterpolatedString { pattern, segments } => {
                self.advance();
                self.parse_interpolation(pattern, segments, span)
            }
            TokenKind::This => {
                self.advance();
                Ok(Expr::new(ExprKind::This, span))
            }
            TokenKind::Super => {
                self.advance();
                Ok(Expr::new(ExprKind::Super, span))
            }
            TokenKind::LeftParen => {
                if self.is_arrow_function() {
                    return self.parse_arrow_function();
                }
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                let span = span.merge(self.previous_span());
                self.left_value_legal = false;
                Ok(Expr::new(ExprKind::Group(Box::new(inner)), span))
            }
            TokenKind::LeftBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(&TokenKind::RightBracket) && !self.is_at_end() {
                    elements.push(self.parse_expression()?);
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RightBracket)?;
                let span = span.merge(self.previous_span());
                Ok(Expr::new(ExprKind::ListLiteral(elements), span))
            }
            TokenKind::LeftBrace => self.parse_struct_literal(),
            TokenKind::Fun => {
                let literal = self.parse_function_literal()?;
                let span = span.merge(self.previous_span());
                Ok(Expr::new(ExprKind::FunctionLiteral(Box::new(literal)), span))
            }
            TokenKind::If => self.parse_if_expression(),
            TokenKind::Identifier(name) => {
                self.advance();
                self.left_value_legal = true;
                Ok(Expr::new(ExprKind::Identifier(name), span))
            }
            _ => Err(QuillError::unexpected_token(
                "expression",
                &self.peek().kind.describe(),
                span,
            )),
        }
    }

    /// Each interpolation segment is parsed by a fresh parser instance over
    /// the segment's token list in expression mode; the segment must yield
    /// exactly one expression.
    fn parse_interpolation(
        &mut self,
        pattern: String,
        segments: Vec<Vec<Token>>,
        span: crate::span::Span,
    ) -> ParseResult<Expr> {
        let mut parsed = Vec::with_capacity(segments.len());
        for tokens in segments {
            let segment_span = tokens
                .first()
                .map(|t| t.span)
                .unwrap_or(span);
            let mut sub = Parser::new(tokens, SourceKind::Expression);
            let result = sub.parse_expression();
            let single = match result {
                Ok(expr) if sub.is_at_end() && sub.errors.is_empty() => Some(expr),
                _ => None,
            };
            match single {
                Some(expr) => parsed.push(expr),
                None => {
                    self.report(QuillError::new(
                        ErrorCode::StringInterpolation,
                        "interpolation segment must be a single expression",
                        segment_span,
                    ));
                    parsed.push(Expr::new(ExprKind::NullLiteral, segment_span));
                }
            }
        }
        Ok(Expr::new(
            ExprKind::Interpolation {
                pattern,
                segments: parsed,
            },
            span,
        ))
    }

    /// `{ key: value, … }`
    fn parse_struct_literal(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();
        self.expect(&TokenKind::LeftBrace)?;
        let mut fields = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let key = match self.peek().kind.clone() {
                TokenKind::Identifier(name) => {
                    self.advance();
                    name
                }
                TokenKind::StringLiteral(s) => {
                    self.advance();
                    s
                }
                _ => {
                    return Err(QuillError::unexpected_token(
                        "struct field key",
                        &self.peek().kind.describe(),
                        self.current_span(),
                    ))
                }
            };
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_expression()?;
            fields.push((key, value));
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace)?;
        let span = start.merge(self.previous_span());
        self.left_value_legal = false;
        Ok(Expr::new(
            ExprKind::StructLiteral {
                id: None,
                prototype: None,
                fields,
            },
            span,
        ))
    }

    /// `if (cond) a else b` in expression position parses to the same node
    /// as the conditional operator.
    fn parse_if_expression(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();
        self.expect(&TokenKind::If)?;
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let then_value = self.parse_expression()?;
        self.expect(&TokenKind::Else)?;
        let else_value = self.parse_expression()?;
        let span = start.merge(else_value.span);
        self.left_value_legal = false;
        Ok(Expr::new(
            ExprKind::Ternary {
                condition: Box::new(condition),
                then_value: Box::new(then_value),
                else_value: Box::new(else_value),
            },
            span,
        ))
    }

    /// Lookahead: does the parenthesis at the cursor start an arrow
    /// function (`(a, b) => …`)?
    fn is_arrow_function(&self) -> bool {
        let mut index = self.current;
        debug_assert!(self.tokens[index].kind == TokenKind::LeftParen);
        let mut depth = 0usize;
        while index < self.tokens.len() - 1 {
            match self.tokens[index].kind {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        let mut next = index + 1;
                        while next < self.tokens.len() - 1 && self.tokens[next].kind.is_trivia() {
                            next += 1;
                        }
                        return self.tokens[next].kind == TokenKind::FatArrow;
                    }
                }
                _ => {}
            }
            index += 1;
        }
        false
    }

    /// `(a, b: num) => expr`
    fn parse_arrow_function(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();
        self.expect(&TokenKind::LeftParen)?;
        let params = self.parse_parameter_list()?;
        self.expect(&TokenKind::FatArrow)?;

        self.function_depth += 1;
        let body = self.parse_expression();
        self.function_depth -= 1;
        let body = body?;

        let span = start.merge(body.span);
        let decl = crate::ast::FunctionDecl {
            id: None,
            category: crate::ast::FunctionCategory::Literal,
            class_id: None,
            generic_params: Vec::new(),
            params,
            declared_return_type: None,
            is_external: false,
            is_static: false,
            redirecting: None,
            body: Some(crate::ast::FunctionBody::Expression(Box::new(body))),
            span,
        };
        self.left_value_legal = false;
        Ok(Expr::new(ExprKind::FunctionLiteral(Box::new(decl)), span))
    }
}
