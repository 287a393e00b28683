//! Type-expression parsing.

use crate::ast::{ParamTypeExpr, TypeExpr, TypeExprKind};
use crate::error::ParseResult;
use crate::lexer::TokenKind;
use crate::parser::core::Parser;

impl Parser {
    /// A type expression: nominal with optional arguments and `?`, or a
    /// function type `(T, [U]) -> R`.
    pub(crate) fn parse_type_expr(&mut self) -> ParseResult<TypeExpr> {
        let start = self.current_span();

        if self.match_token(&TokenKind::LeftParen) {
            return self.parse_function_type(start);
        }

        let id = self.expect_identifier()?;
        let mut args = Vec::new();
        if self.match_token(&TokenKind::Less) {
            while !self.check(&TokenKind::Greater) && !self.is_at_end() {
                args.push(self.parse_type_expr()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Greater)?;
        }
        let nullable = self.match_token(&TokenKind::Question);
        let span = start.merge(self.previous_span());
        Ok(TypeExpr::new(
            TypeExprKind::Nominal { id, args, nullable },
            span,
        ))
    }

    /// `(T, [U], {name: V}, ...W) -> R`
    fn parse_function_type(&mut self, start: crate::span::Span) -> ParseResult<TypeExpr> {
        let mut params = Vec::new();

        while !self.check(&TokenKind::RightParen) && !self.is_at_end() {
            if self.match_token(&TokenKind::LeftBracket) {
                while !self.check(&TokenKind::RightBracket) && !self.is_at_end() {
                    let ty = self.parse_type_expr()?;
                    params.push(ParamTypeExpr {
                        ty,
                        id: None,
                        is_optional: true,
                        is_named: false,
                        is_variadic: false,
                    });
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RightBracket)?;
            } else if self.match_token(&TokenKind::LeftBrace) {
                while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
                    let id = self.expect_identifier()?;
                    self.expect(&TokenKind::Colon)?;
                    let ty = self.parse_type_expr()?;
                    params.push(ParamTypeExpr {
                        ty,
                        id: Some(id),
                        is_optional: false,
                        is_named: true,
                        is_variadic: false,
                    });
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RightBrace)?;
            } else {
                let is_variadic = self.match_token(&TokenKind::Spread);
                let ty = self.parse_type_expr()?;
                params.push(ParamTypeExpr {
                    ty,
                    id: None,
                    is_optional: false,
                    is_named: false,
                    is_variadic,
                });
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightParen)?;

        let return_type = if self.match_token(&TokenKind::Arrow) {
            Some(Box::new(self.parse_type_expr()?))
        } else {
            None
        };
        let span = start.merge(self.previous_span());
        Ok(TypeExpr::new(
            TypeExprKind::Function {
                params,
                return_type,
            },
            span,
        ))
    }
}
