//! Declaration parsing: variables, functions, classes, enums, structs,
//! type aliases and external declarations.

use crate::ast::{
    ClassDecl, EnumDecl, Expr, ExprKind, FunctionBody, FunctionCategory, FunctionDecl, ParamDecl,
    RedirectTarget, RedirectingCtor, Stmt, StmtKind, StructDecl, VarDecl,
};
use crate::error::{ErrorCode, ParseResult, QuillError};
use crate::lexer::TokenKind;
use crate::parser::core::Parser;

impl Parser {
    /// `var x: T = expr` / `final y = expr` / `const Z = 1`
    pub(crate) fn parse_var_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        let keyword = self.advance().kind;
        let (is_mutable, is_const) = match keyword {
            TokenKind::Var => (true, false),
            TokenKind::Final => (false, false),
            TokenKind::Const => (false, true),
            _ => unreachable!("caller checked the keyword"),
        };

        let id = self.expect_identifier()?;
        let declared_type = if self.match_token(&TokenKind::Colon) {
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        let initializer = if self.match_token(&TokenKind::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.match_token(&TokenKind::Semicolon);
        let span = start.merge(self.previous_span());

        Ok(Stmt::new(
            StmtKind::Var(VarDecl {
                id,
                class_id: self.class_ids.last().cloned(),
                declared_type,
                initializer,
                is_mutable,
                is_const,
                is_static: false,
                is_external: false,
                lazy_initialize: false,
                span,
            }),
            span,
        ))
    }

    /// `fun name(params) -> T { … }`
    pub(crate) fn parse_function_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::Fun)?;
        let id = self.expect_identifier()?;
        let decl = self.parse_function_rest(
            Some(id),
            FunctionCategory::Normal,
            false,
            false,
            start,
        )?;
        let span = decl.span;
        Ok(Stmt::new(StmtKind::Function(decl), span))
    }

    /// `fun (params) { … }` / `fun name(params) { … }` in expression
    /// position.
    pub(crate) fn parse_function_literal(&mut self) -> ParseResult<FunctionDecl> {
        let start = self.current_span();
        self.expect(&TokenKind::Fun)?;
        let id = match self.peek().kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Some(name)
            }
            _ => None,
        };
        self.parse_function_rest(id, FunctionCategory::Literal, false, false, start)
    }

    /// Common tail of every function form: generic parameters, parameter
    /// list (optional — `fun t { … }` declares a niladic function), return
    /// type, redirecting-constructor clause, body.
    pub(crate) fn parse_function_rest(
        &mut self,
        id: Option<String>,
        category: FunctionCategory,
        is_external: bool,
        is_static: bool,
        start: crate::span::Span,
    ) -> ParseResult<FunctionDecl> {
        let generic_params = self.parse_generic_params()?;

        let params = if self.match_token(&TokenKind::LeftParen) {
            self.parse_parameter_list()?
        } else {
            Vec::new()
        };

        let declared_return_type = if self.match_token(&TokenKind::Arrow) {
            Some(self.parse_type_expr()?)
        } else {
            None
        };

        let redirecting = if category == FunctionCategory::Constructor
            && self.match_token(&TokenKind::Colon)
        {
            Some(self.parse_redirecting_ctor()?)
        } else {
            None
        };

        self.function_depth += 1;
        let body = self.parse_function_body(category, is_external, redirecting.is_some());
        self.function_depth -= 1;
        let body = body?;

        let span = start.merge(self.previous_span());
        Ok(FunctionDecl {
            id,
            category,
            class_id: self.class_ids.last().cloned(),
            generic_params,
            params,
            declared_return_type,
            is_external,
            is_static,
            redirecting,
            body,
            span,
        })
    }

    fn parse_function_body(
        &mut self,
        category: FunctionCategory,
        is_external: bool,
        has_redirect: bool,
    ) -> ParseResult<Option<FunctionBody>> {
        if self.match_token(&TokenKind::FatArrow) {
            let expr = self.parse_expression()?;
            if is_external {
                self.report(QuillError::new(
                    ErrorCode::ExternalConstruct,
                    "external function cannot have a body",
                    expr.span,
                ));
            }
            self.match_token(&TokenKind::Semicolon);
            return Ok(Some(FunctionBody::Expression(Box::new(expr))));
        }

        if self.check(&TokenKind::LeftBrace) {
            let block = self.parse_block()?;
            if is_external {
                self.report(QuillError::new(
                    ErrorCode::ExternalConstruct,
                    "external function cannot have a body",
                    block.span,
                ));
            }
            let statements = match block.kind {
                StmtKind::Block(statements) => statements,
                _ => unreachable!("parse_block yields a block"),
            };
            return Ok(Some(FunctionBody::Block(statements)));
        }

        self.match_token(&TokenKind::Semicolon);
        // A redirecting constructor may omit its body entirely.
        if has_redirect || category == FunctionCategory::Constructor {
            return Ok(Some(FunctionBody::Block(Vec::new())));
        }
        Ok(None)
    }

    /// `: super(args)` / `: this.key(args)` / `: super.key(args)`
    fn parse_redirecting_ctor(&mut self) -> ParseResult<RedirectingCtor> {
        let start = self.current_span();
        let target = if self.match_token(&TokenKind::Super) {
            RedirectTarget::Super
        } else if self.match_token(&TokenKind::This) {
            RedirectTarget::This
        } else {
            return Err(QuillError::unexpected_token(
                "'super' or 'this'",
                &self.peek().kind.describe(),
                self.current_span(),
            ));
        };
        let key = if self.match_token(&TokenKind::Dot) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        self.expect(&TokenKind::LeftParen)?;
        let (positional, named) = self.parse_arguments()?;
        let span = start.merge(self.previous_span());
        Ok(RedirectingCtor {
            target,
            key,
            positional,
            named,
            span,
        })
    }

    /// Parameter list after `(`: required positionals, then `[optional]`,
    /// then `{named}`; a `...rest` parameter is terminal. Consumes the
    /// closing parenthesis.
    pub(crate) fn parse_parameter_list(&mut self) -> ParseResult<Vec<ParamDecl>> {
        let mut params: Vec<ParamDecl> = Vec::new();
        let mut seen_optional = false;
        let mut seen_named = false;
        let mut seen_variadic = false;

        while !self.check(&TokenKind::RightParen) && !self.is_at_end() {
            if self.match_token(&TokenKind::LeftBracket) {
                if seen_optional || seen_named {
                    self.report(QuillError::new(
                        ErrorCode::ParameterOrder,
                        "optional parameter group must come before named parameters",
                        self.previous_span(),
                    ));
                }
                seen_optional = true;
                while !self.check(&TokenKind::RightBracket) && !self.is_at_end() {
                    let param = self.parse_parameter(true, false, &mut seen_variadic)?;
                    self.push_param(&mut params, param);
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RightBracket)?;
            } else if self.match_token(&TokenKind::LeftBrace) {
                if seen_named {
                    self.report(QuillError::new(
                        ErrorCode::ParameterOrder,
                        "duplicate named parameter group",
                        self.previous_span(),
                    ));
                }
                seen_named = true;
                while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
                    let param = self.parse_parameter(false, true, &mut seen_variadic)?;
                    self.push_param(&mut params, param);
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RightBrace)?;
            } else {
                if seen_optional || seen_named {
                    self.report(QuillError::new(
                        ErrorCode::ParameterOrder,
                        "required parameter after optional or named parameters",
                        self.current_span(),
                    ));
                }
                let param = self.parse_parameter(false, false, &mut seen_variadic)?;
                self.push_param(&mut params, param);
            }

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightParen)?;
        Ok(params)
    }

    fn parse_parameter(
        &mut self,
        is_optional: bool,
        is_named: bool,
        seen_variadic: &mut bool,
    ) -> ParseResult<ParamDecl> {
        let start = self.current_span();
        let is_variadic = self.match_token(&TokenKind::Spread);
        if *seen_variadic {
            self.report(QuillError::new(
                ErrorCode::ParameterOrder,
                "no parameter may follow a variadic parameter",
                start,
            ));
        }
        if is_variadic {
            *seen_variadic = true;
            if is_optional || is_named {
                self.report(QuillError::new(
                    ErrorCode::ParameterOrder,
                    "a variadic parameter cannot be optional or named",
                    start,
                ));
            }
        }

        let id = self.expect_identifier()?;
        let declared_type = if self.match_token(&TokenKind::Colon) {
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        let default = if self.match_token(&TokenKind::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let span = start.merge(self.previous_span());
        Ok(ParamDecl {
            id,
            declared_type,
            default,
            is_optional: is_optional && !is_variadic,
            is_named: is_named && !is_variadic,
            is_variadic,
            span,
        })
    }

    fn push_param(&mut self, params: &mut Vec<ParamDecl>, param: ParamDecl) {
        if params.iter().any(|p| p.id == param.id) {
            self.report(QuillError::new(
                ErrorCode::DuplicateParameter,
                format!("duplicate parameter '{}'", param.id),
                param.span,
            ));
        }
        params.push(param);
    }

    /// `<T, U>` generic parameter list.
    pub(crate) fn parse_generic_params(&mut self) -> ParseResult<Vec<String>> {
        let mut params = Vec::new();
        if self.match_token(&TokenKind::Less) {
            while !self.check(&TokenKind::Greater) && !self.is_at_end() {
                params.push(self.expect_identifier()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Greater)?;
        }
        Ok(params)
    }

    /// `abstract? class Id<T> extends S implements A, B with M { members }`
    pub(crate) fn parse_class_statement(&mut self) -> ParseResult<Stmt> {
        self.parse_class(false)
    }

    pub(crate) fn parse_class(&mut self, is_external: bool) -> ParseResult<Stmt> {
        let start = self.current_span();
        let is_abstract = self.match_token(&TokenKind::Abstract);
        self.expect(&TokenKind::Class)?;
        let id = self.expect_identifier()?;
        let generic_params = self.parse_generic_params()?;

        let super_type = if self.match_token(&TokenKind::Extends) {
            Some(self.parse_type_expr()?)
        } else {
            None
        };

        let mut implements = Vec::new();
        if self.match_token(&TokenKind::Implements) {
            loop {
                implements.push(self.parse_type_expr()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let mut mixes = Vec::new();
        if self.match_token(&TokenKind::With) {
            loop {
                mixes.push(self.parse_type_expr()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.class_ids.push(id.clone());
        let members = self.parse_class_body(is_external);
        self.class_ids.pop();
        let members = members?;

        let span = start.merge(self.previous_span());
        Ok(Stmt::new(
            StmtKind::Class(ClassDecl {
                id,
                generic_params,
                super_type,
                implements,
                mixes,
                is_external,
                is_abstract,
                is_enum: false,
                members,
                span,
            }),
            span,
        ))
    }

    fn parse_class_body(&mut self, class_external: bool) -> ParseResult<Vec<Stmt>> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut members = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            match self.parse_class_member(class_external) {
                Ok(member) => members.push(member),
                Err(err) => {
                    self.report(err);
                    self.advance();
                }
            }
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(members)
    }

    /// One class member: field, method, constructor, factory, getter or
    /// setter, with `static` and `external` modifiers.
    fn parse_class_member(&mut self, class_external: bool) -> ParseResult<Stmt> {
        let start = self.current_span();
        let is_external = self.match_token(&TokenKind::External) || class_external;
        let is_static = self.match_token(&TokenKind::Static);

        match self.peek().kind {
            TokenKind::Var | TokenKind::Final | TokenKind::Const => {
                let mut stmt = self.parse_var_statement()?;
                if let StmtKind::Var(ref mut decl) = stmt.kind {
                    decl.is_static = is_static;
                    decl.is_external = is_external;
                }
                Ok(stmt)
            }
            TokenKind::Fun => {
                self.advance();
                let id = self.expect_identifier()?;
                let decl = self.parse_function_rest(
                    Some(id),
                    FunctionCategory::Method,
                    is_external,
                    is_static,
                    start,
                )?;
                let span = decl.span;
                Ok(Stmt::new(StmtKind::Function(decl), span))
            }
            TokenKind::Construct => {
                self.advance();
                let id = match self.peek().kind.clone() {
                    TokenKind::Identifier(name) => {
                        self.advance();
                        Some(name)
                    }
                    _ => None,
                };
                let decl = self.parse_function_rest(
                    id,
                    FunctionCategory::Constructor,
                    is_external,
                    false,
                    start,
                )?;
                let span = decl.span;
                Ok(Stmt::new(StmtKind::Function(decl), span))
            }
            TokenKind::Factory => {
                self.advance();
                let id = match self.peek().kind.clone() {
                    TokenKind::Identifier(name) => {
                        self.advance();
                        Some(name)
                    }
                    _ => None,
                };
                let decl = self.parse_function_rest(
                    id,
                    FunctionCategory::Factory,
                    is_external,
                    false,
                    start,
                )?;
                let span = decl.span;
                Ok(Stmt::new(StmtKind::Function(decl), span))
            }
            TokenKind::Get => {
                self.advance();
                let id = self.expect_identifier()?;
                let decl = self.parse_function_rest(
                    Some(id),
                    FunctionCategory::Getter,
                    is_external,
                    is_static,
                    start,
                )?;
                let span = decl.span;
                Ok(Stmt::new(StmtKind::Function(decl), span))
            }
            TokenKind::Set => {
                self.advance();
                let id = self.expect_identifier()?;
                let decl = self.parse_function_rest(
                    Some(id),
                    FunctionCategory::Setter,
                    is_external,
                    is_static,
                    start,
                )?;
                let span = decl.span;
                Ok(Stmt::new(StmtKind::Function(decl), span))
            }
            _ => Err(QuillError::unexpected_token(
                "class member",
                &self.peek().kind.describe(),
                self.current_span(),
            )),
        }
    }

    /// `enum E { a, b }`
    pub(crate) fn parse_enum_statement(&mut self) -> ParseResult<Stmt> {
        self.parse_enum(false)
    }

    pub(crate) fn parse_enum(&mut self, is_external: bool) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::Enum)?;
        let id = self.expect_identifier()?;
        self.expect(&TokenKind::LeftBrace)?;

        let mut values = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            values.push(self.expect_identifier()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace)?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(
            StmtKind::Enum(EnumDecl {
                id,
                values,
                is_external,
                span,
            }),
            span,
        ))
    }

    /// `struct S extends P { var a = 1  fun m { … } }` — member
    /// declarations lower to key/value fields.
    pub(crate) fn parse_struct_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::Struct)?;
        let id = self.expect_identifier()?;
        let prototype = if self.match_token(&TokenKind::Extends) {
            Some(self.expect_identifier()?)
        } else {
            None
        };

        self.expect(&TokenKind::LeftBrace)?;
        let mut fields: Vec<(String, Expr)> = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Var | TokenKind::Final => {
                    let stmt = self.parse_var_statement()?;
                    if let StmtKind::Var(decl) = stmt.kind {
                        let value = decl.initializer.unwrap_or(Expr::new(
                            ExprKind::NullLiteral,
                            decl.span,
                        ));
                        fields.push((decl.id, value));
                    }
                }
                TokenKind::Fun => {
                    let member_start = self.current_span();
                    self.advance();
                    let name = self.expect_identifier()?;
                    let decl = self.parse_function_rest(
                        Some(name.clone()),
                        FunctionCategory::Literal,
                        false,
                        false,
                        member_start,
                    )?;
                    let span = decl.span;
                    fields.push((name, Expr::new(ExprKind::FunctionLiteral(Box::new(decl)), span)));
                }
                _ => {
                    return Err(QuillError::unexpected_token(
                        "struct member",
                        &self.peek().kind.describe(),
                        self.current_span(),
                    ))
                }
            }
        }
        self.expect(&TokenKind::RightBrace)?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(
            StmtKind::Struct(StructDecl {
                id,
                prototype,
                fields,
                span,
            }),
            span,
        ))
    }

    /// `type Alias<T> = T`
    pub(crate) fn parse_type_alias(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::TypeAlias)?;
        let id = self.expect_identifier()?;
        let generic_params = self.parse_generic_params()?;
        self.expect(&TokenKind::Equal)?;
        let ty = self.parse_type_expr()?;
        self.match_token(&TokenKind::Semicolon);
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(
            StmtKind::TypeAlias {
                id,
                generic_params,
                ty,
            },
            span,
        ))
    }

    /// `external class …` / `external fun …` / `external enum …`
    pub(crate) fn parse_external_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::External)?;
        match self.peek().kind {
            TokenKind::Class | TokenKind::Abstract => self.parse_class(true),
            TokenKind::Enum => self.parse_enum(true),
            TokenKind::Fun => {
                self.advance();
                let id = self.expect_identifier()?;
                let decl = self.parse_function_rest(
                    Some(id),
                    FunctionCategory::Normal,
                    true,
                    false,
                    start,
                )?;
                let span = decl.span;
                Ok(Stmt::new(StmtKind::Function(decl), span))
            }
            _ => Err(QuillError::new(
                ErrorCode::ExternalConstruct,
                "only classes, functions and enums may be external",
                self.current_span(),
            )),
        }
    }
}
