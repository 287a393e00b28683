//! Parser tests.

use crate::ast::*;
use crate::error::ErrorCode;
use crate::lexer::Lexer;
use crate::parser::Parser;

fn parse_source(source: &str) -> (Vec<Stmt>, Vec<crate::error::QuillError>) {
    let (tokens, lex_errors) = Lexer::new(source).tokenize();
    assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);
    let mut parser = Parser::new(tokens, SourceKind::Script);
    let stmts = parser.parse();
    (stmts, parser.errors)
}

fn parse_ok(source: &str) -> Vec<Stmt> {
    let (stmts, errors) = parse_source(source);
    assert!(errors.is_empty(), "parse errors: {:?}", errors);
    stmts
}

fn parse_expr(source: &str) -> Expr {
    let stmts = parse_ok(source);
    assert_eq!(stmts.len(), 1);
    match stmts.into_iter().next().unwrap().kind {
        StmtKind::Expression(expr) => expr,
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_precedence_additive_multiplicative() {
    let expr = parse_expr("1 + 2 * 3");
    match expr.kind {
        ExprKind::Binary {
            operator: BinaryOp::Add,
            right,
            ..
        } => match right.kind {
            ExprKind::Binary {
                operator: BinaryOp::Multiply,
                ..
            } => {}
            other => panic!("expected multiplication on the right, got {:?}", other),
        },
        other => panic!("expected addition at the top, got {:?}", other),
    }
}

#[test]
fn test_equality_does_not_chain() {
    let (_, errors) = parse_source("1 == 2 == 3");
    assert!(!errors.is_empty(), "chained equality should not parse");
}

#[test]
fn test_equality_then_logical() {
    let expr = parse_expr("1 == 2 && true");
    assert!(matches!(expr.kind, ExprKind::LogicalAnd { .. }));
}

#[test]
fn test_compound_assignment_lowers() {
    let expr = parse_expr("x += 1");
    match expr.kind {
        ExprKind::Assign { target, value } => {
            assert!(matches!(target.kind, ExprKind::Identifier(ref n) if n == "x"));
            assert!(matches!(
                value.kind,
                ExprKind::Binary {
                    operator: BinaryOp::Add,
                    ..
                }
            ));
        }
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn test_member_compound_assignment_lowers() {
    let expr = parse_expr("a.b *= 2");
    match expr.kind {
        ExprKind::Assign { target, value } => {
            assert!(matches!(target.kind, ExprKind::Member { .. }));
            match value.kind {
                ExprKind::Binary {
                    left,
                    operator: BinaryOp::Multiply,
                    ..
                } => assert!(matches!(left.kind, ExprKind::Member { .. })),
                other => panic!("expected binary value, got {:?}", other),
            }
        }
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn test_increment_lowers_to_assignment() {
    for source in ["x++", "++x"] {
        let expr = parse_expr(source);
        match expr.kind {
            ExprKind::Assign { value, .. } => assert!(matches!(
                value.kind,
                ExprKind::Binary {
                    operator: BinaryOp::Add,
                    ..
                }
            )),
            other => panic!("expected lowered assignment for {}, got {:?}", source, other),
        }
    }
}

#[test]
fn test_invalid_left_value_is_accumulated() {
    let (stmts, errors) = parse_source("1 = 2");
    // Parsing continues past the error.
    assert_eq!(stmts.len(), 1);
    assert!(errors
        .iter()
        .any(|e| e.code == ErrorCode::InvalidLeftValue));
}

#[test]
fn test_interpolation_parses_segments() {
    let expr = parse_expr("'v: ${1 + 2}'");
    match expr.kind {
        ExprKind::Interpolation { pattern, segments } => {
            assert_eq!(pattern, "v: {0}");
            assert_eq!(segments.len(), 1);
            assert!(matches!(segments[0].kind, ExprKind::Binary { .. }));
        }
        other => panic!("expected interpolation, got {:?}", other),
    }
}

#[test]
fn test_interpolation_rejects_statements() {
    let (_, errors) = parse_source("'${var x = 1}'");
    assert!(errors
        .iter()
        .any(|e| e.code == ErrorCode::StringInterpolation));
}

#[test]
fn test_interpolation_rejects_two_expressions() {
    let (_, errors) = parse_source("'${1 2}'");
    assert!(errors
        .iter()
        .any(|e| e.code == ErrorCode::StringInterpolation));
}

#[test]
fn test_function_without_parameter_list() {
    let stmts = parse_ok("fun t { return 1 }");
    match &stmts[0].kind {
        StmtKind::Function(decl) => {
            assert_eq!(decl.id.as_deref(), Some("t"));
            assert!(decl.params.is_empty());
        }
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn test_parameter_groups() {
    let stmts = parse_ok("fun f(a, [b = 2], {c = 3}) => a + b + c");
    match &stmts[0].kind {
        StmtKind::Function(decl) => {
            assert_eq!(decl.params.len(), 3);
            assert!(!decl.params[0].is_optional && !decl.params[0].is_named);
            assert!(decl.params[1].is_optional);
            assert!(decl.params[2].is_named);
            assert_eq!(decl.min_arity(), 1);
            assert_eq!(decl.max_arity(), 2);
            assert!(!decl.is_variadic());
        }
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn test_variadic_parameter_is_terminal() {
    let stmts = parse_ok("fun f(a, ...rest) { }");
    match &stmts[0].kind {
        StmtKind::Function(decl) => {
            assert!(decl.is_variadic());
            assert!(decl.params[1].is_variadic);
        }
        other => panic!("expected function, got {:?}", other),
    }

    let (_, errors) = parse_source("fun f(...rest, b) { }");
    assert!(errors.iter().any(|e| e.code == ErrorCode::ParameterOrder));
}

#[test]
fn test_class_with_redirecting_constructor() {
    let stmts = parse_ok(
        "class B extends A { construct(y) : super(y * 2) { this.y = y } }",
    );
    match &stmts[0].kind {
        StmtKind::Class(decl) => {
            assert_eq!(decl.id, "B");
            assert_eq!(
                decl.super_type.as_ref().and_then(|t| t.nominal_id()),
                Some("A")
            );
            assert!(decl.has_user_constructor());
            match &decl.members[0].kind {
                StmtKind::Function(ctor) => {
                    assert_eq!(ctor.category, FunctionCategory::Constructor);
                    let redirect = ctor.redirecting.as_ref().expect("redirect");
                    assert_eq!(redirect.target, RedirectTarget::Super);
                    assert_eq!(redirect.positional.len(), 1);
                }
                other => panic!("expected constructor, got {:?}", other),
            }
        }
        other => panic!("expected class, got {:?}", other),
    }
}

#[test]
fn test_class_accessors_and_static() {
    let stmts = parse_ok(
        "class C { static var n = 0 get value -> num { return 1 } set value(v) { } }",
    );
    match &stmts[0].kind {
        StmtKind::Class(decl) => {
            assert_eq!(decl.members.len(), 3);
            assert!(matches!(
                &decl.members[0].kind,
                StmtKind::Var(v) if v.is_static
            ));
            assert!(matches!(
                &decl.members[1].kind,
                StmtKind::Function(f) if f.category == FunctionCategory::Getter
            ));
            assert!(matches!(
                &decl.members[2].kind,
                StmtKind::Function(f) if f.category == FunctionCategory::Setter
            ));
        }
        other => panic!("expected class, got {:?}", other),
    }
}

#[test]
fn test_enum_declaration() {
    let stmts = parse_ok("enum E { a, b }");
    match &stmts[0].kind {
        StmtKind::Enum(decl) => {
            assert_eq!(decl.id, "E");
            assert_eq!(decl.values, vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("expected enum, got {:?}", other),
    }
}

#[test]
fn test_struct_declaration_lowers_members() {
    let stmts = parse_ok("struct S extends P { var a = 1 fun m { return 2 } }");
    match &stmts[0].kind {
        StmtKind::Struct(decl) => {
            assert_eq!(decl.prototype.as_deref(), Some("P"));
            assert_eq!(decl.fields.len(), 2);
            assert_eq!(decl.fields[0].0, "a");
            assert!(matches!(
                decl.fields[1].1.kind,
                ExprKind::FunctionLiteral(_)
            ));
        }
        other => panic!("expected struct, got {:?}", other),
    }
}

#[test]
fn test_for_in_and_c_style() {
    let stmts = parse_ok("for (var x in [1, 2]) { } for (var i = 0; i < 3; i++) { }");
    assert!(matches!(stmts[0].kind, StmtKind::ForIn { .. }));
    assert!(matches!(stmts[1].kind, StmtKind::For { .. }));
}

#[test]
fn test_when_statement() {
    let stmts = parse_ok("when (x) { 1 -> { } 2 -> { } else -> { } }");
    match &stmts[0].kind {
        StmtKind::When {
            subject,
            cases,
            else_branch,
        } => {
            assert!(subject.is_some());
            assert_eq!(cases.len(), 2);
            assert!(else_branch.is_some());
        }
        other => panic!("expected when, got {:?}", other),
    }
}

#[test]
fn test_return_outside_function() {
    let (_, errors) = parse_source("return 1");
    assert!(errors.iter().any(|e| e.code == ErrorCode::OutsideReturn));
}

#[test]
fn test_break_outside_loop() {
    let (_, errors) = parse_source("break");
    assert!(errors.iter().any(|e| e.code == ErrorCode::MisplacedBreak));
}

#[test]
fn test_module_kind_rejects_statements() {
    let (tokens, _) = Lexer::new("1 + 2").tokenize();
    let mut parser = Parser::new(tokens, SourceKind::Module);
    parser.parse();
    assert!(!parser.errors.is_empty());
}

#[test]
fn test_is_and_as_operators() {
    let expr = parse_expr("x is! num");
    assert!(matches!(
        expr.kind,
        ExprKind::TypeCheck { negated: true, .. }
    ));
    let expr = parse_expr("x as str");
    assert!(matches!(expr.kind, ExprKind::TypeCast { .. }));
}

#[test]
fn test_arrow_function() {
    let expr = parse_expr("(a, b) => a + b");
    match expr.kind {
        ExprKind::FunctionLiteral(decl) => {
            assert_eq!(decl.params.len(), 2);
            assert!(matches!(decl.body, Some(FunctionBody::Expression(_))));
        }
        other => panic!("expected function literal, got {:?}", other),
    }
}

#[test]
fn test_named_arguments() {
    let expr = parse_expr("f(1, c: 3)");
    match expr.kind {
        ExprKind::Call {
            positional, named, ..
        } => {
            assert_eq!(positional.len(), 1);
            assert_eq!(named.len(), 1);
            assert_eq!(named[0].0, "c");
        }
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn test_ternary_and_if_expression() {
    assert!(matches!(
        parse_expr("a ? 1 : 2").kind,
        ExprKind::Ternary { .. }
    ));
    assert!(matches!(
        parse_expr("if (a) 1 else 2").kind,
        ExprKind::Ternary { .. }
    ));
}

#[test]
fn test_import_and_library() {
    let stmts = parse_ok("library 'tools' import 'util.ql' import 'm.ql' as m");
    assert!(matches!(stmts[0].kind, StmtKind::Library { .. }));
    assert!(matches!(
        &stmts[1].kind,
        StmtKind::Import(decl) if decl.alias.is_none()
    ));
    assert!(matches!(
        &stmts[2].kind,
        StmtKind::Import(decl) if decl.alias.as_deref() == Some("m")
    ));
}

#[test]
fn test_type_alias() {
    let stmts = parse_ok("type Predicate = (any) -> bool");
    assert!(matches!(stmts[0].kind, StmtKind::TypeAlias { .. }));
}
