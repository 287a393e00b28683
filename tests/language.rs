//! End-to-end language tests: each scenario goes through the whole
//! pipeline (lex → parse → compile → VM) via the embedding facade.

use indexmap::IndexMap;

use quill_script::error::ErrorCode;
use quill_script::runtime::Value;
use quill_script::Quill;

fn eval(source: &str) -> Value {
    Quill::new()
        .eval(source)
        .unwrap_or_else(|err| panic!("eval failed: {}", err.report()))
}

fn eval_err(source: &str) -> quill_script::error::QuillError {
    match Quill::new().eval(source) {
        Ok(value) => panic!("expected an error, got {}", value.to_display()),
        Err(err) => err,
    }
}

fn assert_int(source: &str, expected: i64) {
    match eval(source) {
        Value::Int(n) => assert_eq!(n, expected, "source: {}", source),
        other => panic!("expected int, got {} (source: {})", other.to_display(), source),
    }
}

fn assert_str(source: &str, expected: &str) {
    match eval(source) {
        Value::Str(s) => assert_eq!(s, expected, "source: {}", source),
        other => panic!("expected str, got {} (source: {})", other.to_display(), source),
    }
}

fn assert_bool(source: &str, expected: bool) {
    match eval(source) {
        Value::Bool(b) => assert_eq!(b, expected, "source: {}", source),
        other => panic!("expected bool, got {} (source: {})", other.to_display(), source),
    }
}

// ===== Expressions =====

#[test]
fn test_arithmetic_precedence() {
    assert_int("1 + 2 * 3", 7);
    assert_int("(1 + 2) * 3", 9);
    assert_int("10 - 2 - 3", 5);
    assert_int("7 % 4", 3);
}

#[test]
fn test_division_yields_float() {
    match eval("10 / 4") {
        Value::Float(f) => assert_eq!(f, 2.5),
        other => panic!("expected float, got {}", other.to_display()),
    }
}

#[test]
fn test_comparisons_and_equality() {
    assert_bool("1 < 2", true);
    assert_bool("2 <= 2", true);
    assert_bool("3 > 4", false);
    assert_bool("1 == 1.0", true);
    assert_bool("'a' != 'b'", true);
}

#[test]
fn test_ternary_and_if_expression() {
    assert_int("true ? 1 : 2", 1);
    assert_int("false ? 1 : 2", 2);
    assert_int("if (1 < 2) 10 else 20", 10);
}

#[test]
fn test_string_interpolation() {
    assert_str("var x = 6\n'${x} * 7 = ${x * 7}'", "6 * 7 = 42");
    assert_str("'no segments'", "no segments");
}

#[test]
fn test_typeof_is_as() {
    assert_bool("1 is num", true);
    assert_bool("1 is float", false);
    assert_bool("1 is! str", true);
    assert_bool("null is str?", true);
    assert_str("(typeof 1).toString()", "int");
    match eval("1 as float") {
        Value::Float(f) => assert_eq!(f, 1.0),
        other => panic!("expected float, got {}", other.to_display()),
    }
    assert_eq!(eval_err("'x' as num").code, ErrorCode::TypeCast);
}

// ===== Statements & control flow =====

#[test]
fn test_variables_and_scoping() {
    // A declaration shadows outer declarations for its scope only.
    assert_int("var x = 1\n{ var x = 2 }\nx", 1);
    assert_int("var x = 1\n{ x = 2 }\nx", 2);
}

#[test]
fn test_immutable_assignment_fails() {
    assert_eq!(eval_err("final x = 1\nx = 2").code, ErrorCode::Immutable);
}

#[test]
fn test_while_loop() {
    assert_int("var n = 0\nwhile (n < 5) { n = n + 1 }\nn", 5);
}

#[test]
fn test_do_while_runs_once() {
    assert_int("var n = 0\ndo { n = n + 1 } while (false)\nn", 1);
}

#[test]
fn test_c_style_for() {
    assert_int("var s = 0\nfor (var i = 0; i < 4; i++) { s = s + i }\ns", 6);
}

#[test]
fn test_for_loop_variable_is_per_iteration() {
    // Writes to the body copy do not drive the loop header.
    assert_int(
        "var c = 0\nfor (var i = 0; i < 3; i++) { i = 99\nc = c + 1 }\nc",
        3,
    );
}

#[test]
fn test_break_and_continue() {
    assert_int(
        "var s = 0\nfor (var i = 0; i < 10; i++) { if (i == 3) { break }\ns = s + i }\ns",
        3,
    );
    assert_int(
        "var s = 0\nfor (var i = 0; i < 5; i++) { if (i == 2) { continue }\ns = s + i }\ns",
        8,
    );
}

#[test]
fn test_when_statement() {
    let source = "\
var x = 2
var out = 0
when (x) {
  1 -> { out = 10 }
  2 -> { out = 20 }
  else -> { out = 30 }
}
out";
    assert_int(source, 20);

    let source = "\
var out = 0
when (9) {
  1 -> { out = 10 }
  else -> { out = 30 }
}
out";
    assert_int(source, 30);
}

#[test]
fn test_when_without_subject() {
    let source = "\
var x = 7
var out = 0
when {
  x < 5 -> { out = 1 }
  x < 10 -> { out = 2 }
  else -> { out = 3 }
}
out";
    assert_int(source, 2);
}

#[test]
fn test_compound_assignment_and_increment() {
    assert_int("var x = 10\nx += 5\nx -= 3\nx *= 2\nx", 24);
    assert_int("var x = 1\nx++;\n++x;\nx", 3);
    assert_int("var s = { n: 1 }\ns.n += 4\ns.n", 5);
}

// ===== Functions =====

#[test]
fn test_function_declaration_and_call() {
    assert_int("fun add(a, b) => a + b\nadd(2, 3)", 5);
    assert_int("fun f { return 9 }\nf()", 9);
}

#[test]
fn test_closures_capture_definition_scope() {
    let source = "\
fun counter {
  var n = 0
  return fun () { n = n + 1\nreturn n }
}
var c = counter()
c()
c()
c()";
    assert_int(source, 3);
}

#[test]
fn test_arrow_function_and_higher_order() {
    assert_int("fun apply(f, x) => f(x)\napply((n) => n * 2, 21)", 42);
}

#[test]
fn test_recursion() {
    assert_int(
        "fun fib(n) { if (n < 2) { return n }\nreturn fib(n - 1) + fib(n - 2) }\nfib(10)",
        55,
    );
}

#[test]
fn test_variadic_packing() {
    let source = "\
fun count(first, ...rest) => rest.length
count(1, 2, 3, 4)";
    assert_int(source, 3);
}

// Scenario: named + optional arguments.
#[test]
fn test_named_and_optional_arguments() {
    let prelude = "fun f(a, [b = 2], {c = 3}) => a + b + c\n";
    assert_int(&format!("{}f(10)", prelude), 15);
    assert_int(&format!("{}f(10, 20)", prelude), 25);
    assert_int(&format!("{}f(10, 20, c: 30)", prelude), 60);
    let err = eval_err(&format!("{}f(10, 20, 30, 40)", prelude));
    assert_eq!(err.code, ErrorCode::Arity);
}

#[test]
fn test_arity_bounds() {
    let err = eval_err("fun f(a, b) { }\nf(1)");
    assert_eq!(err.code, ErrorCode::Arity);
    let err = eval_err("fun f(a) { }\nf(1, 2)");
    assert_eq!(err.code, ErrorCode::Arity);
    let err = eval_err("fun f(a) { }\nf(nope: 1)");
    assert_eq!(err.code, ErrorCode::NamedArg);
}

#[test]
fn test_short_circuit_evaluates_side_effect_once() {
    let source = "\
var n = 0
fun bump { n = n + 1\nreturn true }
bump() || true
n";
    assert_int(source, 1);

    let source = "\
var n = 0
fun bump { n = n + 1\nreturn false }
bump() && false
n";
    assert_int(source, 1);

    // The right operand is not evaluated on short-circuit.
    let source = "\
var n = 0
fun bump { n = n + 1\nreturn true }
true || bump()
false && bump()
n";
    assert_int(source, 0);
}

// ===== Lists & for-in =====

#[test]
fn test_list_members() {
    assert_int("[1, 2, 3].length", 3);
    assert_bool("[].isEmpty", true);
    assert_bool("[1].isNotEmpty", true);
    assert_int("[5, 6, 7].elementAt(1)", 6);
    assert_int("var l = [1]\nl.add(2, 3)\nl.length", 3);
    assert_str("['a', 'b'].join('-')", "a-b");
    assert_int("[4, 5][1]", 5);
    assert_eq!(eval_err("[1][5]").code, ErrorCode::OutOfRange);
}

// Scenario: for-in lowering.
#[test]
fn test_for_in_over_list() {
    assert_int(
        "var s = 0\nfor (var x in [1, 2, 3, 4]) { s = s + x }\ns",
        10,
    );
    // Empty iterables never enter the body.
    assert_int("var s = 0\nfor (var x in []) { s = s + 1 }\ns", 0);
}

#[test]
fn test_for_in_over_string() {
    assert_int("var n = 0\nfor (var c in 'abc') { n = n + 1 }\nn", 3);
}

// ===== Structs =====

// Scenario: basic struct.
#[test]
fn test_basic_struct_to_string() {
    let source = "fun t { var f = { value: 42, greeting: 'hi!' }; f.value = 'ha!'; \
                  f.world = 'everything'; return f.toString() }";
    let mut quill = Quill::new();
    let value = quill
        .eval_with(source, Some("t"), Vec::new(), IndexMap::new())
        .unwrap_or_else(|err| panic!("{}", err.report()));
    assert_eq!(
        value.to_display(),
        "{\n  value: ha!,\n  greeting: hi!,\n  world: everything\n}"
    );
}

#[test]
fn test_struct_prototype_chain() {
    let source = "\
struct P { var greeting = 'hi' }
struct S extends P { var own = 1 }
var s = S()
s.greeting";
    assert_str(source, "hi");
}

#[test]
fn test_struct_write_targets_receiver() {
    let source = "\
struct P { var greeting = 'hi' }
var a = P()
var b = P()
a.greeting = 'yo'
b.greeting";
    assert_str(source, "hi");
}

#[test]
fn test_struct_write_creates_keys() {
    assert_bool(
        "var s = { a: 1 }\ns.b = 2\ns.containsKey('b')",
        true,
    );
    assert_int("var s = { a: 1 }\ns['a']", 1);
}

#[test]
fn test_struct_methods() {
    let source = "\
var s = { n: 3 }
struct Tools { fun twice(x) => x * 2 }
var t = Tools()
t.twice(s.n)";
    assert_int(source, 6);
}

// ===== Classes =====

#[test]
fn test_class_fields_and_methods() {
    let source = "\
class Point {
  var x = 0
  var y = 0
  fun sum => x + y
}
var p = Point()
p.x = 3
p.y = 4
p.sum()";
    assert_int(source, 7);
}

#[test]
fn test_constructor_creates_fields() {
    let source = "\
class A {
  construct(x) { this.x = x }
}
A(41).x";
    assert_int(source, 41);
}

// Scenario: inheritance and super call.
#[test]
fn test_inheritance_and_redirecting_constructor() {
    let source = "\
class A {
  construct(x) { this.x = x }
}
class B extends A {
  construct(y) : super(y * 2) { this.y = y }
}
";
    assert_int(&format!("{}B(3).x", source), 6);
    assert_int(&format!("{}B(3).y", source), 3);
}

#[test]
fn test_method_inheritance_and_override() {
    let source = "\
class A {
  fun hello => 'A'
  fun tag => 'tag'
}
class B extends A {
  fun hello => 'B'
}
var b = B()
b.hello() + b.tag()";
    assert_str(source, "Btag");
}

#[test]
fn test_super_method_dispatch() {
    let source = "\
class A {
  fun name => 'A'
}
class B extends A {
  fun name => 'B'
  fun parent => super.name()
}
B().parent()";
    assert_str(source, "A");
}

#[test]
fn test_static_members_are_lazy() {
    let source = "\
class Config {
  static var level = 2 * 21
}
Config.level";
    assert_int(source, 42);
}

#[test]
fn test_getters_and_setters() {
    let source = "\
class Box {
  var _v = 0
  get value -> num { return _v }
  set value(n) { _v = n }
}
var b = Box()
b.value = 5
b.value + 1";
    assert_int(source, 6);
}

#[test]
fn test_named_constructor() {
    let source = "\
class Vec {
  var x = 0
  construct(x) { this.x = x }
  construct origin() { this.x = 0 }
}
Vec.origin().x + Vec(9).x";
    assert_int(source, 9);
}

#[test]
fn test_abstract_class_cannot_instantiate() {
    let err = eval_err("abstract class A { }\nA()");
    assert_eq!(err.code, ErrorCode::AbstractClass);
}

#[test]
fn test_private_member_access_is_rejected() {
    let err = eval_err("class C { var _secret = 1 }\nC()._secret");
    assert_eq!(err.code, ErrorCode::PrivateMember);
}

#[test]
fn test_instance_type_checks() {
    let source = "\
class A { }
class B extends A { }
var b = B()
b is A";
    assert_bool(source, true);
}

// ===== Enums =====

// Scenario: enum lowering.
#[test]
fn test_enum_lowering() {
    assert_int("enum E { a, b }\nE.values.length", 2);
    assert_str("enum E { a, b }\nE.a.toString()", "E.a");
    assert_str("enum Color { red, green, blue }\nColor.blue.toString()", "Color.blue");
}

#[test]
fn test_enum_identity() {
    assert_bool("enum E { a, b }\nE.a == E.a", true);
    assert_bool("enum E { a, b }\nE.a == E.b", false);
    assert_bool("enum E { a }\nE.values.elementAt(0) == E.a", true);
}

// ===== Errors =====

// Scenario: string interpolation segment must be one expression.
#[test]
fn test_interpolation_error() {
    let err = eval_err("'${var x = 1}'");
    assert_eq!(err.code, ErrorCode::StringInterpolation);
    // Reported at the segment offset.
    assert!(err.span.offset > 0);
}

#[test]
fn test_undefined_symbol() {
    assert_eq!(eval_err("missing + 1").code, ErrorCode::Undefined);
}

#[test]
fn test_null_member_access() {
    assert_eq!(eval_err("var x = null\nx.y").code, ErrorCode::NullObject);
}

#[test]
fn test_not_callable() {
    assert_eq!(eval_err("var x = 1\nx()").code, ErrorCode::NotCallable);
}

#[test]
fn test_error_carries_stack_trace() {
    let err = eval_err("fun inner { missing }\nfun outer { inner() }\nouter()");
    assert_eq!(err.code, ErrorCode::Undefined);
    let report = err.report();
    assert!(report.contains("inner"), "report: {}", report);
    assert!(report.contains("outer"), "report: {}", report);
}

// ===== Bytecode roundtrip =====

#[test]
fn test_compile_then_load_bytecode() {
    let mut quill = Quill::new();
    let bytes = quill.compile("fun six => 6\nsix() * 7").unwrap();
    // Header: signature opcode + the 4 signature bytes.
    assert_eq!(&bytes[..5], &[0, 8, 5, 20, 21]);
    let value = quill.load_bytecode(&bytes).unwrap();
    assert!(matches!(value, Value::Int(42)));
}

#[test]
fn test_bad_signature_is_rejected() {
    let mut quill = Quill::new();
    let mut bytes = quill.compile("1").unwrap();
    bytes[2] = 77;
    let err = quill.load_bytecode(&bytes).unwrap_err();
    assert_eq!(err.code, ErrorCode::BytecodeSignature);
}

// ===== Embedding =====

#[test]
fn test_invoke_with_named_arguments() {
    let mut quill = Quill::new();
    quill
        .eval("fun greet(name, {greeting = 'hello'}) => '${greeting}, ${name}'")
        .unwrap();
    let mut named = IndexMap::new();
    named.insert("greeting".to_string(), Value::Str("hey".to_string()));
    let value = quill
        .invoke("greet", vec![Value::Str("quill".to_string())], named)
        .unwrap();
    assert_eq!(value.to_display(), "hey, quill");
}

#[test]
fn test_state_persists_across_evals() {
    let mut quill = Quill::new();
    quill.eval("fun double(n) => n * 2").unwrap();
    let value = quill.eval("double(21)").unwrap();
    assert!(matches!(value, Value::Int(42)));
}

#[test]
fn test_external_function_binding() {
    use quill_script::runtime::ExternFunction;
    use quill_script::InitOptions;

    let mut quill = Quill::new();
    quill
        .init(InitOptions {
            external_functions: vec![(
                "host_add".to_string(),
                ExternFunction::positional(|args| match (args.first(), args.get(1)) {
                    (Some(Value::Int(a)), Some(Value::Int(b))) => Ok(Value::Int(a + b)),
                    _ => Err("expected two ints".to_string()),
                }),
            )],
            ..Default::default()
        })
        .unwrap();
    let value = quill
        .eval("external fun host_add(a, b)\nhost_add(20, 22)")
        .unwrap();
    assert!(matches!(value, Value::Int(42)));
}

#[test]
fn test_preinclude_defines_globals() {
    use quill_script::InitOptions;

    let mut quill = Quill::new();
    quill
        .init(InitOptions {
            preincludes: vec![(
                "core.ql".to_string(),
                "fun clamp(v, lo, hi) => v < lo ? lo : (v > hi ? hi : v)".to_string(),
            )],
            ..Default::default()
        })
        .unwrap();
    let value = quill.eval("clamp(99, 0, 10)").unwrap();
    assert!(matches!(value, Value::Int(10)));
}

#[test]
fn test_imports_through_memory_resolver() {
    use quill_script::module::MemorySourceResolver;

    let mut resolver = MemorySourceResolver::new();
    resolver.add("util.ql", "fun triple(n) => n * 3");
    let mut quill = Quill::with_resolver(Box::new(resolver));
    let value = quill.eval("import 'util.ql'\ntriple(14)").unwrap();
    assert!(matches!(value, Value::Int(42)));
}

#[test]
fn test_import_alias_binds_namespace_object() {
    use quill_script::module::MemorySourceResolver;

    let mut resolver = MemorySourceResolver::new();
    resolver.add("mathx.ql", "var pi = 3\nfun square(n) => n * n");
    let mut quill = Quill::with_resolver(Box::new(resolver));
    let value = quill
        .eval("import 'mathx.ql' as mathx\nmathx.square(6) + mathx.pi")
        .unwrap();
    assert!(matches!(value, Value::Int(39)));
}

#[test]
fn test_missing_import_is_source_provider_error() {
    use quill_script::module::MemorySourceResolver;

    let mut quill = Quill::with_resolver(Box::new(MemorySourceResolver::new()));
    let err = quill.eval("import 'nowhere.ql'").unwrap_err();
    assert_eq!(err.code, ErrorCode::SourceProviderError);
}

#[test]
fn test_type_alias_in_checks() {
    assert_bool("type Num = num\n1 is Num", true);
}

#[test]
fn test_library_declaration_parses() {
    assert_int("library 'tools'\nvar x = 1\nx", 1);
}
