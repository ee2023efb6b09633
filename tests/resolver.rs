use roxide as lox;

use lox::error::{LoxError, Result};
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::reporter::Reporter;
use lox::resolver::Resolver;
use lox::scanner::Scanner;

fn resolve(source: &str) -> Result<()> {
    let tokens = Scanner::new(source.as_bytes().to_vec())
        .filter_map(std::result::Result::ok)
        .collect();

    let mut reporter = Reporter::new();
    let statements = {
        let mut parser = Parser::new(tokens, &mut reporter);
        parser.parse()
    };
    assert!(!reporter.had_error(), "parse error in: {}", source);

    let mut interpreter = Interpreter::new();
    let mut resolver = Resolver::new(&mut interpreter);

    resolver.resolve(&statements)
}

fn resolve_error(source: &str) -> String {
    match resolve(source) {
        Err(LoxError::Resolve { message, .. }) => message,

        other => panic!("expected a resolve error for: {} ({:?})", source, other),
    }
}

#[test]
fn reading_a_local_in_its_own_initializer_errors() {
    let message = resolve_error("{ var a = 1; { var a = a; } }");
    assert_eq!(message, "Can't read local variable in its own initializer.");
}

#[test]
fn duplicate_declaration_in_same_scope_errors() {
    let message = resolve_error("{ var a = 1; var a = 2; }");
    assert!(message.contains("already declared"));
}

#[test]
fn return_at_top_level_errors() {
    let message = resolve_error("return 1;");
    assert_eq!(message, "Can't return from top-level code.");
}

#[test]
fn returning_a_value_from_an_initializer_errors() {
    let message = resolve_error("class A { init() { return 1; } }");
    assert_eq!(message, "Can't return a value from an initializer.");
}

#[test]
fn bare_return_in_initializer_is_fine() {
    assert!(resolve("class A { init() { return; } }").is_ok());
}

#[test]
fn this_outside_a_class_errors() {
    let message = resolve_error("print this;");
    assert_eq!(message, "Can't use 'this' outside of a class.");
}

#[test]
fn this_in_a_static_method_errors() {
    let message = resolve_error("class A { static make() { return this; } }");
    assert_eq!(message, "Can't use 'this' in a static method.");
}

#[test]
fn this_in_an_instance_method_is_fine() {
    assert!(resolve("class A { get() { return this; } }").is_ok());
}

#[test]
fn super_outside_a_class_errors() {
    let message = resolve_error("print super.x;");
    assert_eq!(message, "Can't use 'super' outside of a class.");
}

#[test]
fn super_without_a_superclass_errors() {
    let message = resolve_error("class A { m() { return super.m(); } }");
    assert_eq!(message, "Can't use 'super' in a class with no superclass.");
}

#[test]
fn super_with_a_superclass_is_fine() {
    assert!(resolve("class A { m() { return 1; } } class B < A { m() { return super.m(); } }").is_ok());
}

#[test]
fn class_inheriting_from_itself_errors() {
    let message = resolve_error("class A < A {}");
    assert_eq!(message, "A class can't inherit from itself.");
}

#[test]
fn break_inside_a_nested_function_escaping_its_loop_errors() {
    // The parser's brace scan finds the enclosing while; the resolver
    // knows function boundaries reset loop context.
    let message = resolve_error("while (true) { fun f() { break; } }");
    assert_eq!(message, "Can't use 'break' outside of a loop.");
}

#[test]
fn a_method_and_a_field_may_share_a_name() {
    assert!(resolve("class A { x = 1; x() { return 2; } }").is_ok());
}

#[test]
fn duplicate_methods_error() {
    let message = resolve_error("class A { m() { return 1; } m() { return 2; } }");
    assert!(message.contains("already declared"));
}

#[test]
fn closures_and_shadowing_resolve() {
    assert!(resolve(
        "var a = \"global\";
         {
           fun show() { print a; }
           show();
           var a = \"shadow\";
           show();
         }"
    )
    .is_ok());
}

#[test]
fn loop_bodies_allow_break_and_continue() {
    assert!(resolve("while (true) { if (1 < 2) break; continue; }").is_ok());
    assert!(resolve("for (var i = 0; i < 3; i = i + 1) { continue; }").is_ok());
}
