use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use roxide as lox;

use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::reporter::Reporter;
use lox::resolver::Resolver;
use lox::scanner::Scanner;

/// Writer handle the tests keep a clone of, so output survives the
/// interpreter taking ownership of its writer.
#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("print output is UTF-8")
    }
}

struct Outcome {
    output: String,
    had_error: bool,
    had_runtime_error: bool,
}

/// Drive the full pipeline the way the CLI does, capturing stdout.
fn run(source: &str) -> Outcome {
    let buffer = SharedBuffer::default();
    let mut interpreter = Interpreter::with_writer(Box::new(buffer.clone()));
    let mut reporter = Reporter::new();

    let tokens = Scanner::new(source.as_bytes().to_vec())
        .filter_map(|result| match result {
            Ok(token) => Some(token),

            Err(err) => {
                reporter.error(&err);
                None
            }
        })
        .collect::<Vec<_>>();

    let statements = {
        let mut parser = Parser::new(tokens, &mut reporter);
        parser.parse()
    };

    if !reporter.had_error() {
        let resolved = {
            let mut resolver = Resolver::new(&mut interpreter);
            resolver.resolve(&statements)
        };

        match resolved {
            Ok(()) => interpreter.interpret(&statements, &mut reporter),

            Err(err) => reporter.error(&err),
        }
    }

    Outcome {
        output: buffer.contents(),
        had_error: reporter.had_error(),
        had_runtime_error: reporter.had_runtime_error(),
    }
}

fn run_ok(source: &str) -> String {
    let outcome = run(source);

    assert!(!outcome.had_error, "compile error in: {}", source);
    assert!(!outcome.had_runtime_error, "runtime error in: {}", source);

    outcome.output
}

fn run_runtime_error(source: &str) -> String {
    let outcome = run(source);

    assert!(!outcome.had_error, "compile error in: {}", source);
    assert!(
        outcome.had_runtime_error,
        "expected a runtime error in: {}",
        source
    );

    outcome.output
}

// ─────────────────────────────────────────────────────────────────────
// Spec scenarios
// ─────────────────────────────────────────────────────────────────────

#[test]
fn arithmetic_precedence() {
    assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
}

#[test]
fn string_concatenation_coerces_numbers() {
    assert_eq!(run_ok("var a = \"hi\"; var b = 2; print a + b;"), "hi2\n");
    assert_eq!(run_ok("print 1 + \"x\";"), "1x\n");
}

#[test]
fn continue_in_a_for_loop_still_increments() {
    let source = "for (var i = 0; i < 3; i = i + 1) { if (i == 1) continue; print i; }";
    assert_eq!(run_ok(source), "0\n2\n");
}

#[test]
fn class_with_initializer_and_method() {
    let source = "class A { init(x) { this.x = x; } get() { return this.x; } }
                  var a = new A(5);
                  print a.get();";
    assert_eq!(run_ok(source), "5\n");
}

#[test]
fn subclass_dispatches_through_super() {
    let source = "class A { init(x) { this.x = x; } get() { return this.x; } }
                  class B < A { get() { return super.get() + 1; } }
                  print new B(10).get();";
    assert_eq!(run_ok(source), "11\n");
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    assert_eq!(run_runtime_error("print 1/0;"), "");
}

#[test]
fn empty_program_produces_no_output() {
    assert_eq!(run_ok(""), "");
}

// ─────────────────────────────────────────────────────────────────────
// Operator semantics
// ─────────────────────────────────────────────────────────────────────

#[test]
fn logical_operators_return_the_deciding_operand() {
    assert_eq!(run_ok("print \"a\" or \"b\";"), "a\n");
    assert_eq!(run_ok("print nil or \"b\";"), "b\n");
    assert_eq!(run_ok("print nil and 2;"), "nil\n");
    assert_eq!(run_ok("print 1 and 2;"), "2\n");
    assert_eq!(run_ok("print false or false;"), "false\n");
}

#[test]
fn truthiness_follows_nil_and_false_only() {
    assert_eq!(run_ok("print !nil;"), "true\n");
    assert_eq!(run_ok("print !false;"), "true\n");
    assert_eq!(run_ok("print !0;"), "false\n");
    assert_eq!(run_ok("print !\"\";"), "false\n");
}

#[test]
fn modulo_uses_fmod_semantics() {
    assert_eq!(run_ok("print 7 % 3;"), "1\n");
    assert_eq!(run_ok("print 10 % 3.5;"), "3\n");
    assert_eq!(run_ok("print -7 % 3;"), "-1\n");
}

#[test]
fn equality_is_structural_for_primitives() {
    assert_eq!(run_ok("print 1 == 1;"), "true\n");
    assert_eq!(run_ok("print \"a\" == \"a\";"), "true\n");
    assert_eq!(run_ok("print nil == nil;"), "true\n");
    assert_eq!(run_ok("print 1 == \"1\";"), "false\n");
    assert_eq!(run_ok("print 1 != 2;"), "true\n");
}

#[test]
fn instances_compare_by_identity() {
    let source = "class A {}
                  var a = new A();
                  var b = new A();
                  print a == a;
                  print a == b;";
    assert_eq!(run_ok(source), "true\nfalse\n");
}

#[test]
fn comparisons_require_numbers() {
    run_runtime_error("print 1 < \"2\";");
    run_runtime_error("print -\"x\";");
}

#[test]
fn number_printing_drops_integral_fractions() {
    assert_eq!(run_ok("print 2.5 + 0.5;"), "3\n");
    assert_eq!(run_ok("print 2.75;"), "2.75\n");
}

// ─────────────────────────────────────────────────────────────────────
// Variables, scoping, and closures
// ─────────────────────────────────────────────────────────────────────

#[test]
fn uninitialized_variables_error_on_read() {
    run_runtime_error("var x; print x;");
}

#[test]
fn nil_initialized_variables_read_fine() {
    assert_eq!(run_ok("var x = nil; print x;"), "nil\n");
}

#[test]
fn undefined_variable_is_a_runtime_error() {
    run_runtime_error("print missing;");
}

#[test]
fn assignment_returns_the_assigned_value() {
    assert_eq!(run_ok("var x = 1; print x = 2;"), "2\n");
}

#[test]
fn compound_assignment_and_increment() {
    assert_eq!(run_ok("var x = 1; x += 2; print x;"), "3\n");
    assert_eq!(run_ok("var x = 5; x -= 2; print x;"), "3\n");
    assert_eq!(run_ok("var x = 1; x++; print x;"), "2\n");
    assert_eq!(run_ok("var x = 1; x--; print x;"), "0\n");
}

#[test]
fn block_scoping_shadows_and_restores() {
    let source = "var a = \"outer\";
                  {
                    var a = \"inner\";
                    print a;
                  }
                  print a;";
    assert_eq!(run_ok(source), "inner\nouter\n");
}

#[test]
fn closures_capture_their_defining_environment() {
    let source = "fun makeCounter() {
                    var i = 0;
                    fun count() { i = i + 1; print i; }
                    return count;
                  }
                  var counter = makeCounter();
                  counter();
                  counter();";
    assert_eq!(run_ok(source), "1\n2\n");
}

#[test]
fn closures_share_a_captured_loop_variable() {
    let source = "var f;
                  for (var i = 0; i < 3; i = i + 1) {
                    if (i == 1) {
                      fun capture() { print i; }
                      f = capture;
                    }
                  }
                  f();";
    // One environment holds i, so the closure sees its final value.
    assert_eq!(run_ok(source), "3\n");
}

#[test]
fn function_identity_round_trips_through_calls() {
    assert_eq!(run_ok("fun id(x) { return x; } print id(42);"), "42\n");
    assert_eq!(run_ok("fun id(x) { return x; } print id(\"v\");"), "v\n");
    assert_eq!(run_ok("fun id(x) { return x; } print id(nil);"), "nil\n");
}

#[test]
fn recursion_through_global_bindings() {
    let source = "fun fib(n) {
                    if (n < 2) return n;
                    return fib(n - 1) + fib(n - 2);
                  }
                  print fib(10);";
    assert_eq!(run_ok(source), "55\n");
}

#[test]
fn functions_without_return_yield_nil() {
    assert_eq!(run_ok("fun noop() {} print noop();"), "nil\n");
}

// ─────────────────────────────────────────────────────────────────────
// Control flow
// ─────────────────────────────────────────────────────────────────────

#[test]
fn while_loop_runs_to_completion() {
    let source = "var i = 0; while (i < 3) { print i; i = i + 1; }";
    assert_eq!(run_ok(source), "0\n1\n2\n");
}

#[test]
fn break_unwinds_exactly_to_the_enclosing_loop() {
    let source = "var i = 0;
                  while (true) {
                    if (i == 2) break;
                    print i;
                    i = i + 1;
                  }
                  print \"done\";";
    assert_eq!(run_ok(source), "0\n1\ndone\n");
}

#[test]
fn break_from_a_nested_block_still_exits_the_loop() {
    let source = "var i = 0;
                  while (i < 5) {
                    {
                      if (i == 1) break;
                    }
                    print i;
                    i = i + 1;
                  }";
    assert_eq!(run_ok(source), "0\n");
}

#[test]
fn inner_loop_break_leaves_the_outer_loop_running() {
    let source = "for (var i = 0; i < 2; i = i + 1) {
                    for (var j = 0; j < 5; j = j + 1) {
                      if (j == 1) break;
                      print i + j;
                    }
                  }";
    assert_eq!(run_ok(source), "0\n1\n");
}

#[test]
fn continue_in_a_while_skips_to_the_condition() {
    let source = "var i = 0;
                  while (i < 4) {
                    i = i + 1;
                    if (i == 2) continue;
                    print i;
                  }";
    assert_eq!(run_ok(source), "1\n3\n4\n");
}

#[test]
fn if_else_branches() {
    assert_eq!(run_ok("if (1 < 2) print \"yes\"; else print \"no\";"), "yes\n");
    assert_eq!(run_ok("if (nil) print \"yes\"; else print \"no\";"), "no\n");
}

// ─────────────────────────────────────────────────────────────────────
// Classes
// ─────────────────────────────────────────────────────────────────────

#[test]
fn fields_and_sets_on_instances() {
    let source = "class Box {}
                  var b = new Box();
                  b.value = 7;
                  print b.value;";
    assert_eq!(run_ok(source), "7\n");
}

#[test]
fn class_fields_seed_each_instance_separately() {
    let source = "class Counter {
                    count = 0;
                    bump() { this.count += 1; return this.count; }
                  }
                  var a = new Counter();
                  var b = new Counter();
                  print a.bump();
                  print a.bump();
                  print b.bump();";
    assert_eq!(run_ok(source), "1\n2\n1\n");
}

#[test]
fn undefined_field_is_a_runtime_error() {
    run_runtime_error("class A {} var a = new A(); print a.missing;");
}

#[test]
fn undefined_method_is_a_runtime_error() {
    run_runtime_error("class A {} var a = new A(); a.missing();");
}

#[test]
fn static_method_call_on_the_class() {
    let source = "class Math { static square(n) { return n * n; } }
                  print Math.square(4);";
    assert_eq!(run_ok(source), "16\n");
}

#[test]
fn static_methods_are_not_reachable_through_instances() {
    let source = "class Math { static square(n) { return n * n; } }
                  var m = new Math();
                  m.square(4);";
    run_runtime_error(source);
}

#[test]
fn inherited_methods_dispatch_through_the_chain() {
    let source = "class A { speak() { return \"A\"; } }
                  class B < A {}
                  print new B().speak();";
    assert_eq!(run_ok(source), "A\n");
}

#[test]
fn initializers_return_the_instance() {
    let source = "class A { init() { this.x = 1; } }
                  var a = new A();
                  print a.x;";
    assert_eq!(run_ok(source), "1\n");
}

#[test]
fn superclass_must_be_a_class() {
    run_runtime_error("var NotAClass = 1; class A < NotAClass {}");
}

#[test]
fn calling_a_class_alias_without_new_is_a_runtime_error() {
    let source = "class A {}
                  fun pick(c) { return c(); }
                  pick(A);";
    run_runtime_error(source);
}

#[test]
fn arity_mismatch_names_the_callable() {
    let outcome = run("fun f(a) { return a; } f(1, 2);");
    assert!(outcome.had_runtime_error);
}

#[test]
fn calling_a_non_callable_is_a_runtime_error() {
    run_runtime_error("var x = 1; x();");
}

// ─────────────────────────────────────────────────────────────────────
// Pipeline behavior
// ─────────────────────────────────────────────────────────────────────

#[test]
fn runtime_errors_stop_at_the_failing_statement() {
    let outcome = run("print 1; print 1/0; print 2;");

    assert!(outcome.had_runtime_error);
    assert_eq!(outcome.output, "1\n");
}

#[test]
fn parse_errors_suppress_interpretation() {
    let outcome = run("print 1; var = ;");

    assert!(outcome.had_error);
    assert_eq!(outcome.output, "");
}

#[test]
fn clock_is_seeded_into_globals() {
    assert_eq!(run_ok("print clock() >= 0;"), "true\n");
}
