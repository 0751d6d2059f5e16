//! End-to-end scenarios driven through the full pipeline, with program
//! output captured in a buffer.

use lox::Lox;

/// Run a source string in script mode and collect output plus error flags.
fn run_source(source: &str) -> (String, bool, bool) {
    let mut output: Vec<u8> = Vec::new();
    let mut driver = Lox::new(&mut output);

    driver.run(source, false);

    let had_error = driver.had_error();
    let had_runtime_error = driver.had_runtime_error();
    drop(driver);

    let output = String::from_utf8(output).expect("program output is UTF-8");
    (output, had_error, had_runtime_error)
}

fn assert_output(source: &str, expected: &str) {
    let (output, had_error, had_runtime_error) = run_source(source);
    assert!(!had_error, "unexpected compile error in {:?}", source);
    assert!(
        !had_runtime_error,
        "unexpected runtime error in {:?}",
        source
    );
    assert_eq!(output, expected, "wrong output for {:?}", source);
}

fn assert_compile_error(source: &str) {
    let (_, had_error, _) = run_source(source);
    assert!(had_error, "expected a compile error in {:?}", source);
}

fn assert_runtime_error(source: &str) {
    let (_, had_error, had_runtime_error) = run_source(source);
    assert!(!had_error, "unexpected compile error in {:?}", source);
    assert!(
        had_runtime_error,
        "expected a runtime error in {:?}",
        source
    );
}

#[test]
fn arithmetic() {
    assert_output("print 1 + 2;", "3\n");
    assert_output("print 2 + 3 * 4;", "14\n");
    assert_output("print (2 + 3) * 4;", "20\n");
    assert_output("print 7 / 2;", "3.5\n");
    assert_output("print -3 + 1;", "-2\n");
}

#[test]
fn string_concatenation() {
    assert_output(
        "var a = \"hi\"; var b = \"!\"; print a .. b;",
        "\"hi!\"\n",
    );
}

#[test]
fn if_then_else_end() {
    assert_output(
        "var x = 10; if x > 5 then print \"big\"; else print \"small\"; end",
        "\"big\"\n",
    );
    assert_output(
        "var x = 2; if x > 5 then print \"big\"; else print \"small\"; end",
        "\"small\"\n",
    );
    assert_output("if true then print 1; end", "1\n");
}

#[test]
fn closures_share_their_defining_scope() {
    let source = "
        func make() {
            var i = 0;
            func inc() {
                i = i + 1;
                return i;
            }
            return inc;
        }
        var c = make();
        print c();
        print c();
    ";
    assert_output(source, "1\n2\n");
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    assert_runtime_error("print 1 / 0;");
}

#[test]
fn block_scoping_and_shadowing() {
    assert_output(
        "{ var a = 1; { var a = 2; print a; } print a; }",
        "2\n1\n",
    );
}

#[test]
fn return_at_top_level_is_a_compile_error() {
    assert_compile_error("return 1;");
}

#[test]
fn while_loop() {
    let source = "
        var i = 0;
        var sum = 0;
        while i < 5 do
            sum = sum + i;
            i = i + 1;
        end
        print sum;
    ";
    assert_output(source, "10\n");
}

#[test]
fn for_loop_desugars_and_runs() {
    assert_output(
        "for var i = 0; i < 3; i = i + 1 do print i; end",
        "0\n1\n2\n",
    );
}

#[test]
fn do_end_blocks_scope_like_braces() {
    assert_output("do var a = 1; print a; end", "1\n");
    assert_compile_error("do var a = 1; end print a;");
}

#[test]
fn logical_operators_yield_the_deciding_operand() {
    assert_output("print 1 or 2;", "1\n");
    assert_output("print null or \"x\";", "\"x\"\n");
    assert_output("print 1 and 2;", "2\n");
    assert_output("print false and 1;", "false\n");
}

#[test]
fn truthiness_of_strings_and_numbers() {
    assert_output(
        "if \"\" then print \"y\"; else print \"n\"; end",
        "\"n\"\n",
    );
    assert_output(
        "if \"x\" then print \"y\"; else print \"n\"; end",
        "\"y\"\n",
    );
    assert_output("if 0 then print \"y\"; else print \"n\"; end", "\"n\"\n");
    assert_output("if 7 then print \"y\"; else print \"n\"; end", "\"y\"\n");
}

#[test]
fn not_keyword_matches_bang() {
    assert_output("print not true;", "false\n");
    assert_output("print !true;", "false\n");
    assert_output("print not \"\";", "true\n");
}

#[test]
fn equality_rules() {
    assert_output("print 1 == 1;", "true\n");
    assert_output("print \"a\" == \"b\";", "false\n");
    assert_output("print null == null;", "true\n");

    // `!=` never type-checks; `==` does.
    assert_output("print 1 != \"1\";", "true\n");
    assert_runtime_error("print 1 == \"1\";");
}

#[test]
fn concat_requires_strings() {
    assert_runtime_error("print 1 .. 2;");
}

#[test]
fn comparison_requires_numbers() {
    assert_runtime_error("print \"a\" < \"b\";");
}

#[test]
fn use_before_declaration_is_caught_statically() {
    assert_compile_error("print x; var x = 0;");
    assert_compile_error("print nosuch;");
}

#[test]
fn arity_is_checked_exactly() {
    let source = "
        func add(a, b) { return a + b; }
        print add(1);
    ";
    assert_runtime_error(source);
}

#[test]
fn only_callables_can_be_called() {
    assert_runtime_error("var x = 1; x();");
}

#[test]
fn functions_capture_lexically_at_declaration() {
    let source = "
        var a = \"global\";
        {
            func show() { print a; }
            show();
            var a = \"block\";
            show();
        }
    ";
    assert_output(source, "\"global\"\n\"global\"\n");
}

#[test]
fn closure_sees_later_writes_to_captured_variable() {
    let source = "
        func make() {
            var a = \"first\";
            func get() { return a; }
            a = \"second\";
            return get;
        }
        var g = make();
        print g();
    ";
    assert_output(source, "\"second\"\n");
}

#[test]
fn mutual_recursion_with_late_bound_globals() {
    let source = "
        func is_even(n) {
            if n == 0 then return true; end
            return is_odd(n - 1);
        }
        func is_odd(n) {
            if n == 0 then return false; end
            return is_even(n - 1);
        }
        print is_even(10);
    ";
    assert_output(source, "true\n");
}

#[test]
fn calling_a_global_that_never_appears_fails_at_runtime() {
    assert_runtime_error("func f() { return ghost(); } print f();");
}

#[test]
fn recursion() {
    let source = "
        func fib(n) {
            if n < 2 then return n; end
            return fib(n - 1) + fib(n - 2);
        }
        print fib(10);
    ";
    assert_output(source, "55\n");
}

#[test]
fn implicit_return_is_null() {
    assert_output("func f() {} print f();", "null\n");
}

#[test]
fn return_unwinds_only_the_current_invocation() {
    let source = "
        func f() {
            var i = 0;
            while true do
                i = i + 1;
                if i == 3 then return i; end
            end
        }
        print f();
        print \"after\";
    ";
    assert_output(source, "3\n\"after\"\n");
}

#[test]
fn callable_display_forms() {
    assert_output("print clock;", "<native fn>\n");
    assert_output("func f() {} print f;", "<fn f>\n");
}

#[test]
fn clock_is_a_wall_clock() {
    assert_output("print clock() > 0;", "true\n");
}

#[test]
fn parse_errors_abort_evaluation() {
    let (output, had_error, _) = run_source("var 1; print 2;");
    assert!(had_error);
    assert_eq!(output, "");
}

#[test]
fn repl_mode_echoes_expression_values() {
    let mut output: Vec<u8> = Vec::new();
    let mut driver = Lox::new(&mut output);

    driver.run("1 + 2;", true);
    drop(driver);

    assert_eq!(String::from_utf8(output).unwrap(), "3\n");
}

#[test]
fn repl_session_keeps_globals_across_lines() {
    let mut output: Vec<u8> = Vec::new();
    let mut driver = Lox::new(&mut output);

    driver.run("var a = 1;", true);
    driver.run("a = a + 1;", true);
    driver.run("print a;", true);

    assert!(!driver.had_error());
    drop(driver);

    // The assignment echoes its value, then the print emits it again.
    assert_eq!(String::from_utf8(output).unwrap(), "2\n2\n");
}

#[test]
fn global_redeclaration_is_permitted() {
    assert_output("var a = 1; var a = 2; print a;", "2\n");
}

#[test]
fn duplicate_local_declaration_is_a_compile_error() {
    assert_compile_error("{ var a = 1; var a = 2; }");
}

#[test]
fn self_referential_initializer_is_a_compile_error() {
    assert_compile_error("{ var x = x; }");
}
