//! Integration tests for the ZED VM: compile small programs and execute
//! their event bytecode against a fresh VM.

use zed_codegen::compile;
use zed_types::SourceFile;
use zed_vm::{Vm, VmError};

/// Compile source and run its events in driver order (init, rules for one
/// fake record, exit), returning the VM for inspection.
fn run(source: &str) -> Vm {
    try_run(source).unwrap_or_else(|e| panic!("run failed for {source:?}: {e}"))
}

fn try_run(source: &str) -> Result<Vm, VmError> {
    let sf = SourceFile::new("test.zed", source);
    let program = zed_parser::parse_source(&sf).unwrap_or_else(|e| panic!("{}", e.render(&sf)));
    let compiled = compile(&program).unwrap_or_else(|e| panic!("compile failed: {e}"));
    let mut vm = Vm::new();
    vm.run_event(compiled.event(zed_codegen::Event::Init))?;
    vm.run_event(compiled.event(zed_codegen::Event::Rules))?;
    vm.run_event(compiled.event(zed_codegen::Event::Exit))?;
    Ok(vm)
}

/// Run and return the output buffer as a string.
fn output(source: &str) -> String {
    String::from_utf8(run(source).out).expect("output is UTF-8")
}

// ══════════════════════════════════════════════════════════════════════════════
// Literals, arithmetic, output
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn print_appends_to_output() {
    assert_eq!(output(r#"print("hi");"#), "hi");
}

#[test]
fn print_joins_arguments_with_ocs() {
    assert_eq!(output(r#"print("a", "b", 3);"#), "a,b,3");
    assert_eq!(output("@ocs = \"|\"; print(1, 2);"), "1|2");
}

#[test]
fn trailing_expression_is_flushed() {
    assert_eq!(output(r#""residue""#), "residue");
}

#[test]
fn falsy_residues_are_skipped() {
    assert_eq!(output("nil"), "");
    assert_eq!(output("false"), "");
    assert_eq!(output("0"), "");
    assert_eq!(output("true"), "true");
    assert_eq!(output("42"), "42");
}

#[test]
fn assignments_are_value_statements() {
    // An un-terminated assignment leaves its value for the residue flush.
    assert_eq!(output("let x = 7"), "7");
    assert_eq!(output("let x = 1; x += 4"), "5");
}

#[test]
fn statement_pops_stay_balanced_inside_calls() {
    // A function whose body contains `;`-terminated statements must not
    // disturb the caller's partially built string segments.
    assert_eq!(
        output(r#"fn f() { let y = 1; return y; }; print("a${f()}b");"#),
        "a1b"
    );
}

#[test]
fn arithmetic() {
    assert_eq!(output("print(1 + 2 * 3);"), "7");
    assert_eq!(output("print(7 % 3);"), "1");
    assert_eq!(output("print(10 / 4);"), "2");
    assert_eq!(output("print(10.0 / 4);"), "2.5");
    assert_eq!(output("print(-(3 - 5));"), "2");
}

#[test]
fn numeric_strings_coerce() {
    assert_eq!(output(r#"print("4" + 1);"#), "5");
    assert_eq!(output(r#"print(" 2 " * 3);"#), "6");
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let err = try_run("print(1 / 0);").unwrap_err();
    assert!(matches!(err, VmError::DivisionByZero { .. }));
}

#[test]
fn concat_and_repeat() {
    assert_eq!(output(r#"print("a" ++ 1 ++ "b");"#), "a1b");
    assert_eq!(output(r#"print("ab" ** 3);"#), "ababab");
}

#[test]
fn comparisons_and_equality() {
    assert_eq!(output("print(1 < 2, 2 <= 2, 3 > 4);"), "true,true,false");
    assert_eq!(output(r#"print("a" < "b");"#), "true");
    assert_eq!(output("print(1 == 1.0, 1 != 2);"), "true,true");
}

// ══════════════════════════════════════════════════════════════════════════════
// Variables, scopes, short-circuit
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn define_store_and_compound_assignment() {
    assert_eq!(output("let x = 1; x += 4; x *= 2; print(x);"), "10");
}

#[test]
fn fallback_assignment() {
    assert_eq!(output("let x = nil; x ?= 5; x ?= 9; print(x);"), "5");
}

#[test]
fn undefined_variable_is_a_runtime_error() {
    let err = try_run("print(missing);").unwrap_err();
    assert!(matches!(err, VmError::UndefinedVariable { .. }));
}

#[test]
fn block_scopes_shadow_and_restore() {
    assert_eq!(
        output("let x = 1; if (true) { let x = 2; print(x); }; print(x);"),
        "21"
    );
}

#[test]
fn and_yields_operand_values() {
    assert_eq!(output("let v = 1 and 2; print(v);"), "2");
    assert_eq!(output("let v = 0 and 2; print(v);"), "0");
    assert_eq!(output(r#"let v = "x" or "y"; print(v);"#), "x");
    assert_eq!(output("let v = false or 7; print(v);"), "7");
}

#[test]
fn conditionals_take_the_right_branch() {
    assert_eq!(
        output(r#"if (1 < 2) { print("then"); } else { print("else"); };"#),
        "then"
    );
    assert_eq!(
        output(r#"if (nil) { print("then"); } else { print("else"); };"#),
        "else"
    );
    assert_eq!(
        output(
            r#"let n = 2;
               if (n == 1) { print("one"); }
               else if (n == 2) { print("two"); }
               else { print("many"); };"#
        ),
        "two"
    );
}

#[test]
fn while_loop_runs_to_completion() {
    assert_eq!(
        output("let i = 0; let acc = \"\"; while (i < 4) { acc = acc ++ i; i += 1; }; print(acc);"),
        "0123"
    );
}

#[test]
fn do_while_runs_body_first() {
    assert_eq!(output("let i = 9; do { print(i); } while (i < 0);"), "9");
}

#[test]
fn break_and_continue() {
    assert_eq!(
        output(
            "let i = 0; let acc = \"\";
             while (true) { i += 1; if (i == 3) { continue; }; if (i > 5) { break; }; acc = acc ++ i; };
             print(acc);"
        ),
        "1245"
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Strings and interpolation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn interpolation_concatenates_segments_in_order() {
    assert_eq!(output(r#"let x = 5; print("a${x}b${x + 1}c");"#), "a5b6c");
}

#[test]
fn format_spec_alignment_and_precision() {
    assert_eq!(output(r#"let x = 7; print("[${x:>4}]");"#), "[   7]");
    assert_eq!(output(r#"let x = 7; print("[${x:<4}]");"#), "[7   ]");
    assert_eq!(output(r#"let x = 1.5; print("${x:.3}");"#), "1.500");
}

// ══════════════════════════════════════════════════════════════════════════════
// Containers
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn list_literals_preserve_order() {
    assert_eq!(output("print([1, 2, 3]);"), "[1, 2, 3]");
}

#[test]
fn subscripts_read_and_write() {
    assert_eq!(output("let l = [1, 2, 3]; print(l[1]);"), "2");
    assert_eq!(output("let l = [1, 2]; l[0] = 9; print(l);"), "[9, 2]");
    assert_eq!(output("let l = [1, 2]; l[1] += 10; print(l[1]);"), "12");
}

#[test]
fn list_assignment_extends_with_nil() {
    assert_eq!(output("let l = []; l[2] = 9; print(len(l));"), "3");
}

#[test]
fn out_of_range_subscript_yields_nil() {
    assert_eq!(output("let l = [1]; print(str(l[5]));"), "");
}

#[test]
fn map_literals_and_subscripts() {
    assert_eq!(output(r#"let m = {"a": 1, "b": 2}; print(m["b"]);"#), "2");
    assert_eq!(output(r#"let m = {"a": 1}; m["c"] = 3; print(m["c"]);"#), "3");
    assert_eq!(output(r#"let m = {"a": 1}; m["a"] += 1; print(m["a"]);"#), "2");
}

#[test]
fn string_subscript_yields_chars() {
    assert_eq!(output(r#"let s = "abc"; print(s[1]);"#), "b");
}

#[test]
fn ranges_display() {
    assert_eq!(output("let r = 1..5; print(r);"), "1..5");
    assert_eq!(output("let r = 1..=5; print(r);"), "1..=5");
}

// ══════════════════════════════════════════════════════════════════════════════
// Functions
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn function_definition_and_call() {
    assert_eq!(
        output("fn add(a, b) { return a + b; }; print(add(2, 3));"),
        "5"
    );
}

#[test]
fn function_without_return_yields_nil() {
    assert_eq!(output("fn f() { 1; }; print(str(f()));"), "");
}

#[test]
fn missing_arguments_default_to_nil() {
    assert_eq!(output("fn f(a, b) { return str(b); }; print(f(1));"), "");
}

#[test]
fn functions_close_over_nothing_but_see_outer_scope() {
    // Function bodies execute on the shared scope stack, so outer
    // variables resolve dynamically.
    assert_eq!(
        output("let base = 10; fn bump(x) { return base + x; }; print(bump(5));"),
        "15"
    );
}

#[test]
fn recursion() {
    assert_eq!(
        output("fn fact(n) { if (n <= 1) { return 1; }; return n * fact(n - 1); }; print(fact(5));"),
        "120"
    );
}

#[test]
fn anonymous_functions_are_values() {
    assert_eq!(
        output("let twice = fn(x) { return x * 2; }; print(twice(21));"),
        "42"
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Builtins
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn string_builtins() {
    assert_eq!(output(r#"print(len("abcd"));"#), "4");
    assert_eq!(output(r#"print(upper("ab"), lower("CD"));"#), "AB,cd");
    assert_eq!(output(r#"print(trim("  x  "));"#), "x");
    assert_eq!(output(r#"print(substr("hello", 1, 3));"#), "ell");
    assert_eq!(output(r#"print(contains("hello", "ell"));"#), "true");
}

#[test]
fn split_and_join() {
    assert_eq!(output(r#"print(join(split("a:b:c", ":"), "-"));"#), "a-b-c");
    assert_eq!(output(r#"print(len(split("abc", "")));"#), "3");
}

#[test]
fn push_and_keys() {
    assert_eq!(output("let l = [1]; push(l, 2); print(l);"), "[1, 2]");
    assert_eq!(output(r#"print(join(keys({"b": 1, "a": 2}), ","));"#), "a,b");
}

#[test]
fn num_and_int_coercions() {
    assert_eq!(output(r#"print(num("42") + 1);"#), "43");
    assert_eq!(output("print(int(3.9));"), "3");
    assert_eq!(output(r#"print(str(num("nope")));"#), "");
}

#[test]
fn builtin_arity_is_checked() {
    let err = try_run("print(len());").unwrap_err();
    assert!(matches!(err, VmError::Arity { .. }));
}

#[test]
fn builtins_are_not_shadowable() {
    // `len` stays a builtin even when a variable of that name exists.
    assert_eq!(output(r#"let len = 9; print(len("ab"));"#), "2");
}

// ══════════════════════════════════════════════════════════════════════════════
// Globals
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn separator_globals_read_back_as_strings() {
    assert_eq!(output("print(@ics, @ors == \"\\n\");"), ",,true");
}

#[test]
fn rec_and_cols_are_programmable() {
    let mut vm = Vm::new();
    vm.globals.rec = "a,b".into();
    vm.globals.set_cols(vec!["a".into(), "b".into()]);

    let sf = SourceFile::new("test.zed", "print(@rec, @cols[1]);");
    let program = zed_parser::parse_source(&sf).unwrap();
    let compiled = compile(&program).unwrap();
    vm.run_event(compiled.event(zed_codegen::Event::Rules)).unwrap();
    assert_eq!(String::from_utf8(vm.out).unwrap(), "a,b,b");
}

#[test]
fn cols_subscript_assignment_mutates_storage() {
    let mut vm = Vm::new();
    vm.globals.set_cols(vec!["x".into(), "y".into()]);

    let sf = SourceFile::new("test.zed", r#"@cols[0] = "z"; print(@cols[0]);"#);
    let program = zed_parser::parse_source(&sf).unwrap();
    let compiled = compile(&program).unwrap();
    vm.run_event(compiled.event(zed_codegen::Event::Rules)).unwrap();
    assert_eq!(String::from_utf8(vm.out).unwrap(), "z");
}

#[test]
fn compound_global_assignment_reads_then_writes() {
    let mut vm = Vm::new();
    vm.globals.rec = "5".into();
    let sf = SourceFile::new("test.zed", "@rec += 2; print(@rec);");
    let program = zed_parser::parse_source(&sf).unwrap();
    let compiled = compile(&program).unwrap();
    vm.run_event(compiled.event(zed_codegen::Event::Rules)).unwrap();
    assert_eq!(String::from_utf8(vm.out).unwrap(), "7");
}

#[test]
fn base_scope_persists_across_events() {
    assert_eq!(
        output("onInit { let total = 40; } onExit { total += 2; print(total); }"),
        "42"
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Record-range rules
// ══════════════════════════════════════════════════════════════════════════════

/// Run only the rules program for records 1..=n.
fn run_rules_for_records(source: &str, n: u64) -> String {
    let sf = SourceFile::new("test.zed", source);
    let program = zed_parser::parse_source(&sf).unwrap_or_else(|e| panic!("{}", e.render(&sf)));
    let compiled = compile(&program).unwrap();
    let mut vm = Vm::new();
    for rnum in 1..=n {
        vm.globals.rnum = rnum;
        vm.run_event(compiled.event(zed_codegen::Event::Rules)).unwrap();
    }
    String::from_utf8(vm.out).unwrap()
}

#[test]
fn rec_range_inclusive_bounds() {
    assert_eq!(run_rules_for_records("2..=4 { print(@rnum); }", 6), "234");
}

#[test]
fn rec_range_exclusive_bound() {
    assert_eq!(run_rules_for_records("2..4 { print(@rnum); }", 6), "23");
}

#[test]
fn rec_range_open_bounds() {
    assert_eq!(run_rules_for_records("..=2 { print(@rnum); }", 4), "12");
    assert_eq!(run_rules_for_records("3.. { print(@rnum); }", 5), "345");
    assert_eq!(run_rules_for_records("{ print(@rnum); }", 3), "123");
}

#[test]
fn rec_range_bounds_reevaluate_each_record() {
    // The bound expression references a variable updated by the rules.
    assert_eq!(
        run_rules_for_records(
            "onInit { }\nlet cap = 3; ..=cap { print(@rnum); };",
            5
        ),
        "123"
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Redirection
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn redirection_writes_to_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let path_str = path.to_str().unwrap();

    let source = format!(
        r#"print("one") >! "{p}"; print("two") >> "{p}";"#,
        p = path_str
    );
    let vm = run(&source);
    drop(vm);
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, "one\ntwo\n");
}

#[test]
fn clobber_truncates_only_on_first_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    std::fs::write(&path, "stale\n").unwrap();
    let path_str = path.to_str().unwrap();

    let source = format!(r#"print("fresh") >! "{p}"; print("more") >! "{p}";"#, p = path_str);
    run(&source);
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, "fresh\nmore\n");
}
