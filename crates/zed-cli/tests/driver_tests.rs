//! End-to-end driver tests: compile a program, feed it in-memory record
//! streams, and check the buffered output.

use std::io::Cursor;

use zed_cli::driver::{load_program, Driver, LoadedProgram, DEFAULT_MAX_RECORD_LEN};
use zed_types::{ErrorKind, SourceFile};

/// Compile a program from source text (no file needed).
fn loaded(source: &str) -> LoadedProgram {
    let sf = SourceFile::new("prog.zed", source);
    let ast = zed_parser::parse_source(&sf).unwrap_or_else(|e| panic!("{}", e.render(&sf)));
    let program = zed_codegen::compile(&ast).unwrap_or_else(|e| panic!("compile failed: {e}"));
    LoadedProgram {
        program,
        source: Some(sf),
    }
}

/// Run a program over named in-memory inputs, returning stdout content.
fn run(source: &str, inputs: &[(&str, &str)]) -> String {
    let mut driver = Driver::new(loaded(source), DEFAULT_MAX_RECORD_LEN);
    driver.run_init().expect("init");
    for (name, data) in inputs {
        driver
            .process_reader(name, Cursor::new(data.as_bytes()))
            .unwrap_or_else(|d| panic!("processing {name}: {d}"));
    }
    let out = driver.finish().expect("exit");
    String::from_utf8(out).expect("output is UTF-8")
}

// ══════════════════════════════════════════════════════════════════════════════
// Whole-program behavior
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn trailing_rec_echoes_records() {
    assert_eq!(run("onRec { @rec };", &[("f.txt", "a\nb\n")]), "a\nb\n");
}

#[test]
fn init_only_print_without_records() {
    // No data files: only init and exit run, no @ors is appended.
    assert_eq!(run(r#"onInit { print("hi") };"#, &[]), "hi");
}

#[test]
fn dash_input_is_just_another_stream() {
    assert_eq!(
        run("onRec { print(@file) };", &[("-", "x\n"), ("f.txt", "y\n")]),
        "-\nf.txt\n"
    );
}

#[test]
fn assigning_rnum_refuses_to_compile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.zed");
    std::fs::write(&path, "@rnum = 5;\n").unwrap();
    let err = load_program(&path).expect_err("must not compile");
    assert_eq!(err.diagnostic.kind, ErrorKind::ReadOnlyGlobal);
    let rendered = err.render(&path);
    assert!(rendered.contains(":1:1: read-only global:"), "{rendered}");
}

// ══════════════════════════════════════════════════════════════════════════════
// Record loop behavior
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn last_record_without_trailing_delimiter() {
    assert_eq!(run("onRec { @rec };", &[("f", "a\nb")]), "a\nb\n");
}

#[test]
fn ors_only_appended_when_output_grew() {
    let source = r#"if (@rnum == 2) { print("hit"); };"#;
    assert_eq!(run(source, &[("f", "a\nb\nc\n")]), "hit\n");
}

#[test]
fn columns_split_by_ics() {
    assert_eq!(
        run("onRec { print(@cols[1], @cols[0]) };", &[("f", "a,b\nc,d\n")]),
        "b,a\nd,c\n"
    );
}

#[test]
fn separators_are_reconfigurable() {
    let source = r#"
        onInit { @ics = ";"; @ors = "|"; }
        onRec { print(@cols[0]) };
    "#;
    assert_eq!(run(source, &[("f", "a;b\nc;d\n")]), "a|c|");
}

#[test]
fn irs_change_resplits_the_stream() {
    let source = r#"
        onInit { @irs = ";"; }
        onRec { @rec };
    "#;
    assert_eq!(run(source, &[("f", "a;b;c")]), "a\nb\nc\n");
}

#[test]
fn rnum_spans_files_frnum_resets() {
    let source = "onRec { print(@file, @frnum, @rnum) };";
    assert_eq!(
        run(source, &[("one", "a\nb\n"), ("two", "c\n")]),
        "one,1,1\none,2,2\ntwo,1,3\n"
    );
}

#[test]
fn file_events_run_per_file() {
    let source = r#"onFile { print("<", @file, ">"); }"#;
    assert_eq!(run(source, &[("x", ""), ("y", "")]), "<,x,><,y,>");
}

#[test]
fn rules_and_rec_ranges_gate_on_rnum() {
    let source = "2..=3 { print(@rec); }";
    assert_eq!(run(source, &[("f", "a\nb\nc\nd\n")]), "b\nc\n");
}

#[test]
fn aggregation_across_records() {
    let source = r#"
        onInit { let total = 0; }
        onRec { total += num(@cols[1]); }
        onExit { print("total=${total}") }
    "#;
    assert_eq!(run(source, &[("f", "a,1\nb,2\nc,3\n")]), "total=6");
}

#[test]
fn rec_rewrite_changes_the_split() {
    let source = r#"
        onRec { @rec = upper(@rec); }
        { print(@cols[0]); }
    "#;
    assert_eq!(run(source, &[("f", "ab,cd\n")]), "AB\n");
}

#[test]
fn empty_records_produce_no_output_growth() {
    assert_eq!(run("onRec { @rec };", &[("f", "a\n\nb\n")]), "a\nb\n");
}

#[test]
fn record_too_long_is_an_error() {
    let mut driver = Driver::new(loaded("onRec { @rec };"), 4);
    driver.run_init().unwrap();
    let err = driver
        .process_reader("f", Cursor::new(b"abcdefghij\n".as_slice()))
        .expect_err("record exceeds the cap");
    assert_eq!(err.kind, ErrorKind::RecordTooLong);
}

#[test]
fn record_at_exact_cap_is_fine() {
    let mut driver = Driver::new(loaded("onRec { @rec };"), 4);
    driver.run_init().unwrap();
    driver
        .process_reader("f", Cursor::new(b"abcd\nxy\n".as_slice()))
        .expect("records fit");
    assert_eq!(driver.finish().unwrap(), b"abcd\nxy\n");
}

#[test]
fn runtime_errors_carry_offsets() {
    let source = "onRec { print(1 / num(@cols[0])); }";
    let mut driver = Driver::new(loaded(source), DEFAULT_MAX_RECORD_LEN);
    driver.run_init().unwrap();
    let err = driver
        .process_reader("f", Cursor::new(b"0\n".as_slice()))
        .expect_err("division by zero");
    assert_eq!(err.kind, ErrorKind::Runtime);
    let rendered = driver.render(&err, "prog.zed");
    assert!(rendered.starts_with("prog.zed:1:"), "{rendered}");
}

// ══════════════════════════════════════════════════════════════════════════════
// Precompiled bytecode
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn zbc_load_matches_direct_compilation() {
    let source = "onInit { let n = 0; } onRec { n += 1; } onExit { print(n) }";
    let direct = loaded(source);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prog.zbc");
    let mut file = std::fs::File::create(&path).unwrap();
    zed_codegen::zbc::write_zbc(&mut file, &direct.program).unwrap();
    drop(file);

    let from_disk = load_program(&path).expect("zbc loads");
    assert_eq!(from_disk.program, direct.program);
    assert!(from_disk.source.is_none());

    // And it runs identically.
    let mut driver = Driver::new(from_disk, DEFAULT_MAX_RECORD_LEN);
    driver.run_init().unwrap();
    driver
        .process_reader("f", Cursor::new(b"a\nb\n".as_slice()))
        .unwrap();
    assert_eq!(driver.finish().unwrap(), b"2");
}

#[test]
fn truncated_zbc_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.zbc");
    std::fs::write(&path, [3u8, 0, 1]).unwrap();
    let err = load_program(&path).expect_err("short file");
    assert_eq!(err.diagnostic.kind, ErrorKind::Io);
}

#[test]
fn source_load_reports_parse_errors_with_location() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.zed");
    std::fs::write(&path, "onRec {\n  let = 3;\n}\n").unwrap();
    let err = load_program(&path).expect_err("parse error");
    assert_eq!(err.diagnostic.kind, ErrorKind::Parse);
    assert!(err.render(&path).contains(":2:"), "{}", err.render(&path));
}
