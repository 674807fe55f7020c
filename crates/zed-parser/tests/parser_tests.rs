//! Integration tests for the ZED parser.

use zed_parser::parse_source;
use zed_types::ast::*;
use zed_types::SourceFile;

fn parse(source: &str) -> Program {
    let sf = SourceFile::new("test.zed", source);
    parse_source(&sf).unwrap_or_else(|e| panic!("parse failed: {}", e.render(&sf)))
}

fn parse_err(source: &str) -> zed_types::Diagnostic {
    let sf = SourceFile::new("test.zed", source);
    parse_source(&sf).expect_err("expected a parse error")
}

/// Parse a single rules statement (dropping the trailing StmtEnd).
fn rules_stmt(source: &str) -> Node {
    let program = parse(source);
    assert!(
        !program.rules.is_empty(),
        "expected a rules statement for {source:?}"
    );
    program.rules.into_iter().next().unwrap()
}

#[test]
fn event_blocks_fill_their_lists() {
    let program = parse("onInit { 1; } onFile { 2; } onRec { 3; } onExit { 4; } 5;");
    assert_eq!(program.inits.len(), 2); // int + stmt_end
    assert_eq!(program.files.len(), 2);
    assert_eq!(program.recs.len(), 2);
    assert_eq!(program.exits.len(), 2);
    assert_eq!(program.rules.len(), 2);
}

#[test]
fn repeated_event_blocks_append() {
    let program = parse("onInit { 1; } onInit { 2; }");
    assert_eq!(program.inits.len(), 4);
}

#[test]
fn trailing_semicolon_after_event_block_is_tolerated() {
    let program = parse("onInit { 1; };");
    assert_eq!(program.inits.len(), 2);
    assert!(program.rules.is_empty());
}

#[test]
fn semicolon_appends_stmt_end() {
    let program = parse("onRec { @rec; }");
    assert!(matches!(program.recs[0].kind, NodeKind::Global(Global::Rec)));
    assert!(matches!(program.recs[1].kind, NodeKind::StmtEnd));
}

#[test]
fn trailing_expression_has_no_stmt_end() {
    let program = parse("onRec { @rec }");
    assert_eq!(program.recs.len(), 1);
    assert!(matches!(program.recs[0].kind, NodeKind::Global(Global::Rec)));
}

#[test]
fn let_builds_define() {
    let stmt = rules_stmt("let x = 1 + 2;");
    let NodeKind::Define { name, value } = stmt.kind else {
        panic!("expected define, got {stmt:?}");
    };
    assert!(matches!(name.kind, NodeKind::Ident(ref n) if n == "x"));
    assert!(matches!(value.kind, NodeKind::Infix { op: InfixOp::Add, .. }));
}

#[test]
fn compound_assignment_combos() {
    for (src, combo) in [
        ("x = 1;", Combo::Assign),
        ("x += 1;", Combo::Add),
        ("x -= 1;", Combo::Sub),
        ("x *= 1;", Combo::Mul),
        ("x /= 1;", Combo::Div),
        ("x %= 1;", Combo::Mod),
        ("x ?= 1;", Combo::Fallback),
    ] {
        let stmt = rules_stmt(src);
        let NodeKind::Assign { combo: c, .. } = stmt.kind else {
            panic!("expected assign for {src:?}");
        };
        assert_eq!(c, combo, "combo for {src:?}");
    }
}

#[test]
fn subscript_assignment_target() {
    let stmt = rules_stmt("m[\"k\"] = 1;");
    let NodeKind::Assign { target, .. } = stmt.kind else {
        panic!("expected assign");
    };
    assert!(matches!(target.kind, NodeKind::Subscript { .. }));
}

#[test]
fn assignment_to_call_is_rejected() {
    let e = parse_err("f() = 1;");
    assert!(e.message.contains("assignment target"));
}

#[test]
fn precedence_and_binds_tighter_than_or() {
    let stmt = rules_stmt("a or b and c;");
    let NodeKind::Infix { op, right, .. } = stmt.kind else {
        panic!("expected infix");
    };
    assert_eq!(op, InfixOp::Or);
    assert!(matches!(right.kind, NodeKind::Infix { op: InfixOp::And, .. }));
}

#[test]
fn precedence_mul_over_add() {
    let stmt = rules_stmt("1 + 2 * 3;");
    let NodeKind::Infix { op, right, .. } = stmt.kind else {
        panic!("expected infix");
    };
    assert_eq!(op, InfixOp::Add);
    assert!(matches!(right.kind, NodeKind::Infix { op: InfixOp::Mul, .. }));
}

#[test]
fn comparison_chaining_is_rejected() {
    let e = parse_err("a < b < c;");
    assert!(e.message.contains("chained"));
}

#[test]
fn range_expression() {
    let stmt = rules_stmt("let r = 1..5;");
    let NodeKind::Define { value, .. } = stmt.kind else {
        panic!("expected define");
    };
    let NodeKind::Range { inclusive, .. } = value.kind else {
        panic!("expected range");
    };
    assert!(!inclusive);

    let stmt = rules_stmt("let r = 1..=5;");
    let NodeKind::Define { value, .. } = stmt.kind else {
        panic!("expected define");
    };
    assert!(matches!(value.kind, NodeKind::Range { inclusive: true, .. }));
}

#[test]
fn conditional_with_else_if() {
    let stmt = rules_stmt("if (a) { 1; } else if (b) { 2; } else { 3; };");
    let NodeKind::Conditional { else_branch, .. } = stmt.kind else {
        panic!("expected conditional");
    };
    assert_eq!(else_branch.len(), 1);
    assert!(matches!(else_branch[0].kind, NodeKind::Conditional { .. }));
}

#[test]
fn while_and_do_while() {
    let stmt = rules_stmt("while (x) { break; };");
    assert!(matches!(stmt.kind, NodeKind::Loop { is_do: false, .. }));

    let stmt = rules_stmt("do { x += 1; } while (x < 3);");
    assert!(matches!(stmt.kind, NodeKind::Loop { is_do: true, .. }));
}

#[test]
fn function_definition_and_anonymous() {
    let stmt = rules_stmt("fn add(a, b) { return a + b; };");
    let NodeKind::Func { name, params, body } = stmt.kind else {
        panic!("expected func");
    };
    assert_eq!(name, "add");
    assert_eq!(params, ["a", "b"]);
    assert!(matches!(body[0].kind, NodeKind::FuncReturn(_)));

    let stmt = rules_stmt("let f = fn(x) { return x; };");
    let NodeKind::Define { value, .. } = stmt.kind else {
        panic!("expected define");
    };
    assert!(matches!(value.kind, NodeKind::Func { ref name, .. } if name.is_empty()));
}

#[test]
fn bare_return_yields_nil() {
    let stmt = rules_stmt("fn f() { return; };");
    let NodeKind::Func { body, .. } = stmt.kind else {
        panic!("expected func");
    };
    let NodeKind::FuncReturn(ref inner) = body[0].kind else {
        panic!("expected return");
    };
    assert!(matches!(inner.kind, NodeKind::Nil));
}

#[test]
fn call_and_subscript_postfix() {
    let stmt = rules_stmt("f(1, 2)[0];");
    let NodeKind::Subscript { container, .. } = stmt.kind else {
        panic!("expected subscript");
    };
    let NodeKind::Call { ref args, .. } = container.kind else {
        panic!("expected call");
    };
    assert_eq!(args.len(), 2);
}

#[test]
fn list_and_map_literals() {
    let stmt = rules_stmt("[1, 2, 3];");
    assert!(matches!(stmt.kind, NodeKind::List(ref e) if e.len() == 3));

    let stmt = rules_stmt("let m = {\"a\": 1, \"b\": 2};");
    let NodeKind::Define { value, .. } = stmt.kind else {
        panic!("expected define");
    };
    assert!(matches!(value.kind, NodeKind::Map(ref e) if e.len() == 2));
}

#[test]
fn string_with_interpolation_and_spec() {
    let stmt = rules_stmt(r#""n=${x:>8}!";"#);
    let NodeKind::Str(segments) = stmt.kind else {
        panic!("expected string");
    };
    assert_eq!(segments.len(), 3);
    assert!(matches!(segments[0], Segment::Plain(ref s) if s == "n="));
    let Segment::Interp { ref nodes, ref spec, .. } = segments[1] else {
        panic!("expected interpolation");
    };
    assert_eq!(nodes.len(), 1);
    assert_eq!(spec.as_deref(), Some(">8"));
    assert!(matches!(segments[2], Segment::Plain(ref s) if s == "!"));
}

// ── Record-range rules ────────────────────────────────────────────────────────

#[test]
fn bare_block_is_an_unconditional_rule() {
    let program = parse("{ @rec };");
    assert_eq!(program.rules.len(), 1);
    let NodeKind::RecRange { ref from, ref to, ref action, id, exclusive } =
        program.rules[0].kind
    else {
        panic!("expected rec-range");
    };
    assert!(from.is_none() && to.is_none());
    assert_eq!(action.len(), 1);
    assert_eq!(id, 0);
    assert!(!exclusive);
}

#[test]
fn bounded_rules() {
    let program = parse("1..5 { @rec; }  3..=7 { @rec; }  ..2 { @rec; }  9.. { @rec; }");
    assert_eq!(program.rules.len(), 4);

    let NodeKind::RecRange { ref from, ref to, id, exclusive, .. } = program.rules[0].kind
    else {
        panic!();
    };
    assert!(from.is_some() && to.is_some());
    assert_eq!(id, 0);
    assert!(exclusive);

    let NodeKind::RecRange { exclusive, id, .. } = program.rules[1].kind else {
        panic!();
    };
    assert!(!exclusive);
    assert_eq!(id, 1);

    let NodeKind::RecRange { ref from, ref to, id, .. } = program.rules[2].kind else {
        panic!();
    };
    assert!(from.is_none() && to.is_some());
    assert_eq!(id, 2);

    let NodeKind::RecRange { ref from, ref to, id, .. } = program.rules[3].kind else {
        panic!();
    };
    assert!(from.is_some() && to.is_none());
    assert_eq!(id, 3);
}

#[test]
fn range_statement_without_block_is_an_expression() {
    let program = parse("1..5;");
    assert!(matches!(program.rules[0].kind, NodeKind::Range { .. }));
}

// ── Redirection ───────────────────────────────────────────────────────────────

#[test]
fn redirection_forms() {
    let stmt = rules_stmt(r#"print(@rec) >> "out.txt";"#);
    let NodeKind::Redir { ref expr, clobber, .. } = stmt.kind else {
        panic!("expected redir");
    };
    assert!(!clobber);
    assert!(matches!(expr.kind, NodeKind::Call { .. }));

    let stmt = rules_stmt(r#"@rec >! "out.txt";"#);
    assert!(matches!(stmt.kind, NodeKind::Redir { clobber: true, .. }));
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[test]
fn missing_semicolon_between_statements() {
    let e = parse_err("onInit { 1 2; }");
    assert_eq!(e.kind, zed_types::ErrorKind::Parse);
    assert!(e.message.contains("';'"));
}

#[test]
fn unclosed_block() {
    let e = parse_err("onInit { 1;");
    assert!(e.message.contains("unclosed block"));
}

#[test]
fn error_offset_points_at_problem() {
    let sf = SourceFile::new("test.zed", "let = 1;");
    let e = parse_source(&sf).expect_err("expected error");
    assert_eq!(e.offset, 4);
}
