//! Stable 64-bit digests of function nodes.
//!
//! The `func` instruction embeds a hash the VM uses to cache compiled
//! closures across reinvocations of an event program, so the digest must be
//! a deterministic consequence of the function's AST alone: FNV-1a 64 over
//! a canonical s-expression rendering. Not cryptographically secure, and
//! does not need to be.

use std::fmt::Write;
use zed_types::ast::{Node, NodeKind, Segment};

/// 64-bit FNV-1a offset basis.
pub const FNV1A_OFFSET_BASIS_64: u64 = 0xcbf29ce484222325;
/// 64-bit FNV-1a prime.
pub const FNV1A_PRIME_64: u64 = 0x0000_0100_0000_01B3;

/// Hash an arbitrary byte slice with FNV-1a 64-bit.
#[inline]
pub const fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV1A_OFFSET_BASIS_64;
    let mut i = 0usize;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV1A_PRIME_64);
        i += 1;
    }
    hash
}

/// Digest of a function node: FNV-1a 64 of its canonical rendering.
pub fn func_hash(node: &Node) -> u64 {
    let mut text = String::new();
    render(node, &mut text);
    fnv1a64(text.as_bytes())
}

/// Canonical textual rendering of a node.
///
/// Offsets are deliberately excluded so that moving a function within the
/// source does not change its digest; floats render as raw bits so the
/// text is identical across platforms.
fn render(node: &Node, out: &mut String) {
    match &node.kind {
        NodeKind::Boolean(b) => {
            let _ = write!(out, "(bool {b})");
        }
        NodeKind::Nil => out.push_str("(nil)"),
        NodeKind::Float(v) => {
            let _ = write!(out, "(float {:016x})", v.to_bits());
        }
        NodeKind::Int(v) => {
            let _ = write!(out, "(int {v})");
        }
        NodeKind::Uint(v) => {
            let _ = write!(out, "(uint {v})");
        }
        NodeKind::Str(segments) => {
            out.push_str("(str");
            for seg in segments {
                match seg {
                    Segment::Plain(text) => {
                        let _ = write!(out, " (plain {}:{text})", text.len());
                    }
                    Segment::Interp { nodes, spec, .. } => {
                        out.push_str(" (interp");
                        render_list(nodes, out);
                        if let Some(spec) = spec {
                            let _ = write!(out, " (spec {}:{spec})", spec.len());
                        }
                        out.push(')');
                    }
                }
            }
            out.push(')');
        }
        NodeKind::Ident(name) => {
            let _ = write!(out, "(ident {name})");
        }
        NodeKind::Global(g) => {
            let _ = write!(out, "(global {})", g.name());
        }
        NodeKind::Define { name, value } => {
            out.push_str("(define");
            render(name, out);
            render(value, out);
            out.push(')');
        }
        NodeKind::Assign {
            target,
            value,
            combo,
        } => {
            let _ = write!(out, "(assign {}", combo.id());
            render(target, out);
            render(value, out);
            out.push(')');
        }
        NodeKind::Infix { left, right, op } => {
            let _ = write!(out, "(infix {op}");
            render(left, out);
            render(right, out);
            out.push(')');
        }
        NodeKind::Prefix { operand, op } => {
            let _ = write!(out, "(prefix {op}");
            render(operand, out);
            out.push(')');
        }
        NodeKind::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            out.push_str("(if");
            render(condition, out);
            render_list(then_branch, out);
            render_list(else_branch, out);
            out.push(')');
        }
        NodeKind::Loop {
            condition,
            body,
            is_do,
        } => {
            let _ = write!(out, "(loop {is_do}");
            render(condition, out);
            render_list(body, out);
            out.push(')');
        }
        NodeKind::LoopBreak => out.push_str("(break)"),
        NodeKind::LoopContinue => out.push_str("(continue)"),
        NodeKind::Func { name, params, body } => {
            let _ = write!(out, "(func {name} (params");
            for p in params {
                let _ = write!(out, " {p}");
            }
            out.push(')');
            render_list(body, out);
            out.push(')');
        }
        NodeKind::FuncReturn(inner) => {
            out.push_str("(return");
            render(inner, out);
            out.push(')');
        }
        NodeKind::Call { callee, args } => {
            out.push_str("(call");
            render(callee, out);
            render_list(args, out);
            out.push(')');
        }
        NodeKind::List(elements) => {
            out.push_str("(list");
            render_list(elements, out);
            out.push(')');
        }
        NodeKind::Map(entries) => {
            out.push_str("(map");
            for (k, v) in entries {
                render(k, out);
                render(v, out);
            }
            out.push(')');
        }
        NodeKind::Range {
            from,
            to,
            inclusive,
        } => {
            let _ = write!(out, "(range {inclusive}");
            render(from, out);
            render(to, out);
            out.push(')');
        }
        NodeKind::Subscript { container, index } => {
            out.push_str("(subscript");
            render(container, out);
            render(index, out);
            out.push(')');
        }
        NodeKind::RecRange {
            from,
            to,
            action,
            id,
            exclusive,
        } => {
            let _ = write!(out, "(rec_range {id} {exclusive}");
            if let Some(from) = from {
                render(from, out);
            }
            if let Some(to) = to {
                render(to, out);
            }
            render_list(action, out);
            out.push(')');
        }
        NodeKind::Redir {
            expr,
            target,
            clobber,
        } => {
            let _ = write!(out, "(redir {clobber}");
            render(expr, out);
            render(target, out);
            out.push(')');
        }
        NodeKind::StmtEnd => out.push_str("(stmt_end)"),
    }
}

fn render_list(nodes: &[Node], out: &mut String) {
    out.push_str(" (");
    for node in nodes {
        render(node, out);
    }
    out.push(')');
}
