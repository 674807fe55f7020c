//! Lowering for value-producing nodes.
//!
//! Stack discipline (the ABI with the VM): binary operands are pushed left
//! then right; subscript pushes index then container; call and builtin
//! arguments are pushed in reverse so the VM pops them in natural order;
//! list elements and string segments are emitted reversed.

use zed_types::ast::{InfixOp, Node, NodeKind, PrefixOp, Segment};

use crate::compiler::Compiler;
use crate::error::{CompileError, CompileResult};
use crate::isa::{Builtin, Op, ScopeKind};

pub(crate) fn emit_literal(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    match &node.kind {
        NodeKind::Boolean(true) => {
            c.emit_op(Op::BoolTrue);
            c.emit_u16(node.offset);
        }
        NodeKind::Boolean(false) => {
            c.emit_op(Op::BoolFalse);
            c.emit_u16(node.offset);
        }
        NodeKind::Nil => {
            c.emit_op(Op::Nil);
            c.emit_u16(node.offset);
        }
        NodeKind::Float(v) => {
            c.emit_op(Op::Float);
            c.emit_bytes(&v.to_le_bytes());
        }
        NodeKind::Int(v) => {
            c.emit_op(Op::Int);
            c.emit_bytes(&v.to_le_bytes());
        }
        NodeKind::Uint(v) => {
            c.emit_op(Op::Uint);
            c.emit_bytes(&v.to_le_bytes());
        }
        _ => unreachable!("emit_literal on non-literal node"),
    }
    Ok(())
}

/// Segments are emitted in reverse order so the VM concatenates them in
/// natural order after `str len`.
pub(crate) fn emit_string(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Str(segments) = &node.kind else {
        unreachable!("emit_string on non-string node");
    };
    let count = Compiler::u16_checked(segments.len(), "string segment count", node.offset)?;
    for segment in segments.iter().rev() {
        match segment {
            Segment::Plain(text) => {
                c.emit_op(Op::Plain);
                c.emit_cstr(text, node.offset)?;
            }
            Segment::Interp {
                nodes,
                spec,
                offset,
            } => {
                c.emit_op(Op::ScopeIn);
                c.emit_u8(ScopeKind::Block as u8);
                for inner in nodes {
                    c.emit_node(inner)?;
                }
                c.emit_op(Op::ScopeOut);
                c.emit_u8(ScopeKind::Block as u8);
                if let Some(spec) = spec {
                    c.emit_op(Op::Format);
                    c.emit_u16(*offset);
                    c.emit_cstr(spec, *offset)?;
                }
            }
        }
    }
    c.emit_op(Op::Str);
    c.emit_u16(count);
    Ok(())
}

pub(crate) fn emit_load(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Ident(name) = &node.kind else {
        unreachable!("emit_load on non-ident node");
    };
    c.emit_op(Op::Load);
    c.emit_u16(node.offset);
    c.emit_cstr(name, node.offset)
}

/// Global reads carry no source offset; the VM decodes accordingly.
pub(crate) fn emit_global(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Global(global) = &node.kind else {
        unreachable!("emit_global on non-global node");
    };
    c.emit_op(Op::Global);
    c.emit_u8(global.id());
    Ok(())
}

pub(crate) fn emit_infix(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Infix { left, right, op } = &node.kind else {
        unreachable!("emit_infix on non-infix node");
    };

    // `and`/`or` lower to short-circuit jumps: the value left on the stack
    // is the falsy/truthy left operand (after the jump) or the right
    // operand's value.
    if let InfixOp::And | InfixOp::Or = op {
        c.emit_node(left)?;
        c.emit_op(if *op == InfixOp::And {
            Op::JumpFalse
        } else {
            Op::JumpTrue
        });
        let patch = c.reserve_u16();
        c.emit_node(right)?;
        return c.patch_to_here(patch, node.offset);
    }

    c.emit_node(left)?;
    c.emit_node(right)?;
    let opcode = match op {
        InfixOp::Add => Op::Add,
        InfixOp::Sub => Op::Sub,
        InfixOp::Mul => Op::Mul,
        InfixOp::Div => Op::Div,
        InfixOp::Mod => Op::Mod,
        InfixOp::Lt => Op::Lt,
        InfixOp::Lte => Op::Lte,
        InfixOp::Gt => Op::Gt,
        InfixOp::Gte => Op::Gte,
        InfixOp::Eq => Op::Eq,
        InfixOp::Neq => Op::Neq,
        InfixOp::Concat => Op::Concat,
        InfixOp::Repeat => Op::Repeat,
        InfixOp::And | InfixOp::Or => unreachable!("handled above"),
    };
    c.emit_op(opcode);
    c.emit_u16(node.offset);
    Ok(())
}

pub(crate) fn emit_prefix(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Prefix { operand, op } = &node.kind else {
        unreachable!("emit_prefix on non-prefix node");
    };
    c.emit_node(operand)?;
    c.emit_op(match op {
        PrefixOp::Neg => Op::Neg,
        PrefixOp::Not => Op::Not,
    });
    c.emit_u16(node.offset);
    Ok(())
}

pub(crate) fn emit_list(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::List(elements) = &node.kind else {
        unreachable!("emit_list on non-list node");
    };
    let len = Compiler::u16_checked(elements.len(), "list length", node.offset)?;
    for element in elements.iter().rev() {
        c.emit_node(element)?;
    }
    c.emit_op(Op::List);
    c.emit_u16(len);
    Ok(())
}

pub(crate) fn emit_map(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Map(entries) = &node.kind else {
        unreachable!("emit_map on non-map node");
    };
    let len = Compiler::u16_checked(entries.len(), "map length", node.offset)?;
    for (key, value) in entries {
        c.emit_node(key)?;
        c.emit_node(value)?;
    }
    c.emit_op(Op::Map);
    c.emit_u16(node.offset);
    c.emit_u16(len);
    Ok(())
}

pub(crate) fn emit_range(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Range {
        from,
        to,
        inclusive,
    } = &node.kind
    else {
        unreachable!("emit_range on non-range node");
    };
    c.emit_node(from)?;
    c.emit_node(to)?;
    c.emit_op(Op::Range);
    c.emit_u16(node.offset);
    c.emit_u8(u8::from(*inclusive));
    Ok(())
}

pub(crate) fn emit_subscript(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Subscript { container, index } = &node.kind else {
        unreachable!("emit_subscript on non-subscript node");
    };
    c.emit_node(index)?;
    c.emit_node(container)?;
    c.emit_op(Op::Subscript);
    c.emit_u16(node.offset);
    Ok(())
}

pub(crate) fn emit_call(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Call { callee, args } = &node.kind else {
        unreachable!("emit_call on non-call node");
    };

    // A callee identifier naming a builtin always dispatches through the
    // builtin table; builtins are not shadowable.
    if let NodeKind::Ident(name) = &callee.kind {
        if let Some(builtin) = Builtin::from_name(name) {
            return emit_builtin_call(c, builtin, args, node.offset);
        }
    }

    let argc = argc_checked(args.len(), node.offset)?;
    for arg in args.iter().rev() {
        c.emit_node(arg)?;
    }
    c.emit_node(callee)?;
    c.emit_op(Op::Call);
    c.emit_u16(node.offset);
    c.emit_u8(argc);
    Ok(())
}

pub(crate) fn emit_builtin_call(
    c: &mut Compiler,
    builtin: Builtin,
    args: &[Node],
    offset: u16,
) -> CompileResult<()> {
    let argc = argc_checked(args.len(), offset)?;
    for arg in args.iter().rev() {
        c.emit_node(arg)?;
    }
    c.emit_op(Op::Builtin);
    c.emit_u8(builtin.id());
    c.emit_u16(offset);
    c.emit_u8(argc);
    Ok(())
}

pub(crate) fn argc_checked(count: usize, offset: u16) -> CompileResult<u8> {
    u8::try_from(count).map_err(|_| CompileError::BytecodeOverflow {
        what: "argument count",
        offset,
    })
}
