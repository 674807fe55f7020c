//! Lowering for statement nodes: definitions, assignments, control flow,
//! function literals, record-range rules and redirections.

use zed_types::ast::{Combo, Node, NodeKind};

use crate::compiler::Compiler;
use crate::error::{CompileError, CompileResult};
use crate::expr;
use crate::hash::func_hash;
use crate::isa::{Op, ScopeKind};

pub(crate) fn emit_define(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Define { name, value } = &node.kind else {
        unreachable!("emit_define on non-define node");
    };
    let NodeKind::Ident(name_text) = &name.kind else {
        return Err(CompileError::UnsupportedNode {
            message: "define target must be an identifier".into(),
            offset: name.offset,
        });
    };
    c.emit_node(value)?;
    c.emit_op(Op::Define);
    c.emit_u16(node.offset);
    c.emit_cstr(name_text, node.offset)
}

pub(crate) fn emit_assign(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Assign {
        target,
        value,
        combo,
    } = &node.kind
    else {
        unreachable!("emit_assign on non-assign node");
    };

    match &target.kind {
        NodeKind::Ident(name) => {
            c.emit_node(value)?;
            c.emit_op(Op::Store);
            c.emit_u16(node.offset);
            c.emit_u8(combo.id());
            c.emit_cstr(name, node.offset)
        }
        NodeKind::Global(global) => {
            if global.is_read_only() {
                return Err(CompileError::ReadOnlyGlobal {
                    global: *global,
                    offset: node.offset,
                });
            }
            // `gstore` carries no combo tag, so compound forms lower as
            // read-modify-write.
            match combo {
                Combo::Assign => c.emit_node(value)?,
                Combo::Fallback => {
                    return Err(CompileError::UnsupportedNode {
                        message: format!("?= cannot target {global}"),
                        offset: node.offset,
                    });
                }
                _ => {
                    c.emit_op(Op::Global);
                    c.emit_u8(global.id());
                    c.emit_node(value)?;
                    c.emit_op(combo_op(*combo));
                    c.emit_u16(node.offset);
                }
            }
            c.emit_op(Op::Gstore);
            c.emit_u16(node.offset);
            c.emit_u8(global.id());
            Ok(())
        }
        NodeKind::Subscript { container, index } => {
            c.emit_node(value)?;
            c.emit_node(index)?;
            c.emit_node(container)?;
            c.emit_op(Op::Set);
            c.emit_u16(node.offset);
            c.emit_u8(combo.id());
            Ok(())
        }
        _ => Err(CompileError::UnsupportedNode {
            message: "assignment target must be an identifier, global or subscript".into(),
            offset: target.offset,
        }),
    }
}

fn combo_op(combo: Combo) -> Op {
    match combo {
        Combo::Add => Op::Add,
        Combo::Sub => Op::Sub,
        Combo::Mul => Op::Mul,
        Combo::Div => Op::Div,
        Combo::Mod => Op::Mod,
        Combo::Assign | Combo::Fallback => unreachable!("handled by the caller"),
    }
}

pub(crate) fn emit_conditional(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Conditional {
        condition,
        then_branch,
        else_branch,
    } = &node.kind
    else {
        unreachable!("emit_conditional on non-conditional node");
    };

    c.emit_node(condition)?;
    c.emit_op(Op::JumpFalse);
    let else_patch = c.reserve_u16();

    c.emit_op(Op::ScopeIn);
    c.emit_u8(ScopeKind::Block as u8);
    for stmt in then_branch {
        c.emit_node(stmt)?;
    }
    c.emit_op(Op::ScopeOut);
    c.emit_u8(ScopeKind::Block as u8);

    c.emit_op(Op::Jump);
    let end_patch = c.reserve_u16();
    c.patch_to_here(else_patch, node.offset)?;

    c.emit_op(Op::ScopeIn);
    c.emit_u8(ScopeKind::Block as u8);
    for stmt in else_branch {
        c.emit_node(stmt)?;
    }
    c.emit_op(Op::ScopeOut);
    c.emit_u8(ScopeKind::Block as u8);

    c.patch_to_here(end_patch, node.offset)
}

pub(crate) fn emit_loop(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Loop {
        condition,
        body,
        is_do,
    } = &node.kind
    else {
        unreachable!("emit_loop on non-loop node");
    };

    c.enter_loop();
    let loop_start = c.loop_start().expect("just entered");

    if *is_do {
        c.emit_op(Op::ScopeIn);
        c.emit_u8(ScopeKind::Loop as u8);
        for stmt in body {
            c.emit_node(stmt)?;
        }
        c.emit_op(Op::ScopeOut);
        c.emit_u8(ScopeKind::Loop as u8);

        c.emit_node(condition)?;
        c.emit_op(Op::JumpTrue);
        let start = Compiler::u16_checked(loop_start, "jump target", node.offset)?;
        c.emit_u16(start);
    } else {
        c.emit_node(condition)?;
        c.emit_op(Op::JumpFalse);
        let exit_patch = c.reserve_u16();
        c.register_loop_exit(exit_patch);

        c.emit_op(Op::ScopeIn);
        c.emit_u8(ScopeKind::Loop as u8);
        for stmt in body {
            c.emit_node(stmt)?;
        }
        c.emit_op(Op::ScopeOut);
        c.emit_u8(ScopeKind::Loop as u8);

        c.emit_op(Op::Jump);
        let start = Compiler::u16_checked(loop_start, "jump target", node.offset)?;
        c.emit_u16(start);
    }

    c.exit_loop(node.offset)?;

    // The loop's value.
    c.emit_op(Op::Nil);
    c.emit_u16(node.offset);
    Ok(())
}

pub(crate) fn emit_break(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    if c.loop_start().is_none() {
        return Err(CompileError::UnsupportedNode {
            message: "'break' outside of a loop".into(),
            offset: node.offset,
        });
    }
    c.emit_op(Op::ScopeOut);
    c.emit_u8(ScopeKind::Loop as u8);
    c.emit_op(Op::Jump);
    let patch = c.reserve_u16();
    c.register_loop_exit(patch);
    Ok(())
}

pub(crate) fn emit_continue(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let Some(loop_start) = c.loop_start() else {
        return Err(CompileError::UnsupportedNode {
            message: "'continue' outside of a loop".into(),
            offset: node.offset,
        });
    };
    c.emit_op(Op::ScopeOut);
    c.emit_u8(ScopeKind::Loop as u8);
    c.emit_op(Op::Jump);
    let start = Compiler::u16_checked(loop_start, "jump target", node.offset)?;
    c.emit_u16(start);
    Ok(())
}

pub(crate) fn emit_func(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Func { name, params, body } = &node.kind else {
        unreachable!("emit_func on non-func node");
    };

    // The body is compiled into its own context so it becomes a
    // self-contained byte sequence embedded in the instruction.
    c.push_context();
    for stmt in body {
        if let Err(e) = c.emit_node(stmt) {
            c.pop_context();
            return Err(e);
        }
    }
    let body_bytes = c.pop_context();

    let hash = func_hash(node);
    let paramc = Compiler::u16_checked(params.len(), "parameter count", node.offset)?;
    let body_len = Compiler::u16_checked(body_bytes.len(), "function body length", node.offset)?;

    c.emit_op(Op::Func);
    let skip_patch = c.reserve_u16();
    c.emit_bytes(&hash.to_le_bytes());
    c.emit_cstr(name, node.offset)?;
    c.emit_u16(paramc);
    for param in params {
        c.emit_cstr(param, node.offset)?;
    }
    c.emit_u16(body_len);
    c.emit_bytes(&body_bytes);

    // Skip = bytes following the skip field up to and including the body,
    // so a VM with the function cached can fast-forward.
    let skip = c.here() - (skip_patch + 2);
    c.patch_u16(skip_patch, skip, "function skip field", node.offset)
}

pub(crate) fn emit_return(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::FuncReturn(inner) = &node.kind else {
        unreachable!("emit_return on non-return node");
    };
    c.emit_node(inner)?;
    c.emit_op(Op::FuncReturn);
    Ok(())
}

pub(crate) fn emit_rec_range(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::RecRange {
        from,
        to,
        action,
        id,
        exclusive,
    } = &node.kind
    else {
        unreachable!("emit_rec_range on non-rec-range node");
    };

    let action_bytes = if action.is_empty() {
        Vec::new()
    } else {
        c.push_context();
        for stmt in action {
            if let Err(e) = c.emit_node(stmt) {
                c.pop_context();
                return Err(e);
            }
        }
        c.pop_context()
    };
    let action_len = Compiler::u16_checked(action_bytes.len(), "rule action length", node.offset)?;

    // Bounds are compiled to, then from, so the VM pops from first.
    if let Some(to) = to {
        c.emit_node(to)?;
    }
    if let Some(from) = from {
        c.emit_node(from)?;
    }

    c.emit_op(Op::RecRange);
    c.emit_u8(*id);
    c.emit_u8(u8::from(*exclusive));
    c.emit_u16(action_len);
    c.emit_bytes(&action_bytes);
    c.emit_u8(u8::from(from.is_some()));
    c.emit_u8(u8::from(to.is_some()));
    Ok(())
}

pub(crate) fn emit_redir(c: &mut Compiler, node: &Node) -> CompileResult<()> {
    let NodeKind::Redir {
        expr: value,
        target,
        clobber,
    } = &node.kind
    else {
        unreachable!("emit_redir on non-redir node");
    };

    // `print(...)` under a redirection formats into a value instead of
    // appending to the output buffer.
    let mut lowered_sprint = false;
    if let NodeKind::Call { callee, args } = &value.kind {
        if matches!(&callee.kind, NodeKind::Ident(name) if name == "print") {
            let argc = expr::argc_checked(args.len(), value.offset)?;
            for arg in args.iter().rev() {
                c.emit_node(arg)?;
            }
            c.emit_op(Op::Sprint);
            c.emit_u16(value.offset);
            c.emit_u8(argc);
            lowered_sprint = true;
        }
    }
    if !lowered_sprint {
        c.emit_node(value)?;
    }

    c.emit_node(target)?;
    c.emit_op(Op::Redir);
    c.emit_u16(node.offset);
    c.emit_u8(u8::from(*clobber));
    Ok(())
}
