//! Instruction set definition: opcode numbering, operand shapes, scope
//! kinds, the builtin table, and a decode walk for validation.
//!
//! Encoding: each instruction is a 1-byte opcode followed by fixed operand
//! bytes. Strings are NUL-terminated; 16-bit lengths/targets and 64-bit
//! immediates are little-endian. Many instructions embed a 2-byte source
//! offset used by runtime diagnostics.

use thiserror::Error;
use zed_types::ast::{Combo, Global};

/// Opcodes, in wire order. Must stay in sync with the VM.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Discard top of stack.
    Pop = 0,
    /// off(2) — push true.
    BoolTrue = 1,
    /// off(2) — push false.
    BoolFalse = 2,
    /// off(2) — push nil.
    Nil = 3,
    /// 8 raw bytes — push a 64-bit float.
    Float = 4,
    /// 8 raw bytes — push a 64-bit signed int.
    Int = 5,
    /// 8 raw bytes — push a 64-bit unsigned int.
    Uint = 6,
    /// bytes + NUL — push a literal string segment.
    Plain = 7,
    /// off(2) + bytes + NUL — apply a format spec to the preceding
    /// interpolation result.
    Format = 8,
    /// len(2) — concatenate `len` segments on the stack into one string.
    Str = 9,
    /// scope-kind(1) — enter a lexical scope.
    ScopeIn = 10,
    /// scope-kind(1) — exit a lexical scope.
    ScopeOut = 11,
    /// builtin-id(1) + off(2) + argc(1) — call a builtin by id.
    Builtin = 12,
    /// off(2) + argc(1) — call top-of-stack function.
    Call = 13,
    /// skip(2) + hash(8) + name NUL + paramc(2) + params NUL× + bodylen(2)
    /// + body — define a function literal.
    Func = 14,
    /// Return from the current function.
    FuncReturn = 15,
    /// off(2) + name NUL — define a variable in the current scope.
    Define = 16,
    /// off(2) + name NUL — load a variable.
    Load = 17,
    /// off(2) + combo(1) + name NUL — store to a variable.
    Store = 18,
    /// off(2) + combo(1) — indexed-container assignment.
    Set = 19,
    /// global-id(1) — read a global. Unlike most operations, reads carry
    /// no source offset.
    Global = 20,
    /// off(2) + global-id(1) — write a global.
    Gstore = 21,
    // Binary operators, each off(2).
    Add = 22,
    Sub = 23,
    Mul = 24,
    Div = 25,
    Mod = 26,
    Lt = 27,
    Lte = 28,
    Gt = 29,
    Gte = 30,
    Eq = 31,
    Neq = 32,
    Concat = 33,
    Repeat = 34,
    // Unary operators, each off(2).
    Neg = 35,
    Not = 36,
    /// len(2) — build a list from the top `len` slots.
    List = 37,
    /// off(2) + len(2) — build a map from the top `2·len` slots.
    Map = 38,
    /// off(2) + inclusive(1) — build a range.
    Range = 39,
    /// off(2) — index into a container.
    Subscript = 40,
    /// target(2) — unconditional jump.
    Jump = 41,
    /// target(2) — jump when top of stack is truthy.
    JumpTrue = 42,
    /// target(2) — jump when top of stack is falsy.
    JumpFalse = 43,
    /// id(1) + exclusive(1) + actionlen(2) + action + has_from(1) +
    /// has_to(1) — record-range rule.
    RecRange = 44,
    /// off(2) + clobber(1) — direct the previous value to a file target.
    Redir = 45,
    /// off(2) + argc(1) — format-and-push (print inside a redirection).
    Sprint = 46,
}

impl Op {
    const ALL: [Op; 47] = [
        Op::Pop,
        Op::BoolTrue,
        Op::BoolFalse,
        Op::Nil,
        Op::Float,
        Op::Int,
        Op::Uint,
        Op::Plain,
        Op::Format,
        Op::Str,
        Op::ScopeIn,
        Op::ScopeOut,
        Op::Builtin,
        Op::Call,
        Op::Func,
        Op::FuncReturn,
        Op::Define,
        Op::Load,
        Op::Store,
        Op::Set,
        Op::Global,
        Op::Gstore,
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Div,
        Op::Mod,
        Op::Lt,
        Op::Lte,
        Op::Gt,
        Op::Gte,
        Op::Eq,
        Op::Neq,
        Op::Concat,
        Op::Repeat,
        Op::Neg,
        Op::Not,
        Op::List,
        Op::Map,
        Op::Range,
        Op::Subscript,
        Op::Jump,
        Op::JumpTrue,
        Op::JumpFalse,
        Op::RecRange,
        Op::Redir,
        Op::Sprint,
    ];

    pub fn from_u8(byte: u8) -> Option<Op> {
        Self::ALL.get(byte as usize).copied()
    }
}

/// Scope kinds carried by `scope_in` / `scope_out`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Block = 0,
    /// Iteration scope — `break`/`continue` unwind to it.
    Loop = 1,
    /// Call frame.
    Function = 2,
}

impl ScopeKind {
    pub fn from_u8(byte: u8) -> Option<ScopeKind> {
        match byte {
            0 => Some(ScopeKind::Block),
            1 => Some(ScopeKind::Loop),
            2 => Some(ScopeKind::Function),
            _ => None,
        }
    }
}

/// Builtin functions callable through the `builtin` opcode.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print = 0,
    Len = 1,
    Str = 2,
    Num = 3,
    Int = 4,
    Split = 5,
    Join = 6,
    Substr = 7,
    Contains = 8,
    Upper = 9,
    Lower = 10,
    Trim = 11,
    Push = 12,
    Keys = 13,
}

impl Builtin {
    const ALL: [Builtin; 14] = [
        Builtin::Print,
        Builtin::Len,
        Builtin::Str,
        Builtin::Num,
        Builtin::Int,
        Builtin::Split,
        Builtin::Join,
        Builtin::Substr,
        Builtin::Contains,
        Builtin::Upper,
        Builtin::Lower,
        Builtin::Trim,
        Builtin::Push,
        Builtin::Keys,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Builtin> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Num => "num",
            Builtin::Int => "int",
            Builtin::Split => "split",
            Builtin::Join => "join",
            Builtin::Substr => "substr",
            Builtin::Contains => "contains",
            Builtin::Upper => "upper",
            Builtin::Lower => "lower",
            Builtin::Trim => "trim",
            Builtin::Push => "push",
            Builtin::Keys => "keys",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Self::ALL.iter().copied().find(|b| b.name() == name)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Validation
// ══════════════════════════════════════════════════════════════════════════════

/// A malformed instruction found by [`validate`].
#[derive(Debug, Clone, Error)]
#[error("invalid bytecode at byte {at}: {message}")]
pub struct InvalidBytecode {
    pub at: usize,
    pub message: String,
}

/// Decode-walk an event program, checking that every opcode's operand bytes
/// lie within the byte string and every jump target is in range.
///
/// Jump targets may equal `code.len()`: a trailing short-circuit expression
/// patches to end-of-program, which the VM treats as a clean halt.
pub fn validate(code: &[u8]) -> Result<(), InvalidBytecode> {
    let mut pc = 0usize;
    while pc < code.len() {
        pc = validate_inst(code, pc)?;
    }
    Ok(())
}

fn err(at: usize, message: impl Into<String>) -> InvalidBytecode {
    InvalidBytecode {
        at,
        message: message.into(),
    }
}

/// Consume `n` operand bytes.
fn take<'c>(
    code: &'c [u8],
    pc: usize,
    at: &mut usize,
    op: Op,
    n: usize,
) -> Result<&'c [u8], InvalidBytecode> {
    let end = at
        .checked_add(n)
        .filter(|&e| e <= code.len())
        .ok_or_else(|| err(pc, format!("{op:?}: truncated operands")))?;
    let bytes = &code[*at..end];
    *at = end;
    Ok(bytes)
}

/// Consume a 16-bit little-endian operand.
fn take_u16(code: &[u8], pc: usize, at: &mut usize, op: Op) -> Result<u16, InvalidBytecode> {
    let bytes = take(code, pc, at, op, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Advance past a NUL-terminated string operand.
fn take_cstr(code: &[u8], pc: usize, at: &mut usize, op: Op) -> Result<(), InvalidBytecode> {
    match code[*at..].iter().position(|&b| b == 0) {
        Some(nul) => {
            *at += nul + 1;
            Ok(())
        }
        None => Err(err(pc, format!("{op:?}: unterminated string operand"))),
    }
}

/// Validate the instruction at `pc`, returning the pc of the next one.
fn validate_inst(code: &[u8], pc: usize) -> Result<usize, InvalidBytecode> {
    let op = Op::from_u8(code[pc]).ok_or_else(|| err(pc, format!("unknown opcode {}", code[pc])))?;
    let mut at = pc + 1;

    match op {
        Op::Pop | Op::FuncReturn => {}
        Op::BoolTrue | Op::BoolFalse | Op::Nil | Op::Str | Op::List | Op::Subscript => {
            take(code, pc, &mut at, op, 2)?;
        }
        Op::Float | Op::Int | Op::Uint => {
            take(code, pc, &mut at, op, 8)?;
        }
        Op::Plain => {
            take_cstr(code, pc, &mut at, op)?;
        }
        Op::Format => {
            take(code, pc, &mut at, op, 2)?;
            take_cstr(code, pc, &mut at, op)?;
        }
        Op::ScopeIn | Op::ScopeOut => {
            let kind = take(code, pc, &mut at, op, 1)?[0];
            if ScopeKind::from_u8(kind).is_none() {
                return Err(err(pc, format!("{op:?}: bad scope kind {kind}")));
            }
        }
        Op::Builtin => {
            let id = take(code, pc, &mut at, op, 1)?[0];
            if Builtin::from_id(id).is_none() {
                return Err(err(pc, format!("builtin: unknown id {id}")));
            }
            take(code, pc, &mut at, op, 3)?; // off + argc
        }
        Op::Call | Op::Redir | Op::Sprint | Op::Range => {
            take(code, pc, &mut at, op, 3)?;
        }
        Op::Func => {
            take(code, pc, &mut at, op, 2)?; // skip
            take(code, pc, &mut at, op, 8)?; // hash
            take_cstr(code, pc, &mut at, op)?;
            let paramc = take_u16(code, pc, &mut at, op)?;
            for _ in 0..paramc {
                take_cstr(code, pc, &mut at, op)?;
            }
            let bodylen = take_u16(code, pc, &mut at, op)? as usize;
            let body = take(code, pc, &mut at, op, bodylen)?;
            validate(body).map_err(|e| err(pc, format!("func body: {e}")))?;
        }
        Op::Define | Op::Load => {
            take(code, pc, &mut at, op, 2)?;
            take_cstr(code, pc, &mut at, op)?;
        }
        Op::Store => {
            take(code, pc, &mut at, op, 2)?;
            let combo = take(code, pc, &mut at, op, 1)?[0];
            if Combo::from_id(combo).is_none() {
                return Err(err(pc, format!("store: bad combo {combo}")));
            }
            take_cstr(code, pc, &mut at, op)?;
        }
        Op::Set => {
            take(code, pc, &mut at, op, 2)?;
            let combo = take(code, pc, &mut at, op, 1)?[0];
            if Combo::from_id(combo).is_none() {
                return Err(err(pc, format!("set: bad combo {combo}")));
            }
        }
        Op::Global => {
            let id = take(code, pc, &mut at, op, 1)?[0];
            if Global::from_id(id).is_none() {
                return Err(err(pc, format!("global: unknown id {id}")));
            }
        }
        Op::Gstore => {
            take(code, pc, &mut at, op, 2)?;
            let id = take(code, pc, &mut at, op, 1)?[0];
            if Global::from_id(id).is_none() {
                return Err(err(pc, format!("gstore: unknown id {id}")));
            }
        }
        Op::Add
        | Op::Sub
        | Op::Mul
        | Op::Div
        | Op::Mod
        | Op::Lt
        | Op::Lte
        | Op::Gt
        | Op::Gte
        | Op::Eq
        | Op::Neq
        | Op::Concat
        | Op::Repeat
        | Op::Neg
        | Op::Not => {
            take(code, pc, &mut at, op, 2)?;
        }
        Op::Map => {
            take(code, pc, &mut at, op, 4)?;
        }
        Op::Jump | Op::JumpTrue | Op::JumpFalse => {
            let target = take_u16(code, pc, &mut at, op)? as usize;
            if target > code.len() {
                return Err(err(
                    pc,
                    format!("{op:?}: target {target} out of range (len {})", code.len()),
                ));
            }
        }
        Op::RecRange => {
            take(code, pc, &mut at, op, 2)?; // id + exclusive
            let actionlen = take_u16(code, pc, &mut at, op)? as usize;
            let action = take(code, pc, &mut at, op, actionlen)?;
            validate(action).map_err(|e| err(pc, format!("rec_range action: {e}")))?;
            take(code, pc, &mut at, op, 2)?; // has_from + has_to
        }
    }
    Ok(at)
}
