//! The bytecode interpreter.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::rc::Rc;

use zed_codegen::isa::{Builtin, Op, ScopeKind};
use zed_types::ast::{Combo, Global};

use crate::builtins;
use crate::env::ScopeStack;
use crate::error::{VmError, VmResult};
use crate::value::{FuncValue, Num, Value};

// ══════════════════════════════════════════════════════════════════════════════
// Globals
// ══════════════════════════════════════════════════════════════════════════════

/// The predefined globals shared between the driver and the VM.
///
/// Separators are single bytes; `@cols` is a live list value so indexed
/// assignment through `@cols[i]` mutates the stored columns.
#[derive(Debug)]
pub struct Globals {
    pub file: String,
    pub frnum: u64,
    pub rnum: u64,
    pub ics: u8,
    pub irs: u8,
    pub ocs: u8,
    pub ors: u8,
    pub rec: String,
    pub cols: Value,
}

impl Default for Globals {
    fn default() -> Self {
        Self {
            file: String::new(),
            frnum: 1,
            rnum: 1,
            ics: b',',
            irs: b'\n',
            ocs: b',',
            ors: b'\n',
            rec: String::new(),
            cols: Value::list(Vec::new()),
        }
    }
}

impl Globals {
    /// Replace the column list (driver, once per record).
    pub fn set_cols(&mut self, cols: Vec<String>) {
        self.cols = Value::list(cols.into_iter().map(Value::Str).collect());
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// VM
// ══════════════════════════════════════════════════════════════════════════════

/// Control-flow signal threaded out of [`Vm::exec`].
enum Flow {
    Normal,
    Return(Value),
}

/// The ZED virtual machine.
///
/// State persists across event invocations: the base variable scope, the
/// globals, the output buffer, the per-hash function cache, the per-rule
/// action cache and the redirection file table.
#[derive(Debug)]
pub struct Vm {
    pub globals: Globals,
    scopes: ScopeStack,
    stack: Vec<Value>,
    /// Buffered output, flushed to stdout by the driver at process end.
    pub out: Vec<u8>,
    func_cache: HashMap<u64, Rc<FuncValue>>,
    action_cache: HashMap<u8, Rc<Vec<u8>>>,
    redirect_files: HashMap<String, File>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self {
            globals: Globals::default(),
            scopes: ScopeStack::new(),
            stack: Vec::new(),
            out: Vec::new(),
            func_cache: HashMap::new(),
            action_cache: HashMap::new(),
            redirect_files: HashMap::new(),
        }
    }

    /// Run one event program.
    ///
    /// Values left on the operand stack afterwards are flushed to the
    /// output buffer in push order (falsy values are skipped) — the
    /// trailing-expression output convention.
    pub fn run_event(&mut self, code: &[u8]) -> VmResult<()> {
        self.exec(code)?;
        for value in std::mem::take(&mut self.stack) {
            // Falsy residues are dropped: branch-preserved condition
            // values (always falsy) must not leak into the output.
            if value.is_truthy() {
                self.out.extend_from_slice(value.to_string().as_bytes());
            }
        }
        Ok(())
    }

    /// Append formatted text to the output buffer (the `print` builtin).
    pub(crate) fn write_out(&mut self, text: &str) {
        self.out.extend_from_slice(text.as_bytes());
    }

    // ── Stack helpers ────────────────────────────────────────────────────

    fn pop(&mut self, offset: u16) -> VmResult<Value> {
        self.stack.pop().ok_or_else(|| VmError::CorruptBytecode {
            message: "operand stack underflow".into(),
            offset,
        })
    }

    pub(crate) fn pop_args(&mut self, argc: u8, offset: u16) -> VmResult<Vec<Value>> {
        let mut args = Vec::with_capacity(argc as usize);
        for _ in 0..argc {
            args.push(self.pop(offset)?);
        }
        Ok(args)
    }

    // ── Execution ────────────────────────────────────────────────────────

    fn exec(&mut self, code: &[u8]) -> VmResult<Flow> {
        let mut pc = 0usize;
        while pc < code.len() {
            let inst_pc = pc;
            let op = Op::from_u8(code[pc]).ok_or_else(|| corrupt("unknown opcode"))?;
            pc += 1;
            match op {
                Op::Pop => {
                    self.stack.pop();
                }
                Op::BoolTrue => {
                    word(code, &mut pc)?;
                    self.stack.push(Value::Bool(true));
                }
                Op::BoolFalse => {
                    word(code, &mut pc)?;
                    self.stack.push(Value::Bool(false));
                }
                Op::Nil => {
                    word(code, &mut pc)?;
                    self.stack.push(Value::Nil);
                }
                Op::Float => {
                    let raw = qword(code, &mut pc)?;
                    self.stack.push(Value::Float(f64::from_le_bytes(raw)));
                }
                Op::Int => {
                    let raw = qword(code, &mut pc)?;
                    self.stack.push(Value::Int(i64::from_le_bytes(raw)));
                }
                Op::Uint => {
                    let raw = qword(code, &mut pc)?;
                    self.stack.push(Value::Uint(u64::from_le_bytes(raw)));
                }
                Op::Plain => {
                    let text = cstr(code, &mut pc)?;
                    self.stack.push(Value::Str(text.to_string()));
                }
                Op::Format => {
                    let offset = word(code, &mut pc)?;
                    let spec = cstr(code, &mut pc)?.to_string();
                    let value = self.pop(offset)?;
                    self.stack
                        .push(Value::Str(builtins::format_value(&value, &spec)));
                }
                Op::Str => {
                    let count = word(code, &mut pc)?;
                    // Segments were pushed in reverse source order, so
                    // popping yields natural order.
                    let mut text = String::new();
                    for _ in 0..count {
                        let segment = self.pop(0)?;
                        text.push_str(&segment.to_string());
                    }
                    self.stack.push(Value::Str(text));
                }
                Op::ScopeIn => {
                    let kind = scope_kind(code, &mut pc)?;
                    self.scopes.push(kind, self.stack.len());
                }
                Op::ScopeOut => {
                    let kind = scope_kind(code, &mut pc)?;
                    let base = self.scopes.unwind(kind).ok_or_else(|| {
                        corrupt("scope_out without matching scope_in")
                    })?;
                    self.squash_stack_to(base);
                }
                Op::Builtin => {
                    let id = byte(code, &mut pc)?;
                    let builtin =
                        Builtin::from_id(id).ok_or_else(|| corrupt("unknown builtin id"))?;
                    let offset = word(code, &mut pc)?;
                    let argc = byte(code, &mut pc)?;
                    let args = self.pop_args(argc, offset)?;
                    let result = builtins::call(self, builtin, args, offset)?;
                    self.stack.push(result);
                }
                Op::Call => {
                    let offset = word(code, &mut pc)?;
                    let argc = byte(code, &mut pc)?;
                    self.op_call(offset, argc)?;
                }
                Op::Func => {
                    pc = self.op_func(code, pc)?;
                }
                Op::FuncReturn => {
                    let value = self.pop(0)?;
                    return Ok(Flow::Return(value));
                }
                Op::Define => {
                    word(code, &mut pc)?;
                    let name = cstr(code, &mut pc)?;
                    // Assignments leave their value: the statement's
                    // `pop` (or an enclosing expression) consumes it.
                    let value = self
                        .stack
                        .last()
                        .cloned()
                        .ok_or_else(|| corrupt("define on empty stack"))?;
                    self.scopes.define(name, value);
                }
                Op::Load => {
                    let offset = word(code, &mut pc)?;
                    let name = cstr(code, &mut pc)?;
                    let value = self.scopes.get(name).cloned().ok_or_else(|| {
                        VmError::UndefinedVariable {
                            name: name.to_string(),
                            offset,
                        }
                    })?;
                    self.stack.push(value);
                }
                Op::Store => {
                    let offset = word(code, &mut pc)?;
                    let combo = combo(code, &mut pc)?;
                    let name = cstr(code, &mut pc)?;
                    self.op_store(name, combo, offset)?;
                }
                Op::Set => {
                    let offset = word(code, &mut pc)?;
                    let combo = combo(code, &mut pc)?;
                    self.op_set(combo, offset)?;
                }
                Op::Global => {
                    let global = global(code, &mut pc)?;
                    let value = self.global_read(global);
                    self.stack.push(value);
                }
                Op::Gstore => {
                    let offset = word(code, &mut pc)?;
                    let g = global(code, &mut pc)?;
                    let value = self.pop(offset)?;
                    self.global_write(g, value.clone(), offset)?;
                    self.stack.push(value);
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
                | Op::Repeat => {
                    let offset = word(code, &mut pc)?;
                    let right = self.pop(offset)?;
                    let left = self.pop(offset)?;
                    let result = self.binary(op, left, right, offset)?;
                    self.stack.push(result);
                }
                Op::Neg => {
                    let offset = word(code, &mut pc)?;
                    let value = self.pop(offset)?;
                    self.stack.push(negate(value, offset)?);
                }
                Op::Not => {
                    let offset = word(code, &mut pc)?;
                    let value = self.pop(offset)?;
                    self.stack.push(Value::Bool(!value.is_truthy()));
                }
                Op::List => {
                    let len = word(code, &mut pc)?;
                    // Elements were pushed reversed; popping restores
                    // source order.
                    let mut items = Vec::with_capacity(len as usize);
                    for _ in 0..len {
                        items.push(self.pop(0)?);
                    }
                    self.stack.push(Value::list(items));
                }
                Op::Map => {
                    let offset = word(code, &mut pc)?;
                    let len = word(code, &mut pc)?;
                    let mut entries = std::collections::BTreeMap::new();
                    for _ in 0..len {
                        let value = self.pop(offset)?;
                        let key = self.pop(offset)?;
                        entries.insert(key.to_string(), value);
                    }
                    self.stack.push(Value::map(entries));
                }
                Op::Range => {
                    let offset = word(code, &mut pc)?;
                    let inclusive = byte(code, &mut pc)? != 0;
                    let to = self.pop(offset)?;
                    let from = self.pop(offset)?;
                    let (Some(from), Some(to)) = (from.as_index(), to.as_index()) else {
                        return Err(VmError::TypeMismatch {
                            message: "range bounds must be integers".into(),
                            offset,
                        });
                    };
                    self.stack.push(Value::Range {
                        from,
                        to,
                        inclusive,
                    });
                }
                Op::Subscript => {
                    let offset = word(code, &mut pc)?;
                    let container = self.pop(offset)?;
                    let index = self.pop(offset)?;
                    let value = subscript(&container, &index, offset)?;
                    self.stack.push(value);
                }
                Op::Jump => {
                    let target = word(code, &mut pc)? as usize;
                    pc = target;
                }
                Op::JumpTrue | Op::JumpFalse => {
                    let target = word(code, &mut pc)? as usize;
                    let truthy = self
                        .stack
                        .last()
                        .ok_or_else(|| corrupt("conditional jump on empty stack"))?
                        .is_truthy();
                    let taken = truthy == (op == Op::JumpTrue);
                    if taken {
                        // Forward branches keep the tested value (the
                        // short-circuit result); back-edges pop it so loops
                        // cannot grow the stack per iteration.
                        if target <= inst_pc {
                            self.stack.pop();
                        }
                        pc = target;
                    } else {
                        self.stack.pop();
                    }
                }
                Op::RecRange => {
                    pc = self.op_rec_range(code, pc)?;
                }
                Op::Redir => {
                    let offset = word(code, &mut pc)?;
                    let clobber = byte(code, &mut pc)? != 0;
                    let target = self.pop(offset)?;
                    let value = self.pop(offset)?;
                    self.op_redir(&target.to_string(), &value, clobber, offset)?;
                    self.stack.push(value);
                }
                Op::Sprint => {
                    let offset = word(code, &mut pc)?;
                    let argc = byte(code, &mut pc)?;
                    let args = self.pop_args(argc, offset)?;
                    let text = builtins::join_args(&args, self.globals.ocs);
                    self.stack.push(Value::Str(text));
                }
            }
        }
        Ok(Flow::Normal)
    }

    /// Truncate the operand stack to `base`, preserving the newest value
    /// as the scope's result.
    fn squash_stack_to(&mut self, base: usize) {
        if self.stack.len() > base {
            let top = self.stack.pop().expect("len checked");
            self.stack.truncate(base);
            self.stack.push(top);
        }
    }

    // ── Calls ────────────────────────────────────────────────────────────

    fn op_call(&mut self, offset: u16, argc: u8) -> VmResult<()> {
        let callee = self.pop(offset)?;
        let Value::Func(func) = callee else {
            return Err(VmError::TypeMismatch {
                message: format!("cannot call a {}", callee.type_name()),
                offset,
            });
        };
        // Arguments were pushed reversed; popping yields natural order.
        let args = self.pop_args(argc, offset)?;

        let frame_base = self.stack.len();
        self.scopes.push(ScopeKind::Function, frame_base);
        for (i, param) in func.params.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or(Value::Nil);
            self.scopes.define(param, value);
        }

        let flow = self.exec(&func.body)?;
        let result = match flow {
            Flow::Return(value) => value,
            Flow::Normal => Value::Nil,
        };
        self.scopes
            .unwind(ScopeKind::Function)
            .ok_or_else(|| corrupt("function frame lost"))?;
        self.stack.truncate(frame_base);
        self.stack.push(result);
        Ok(())
    }

    /// Decode a `func` instruction at `pc` (opcode already consumed),
    /// define + push the function value, and return the next pc.
    ///
    /// When the hash is cached the skip field fast-forwards past the
    /// already-known encoding.
    fn op_func(&mut self, code: &[u8], mut pc: usize) -> VmResult<usize> {
        let skip_pos = pc;
        let skip = word(code, &mut pc)? as usize;
        let hash = u64::from_le_bytes(qword(code, &mut pc)?);

        if let Some(func) = self.func_cache.get(&hash).cloned() {
            if !func.name.is_empty() {
                let name = func.name.clone();
                self.scopes.define(&name, Value::Func(func.clone()));
            }
            self.stack.push(Value::Func(func));
            return Ok(skip_pos + 2 + skip);
        }

        let name = cstr(code, &mut pc)?.to_string();
        let paramc = word(code, &mut pc)?;
        let mut params = Vec::with_capacity(paramc as usize);
        for _ in 0..paramc {
            params.push(cstr(code, &mut pc)?.to_string());
        }
        let body_len = word(code, &mut pc)? as usize;
        let body = code
            .get(pc..pc + body_len)
            .ok_or_else(|| corrupt("function body out of bounds"))?
            .to_vec();
        pc += body_len;

        let func = Rc::new(FuncValue {
            name: name.clone(),
            params,
            body,
            hash,
        });
        self.func_cache.insert(hash, func.clone());
        if !name.is_empty() {
            self.scopes.define(&name, Value::Func(func.clone()));
        }
        self.stack.push(Value::Func(func));
        Ok(pc)
    }

    // ── Record-range rules ───────────────────────────────────────────────

    fn op_rec_range(&mut self, code: &[u8], mut pc: usize) -> VmResult<usize> {
        let id = byte(code, &mut pc)?;
        let exclusive = byte(code, &mut pc)? != 0;
        let action_len = word(code, &mut pc)? as usize;
        let action = code
            .get(pc..pc + action_len)
            .ok_or_else(|| corrupt("rule action out of bounds"))?;
        pc += action_len;
        let has_from = byte(code, &mut pc)? != 0;
        let has_to = byte(code, &mut pc)? != 0;

        // `from` was pushed last, so it pops first.
        let from = if has_from { Some(self.pop(0)?) } else { None };
        let to = if has_to { Some(self.pop(0)?) } else { None };

        let n = self.globals.rnum as i128;
        let lo_ok = match from {
            Some(v) => n >= rule_bound(&v)?,
            None => true,
        };
        let hi_ok = match to {
            Some(v) => {
                let bound = rule_bound(&v)?;
                if exclusive {
                    n < bound
                } else {
                    n <= bound
                }
            }
            None => true,
        };

        if lo_ok && hi_ok {
            let cached = self
                .action_cache
                .entry(id)
                .or_insert_with(|| Rc::new(action.to_vec()))
                .clone();
            // A `return` inside a rule action just ends the action.
            self.exec(&cached)?;
        }
        Ok(pc)
    }

    // ── Redirection ──────────────────────────────────────────────────────

    fn op_redir(
        &mut self,
        path: &str,
        value: &Value,
        clobber: bool,
        offset: u16,
    ) -> VmResult<()> {
        if !self.redirect_files.contains_key(path) {
            let file = if clobber {
                File::create(path)
            } else {
                OpenOptions::new().append(true).create(true).open(path)
            }
            .map_err(|e| VmError::Io {
                message: format!("cannot open '{path}': {e}"),
                offset,
            })?;
            self.redirect_files.insert(path.to_string(), file);
        }
        let file = self.redirect_files.get_mut(path).expect("just inserted");
        let mut text = value.to_string().into_bytes();
        text.push(self.globals.ors);
        file.write_all(&text).map_err(|e| VmError::Io {
            message: format!("cannot write to '{path}': {e}"),
            offset,
        })
    }

    // ── Variables ────────────────────────────────────────────────────────

    fn op_store(&mut self, name: &str, combo: Combo, offset: u16) -> VmResult<()> {
        let rhs = self.pop(offset)?;
        let value = match combo {
            Combo::Assign => rhs,
            Combo::Fallback => match self.scopes.get(name) {
                None | Some(Value::Nil) => rhs,
                Some(old) => old.clone(),
            },
            _ => {
                let old = self.scopes.get(name).cloned().ok_or_else(|| {
                    VmError::UndefinedVariable {
                        name: name.to_string(),
                        offset,
                    }
                })?;
                self.binary(combo_op(combo), old, rhs, offset)?
            }
        };
        self.scopes.store(name, value.clone());
        self.stack.push(value);
        Ok(())
    }

    fn op_set(&mut self, combo: Combo, offset: u16) -> VmResult<()> {
        let container = self.pop(offset)?;
        let index = self.pop(offset)?;
        let rhs = self.pop(offset)?;
        match &container {
            Value::List(items) => {
                let idx = index.as_index().filter(|v| *v >= 0).ok_or_else(|| {
                    VmError::TypeMismatch {
                        message: format!("invalid list index {index}"),
                        offset,
                    }
                })? as usize;
                let old = {
                    let mut items = items.borrow_mut();
                    if idx >= items.len() {
                        items.resize(idx + 1, Value::Nil);
                    }
                    items[idx].clone()
                };
                let value = self.combine_set(combo, old, rhs, offset)?;
                items.borrow_mut()[idx] = value.clone();
                self.stack.push(value);
                Ok(())
            }
            Value::Map(entries) => {
                let key = index.to_string();
                let old = entries.borrow().get(&key).cloned();
                let value = match old {
                    Some(old) => self.combine_set(combo, old, rhs, offset)?,
                    None => match combo {
                        Combo::Assign | Combo::Fallback => rhs,
                        _ => {
                            return Err(VmError::TypeMismatch {
                                message: format!("no entry '{key}' to update"),
                                offset,
                            });
                        }
                    },
                };
                entries.borrow_mut().insert(key, value.clone());
                self.stack.push(value);
                Ok(())
            }
            other => Err(VmError::TypeMismatch {
                message: format!("cannot assign into a {}", other.type_name()),
                offset,
            }),
        }
    }

    fn combine_set(
        &mut self,
        combo: Combo,
        old: Value,
        rhs: Value,
        offset: u16,
    ) -> VmResult<Value> {
        Ok(match combo {
            Combo::Assign => rhs,
            Combo::Fallback => match old {
                Value::Nil => rhs,
                kept => kept,
            },
            _ => self.binary(combo_op(combo), old, rhs, offset)?,
        })
    }

    // ── Globals ──────────────────────────────────────────────────────────

    fn global_read(&self, g: Global) -> Value {
        match g {
            Global::Cols => self.globals.cols.clone(),
            Global::File => Value::Str(self.globals.file.clone()),
            Global::Frnum => Value::Uint(self.globals.frnum),
            Global::Rnum => Value::Uint(self.globals.rnum),
            Global::Ics => byte_str(self.globals.ics),
            Global::Irs => byte_str(self.globals.irs),
            Global::Ocs => byte_str(self.globals.ocs),
            Global::Ors => byte_str(self.globals.ors),
            Global::Rec => Value::Str(self.globals.rec.clone()),
        }
    }

    fn global_write(&mut self, g: Global, value: Value, offset: u16) -> VmResult<()> {
        match g {
            Global::Ics => self.globals.ics = sep_byte(g, &value, offset)?,
            Global::Irs => self.globals.irs = sep_byte(g, &value, offset)?,
            Global::Ocs => self.globals.ocs = sep_byte(g, &value, offset)?,
            Global::Ors => self.globals.ors = sep_byte(g, &value, offset)?,
            Global::Rec => self.globals.rec = value.to_string(),
            Global::Cols => {
                let Value::List(_) = value else {
                    return Err(VmError::TypeMismatch {
                        message: format!("@cols must be a list, got {}", value.type_name()),
                        offset,
                    });
                };
                self.globals.cols = value;
            }
            // The compiler refuses assignments to read-only globals.
            Global::File | Global::Frnum | Global::Rnum => {
                return Err(corrupt("gstore to a read-only global"));
            }
        }
        Ok(())
    }

    // ── Operators ────────────────────────────────────────────────────────

    fn binary(&mut self, op: Op, left: Value, right: Value, offset: u16) -> VmResult<Value> {
        match op {
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod => {
                arith(op, &left, &right, offset)
            }
            Op::Lt | Op::Lte | Op::Gt | Op::Gte => {
                let ordering = compare(&left, &right, offset)?;
                Ok(Value::Bool(match op {
                    Op::Lt => ordering.is_lt(),
                    Op::Lte => ordering.is_le(),
                    Op::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }))
            }
            Op::Eq => Ok(Value::Bool(left == right)),
            Op::Neq => Ok(Value::Bool(left != right)),
            Op::Concat => Ok(Value::Str(format!("{left}{right}"))),
            Op::Repeat => repeat(&left, &right, offset),
            _ => Err(corrupt("not a binary operator")),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Operand decoding
// ══════════════════════════════════════════════════════════════════════════════

fn corrupt(message: &str) -> VmError {
    VmError::CorruptBytecode {
        message: message.to_string(),
        offset: 0,
    }
}

fn byte(code: &[u8], pc: &mut usize) -> VmResult<u8> {
    let b = *code.get(*pc).ok_or_else(|| corrupt("truncated operand"))?;
    *pc += 1;
    Ok(b)
}

fn word(code: &[u8], pc: &mut usize) -> VmResult<u16> {
    let bytes = code
        .get(*pc..*pc + 2)
        .ok_or_else(|| corrupt("truncated operand"))?;
    *pc += 2;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn qword(code: &[u8], pc: &mut usize) -> VmResult<[u8; 8]> {
    let bytes = code
        .get(*pc..*pc + 8)
        .ok_or_else(|| corrupt("truncated operand"))?;
    *pc += 8;
    Ok(bytes.try_into().expect("slice of 8"))
}

fn cstr<'c>(code: &'c [u8], pc: &mut usize) -> VmResult<&'c str> {
    let rest = &code[*pc..];
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| corrupt("unterminated string operand"))?;
    let text =
        std::str::from_utf8(&rest[..nul]).map_err(|_| corrupt("string operand is not UTF-8"))?;
    *pc += nul + 1;
    Ok(text)
}

fn scope_kind(code: &[u8], pc: &mut usize) -> VmResult<ScopeKind> {
    ScopeKind::from_u8(byte(code, pc)?).ok_or_else(|| corrupt("bad scope kind"))
}

fn combo(code: &[u8], pc: &mut usize) -> VmResult<Combo> {
    Combo::from_id(byte(code, pc)?).ok_or_else(|| corrupt("bad combo tag"))
}

fn global(code: &[u8], pc: &mut usize) -> VmResult<Global> {
    Global::from_id(byte(code, pc)?).ok_or_else(|| corrupt("bad global id"))
}

// ══════════════════════════════════════════════════════════════════════════════
// Value operations
// ══════════════════════════════════════════════════════════════════════════════

fn byte_str(b: u8) -> Value {
    Value::Str((b as char).to_string())
}

fn sep_byte(g: Global, value: &Value, offset: u16) -> VmResult<u8> {
    let text = value.to_string();
    text.as_bytes()
        .first()
        .copied()
        .ok_or_else(|| VmError::TypeMismatch {
            message: format!("{g} must be a single byte"),
            offset,
        })
}

fn rule_bound(value: &Value) -> VmResult<i128> {
    value
        .as_index()
        .map(i128::from)
        .ok_or_else(|| VmError::TypeMismatch {
            message: format!("record-range bound must be numeric, got {}", value.type_name()),
            offset: 0,
        })
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

fn type_error(op: Op, left: &Value, right: &Value, offset: u16) -> VmError {
    VmError::TypeMismatch {
        message: format!(
            "cannot apply {op:?} to {} and {}",
            left.type_name(),
            right.type_name()
        ),
        offset,
    }
}

fn arith(op: Op, left: &Value, right: &Value, offset: u16) -> VmResult<Value> {
    let (Some(l), Some(r)) = (left.as_num(), right.as_num()) else {
        return Err(type_error(op, left, right, offset));
    };

    if matches!(l, Num::Float(_)) || matches!(r, Num::Float(_)) {
        let (a, b) = (l.as_f64(), r.as_f64());
        if matches!(op, Op::Div | Op::Mod) && b == 0.0 {
            return Err(VmError::DivisionByZero { offset });
        }
        return Ok(Value::Float(match op {
            Op::Add => a + b,
            Op::Sub => a - b,
            Op::Mul => a * b,
            Op::Div => a / b,
            _ => a % b,
        }));
    }

    let unsigned = matches!(l, Num::Uint(_)) && matches!(r, Num::Uint(_));
    let (a, b) = (int_of(l), int_of(r));
    if matches!(op, Op::Div | Op::Mod) && b == 0 {
        return Err(VmError::DivisionByZero { offset });
    }
    let result = match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a.checked_mul(b).ok_or_else(|| VmError::TypeMismatch {
            message: "integer overflow".into(),
            offset,
        })?,
        Op::Div => a / b,
        _ => a % b,
    };
    if unsigned {
        if let Ok(v) = u64::try_from(result) {
            return Ok(Value::Uint(v));
        }
    }
    i64::try_from(result)
        .map(Value::Int)
        .map_err(|_| VmError::TypeMismatch {
            message: "integer overflow".into(),
            offset,
        })
}

fn int_of(num: Num) -> i128 {
    match num {
        Num::Int(v) => v as i128,
        Num::Uint(v) => v as i128,
        Num::Float(v) => v as i128,
    }
}

fn compare(left: &Value, right: &Value, offset: u16) -> VmResult<std::cmp::Ordering> {
    if let (Some(l), Some(r)) = (left.as_num(), right.as_num()) {
        if matches!(l, Num::Float(_)) || matches!(r, Num::Float(_)) {
            return l
                .as_f64()
                .partial_cmp(&r.as_f64())
                .ok_or_else(|| VmError::TypeMismatch {
                    message: "cannot order NaN".into(),
                    offset,
                });
        }
        return Ok(int_of(l).cmp(&int_of(r)));
    }
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return Ok(a.cmp(b));
    }
    Err(VmError::TypeMismatch {
        message: format!(
            "cannot order {} and {}",
            left.type_name(),
            right.type_name()
        ),
        offset,
    })
}

fn negate(value: Value, offset: u16) -> VmResult<Value> {
    match value.as_num() {
        Some(Num::Int(v)) => Ok(Value::Int(-v)),
        Some(Num::Uint(v)) => i64::try_from(v)
            .map(|v| Value::Int(-v))
            .map_err(|_| VmError::TypeMismatch {
                message: "integer overflow".into(),
                offset,
            }),
        Some(Num::Float(v)) => Ok(Value::Float(-v)),
        None => Err(VmError::TypeMismatch {
            message: format!("cannot negate a {}", value.type_name()),
            offset,
        }),
    }
}

fn repeat(left: &Value, right: &Value, offset: u16) -> VmResult<Value> {
    let count = right.as_index().filter(|v| *v >= 0).ok_or_else(|| {
        VmError::TypeMismatch {
            message: "repeat count must be a non-negative integer".into(),
            offset,
        }
    })? as usize;
    match left {
        Value::Str(s) => Ok(Value::Str(s.repeat(count))),
        Value::List(items) => {
            let items = items.borrow();
            let mut result = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                result.extend(items.iter().cloned());
            }
            Ok(Value::list(result))
        }
        other => Err(VmError::TypeMismatch {
            message: format!("cannot repeat a {}", other.type_name()),
            offset,
        }),
    }
}

/// Container read. Out-of-range and missing keys yield nil.
fn subscript(container: &Value, index: &Value, offset: u16) -> VmResult<Value> {
    match container {
        Value::List(items) => {
            let Some(idx) = index.as_index() else {
                return Err(VmError::TypeMismatch {
                    message: format!("invalid list index {index}"),
                    offset,
                });
            };
            if idx < 0 {
                return Ok(Value::Nil);
            }
            Ok(items.borrow().get(idx as usize).cloned().unwrap_or(Value::Nil))
        }
        Value::Str(s) => {
            let Some(idx) = index.as_index() else {
                return Err(VmError::TypeMismatch {
                    message: format!("invalid string index {index}"),
                    offset,
                });
            };
            if idx < 0 {
                return Ok(Value::Nil);
            }
            Ok(s.chars()
                .nth(idx as usize)
                .map(|c| Value::Str(c.to_string()))
                .unwrap_or(Value::Nil))
        }
        Value::Map(entries) => Ok(entries
            .borrow()
            .get(&index.to_string())
            .cloned()
            .unwrap_or(Value::Nil)),
        other => Err(VmError::TypeMismatch {
            message: format!("cannot index a {}", other.type_name()),
            offset,
        }),
    }
}
