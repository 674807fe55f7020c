//! The bytecode compiler: emission-context stack, encoding helpers, jump
//! patching, and the per-node dispatch.

use zed_types::ast::{Node, NodeKind, Program, EVENT_COUNT};

use crate::error::{CompileError, CompileResult};
use crate::isa::{self, Op};
use crate::{expr, stmt};

// ══════════════════════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════════════════════

/// The five event programs, in the fixed order
/// `init, file, rec, rules, exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Init = 0,
    File = 1,
    Rec = 2,
    Rules = 3,
    Exit = 4,
}

impl Event {
    pub const ALL: [Event; EVENT_COUNT] =
        [Event::Init, Event::File, Event::Rec, Event::Rules, Event::Exit];

    pub fn name(self) -> &'static str {
        match self {
            Event::Init => "init",
            Event::File => "file",
            Event::Rec => "rec",
            Event::Rules => "rules",
            Event::Exit => "exit",
        }
    }
}

/// The compiler's output: one self-contained byte string per event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompiledProgram {
    pub events: [Vec<u8>; EVENT_COUNT],
}

impl CompiledProgram {
    pub fn event(&self, event: Event) -> &[u8] {
        &self.events[event as usize]
    }
}

/// Compile a parsed [`Program`] into five event byte strings.
///
/// Each event's nodes are compiled independently with a freshly pushed
/// emission context; no forward references cross event boundaries. Every
/// produced byte string is re-checked with [`isa::validate`] before being
/// handed out.
pub fn compile(program: &Program) -> CompileResult<CompiledProgram> {
    let mut compiler = Compiler::new();
    let mut compiled = CompiledProgram::default();
    for (i, nodes) in program.events().into_iter().enumerate() {
        compiler.push_context();
        for node in nodes {
            compiler.emit_node(node)?;
        }
        let bytes = compiler.pop_context();
        isa::validate(&bytes).map_err(|e| CompileError::Internal(e.to_string()))?;
        compiled.events[i] = bytes;
    }
    Ok(compiled)
}

// ══════════════════════════════════════════════════════════════════════════════
// Compiler
// ══════════════════════════════════════════════════════════════════════════════

/// One emission context: an appendable byte buffer plus the loop state
/// local to it. Nested function bodies and rec-range actions push fresh
/// contexts so a `break` can never patch across a context boundary.
struct Context {
    bytes: Vec<u8>,
    /// Byte offsets at which enclosing loops' iterations begin.
    loop_starts: Vec<usize>,
    /// Per-loop sets of operand-byte indices to back-patch at loop exit.
    break_patches: Vec<Vec<usize>>,
}

impl Context {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            loop_starts: Vec::new(),
            break_patches: Vec::new(),
        }
    }
}

/// Compiler state: a stack of emission contexts, the top one current.
pub(crate) struct Compiler {
    contexts: Vec<Context>,
}

impl Compiler {
    fn new() -> Self {
        Self {
            contexts: Vec::new(),
        }
    }

    // ── Emission contexts ────────────────────────────────────────────────

    pub(crate) fn push_context(&mut self) {
        self.contexts.push(Context::new());
    }

    pub(crate) fn pop_context(&mut self) -> Vec<u8> {
        self.contexts
            .pop()
            .expect("emission-context stack must not underflow")
            .bytes
    }

    fn ctx(&mut self) -> &mut Context {
        self.contexts
            .last_mut()
            .expect("emission-context stack is empty")
    }

    /// Current byte index in the current context.
    pub(crate) fn here(&self) -> usize {
        self.contexts
            .last()
            .expect("emission-context stack is empty")
            .bytes
            .len()
    }

    // ── Encoding helpers ─────────────────────────────────────────────────

    pub(crate) fn emit_op(&mut self, op: Op) {
        self.ctx().bytes.push(op as u8);
    }

    pub(crate) fn emit_u8(&mut self, byte: u8) {
        self.ctx().bytes.push(byte);
    }

    pub(crate) fn emit_u16(&mut self, value: u16) {
        self.ctx().bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn emit_bytes(&mut self, bytes: &[u8]) {
        self.ctx().bytes.extend_from_slice(bytes);
    }

    /// Emit a NUL-terminated string operand.
    pub(crate) fn emit_cstr(&mut self, text: &str, offset: u16) -> CompileResult<()> {
        if text.as_bytes().contains(&0) {
            return Err(CompileError::UnsupportedNode {
                message: "string operand contains a NUL byte".into(),
                offset,
            });
        }
        self.ctx().bytes.extend_from_slice(text.as_bytes());
        self.ctx().bytes.push(0);
        Ok(())
    }

    /// Reserve a 2-byte operand for later patching; returns its index.
    pub(crate) fn reserve_u16(&mut self) -> usize {
        let idx = self.here();
        self.emit_u16(0);
        idx
    }

    /// Narrow a byte index or count to 16 bits.
    pub(crate) fn u16_checked(
        value: usize,
        what: &'static str,
        offset: u16,
    ) -> CompileResult<u16> {
        u16::try_from(value).map_err(|_| CompileError::BytecodeOverflow { what, offset })
    }

    /// Write `value` into a previously reserved 2-byte operand.
    pub(crate) fn patch_u16(
        &mut self,
        idx: usize,
        value: usize,
        what: &'static str,
        offset: u16,
    ) -> CompileResult<()> {
        let value = Self::u16_checked(value, what, offset)?;
        self.ctx().bytes[idx..idx + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Patch a reserved jump operand to the current byte index.
    pub(crate) fn patch_to_here(&mut self, idx: usize, offset: u16) -> CompileResult<()> {
        let here = self.here();
        self.patch_u16(idx, here, "jump target", offset)
    }

    // ── Loop bookkeeping ─────────────────────────────────────────────────

    /// Record the current byte index as a loop's iteration point and open
    /// its jump-update set.
    pub(crate) fn enter_loop(&mut self) {
        let here = self.here();
        let ctx = self.ctx();
        ctx.loop_starts.push(here);
        ctx.break_patches.push(Vec::new());
    }

    /// Patch every pending jump-update of the innermost loop to the
    /// current index and close the loop.
    pub(crate) fn exit_loop(&mut self, offset: u16) -> CompileResult<()> {
        let pending = self
            .ctx()
            .break_patches
            .pop()
            .expect("exit_loop without enter_loop");
        self.ctx().loop_starts.pop();
        for idx in pending {
            self.patch_to_here(idx, offset)?;
        }
        Ok(())
    }

    /// Iteration point of the innermost loop in the current context.
    pub(crate) fn loop_start(&self) -> Option<usize> {
        self.contexts.last()?.loop_starts.last().copied()
    }

    /// Register a reserved jump operand with the innermost loop's
    /// jump-update set. Returns `false` when no loop encloses.
    pub(crate) fn register_loop_exit(&mut self, idx: usize) -> bool {
        match self.ctx().break_patches.last_mut() {
            Some(set) => {
                set.push(idx);
                true
            }
            None => false,
        }
    }

    // ── Node dispatch ────────────────────────────────────────────────────

    pub(crate) fn emit_node(&mut self, node: &Node) -> CompileResult<()> {
        match &node.kind {
            NodeKind::Boolean(_)
            | NodeKind::Nil
            | NodeKind::Float(_)
            | NodeKind::Int(_)
            | NodeKind::Uint(_) => expr::emit_literal(self, node),
            NodeKind::Str(_) => expr::emit_string(self, node),
            NodeKind::Ident(_) => expr::emit_load(self, node),
            NodeKind::Global(_) => expr::emit_global(self, node),
            NodeKind::Infix { .. } => expr::emit_infix(self, node),
            NodeKind::Prefix { .. } => expr::emit_prefix(self, node),
            NodeKind::List(_) => expr::emit_list(self, node),
            NodeKind::Map(_) => expr::emit_map(self, node),
            NodeKind::Range { .. } => expr::emit_range(self, node),
            NodeKind::Subscript { .. } => expr::emit_subscript(self, node),
            NodeKind::Call { .. } => expr::emit_call(self, node),
            NodeKind::Define { .. } => stmt::emit_define(self, node),
            NodeKind::Assign { .. } => stmt::emit_assign(self, node),
            NodeKind::Conditional { .. } => stmt::emit_conditional(self, node),
            NodeKind::Loop { .. } => stmt::emit_loop(self, node),
            NodeKind::LoopBreak => stmt::emit_break(self, node),
            NodeKind::LoopContinue => stmt::emit_continue(self, node),
            NodeKind::Func { .. } => stmt::emit_func(self, node),
            NodeKind::FuncReturn(_) => stmt::emit_return(self, node),
            NodeKind::RecRange { .. } => stmt::emit_rec_range(self, node),
            NodeKind::Redir { .. } => stmt::emit_redir(self, node),
            NodeKind::StmtEnd => {
                self.emit_op(Op::Pop);
                Ok(())
            }
        }
    }
}
