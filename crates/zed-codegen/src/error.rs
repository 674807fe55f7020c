//! Compile error types.

use thiserror::Error;
use zed_types::ast::Global;
use zed_types::{Diagnostic, ErrorKind};

/// Errors raised while lowering an AST to bytecode.
///
/// The compiler does not continue past the first error; every variant
/// carries the offending source offset.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// Assignment targets `@file`, `@frnum` or `@rnum`.
    #[error("cannot assign to read-only global {global}")]
    ReadOnlyGlobal { global: Global, offset: u16 },

    /// An AST shape the compiler refuses in this position
    /// (`break`/`continue` outside a loop, a bad lvalue, …).
    #[error("{message}")]
    UnsupportedNode { message: String, offset: u16 },

    /// An operand that would exceed its encoded width.
    #[error("{what} exceeds the bytecode operand limit")]
    BytecodeOverflow { what: &'static str, offset: u16 },

    /// The emitted bytecode failed the post-compilation decode walk.
    /// Indicates a compiler bug, never a user error.
    #[error("internal codegen error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn offset(&self) -> u16 {
        match self {
            Self::ReadOnlyGlobal { offset, .. }
            | Self::UnsupportedNode { offset, .. }
            | Self::BytecodeOverflow { offset, .. } => *offset,
            Self::Internal(_) => 0,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReadOnlyGlobal { .. } => ErrorKind::ReadOnlyGlobal,
            Self::UnsupportedNode { .. } | Self::Internal(_) => ErrorKind::UnsupportedNode,
            Self::BytecodeOverflow { .. } => ErrorKind::BytecodeOverflow,
        }
    }
}

impl From<CompileError> for Diagnostic {
    fn from(e: CompileError) -> Diagnostic {
        Diagnostic::new(e.kind(), e.to_string(), e.offset())
    }
}

/// Compile result alias.
pub type CompileResult<T> = Result<T, CompileError>;
