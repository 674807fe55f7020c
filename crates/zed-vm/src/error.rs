//! Runtime error types.
//!
//! Every variant carries the source offset embedded in the faulting
//! instruction; the driver resolves it to line:col against the cached
//! source.

use thiserror::Error;
use zed_types::{Diagnostic, ErrorKind};

#[derive(Debug, Error)]
pub enum VmError {
    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String, offset: u16 },

    #[error("type mismatch: {message}")]
    TypeMismatch { message: String, offset: u16 },

    #[error("division by zero")]
    DivisionByZero { offset: u16 },

    #[error("wrong number of arguments to {builtin}: expected {expected}, got {got}")]
    Arity {
        builtin: &'static str,
        expected: usize,
        got: usize,
        offset: u16,
    },

    #[error("{message}")]
    Io { message: String, offset: u16 },

    /// A decode failure the post-compile validation should have caught.
    #[error("corrupt bytecode: {message}")]
    CorruptBytecode { message: String, offset: u16 },
}

impl VmError {
    pub fn offset(&self) -> u16 {
        match self {
            Self::UndefinedVariable { offset, .. }
            | Self::TypeMismatch { offset, .. }
            | Self::DivisionByZero { offset }
            | Self::Arity { offset, .. }
            | Self::Io { offset, .. }
            | Self::CorruptBytecode { offset, .. } => *offset,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            _ => ErrorKind::Runtime,
        }
    }
}

impl From<VmError> for Diagnostic {
    fn from(e: VmError) -> Diagnostic {
        Diagnostic::new(e.kind(), e.to_string(), e.offset())
    }
}

/// Runtime result alias.
pub type VmResult<T> = Result<T, VmError>;
