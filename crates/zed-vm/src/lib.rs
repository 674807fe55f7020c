//! ZED virtual machine: a stack interpreter over the bytecode emitted by
//! `zed-codegen`, plus the builtin function set.
//!
//! The VM is invoked once per event program by the driver and shares its
//! scope stack, globals, and output buffer across invocations. Values left
//! on the operand stack when an event program finishes are flushed to the
//! output buffer, which is how a trailing `@rec` echoes records.

pub mod builtins;
pub mod env;
pub mod error;
pub mod value;
pub mod vm;

pub use error::{VmError, VmResult};
pub use value::{FuncValue, Value};
pub use vm::{Globals, Vm};
