//! Shared types for the ZED toolchain: AST nodes, source files with
//! offset → line:col resolution, and the structured [`Diagnostic`] every
//! phase reports errors through.

pub mod ast;
pub mod error;
pub mod source;

pub use error::{Diagnostic, ErrorKind};
pub use source::SourceFile;
