//! ZED parser — consumes the lexer's token stream and builds a
//! [`Program`]: five ordered node lists, one per event.
//!
//! Event blocks (`onInit { .. }` etc.) feed the corresponding list; every
//! other top-level construct belongs to the rules program, which runs once
//! per record.

mod parse_expr;
mod parse_stmt;
pub mod parser;

pub use parser::Parser;

use zed_types::ast::Program;
use zed_types::{Diagnostic, SourceFile};

/// Lex and parse a source file in one step.
pub fn parse_source(source_file: &SourceFile) -> Result<Program, Diagnostic> {
    let tokens = zed_lexer::Lexer::new(source_file).lex()?;
    Parser::new(tokens).parse()
}
