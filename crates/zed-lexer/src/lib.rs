//! ZED lexer — converts source text to a token stream.
//!
//! Features:
//! - String interpolation with `${expr}` and `${expr:spec}` via a mode stack
//! - Single-line comments stripped (`#`)
//! - `@name` globals resolved against the predefined global table
//! - Fails fast on the first error (no recovery; see spec §7)

pub mod lexer;
pub mod token;

pub use lexer::Lexer;
pub use token::{Token, TokenKind};
