//! Core parser infrastructure: token cursor, error reporting, top-level
//! program structure.

use zed_lexer::{Token, TokenKind};
use zed_types::ast::{Node, NodeKind, Program};
use zed_types::{Diagnostic, ErrorKind};

/// The ZED parser.
///
/// Consumes a token stream produced by the lexer and builds a [`Program`].
/// Stops at the first error; there is no recovery.
pub struct Parser {
    /// The token stream (always ends with `Eof`).
    tokens: Vec<Token>,
    /// Current index into `tokens`.
    pos: usize,
    /// Record-range rules seen so far; the count is the next rule id.
    rec_ranges: u16,
}

impl Parser {
    /// Create a new parser from a token stream.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            rec_ranges: 0,
        }
    }

    /// Parse a complete program.
    pub fn parse(mut self) -> Result<Program, Diagnostic> {
        let mut program = Program::default();
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                // Stray semicolons between top-level items are harmless.
                TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::OnInit => {
                    self.advance();
                    let block = self.parse_block()?;
                    program.inits.extend(block);
                }
                TokenKind::OnFile => {
                    self.advance();
                    let block = self.parse_block()?;
                    program.files.extend(block);
                }
                TokenKind::OnRec => {
                    self.advance();
                    let block = self.parse_block()?;
                    program.recs.extend(block);
                }
                TokenKind::OnExit => {
                    self.advance();
                    let block = self.parse_block()?;
                    program.exits.extend(block);
                }
                _ => {
                    self.parse_rule(&mut program.rules)?;
                }
            }
        }
        Ok(program)
    }

    /// Allocate the next record-range rule id.
    pub(crate) fn next_rec_range_id(&mut self, offset: u16) -> Result<u8, Diagnostic> {
        if self.rec_ranges > u8::MAX as u16 {
            return Err(self.error_at(offset, "too many record-range rules (max 256)"));
        }
        let id = self.rec_ranges as u8;
        self.rec_ranges += 1;
        Ok(id)
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    /// Returns the current token without advancing.
    pub(crate) fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or_else(|| {
            self.tokens
                .last()
                .expect("token stream should end with Eof")
        })
    }

    /// Returns the kind of the current token.
    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    /// Returns the offset of the current token.
    pub(crate) fn current_offset(&self) -> u16 {
        self.peek().offset
    }

    /// Returns the offset of the previously consumed token.
    pub(crate) fn prev_offset(&self) -> u16 {
        if self.pos > 0 {
            self.tokens[self.pos - 1].offset
        } else {
            0
        }
    }

    /// Advance the cursor by one and return the consumed token.
    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token matches the given kind exactly.
    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// If the current token matches, advance and return `true`.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume a token of the given kind or fail.
    pub(crate) fn expect(&mut self, kind: &TokenKind, context: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_at_current(format!(
                "expected '{kind}' {context}, found '{}'",
                self.peek_kind()
            )))
        }
    }

    // ── Errors ────────────────────────────────────────────────────────────────

    pub(crate) fn error_at(&self, offset: u16, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(ErrorKind::Parse, message, offset)
    }

    pub(crate) fn error_at_current(&self, message: impl Into<String>) -> Diagnostic {
        self.error_at(self.current_offset(), message)
    }

    // ── Blocks ────────────────────────────────────────────────────────────────

    /// Parse `{ stmt; stmt; ... }` into a node list.
    ///
    /// A `;` after a statement appends a [`NodeKind::StmtEnd`] node (the
    /// compiler lowers it to a `pop`); the final statement may omit it, in
    /// which case its value flows out of the event program.
    pub(crate) fn parse_block(&mut self) -> Result<Vec<Node>, Diagnostic> {
        self.expect(&TokenKind::LBrace, "to open a block")?;
        let mut nodes = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.error_at_current("unclosed block, expected '}'"));
            }
            let stmt = self.parse_statement()?;
            nodes.push(stmt);
            if self.check(&TokenKind::Semicolon) {
                let semi = self.advance();
                nodes.push(Node::new(semi.offset, NodeKind::StmtEnd));
            } else if !self.check(&TokenKind::RBrace) {
                return Err(self.error_at_current("expected ';' or '}' after statement"));
            }
        }
        self.expect(&TokenKind::RBrace, "to close the block")?;
        Ok(nodes)
    }
}
