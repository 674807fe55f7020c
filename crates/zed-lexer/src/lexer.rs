//! Core ZED lexer — a byte cursor with a mode stack for string
//! interpolation.

use zed_types::ast::Global;
use zed_types::{Diagnostic, ErrorKind, SourceFile};

use crate::token::{Token, TokenKind};

/// Lexer mode — tracks whether we're scanning top-level code, the text of
/// a string literal, or an interpolation expression inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Normal code scanning.
    Normal,
    /// Inside a string literal — scanning text until `"` or `${`.
    Str,
    /// Inside a `${...}` interpolation. The `u32` tracks the brace depth so
    /// we know when the interpolation's closing `}` is reached.
    Interp { brace_depth: u32 },
}

/// The ZED lexer.
///
/// Converts source text into a vector of [`Token`]s, stopping at the first
/// error.
pub struct Lexer<'src> {
    /// The full source text as bytes.
    source: &'src [u8],
    /// Current byte offset into `source`.
    pos: usize,
    /// Mode stack for string interpolation.
    mode_stack: Vec<Mode>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source file.
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            pos: 0,
            mode_stack: vec![Mode::Normal],
        }
    }

    /// Lex the entire source into a token stream ending with `Eof`.
    pub fn lex(mut self) -> Result<Vec<Token>, Diagnostic> {
        if self.source.len() > u16::MAX as usize {
            return Err(self.error_at(
                0,
                format!("program too large: {} bytes (max 65535)", self.source.len()),
            ));
        }

        let mut tokens = Vec::new();
        loop {
            let token = match self.current_mode() {
                Mode::Str => self.scan_string()?,
                Mode::Normal | Mode::Interp { .. } => self.scan_normal()?,
            };
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    // ─────────────────────────────────────────────────────────────
    // Mode stack helpers
    // ─────────────────────────────────────────────────────────────

    fn current_mode(&self) -> Mode {
        *self.mode_stack.last().unwrap_or(&Mode::Normal)
    }

    fn push_mode(&mut self, mode: Mode) {
        self.mode_stack.push(mode);
    }

    fn pop_mode(&mut self) {
        if self.mode_stack.len() > 1 {
            self.mode_stack.pop();
        }
    }

    /// Adjust the brace depth of the innermost interpolation mode.
    fn bump_brace_depth(&mut self, delta: i32) {
        if let Some(Mode::Interp { brace_depth }) = self.mode_stack.last_mut() {
            *brace_depth = brace_depth.wrapping_add_signed(delta);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        Some(ch)
    }

    fn offset(&self) -> u16 {
        self.pos as u16
    }

    fn error_at(&self, offset: u16, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(ErrorKind::Lex, message, offset)
    }

    // ─────────────────────────────────────────────────────────────
    // Normal / interpolation mode
    // ─────────────────────────────────────────────────────────────

    fn scan_normal(&mut self) -> Result<Token, Diagnostic> {
        self.skip_whitespace_and_comments();

        let offset = self.offset();
        let Some(ch) = self.peek() else {
            if self.current_mode() != Mode::Normal {
                return Err(self.error_at(offset, "unterminated string"));
            }
            return Ok(Token::new(TokenKind::Eof, offset));
        };

        if ch.is_ascii_alphabetic() || ch == b'_' {
            return Ok(self.scan_ident(offset));
        }
        if ch.is_ascii_digit() {
            return self.scan_number(offset);
        }

        self.advance();
        let kind = match ch {
            b'@' => return self.scan_global(offset),
            b'"' => {
                self.push_mode(Mode::Str);
                TokenKind::StringStart
            }
            b'{' => {
                self.bump_brace_depth(1);
                TokenKind::LBrace
            }
            b'}' => match self.current_mode() {
                Mode::Interp { brace_depth: 0 } => {
                    self.pop_mode();
                    TokenKind::InterpEnd
                }
                Mode::Interp { .. } => {
                    self.bump_brace_depth(-1);
                    TokenKind::RBrace
                }
                _ => TokenKind::RBrace,
            },
            b':' => match self.current_mode() {
                // `:` at interpolation top level starts a raw format spec.
                Mode::Interp { brace_depth: 0 } => return self.scan_format_spec(offset),
                _ => TokenKind::Colon,
            },
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semicolon,
            b'+' => self.pick2(b'+', TokenKind::PlusPlus, b'=', TokenKind::PlusAssign, TokenKind::Plus),
            b'-' => self.pick(b'=', TokenKind::MinusAssign, TokenKind::Minus),
            b'*' => self.pick2(b'*', TokenKind::StarStar, b'=', TokenKind::StarAssign, TokenKind::Star),
            b'/' => self.pick(b'=', TokenKind::SlashAssign, TokenKind::Slash),
            b'%' => self.pick(b'=', TokenKind::PercentAssign, TokenKind::Percent),
            b'=' => self.pick(b'=', TokenKind::EqEq, TokenKind::Assign),
            b'<' => self.pick(b'=', TokenKind::LtEq, TokenKind::Lt),
            b'>' => match self.peek() {
                Some(b'>') => {
                    self.advance();
                    TokenKind::RedirAppend
                }
                Some(b'!') => {
                    self.advance();
                    TokenKind::RedirClobber
                }
                Some(b'=') => {
                    self.advance();
                    TokenKind::GtEq
                }
                _ => TokenKind::Gt,
            },
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::BangEq
                } else {
                    return Err(self.error_at(offset, "unexpected character '!'"));
                }
            }
            b'?' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::QuestionAssign
                } else {
                    return Err(self.error_at(offset, "unexpected character '?'"));
                }
            }
            b'.' => {
                if self.peek() == Some(b'.') {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::DotDotEq
                    } else {
                        TokenKind::DotDot
                    }
                } else {
                    return Err(self.error_at(offset, "unexpected character '.'"));
                }
            }
            other => {
                return Err(self.error_at(
                    offset,
                    format!("unexpected character '{}'", other as char),
                ));
            }
        };
        Ok(Token::new(kind, offset))
    }

    /// Two-way operator choice: `next` selects `matched`, anything else
    /// yields `fallback`.
    fn pick(&mut self, next: u8, matched: TokenKind, fallback: TokenKind) -> TokenKind {
        if self.peek() == Some(next) {
            self.advance();
            matched
        } else {
            fallback
        }
    }

    fn pick2(
        &mut self,
        a: u8,
        on_a: TokenKind,
        b: u8,
        on_b: TokenKind,
        fallback: TokenKind,
    ) -> TokenKind {
        if self.peek() == Some(a) {
            self.advance();
            on_a
        } else if self.peek() == Some(b) {
            self.advance();
            on_b
        } else {
            fallback
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.advance();
                }
                b'#' => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_ident(&mut self, offset: u16) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.advance();
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.source[start..self.pos])
            .expect("identifier bytes are ASCII");
        let kind = TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()));
        Token::new(kind, offset)
    }

    fn scan_global(&mut self, offset: u16) -> Result<Token, Diagnostic> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.advance();
            } else {
                break;
            }
        }
        let name = std::str::from_utf8(&self.source[start..self.pos])
            .expect("global name bytes are ASCII");
        match Global::from_name(name) {
            Some(g) => Ok(Token::new(TokenKind::Global(g), offset)),
            None => Err(self.error_at(offset, format!("unknown global @{name}"))),
        }
    }

    fn scan_number(&mut self, offset: u16) -> Result<Token, Diagnostic> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        // A `.` only continues the number when followed by a digit, so
        // `1..5` lexes as int, dotdot, int.
        let is_float =
            self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit());
        if is_float {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
            let text = std::str::from_utf8(&self.source[start..self.pos]).expect("digits");
            let value: f64 = text
                .parse()
                .map_err(|_| self.error_at(offset, format!("invalid float literal '{text}'")))?;
            return Ok(Token::new(TokenKind::Float(value), offset));
        }

        let text = std::str::from_utf8(&self.source[start..self.pos]).expect("digits");
        if self.peek() == Some(b'u') {
            self.advance();
            let value: u64 = text.parse().map_err(|_| {
                self.error_at(offset, format!("unsigned literal out of range '{text}u'"))
            })?;
            return Ok(Token::new(TokenKind::Uint(value), offset));
        }

        match text.parse::<i64>() {
            Ok(value) => Ok(Token::new(TokenKind::Int(value), offset)),
            Err(_) => match text.parse::<u64>() {
                // Too big for i64 but still representable — promote.
                Ok(value) => Ok(Token::new(TokenKind::Uint(value), offset)),
                Err(_) => Err(self.error_at(offset, format!("integer literal out of range '{text}'"))),
            },
        }
    }

    /// Read the raw format spec after `:` inside an interpolation, leaving
    /// the closing `}` for the next scan.
    fn scan_format_spec(&mut self, offset: u16) -> Result<Token, Diagnostic> {
        let start = self.pos;
        loop {
            match self.peek() {
                Some(b'}') => break,
                Some(b'\n') | None => {
                    return Err(self.error_at(offset, "unterminated format spec"));
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        let spec = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        Ok(Token::new(TokenKind::InterpFormat(spec), offset))
    }

    // ─────────────────────────────────────────────────────────────
    // String mode
    // ─────────────────────────────────────────────────────────────

    fn scan_string(&mut self) -> Result<Token, Diagnostic> {
        let offset = self.offset();

        match self.peek() {
            None => return Err(self.error_at(offset, "unterminated string")),
            Some(b'"') => {
                self.advance();
                self.pop_mode();
                return Ok(Token::new(TokenKind::StringEnd, offset));
            }
            Some(b'$') if self.peek_at(1) == Some(b'{') => {
                self.advance();
                self.advance();
                self.push_mode(Mode::Interp { brace_depth: 0 });
                return Ok(Token::new(TokenKind::InterpStart, offset));
            }
            Some(_) => {}
        }

        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error_at(offset, "unterminated string")),
                Some(b'"') => break,
                Some(b'$') if self.peek_at(1) == Some(b'{') => break,
                Some(b'\\') => {
                    let esc_offset = self.offset();
                    self.advance();
                    let decoded = match self.advance() {
                        Some(b'n') => '\n',
                        Some(b't') => '\t',
                        Some(b'r') => '\r',
                        Some(b'\\') => '\\',
                        Some(b'"') => '"',
                        Some(b'$') => '$',
                        Some(b'0') => '\0',
                        Some(other) => {
                            return Err(self.error_at(
                                esc_offset,
                                format!("unknown escape '\\{}'", other as char),
                            ));
                        }
                        None => return Err(self.error_at(esc_offset, "unterminated string")),
                    };
                    text.push(decoded);
                }
                Some(_) => {
                    // Copy a full UTF-8 sequence byte by byte.
                    let b = self.advance().expect("peeked");
                    let mut bytes = vec![b];
                    let extra = match b {
                        0xC0..=0xDF => 1,
                        0xE0..=0xEF => 2,
                        0xF0..=0xF7 => 3,
                        _ => 0,
                    };
                    for _ in 0..extra {
                        if let Some(c) = self.advance() {
                            bytes.push(c);
                        }
                    }
                    text.push_str(&String::from_utf8_lossy(&bytes));
                }
            }
        }
        Ok(Token::new(TokenKind::StringText(text), offset))
    }
}
