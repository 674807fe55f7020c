//! Expression parsing with full operator precedence.
//!
//! Precedence (loosest → tightest):
//! 8. `..` / `..=` (range)
//! 7. `or`
//! 6. `and`
//! 5. `==`, `!=`, `<`, `>`, `<=`, `>=` (no chaining)
//! 4. `++` (concat)
//! 3. `+`, `-`
//! 2. `*`, `/`, `%`, `**`
//! 1. unary `-`, `not`
//! 0. call `()`, subscript `[]`

use zed_lexer::TokenKind;
use zed_types::ast::{InfixOp, Node, NodeKind, PrefixOp, Segment};
use zed_types::Diagnostic;

use crate::parser::Parser;

impl Parser {
    // ══════════════════════════════════════════════════════════════════════════
    // Entry Point
    // ══════════════════════════════════════════════════════════════════════════

    /// Parse an expression.
    pub(crate) fn parse_expression(&mut self) -> Result<Node, Diagnostic> {
        self.parse_range()
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Precedence Chain
    // ══════════════════════════════════════════════════════════════════════════

    /// `RangeExpr = OrExpr [ (".." | "..=") OrExpr ]`
    fn parse_range(&mut self) -> Result<Node, Diagnostic> {
        let from = self.parse_or()?;
        let inclusive = match self.peek_kind() {
            TokenKind::DotDot => false,
            TokenKind::DotDotEq => true,
            _ => return Ok(from),
        };
        let op = self.advance();
        let to = self.parse_or()?;
        Ok(Node::new(
            op.offset,
            NodeKind::Range {
                from: Box::new(from),
                to: Box::new(to),
                inclusive,
            },
        ))
    }

    /// `OrExpr = AndExpr { "or" AndExpr }`
    pub(crate) fn parse_or(&mut self) -> Result<Node, Diagnostic> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::Or) {
            let op = self.advance();
            let right = self.parse_and()?;
            left = infix(op.offset, left, right, InfixOp::Or);
        }
        Ok(left)
    }

    /// `AndExpr = CompExpr { "and" CompExpr }`
    fn parse_and(&mut self) -> Result<Node, Diagnostic> {
        let mut left = self.parse_comparison()?;
        while self.check(&TokenKind::And) {
            let op = self.advance();
            let right = self.parse_comparison()?;
            left = infix(op.offset, left, right, InfixOp::And);
        }
        Ok(left)
    }

    /// `CompExpr = ConcatExpr [ CompOp ConcatExpr ]`
    ///
    /// Comparison operators do NOT chain: `a < b < c` is a parse error.
    fn parse_comparison(&mut self) -> Result<Node, Diagnostic> {
        let mut left = self.parse_concat()?;
        if let Some(op_kind) = self.comparison_op() {
            let op = self.advance();
            let right = self.parse_concat()?;
            left = infix(op.offset, left, right, op_kind);
            if self.comparison_op().is_some() {
                return Err(self.error_at_current(
                    "comparison operators cannot be chained; use 'and' to combine",
                ));
            }
        }
        Ok(left)
    }

    fn comparison_op(&self) -> Option<InfixOp> {
        match self.peek_kind() {
            TokenKind::EqEq => Some(InfixOp::Eq),
            TokenKind::BangEq => Some(InfixOp::Neq),
            TokenKind::Lt => Some(InfixOp::Lt),
            TokenKind::LtEq => Some(InfixOp::Lte),
            TokenKind::Gt => Some(InfixOp::Gt),
            TokenKind::GtEq => Some(InfixOp::Gte),
            _ => None,
        }
    }

    /// `ConcatExpr = AddExpr { "++" AddExpr }`
    fn parse_concat(&mut self) -> Result<Node, Diagnostic> {
        let mut left = self.parse_add()?;
        while self.check(&TokenKind::PlusPlus) {
            let op = self.advance();
            let right = self.parse_add()?;
            left = infix(op.offset, left, right, InfixOp::Concat);
        }
        Ok(left)
    }

    /// `AddExpr = MulExpr { ("+" | "-") MulExpr }`
    fn parse_add(&mut self) -> Result<Node, Diagnostic> {
        let mut left = self.parse_mul()?;
        loop {
            let op_kind = match self.peek_kind() {
                TokenKind::Plus => InfixOp::Add,
                TokenKind::Minus => InfixOp::Sub,
                _ => break,
            };
            let op = self.advance();
            let right = self.parse_mul()?;
            left = infix(op.offset, left, right, op_kind);
        }
        Ok(left)
    }

    /// `MulExpr = UnaryExpr { ("*" | "/" | "%" | "**") UnaryExpr }`
    fn parse_mul(&mut self) -> Result<Node, Diagnostic> {
        let mut left = self.parse_unary()?;
        loop {
            let op_kind = match self.peek_kind() {
                TokenKind::Star => InfixOp::Mul,
                TokenKind::Slash => InfixOp::Div,
                TokenKind::Percent => InfixOp::Mod,
                TokenKind::StarStar => InfixOp::Repeat,
                _ => break,
            };
            let op = self.advance();
            let right = self.parse_unary()?;
            left = infix(op.offset, left, right, op_kind);
        }
        Ok(left)
    }

    /// `UnaryExpr = ("-" | "not") UnaryExpr | PostfixExpr`
    fn parse_unary(&mut self) -> Result<Node, Diagnostic> {
        let op_kind = match self.peek_kind() {
            TokenKind::Minus => PrefixOp::Neg,
            TokenKind::Not => PrefixOp::Not,
            _ => return self.parse_postfix(),
        };
        let op = self.advance();
        let operand = self.parse_unary()?;
        Ok(Node::new(
            op.offset,
            NodeKind::Prefix {
                operand: Box::new(operand),
                op: op_kind,
            },
        ))
    }

    /// `PostfixExpr = Primary { "(" args ")" | "[" expr "]" }`
    fn parse_postfix(&mut self) -> Result<Node, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    let lparen = self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expression()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen, "to close the argument list")?;
                    expr = Node::new(
                        lparen.offset,
                        NodeKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                    );
                }
                TokenKind::LBracket => {
                    let lbracket = self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RBracket, "to close the subscript")?;
                    expr = Node::new(
                        lbracket.offset,
                        NodeKind::Subscript {
                            container: Box::new(expr),
                            index: Box::new(index),
                        },
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Primaries
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_primary(&mut self) -> Result<Node, Diagnostic> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Int(v) => {
                self.advance();
                Ok(Node::new(tok.offset, NodeKind::Int(v)))
            }
            TokenKind::Uint(v) => {
                self.advance();
                Ok(Node::new(tok.offset, NodeKind::Uint(v)))
            }
            TokenKind::Float(v) => {
                self.advance();
                Ok(Node::new(tok.offset, NodeKind::Float(v)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Node::new(tok.offset, NodeKind::Boolean(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Node::new(tok.offset, NodeKind::Boolean(false)))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Node::new(tok.offset, NodeKind::Nil))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Node::new(tok.offset, NodeKind::Ident(name)))
            }
            TokenKind::Global(g) => {
                self.advance();
                Ok(Node::new(tok.offset, NodeKind::Global(g)))
            }
            TokenKind::StringStart => self.parse_string(),
            TokenKind::Fn => self.parse_fn(false),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen, "to close the parenthesized expression")?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_list(),
            TokenKind::LBrace => self.parse_map(),
            other => Err(self.error_at_current(format!("expected an expression, found '{other}'"))),
        }
    }

    fn parse_list(&mut self) -> Result<Node, Diagnostic> {
        let open = self.advance();
        let mut elements = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            loop {
                elements.push(self.parse_expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBracket, "to close the list")?;
        Ok(Node::new(open.offset, NodeKind::List(elements)))
    }

    fn parse_map(&mut self) -> Result<Node, Diagnostic> {
        let open = self.advance();
        let mut entries = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let key = self.parse_expression()?;
                self.expect(&TokenKind::Colon, "between map key and value")?;
                let value = self.parse_expression()?;
                entries.push((key, value));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace, "to close the map")?;
        Ok(Node::new(open.offset, NodeKind::Map(entries)))
    }

    /// Assemble string segments from the lexer's string-piece tokens.
    fn parse_string(&mut self) -> Result<Node, Diagnostic> {
        let start = self.advance(); // StringStart
        let mut segments = Vec::new();
        loop {
            let tok = self.peek().clone();
            match tok.kind {
                TokenKind::StringText(text) => {
                    self.advance();
                    segments.push(Segment::Plain(text));
                }
                TokenKind::InterpStart => {
                    self.advance();
                    let nodes = vec![self.parse_expression()?];
                    let spec = match self.peek_kind() {
                        TokenKind::InterpFormat(s) => {
                            let s = s.clone();
                            self.advance();
                            Some(s)
                        }
                        _ => None,
                    };
                    self.expect(&TokenKind::InterpEnd, "to close the interpolation")?;
                    segments.push(Segment::Interp {
                        nodes,
                        spec,
                        offset: tok.offset,
                    });
                }
                TokenKind::StringEnd => {
                    self.advance();
                    break;
                }
                other => {
                    return Err(
                        self.error_at_current(format!("unexpected '{other}' inside a string"))
                    );
                }
            }
        }
        Ok(Node::new(start.offset, NodeKind::Str(segments)))
    }
}

fn infix(offset: u16, left: Node, right: Node, op: InfixOp) -> Node {
    Node::new(
        offset,
        NodeKind::Infix {
            left: Box::new(left),
            right: Box::new(right),
            op,
        },
    )
}
