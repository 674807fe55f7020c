//! Statement and rule parsing.

use zed_lexer::TokenKind;
use zed_types::ast::{Combo, Node, NodeKind};
use zed_types::Diagnostic;

use crate::parser::Parser;

impl Parser {
    // ══════════════════════════════════════════════════════════════════════════
    // Top-level rules
    // ══════════════════════════════════════════════════════════════════════════

    /// Parse one top-level item belonging to the rules program: a
    /// record-range rule or a plain statement.
    ///
    /// Rule forms (`..` exclusive, `..=` inclusive):
    /// - `{ action }` — runs for every record
    /// - `from..to { action }`, `from.. { action }`, `..to { action }`
    ///
    /// Anything else is a statement; `from..to` without a trailing block is
    /// an ordinary range expression.
    pub(crate) fn parse_rule(&mut self, rules: &mut Vec<Node>) -> Result<(), Diagnostic> {
        let offset = self.current_offset();

        // Unconditional rule: a bare action block.
        if self.check(&TokenKind::LBrace) {
            let action = self.parse_block()?;
            let id = self.next_rec_range_id(offset)?;
            rules.push(Node::new(
                offset,
                NodeKind::RecRange {
                    from: None,
                    to: None,
                    action,
                    id,
                    exclusive: false,
                },
            ));
            return Ok(());
        }

        // `..to { action }` — no lower bound.
        if let Some(exclusive) = self.eat_range_op() {
            let to = self.parse_or()?;
            let action = self.parse_block()?;
            let id = self.next_rec_range_id(offset)?;
            rules.push(Node::new(
                offset,
                NodeKind::RecRange {
                    from: None,
                    to: Some(Box::new(to)),
                    action,
                    id,
                    exclusive,
                },
            ));
            return Ok(());
        }

        // Statement-leading keywords can never start a rule.
        if self.at_statement_keyword() {
            let stmt = self.parse_statement()?;
            return self.finish_rule_statement(stmt, rules);
        }

        // Expression: may turn into a range rule if `..`/`..=` followed by
        // a block appears.
        let expr = self.parse_or()?;
        if let Some(exclusive) = self.eat_range_op() {
            let op_offset = self.prev_offset();
            // `from.. { action }` — no upper bound.
            if self.check(&TokenKind::LBrace) {
                let action = self.parse_block()?;
                let id = self.next_rec_range_id(offset)?;
                rules.push(Node::new(
                    offset,
                    NodeKind::RecRange {
                        from: Some(Box::new(expr)),
                        to: None,
                        action,
                        id,
                        exclusive,
                    },
                ));
                return Ok(());
            }
            let to = self.parse_or()?;
            if self.check(&TokenKind::LBrace) {
                let action = self.parse_block()?;
                let id = self.next_rec_range_id(offset)?;
                rules.push(Node::new(
                    offset,
                    NodeKind::RecRange {
                        from: Some(Box::new(expr)),
                        to: Some(Box::new(to)),
                        action,
                        id,
                        exclusive,
                    },
                ));
                return Ok(());
            }
            // No block: an ordinary range expression statement.
            let range = Node::new(
                op_offset,
                NodeKind::Range {
                    from: Box::new(expr),
                    to: Box::new(to),
                    inclusive: !exclusive,
                },
            );
            let stmt = self.finish_expression_statement(range)?;
            return self.finish_rule_statement(stmt, rules);
        }

        let stmt = self.finish_expression_statement(expr)?;
        self.finish_rule_statement(stmt, rules)
    }

    /// `..` → exclusive, `..=` → inclusive, anything else → `None`.
    fn eat_range_op(&mut self) -> Option<bool> {
        if self.eat(&TokenKind::DotDot) {
            Some(true)
        } else if self.eat(&TokenKind::DotDotEq) {
            Some(false)
        } else {
            None
        }
    }

    /// Append a rules statement plus its terminator.
    fn finish_rule_statement(
        &mut self,
        stmt: Node,
        rules: &mut Vec<Node>,
    ) -> Result<(), Diagnostic> {
        rules.push(stmt);
        if self.check(&TokenKind::Semicolon) {
            let semi = self.advance();
            rules.push(Node::new(semi.offset, NodeKind::StmtEnd));
        } else if !self.check(&TokenKind::Eof) {
            return Err(self.error_at_current("expected ';' after statement"));
        }
        Ok(())
    }

    fn at_statement_keyword(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Let
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Do
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Fn
                | TokenKind::Return
        )
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════════

    /// Parse a single statement (without its `;` terminator).
    pub(crate) fn parse_statement(&mut self) -> Result<Node, Diagnostic> {
        match self.peek_kind() {
            TokenKind::Let => self.parse_let(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::Break => {
                let tok = self.advance();
                Ok(Node::new(tok.offset, NodeKind::LoopBreak))
            }
            TokenKind::Continue => {
                let tok = self.advance();
                Ok(Node::new(tok.offset, NodeKind::LoopContinue))
            }
            TokenKind::Fn => self.parse_fn(true),
            TokenKind::Return => self.parse_return(),
            _ => {
                let expr = self.parse_expression()?;
                self.finish_expression_statement(expr)
            }
        }
    }

    /// Continue an already-parsed expression into an assignment,
    /// redirection, or plain expression statement.
    pub(crate) fn finish_expression_statement(&mut self, expr: Node) -> Result<Node, Diagnostic> {
        if let Some(combo) = self.peek_combo() {
            self.advance();
            if !matches!(
                expr.kind,
                NodeKind::Ident(_) | NodeKind::Global(_) | NodeKind::Subscript { .. }
            ) {
                return Err(self.error_at(
                    expr.offset,
                    "assignment target must be an identifier, global or subscript",
                ));
            }
            let value = self.parse_expression()?;
            let offset = expr.offset;
            return Ok(Node::new(
                offset,
                NodeKind::Assign {
                    target: Box::new(expr),
                    value: Box::new(value),
                    combo,
                },
            ));
        }

        let clobber = match self.peek_kind() {
            TokenKind::RedirAppend => Some(false),
            TokenKind::RedirClobber => Some(true),
            _ => None,
        };
        if let Some(clobber) = clobber {
            let op = self.advance();
            let target = self.parse_expression()?;
            return Ok(Node::new(
                op.offset,
                NodeKind::Redir {
                    expr: Box::new(expr),
                    target: Box::new(target),
                    clobber,
                },
            ));
        }

        Ok(expr)
    }

    fn peek_combo(&self) -> Option<Combo> {
        match self.peek_kind() {
            TokenKind::Assign => Some(Combo::Assign),
            TokenKind::PlusAssign => Some(Combo::Add),
            TokenKind::MinusAssign => Some(Combo::Sub),
            TokenKind::StarAssign => Some(Combo::Mul),
            TokenKind::SlashAssign => Some(Combo::Div),
            TokenKind::PercentAssign => Some(Combo::Mod),
            TokenKind::QuestionAssign => Some(Combo::Fallback),
            _ => None,
        }
    }

    fn parse_let(&mut self) -> Result<Node, Diagnostic> {
        let let_tok = self.advance();
        let name_tok = self.peek().clone();
        let name = match &name_tok.kind {
            TokenKind::Ident(n) => n.clone(),
            other => {
                return Err(self.error_at_current(format!(
                    "expected a variable name after 'let', found '{other}'"
                )));
            }
        };
        self.advance();
        self.expect(&TokenKind::Assign, "after the variable name")?;
        let value = self.parse_expression()?;
        Ok(Node::new(
            let_tok.offset,
            NodeKind::Define {
                name: Box::new(Node::new(name_tok.offset, NodeKind::Ident(name))),
                value: Box::new(value),
            },
        ))
    }

    fn parse_if(&mut self) -> Result<Node, Diagnostic> {
        let if_tok = self.advance();
        self.expect(&TokenKind::LParen, "after 'if'")?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RParen, "after the condition")?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                vec![self.parse_if()?]
            } else {
                self.parse_block()?
            }
        } else {
            Vec::new()
        };
        Ok(Node::new(
            if_tok.offset,
            NodeKind::Conditional {
                condition: Box::new(condition),
                then_branch,
                else_branch,
            },
        ))
    }

    fn parse_while(&mut self) -> Result<Node, Diagnostic> {
        let while_tok = self.advance();
        self.expect(&TokenKind::LParen, "after 'while'")?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RParen, "after the condition")?;
        let body = self.parse_block()?;
        Ok(Node::new(
            while_tok.offset,
            NodeKind::Loop {
                condition: Box::new(condition),
                body,
                is_do: false,
            },
        ))
    }

    fn parse_do_while(&mut self) -> Result<Node, Diagnostic> {
        let do_tok = self.advance();
        let body = self.parse_block()?;
        self.expect(&TokenKind::While, "after the do-block")?;
        self.expect(&TokenKind::LParen, "after 'while'")?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RParen, "after the condition")?;
        Ok(Node::new(
            do_tok.offset,
            NodeKind::Loop {
                condition: Box::new(condition),
                body,
                is_do: true,
            },
        ))
    }

    /// Parse a function literal. Statement position (`require_name`)
    /// demands a name; expression position allows anonymous functions.
    pub(crate) fn parse_fn(&mut self, require_name: bool) -> Result<Node, Diagnostic> {
        let fn_tok = self.advance();
        let name = match self.peek_kind() {
            TokenKind::Ident(n) => {
                let n = n.clone();
                self.advance();
                n
            }
            _ if !require_name => String::new(),
            other => {
                return Err(self.error_at_current(format!(
                    "expected a function name after 'fn', found '{other}'"
                )));
            }
        };

        self.expect(&TokenKind::LParen, "to open the parameter list")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                match self.peek_kind() {
                    TokenKind::Ident(p) => {
                        params.push(p.clone());
                        self.advance();
                    }
                    other => {
                        return Err(self.error_at_current(format!(
                            "expected a parameter name, found '{other}'"
                        )));
                    }
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "to close the parameter list")?;
        let body = self.parse_block()?;
        Ok(Node::new(fn_tok.offset, NodeKind::Func { name, params, body }))
    }

    fn parse_return(&mut self) -> Result<Node, Diagnostic> {
        let ret_tok = self.advance();
        let inner = if matches!(self.peek_kind(), TokenKind::Semicolon | TokenKind::RBrace) {
            Node::new(ret_tok.offset, NodeKind::Nil)
        } else {
            self.parse_expression()?
        };
        Ok(Node::new(ret_tok.offset, NodeKind::FuncReturn(Box::new(inner))))
    }
}
