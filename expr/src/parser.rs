// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Recursive descent parser. Precedence, loosest first:
//! `or` < `and` < `not` < comparisons < `|` < `&` < `+ -` < `* / // %` < unary < `**`.

use crate::ast::{BinaryOp, CmpOp, Expr, LogicOp, UnaryOp};
use crate::error::{ExprError, Result};
use crate::lexer::{SpannedToken, Token, tokenize};

/// Maximum nesting depth; deeper input is refused rather than risking the stack.
const MAX_DEPTH: usize = 64;

/// Maximum operator count. Operator chains are left-nested, so this bounds the tree depth
/// that binding and evaluation recurse over.
const MAX_OPERATORS: usize = 256;

pub fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        depth: 0,
        operators: 0,
    };
    let expr = parser.parse_or()?;
    if !parser.is_at_end() {
        return Err(parser.unexpected("end of input"));
    }
    Ok(expr)
}

struct Parser<'source> {
    source: &'source str,
    tokens: Vec<SpannedToken>,
    pos: usize,
    depth: usize,
    operators: usize,
}

impl<'source> Parser<'source> {
    fn current(&self) -> &SpannedToken {
        // tokenize always terminates with Eof and the cursor never moves past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current().token, Token::Eof)
    }

    fn advance(&mut self) -> SpannedToken {
        let tok = self.current().clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        tok
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if &self.current().token == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> ExprError {
        let current = self.current();
        ExprError::Syntax {
            expression: self.source.to_string(),
            position: current.start,
            message: format!("expected {}, found {}", expected, current.token),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::Unsafe {
                expression: self.source.to_string(),
                reason: format!("nesting deeper than {}", MAX_DEPTH),
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn operator(&mut self) -> Result<()> {
        self.operators += 1;
        if self.operators > MAX_OPERATORS {
            return Err(ExprError::Unsafe {
                expression: self.source.to_string(),
                reason: format!("more than {} operators", MAX_OPERATORS),
            });
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.match_token(&Token::Or) {
            self.operator()?;
            let rhs = self.parse_and()?;
            lhs = logic(LogicOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_not()?;
        while self.match_token(&Token::And) {
            self.operator()?;
            let rhs = self.parse_not()?;
            lhs = logic(LogicOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.match_token(&Token::Not) {
            self.operator()?;
            self.enter()?;
            let operand = self.parse_not()?;
            self.leave();
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let first = self.parse_bitor()?;
        let mut rest = Vec::new();
        while let Some(op) = cmp_op(&self.current().token) {
            self.advance();
            self.operator()?;
            rest.push((op, self.parse_bitor()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_bitor(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_bitand()?;
        while self.match_token(&Token::Pipe) {
            self.operator()?;
            let rhs = self.parse_bitand()?;
            lhs = logic(LogicOp::BitOr, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bitand(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_arith()?;
        while self.match_token(&Token::Amp) {
            self.operator()?;
            let rhs = self.parse_arith()?;
            lhs = logic(LogicOp::BitAnd, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_arith(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.current().token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.operator()?;
            let rhs = self.parse_term()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.current().token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::DoubleSlash => BinaryOp::FloorDiv,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            self.operator()?;
            let rhs = self.parse_factor()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let op = match self.current().token {
            Token::Minus => Some(UnaryOp::Neg),
            Token::Plus => Some(UnaryOp::Pos),
            Token::Tilde => Some(UnaryOp::Not),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                self.operator()?;
                self.enter()?;
                let operand = self.parse_factor()?;
                self.leave();
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            None => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_atom()?;
        if self.match_token(&Token::DoubleStar) {
            // right associative, and binds tighter than a unary minus on its left
            self.operator()?;
            self.enter()?;
            let exponent = self.parse_factor()?;
            self.leave();
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        let tok = self.current().clone();
        match tok.token {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Token::Ident(name) => {
                self.advance();
                if self.match_token(&Token::LParen) {
                    self.operator()?;
                    let args = self.parse_args()?;
                    Ok(Expr::Call {
                        name,
                        position: tok.start,
                        args,
                    })
                } else {
                    Ok(Expr::Name(name))
                }
            }
            Token::LParen => {
                self.advance();
                self.enter()?;
                let inner = self.parse_or()?;
                self.leave();
                if !self.match_token(&Token::RParen) {
                    return Err(self.unexpected("')'"));
                }
                Ok(inner)
            }
            _ => Err(self.unexpected("a number, name or '('")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.match_token(&Token::RParen) {
            return Ok(args);
        }
        self.enter()?;
        loop {
            args.push(self.parse_or()?);
            if self.match_token(&Token::Comma) {
                continue;
            }
            if self.match_token(&Token::RParen) {
                break;
            }
            return Err(self.unexpected("',' or ')'"));
        }
        self.leave();
        Ok(args)
    }
}

fn cmp_op(token: &Token) -> Option<CmpOp> {
    match token {
        Token::EqEq => Some(CmpOp::Eq),
        Token::NotEq => Some(CmpOp::Ne),
        Token::Lt => Some(CmpOp::Lt),
        Token::Le => Some(CmpOp::Le),
        Token::Gt => Some(CmpOp::Gt),
        Token::Ge => Some(CmpOp::Ge),
        _ => None,
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn logic(op: LogicOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Logic {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Expr {
        Expr::Name(n.to_string())
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse("a + b * 2").unwrap();
        assert_eq!(
            expr,
            binary(
                BinaryOp::Add,
                name("a"),
                binary(BinaryOp::Mul, name("b"), Expr::Number(2.0))
            )
        );
    }

    #[test]
    fn power_is_right_associative_and_beats_unary_minus() {
        let expr = parse("-2 ** 3 ** 2").unwrap();
        assert_eq!(
            expr,
            Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(binary(
                    BinaryOp::Pow,
                    Expr::Number(2.0),
                    binary(BinaryOp::Pow, Expr::Number(3.0), Expr::Number(2.0))
                )),
            }
        );
    }

    #[test]
    fn comparisons_chain() {
        let expr = parse("0 < x <= 1").unwrap();
        match expr {
            Expr::Compare { rest, .. } => assert_eq!(rest.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn boolean_connectives_bind_loosest() {
        let expr = parse("time < 7.65e7 and mu_rate == mu_rate").unwrap();
        match expr {
            Expr::Logic {
                op: LogicOp::And,
                lhs,
                rhs,
            } => {
                assert!(matches!(*lhs, Expr::Compare { .. }));
                assert!(matches!(*rhs, Expr::Compare { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_calls_with_arguments() {
        let expr = parse("atan2(y, x)").unwrap();
        match expr {
            Expr::Call { name, args, .. } => {
                assert_eq!(name, "atan2");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reports_syntax_errors_with_position() {
        match parse("(a + 1") {
            Err(ExprError::Syntax { position, .. }) => assert_eq!(position, 6),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(parse("a +"), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse("a b"), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse(""), Err(ExprError::Syntax { .. })));
    }

    #[test]
    fn refuses_pathological_nesting() {
        let source = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert!(matches!(parse(&source), Err(ExprError::Unsafe { .. })));
    }

    #[test]
    fn refuses_overlong_operator_chains() {
        let sum = format!("time{}", " + time".repeat(100_000));
        match parse(&sum) {
            Err(ExprError::Unsafe { reason, .. }) => assert!(reason.contains("operators")),
            other => panic!("unexpected {other:?}"),
        }
        let cut = format!("a{}", " and a".repeat(100_000));
        assert!(matches!(parse(&cut), Err(ExprError::Unsafe { .. })));
        let ordinary = format!("time{}", " + time".repeat(200));
        assert!(parse(&ordinary).is_ok());
    }
}
