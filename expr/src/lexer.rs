// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Tokenizer built on logos. There are no string, attribute, indexing or assignment tokens,
//! so any input that needs them fails here.

use logos::Logos;
use std::fmt;

use crate::error::{ExprError, Result};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("True")]
    #[token("true")]
    True,
    #[token("False")]
    #[token("false")]
    False,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("//")]
    DoubleSlash,
    #[token("%")]
    Percent,
    #[token("**")]
    DoubleStar,

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,

    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("~")]
    Tilde,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,

    #[regex(r"([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::True => write!(f, "True"),
            Token::False => write!(f, "False"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::DoubleSlash => write!(f, "//"),
            Token::Percent => write!(f, "%"),
            Token::DoubleStar => write!(f, "**"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::Amp => write!(f, "&"),
            Token::Pipe => write!(f, "|"),
            Token::Tilde => write!(f, "~"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Number(n) => write!(f, "{}", n),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// Token with its byte offsets in the source string.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Tokenize the whole expression, terminated by a single [`Token::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push(SpannedToken {
                token,
                start: span.start,
                end: span.end,
            }),
            Err(()) => {
                return Err(ExprError::Unsafe {
                    expression: source.to_string(),
                    reason: format!(
                        "disallowed input {:?} at offset {}",
                        lexer.slice(),
                        span.start
                    ),
                });
            }
        }
    }
    tokens.push(SpannedToken {
        token: Token::Eof,
        start: source.len(),
        end: source.len(),
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn lexes_exponent_and_leading_dot_numbers() {
        assert_eq!(
            kinds("7.65e7 .5 3"),
            vec![
                Token::Number(7.65e7),
                Token::Number(0.5),
                Token::Number(3.0),
                Token::Eof
            ]
        );
    }

    #[test]
    fn keywords_do_not_swallow_longer_identifiers() {
        assert_eq!(
            kinds("android or notes"),
            vec![
                Token::Ident("android".into()),
                Token::Or,
                Token::Ident("notes".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn prefers_longest_operator() {
        assert_eq!(
            kinds("a**2 // 3 <= b"),
            vec![
                Token::Ident("a".into()),
                Token::DoubleStar,
                Token::Number(2.0),
                Token::DoubleSlash,
                Token::Number(3.0),
                Token::Le,
                Token::Ident("b".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn rejects_strings_attributes_and_assignment() {
        for source in ["__import__('os')", "os.system", "x = 1", "a[0]", "lambda: 1; 2"] {
            match tokenize(source) {
                Err(ExprError::Unsafe { .. }) => {}
                other => panic!("{source:?} should be rejected, got {other:?}"),
            }
        }
    }
}
