// Copyright (c) James Kassemi, SC, US. All rights reserved.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExprError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// Input uses a construct outside the whitelist (unknown name, call target, character).
    #[error("unsafe expression {expression:?}: {reason}")]
    Unsafe { expression: String, reason: String },
    #[error("syntax error in {expression:?} at offset {position}: {message}")]
    Syntax {
        expression: String,
        position: usize,
        message: String,
    },
}

impl ExprError {
    pub fn expression(&self) -> &str {
        match self {
            ExprError::Unsafe { expression, .. } | ExprError::Syntax { expression, .. } => {
                expression
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("expression {expression:?} references field {field:?} which the row does not supply")]
    MissingField { expression: String, field: String },
}
