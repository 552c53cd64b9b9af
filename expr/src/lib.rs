// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Closed-grammar expression compiler for per-row transforms.
//!
//! User-supplied strings such as `log10(mu_rate)` or `time < 7.65e7 and mu_rate == mu_rate`
//! are tokenized by [`lexer`], parsed into an [`ast::Expr`] by [`parser`], and bound against a
//! [`FieldSchema`] into a [`CompiledExpr`]. Only arithmetic, comparisons, boolean connectives
//! and the functions in [`functions`] exist in the grammar; anything else is rejected with
//! [`ExprError::Unsafe`].

pub mod ast;
pub mod compile;
pub mod error;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod schema;

pub use compile::{CompiledExpr, Value, compile};
pub use error::{EvalError, ExprError};
pub use functions::Builtin;
pub use schema::{FieldSchema, SYNTHETIC_FIELDS};
