// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Binds a parsed expression to a [`FieldSchema`] and evaluates it against rows.
//!
//! Binding resolves every name to a row slot, a constant, or a [`Builtin`] up front, so
//! evaluation is a walk over a small tree with no lookups and no allocation.

use crate::ast::{BinaryOp, CmpOp, Expr, LogicOp, UnaryOp};
use crate::error::{EvalError, ExprError, Result};
use crate::functions::{Builtin, constant};
use crate::parser::parse;
use crate::schema::FieldSchema;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
}

impl Value {
    /// Booleans coerce to 0/1.
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Number(n) => n,
            Value::Bool(b) => f64::from(u8::from(b)),
        }
    }

    /// Truthiness: only zero is false, NaN is true.
    pub fn truthy(self) -> bool {
        match self {
            Value::Number(n) => n != 0.0,
            Value::Bool(b) => b,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Const(Value),
    Field {
        slot: usize,
        name: Box<str>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Compare {
        first: Box<Node>,
        rest: Box<[(CmpOp, Node)]>,
    },
    Logic {
        op: LogicOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Call1 {
        func: Builtin,
        arg: Box<Node>,
    },
    Call2 {
        func: Builtin,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
}

impl Node {
    fn is_const(&self) -> bool {
        matches!(self, Node::Const(_))
    }

    fn eval(&self, row: &[f64], source: &str) -> std::result::Result<Value, EvalError> {
        match self {
            Node::Const(value) => Ok(*value),
            Node::Field { slot, name } => match row.get(*slot) {
                Some(v) => Ok(Value::Number(*v)),
                None => Err(EvalError::MissingField {
                    expression: source.to_string(),
                    field: name.to_string(),
                }),
            },
            Node::Unary { op, operand } => {
                let value = operand.eval(row, source)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-value.as_f64()),
                    UnaryOp::Pos => Value::Number(value.as_f64()),
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                })
            }
            Node::Binary { op, lhs, rhs } => {
                let a = lhs.eval(row, source)?.as_f64();
                let b = rhs.eval(row, source)?.as_f64();
                Ok(Value::Number(arith(*op, a, b)))
            }
            Node::Compare { first, rest } => {
                let mut left = first.eval(row, source)?.as_f64();
                for (op, node) in rest.iter() {
                    let right = node.eval(row, source)?.as_f64();
                    if !compare(*op, left, right) {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Node::Logic { op, lhs, rhs } => {
                let left = lhs.eval(row, source)?.truthy();
                let result = match op {
                    LogicOp::And => left && rhs.eval(row, source)?.truthy(),
                    LogicOp::Or => left || rhs.eval(row, source)?.truthy(),
                    LogicOp::BitAnd => {
                        let right = rhs.eval(row, source)?.truthy();
                        left & right
                    }
                    LogicOp::BitOr => {
                        let right = rhs.eval(row, source)?.truthy();
                        left | right
                    }
                };
                Ok(Value::Bool(result))
            }
            Node::Call1 { func, arg } => {
                let x = arg.eval(row, source)?.as_f64();
                let out = func.apply1(x);
                if func.is_predicate() {
                    Ok(Value::Bool(out != 0.0))
                } else {
                    Ok(Value::Number(out))
                }
            }
            Node::Call2 { func, lhs, rhs } => {
                let a = lhs.eval(row, source)?.as_f64();
                let b = rhs.eval(row, source)?.as_f64();
                Ok(Value::Number(func.apply2(a, b)))
            }
        }
    }

    /// Collapse subtrees without field references into constants.
    fn fold(self) -> Node {
        let foldable = match &self {
            Node::Const(_) | Node::Field { .. } => false,
            Node::Unary { operand, .. } => operand.is_const(),
            Node::Binary { lhs, rhs, .. }
            | Node::Logic { lhs, rhs, .. }
            | Node::Call2 { lhs, rhs, .. } => lhs.is_const() && rhs.is_const(),
            Node::Compare { first, rest } => {
                first.is_const() && rest.iter().all(|(_, node)| node.is_const())
            }
            Node::Call1 { arg, .. } => arg.is_const(),
        };
        if foldable {
            if let Ok(value) = self.eval(&[], "") {
                return Node::Const(value);
            }
        }
        self
    }

    fn collect_fields(&self, out: &mut Vec<String>) {
        match self {
            Node::Const(_) => {}
            Node::Field { name, .. } => {
                if !out.iter().any(|f| f.as_str() == &**name) {
                    out.push(name.to_string());
                }
            }
            Node::Unary { operand, .. } => operand.collect_fields(out),
            Node::Binary { lhs, rhs, .. }
            | Node::Logic { lhs, rhs, .. }
            | Node::Call2 { lhs, rhs, .. } => {
                lhs.collect_fields(out);
                rhs.collect_fields(out);
            }
            Node::Compare { first, rest } => {
                first.collect_fields(out);
                for (_, node) in rest.iter() {
                    node.collect_fields(out);
                }
            }
            Node::Call1 { arg, .. } => arg.collect_fields(out),
        }
    }
}

fn arith(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => {
            if b == 0.0 {
                return f64::NAN;
            }
            // result takes the sign of the divisor
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        BinaryOp::Pow => a.powf(b),
    }
}

fn compare(op: CmpOp, a: f64, b: f64) -> bool {
    match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
    }
}

/// A bound, reusable row transform.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    source: String,
    root: Node,
    fields: Vec<String>,
}

/// Compile `source` against `schema`, rejecting anything outside the grammar and whitelist.
pub fn compile(source: &str, schema: &FieldSchema) -> Result<CompiledExpr> {
    let source = source.trim();
    let ast = parse(source)?;
    let binder = Binder { source, schema };
    let root = binder.bind(ast)?;
    let mut fields = Vec::new();
    root.collect_fields(&mut fields);
    Ok(CompiledExpr {
        source: source.to_string(),
        root,
        fields,
    })
}

impl CompiledExpr {
    pub fn constant(value: f64) -> Self {
        Self {
            source: value.to_string(),
            root: Node::Const(Value::Number(value)),
            fields: Vec::new(),
        }
    }

    /// OR-join several predicates into one; `None` for an empty input.
    pub fn any_of(exprs: Vec<CompiledExpr>) -> Option<CompiledExpr> {
        let mut iter = exprs.into_iter();
        let first = iter.next()?;
        let mut source = format!("({})", first.source);
        let mut root = first.root;
        let mut fields = first.fields;
        for expr in iter {
            source.push_str(&format!(" or ({})", expr.source));
            for field in expr.fields {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
            root = Node::Logic {
                op: LogicOp::Or,
                lhs: Box::new(root),
                rhs: Box::new(expr.root),
            }
            .fold();
        }
        Some(CompiledExpr {
            source,
            root,
            fields,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Field names referenced by the expression, in first-use order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn is_constant(&self) -> bool {
        self.root.is_const()
    }

    pub fn eval(&self, row: &[f64]) -> std::result::Result<Value, EvalError> {
        self.root.eval(row, &self.source)
    }

    pub fn eval_f64(&self, row: &[f64]) -> std::result::Result<f64, EvalError> {
        self.eval(row).map(Value::as_f64)
    }

    pub fn eval_bool(&self, row: &[f64]) -> std::result::Result<bool, EvalError> {
        self.eval(row).map(Value::truthy)
    }
}

struct Binder<'a> {
    source: &'a str,
    schema: &'a FieldSchema,
}

impl Binder<'_> {
    fn unsafe_err(&self, reason: String) -> ExprError {
        ExprError::Unsafe {
            expression: self.source.to_string(),
            reason,
        }
    }

    fn bind(&self, expr: Expr) -> Result<Node> {
        let node = match expr {
            Expr::Number(n) => Node::Const(Value::Number(n)),
            Expr::Bool(b) => Node::Const(Value::Bool(b)),
            Expr::Name(name) => {
                if let Some(slot) = self.schema.slot(&name) {
                    Node::Field {
                        slot,
                        name: name.into_boxed_str(),
                    }
                } else if let Some(value) = constant(&name) {
                    Node::Const(Value::Number(value))
                } else {
                    return Err(self.unsafe_err(format!("unknown name {:?}", name)));
                }
            }
            Expr::Unary { op, operand } => Node::Unary {
                op,
                operand: Box::new(self.bind(*operand)?),
            },
            Expr::Binary { op, lhs, rhs } => Node::Binary {
                op,
                lhs: Box::new(self.bind(*lhs)?),
                rhs: Box::new(self.bind(*rhs)?),
            },
            Expr::Compare { first, rest } => {
                let first = Box::new(self.bind(*first)?);
                let rest = rest
                    .into_iter()
                    .map(|(op, node)| Ok((op, self.bind(node)?)))
                    .collect::<Result<Vec<_>>>()?;
                Node::Compare {
                    first,
                    rest: rest.into_boxed_slice(),
                }
            }
            Expr::Logic { op, lhs, rhs } => Node::Logic {
                op,
                lhs: Box::new(self.bind(*lhs)?),
                rhs: Box::new(self.bind(*rhs)?),
            },
            Expr::Call {
                name,
                position,
                args,
            } => {
                let func = Builtin::lookup(&name).ok_or_else(|| {
                    self.unsafe_err(format!("function {:?} is not permitted", name))
                })?;
                if args.len() != func.arity() {
                    return Err(ExprError::Syntax {
                        expression: self.source.to_string(),
                        position,
                        message: format!(
                            "{} takes {} argument(s), {} given",
                            name,
                            func.arity(),
                            args.len()
                        ),
                    });
                }
                let mut args = args.into_iter();
                match (args.next(), args.next()) {
                    (Some(arg), None) => Node::Call1 {
                        func,
                        arg: Box::new(self.bind(arg)?),
                    },
                    (Some(lhs), Some(rhs)) => Node::Call2 {
                        func,
                        lhs: Box::new(self.bind(lhs)?),
                        rhs: Box::new(self.bind(rhs)?),
                    },
                    _ => return Err(self.unsafe_err(format!("malformed call to {:?}", name))),
                }
            }
        };
        Ok(node.fold())
    }
}
