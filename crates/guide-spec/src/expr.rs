use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::answers::{Answers, evaluation_context};

/// One side of a comparison: a JSON pointer into the context or a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Var(String),
    Value(Value),
}

impl Operand {
    /// Pointer to the stored answer of `question`.
    pub fn answer(question: &str) -> Self {
        Operand::Var(answer_pointer(question))
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Operand::Value(value.into())
    }

    fn resolve<'a>(&'a self, ctx: &'a Value) -> Result<&'a Value, ExprError> {
        match self {
            Operand::Var(path) => Expr::get_value(ctx, path),
            Operand::Value(value) => Ok(value),
        }
    }
}

/// Lightweight expression AST used for skip conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    LiteralBool { value: bool },
    Eq { left: Operand, right: Operand },
    Ne { left: Operand, right: Operand },
    Gt { left: Operand, right: Operand },
    Gte { left: Operand, right: Operand },
    Lt { left: Operand, right: Operand },
    Lte { left: Operand, right: Operand },
    In { left: Operand, values: Vec<Value> },
    Answered { question: String },
    And { expressions: Vec<Expr> },
    Or { expressions: Vec<Expr> },
    Not { expression: Box<Expr> },
    Var { path: String },
}

/// Why an expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("invalid path '{0}': JSON pointers must start with '/'")]
    InvalidPath(String),
    #[error("value at '{path}' is not a boolean")]
    NotBoolean { path: String },
    #[error("cannot order non-numeric values {left} and {right}")]
    NotNumeric { left: Value, right: Value },
}

/// Evaluates skip conditions against an answers map.
pub trait Evaluator {
    fn evaluate(&self, condition: &Expr, answers: &Answers) -> Result<bool, ExprError>;
}

/// Default [`Evaluator`] backed by [`Expr::evaluate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprEvaluator;

impl Evaluator for ExprEvaluator {
    fn evaluate(&self, condition: &Expr, answers: &Answers) -> Result<bool, ExprError> {
        condition.evaluate(&evaluation_context(answers))
    }
}

static NULL: Value = Value::Null;

#[derive(Clone, Copy)]
enum Ordering {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Expr {
    /// `answers[question] == value`.
    pub fn answer_equals(question: &str, value: impl Into<Value>) -> Self {
        Expr::Eq {
            left: Operand::answer(question),
            right: Operand::value(value),
        }
    }

    pub fn answered(question: &str) -> Self {
        Expr::Answered {
            question: question.to_string(),
        }
    }

    pub fn not(expression: Expr) -> Self {
        Expr::Not {
            expression: Box::new(expression),
        }
    }

    /// Missing pointer targets resolve to `null`: an unanswered question is
    /// a normal state while a module is being filled in.
    fn get_value<'a>(ctx: &'a Value, path: &str) -> Result<&'a Value, ExprError> {
        if !path.is_empty() && !path.starts_with('/') {
            return Err(ExprError::InvalidPath(path.to_string()));
        }
        Ok(ctx.pointer(path).unwrap_or(&NULL))
    }

    /// Evaluates the expression against a context of the form `{"answers": {...}}`.
    pub fn evaluate(&self, ctx: &Value) -> Result<bool, ExprError> {
        match self {
            Expr::LiteralBool { value } => Ok(*value),
            Expr::Eq { left, right } => Ok(loose_eq(left.resolve(ctx)?, right.resolve(ctx)?)),
            Expr::Ne { left, right } => Ok(!loose_eq(left.resolve(ctx)?, right.resolve(ctx)?)),
            Expr::Gt { left, right } => compare(left, right, ctx, Ordering::Gt),
            Expr::Gte { left, right } => compare(left, right, ctx, Ordering::Gte),
            Expr::Lt { left, right } => compare(left, right, ctx, Ordering::Lt),
            Expr::Lte { left, right } => compare(left, right, ctx, Ordering::Lte),
            Expr::In { left, values } => {
                let left = left.resolve(ctx)?;
                let contains = |candidate: &Value| values.iter().any(|v| loose_eq(candidate, v));
                Ok(match left {
                    Value::Array(items) => items.iter().any(contains),
                    other => contains(other),
                })
            }
            Expr::Answered { question } => {
                let value = Self::get_value(ctx, &answer_pointer(question))?;
                Ok(!value.is_null())
            }
            Expr::And { expressions } => {
                for expr in expressions {
                    if !expr.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Expr::Or { expressions } => {
                for expr in expressions {
                    if expr.evaluate(ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Expr::Not { expression } => expression.evaluate(ctx).map(|value| !value),
            Expr::Var { path } => match Self::get_value(ctx, path)? {
                Value::Bool(flag) => Ok(*flag),
                Value::Null => Ok(false),
                _ => Err(ExprError::NotBoolean { path: path.clone() }),
            },
        }
    }
}

fn answer_pointer(question: &str) -> String {
    format!(
        "/answers/{}",
        question.replace('~', "~0").replace('/', "~1")
    )
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(
    left: &Operand,
    right: &Operand,
    ctx: &Value,
    ordering: Ordering,
) -> Result<bool, ExprError> {
    let left = left.resolve(ctx)?;
    let right = right.resolve(ctx)?;
    if left.is_null() || right.is_null() {
        return Ok(false);
    }
    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(ExprError::NotNumeric {
            left: left.clone(),
            right: right.clone(),
        });
    };
    Ok(match ordering {
        Ordering::Gt => a > b,
        Ordering::Gte => a >= b,
        Ordering::Lt => a < b,
        Ordering::Lte => a <= b,
    })
}
