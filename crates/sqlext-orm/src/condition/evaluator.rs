//! Condition evaluator.
//!
//! Conditions follow SQL three-valued logic internally: a comparison that
//! touches `NULL` is unknown, `NOT unknown` stays unknown, and a row only
//! matches when the whole condition is known to be true.

use std::cmp::Ordering;

use sqlext_model::{Record, Value};

use super::ast::{ArithOp, Assignment, ColumnRef, CompareOp, Expr, LogicalOp, Operand};
use super::parser::ConditionError;

// ---------------------------------------------------------------------------
// Column scope
// ---------------------------------------------------------------------------

/// Resolves column references for the row under evaluation.
pub trait Scope {
    /// Look up a column.
    ///
    /// # Errors
    ///
    /// Returns `ConditionError::UnknownColumn` when the reference cannot
    /// belong to this scope (e.g. an unknown qualifier).
    fn column(&self, column: &ColumnRef) -> Result<Value, ConditionError>;
}

/// A plain record resolves every column by name and ignores qualifiers.
/// Missing columns read as `NULL`.
impl Scope for Record {
    fn column(&self, column: &ColumnRef) -> Result<Value, ConditionError> {
        Ok(self.get(&column.name).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Evaluation context
// ---------------------------------------------------------------------------

/// Binds a row scope to the positional arguments of a condition.
pub struct EvalContext<'a> {
    /// The row being evaluated.
    pub scope: &'a dyn Scope,
    /// Values for `?` placeholders, in order.
    pub args: &'a [Value],
}

impl std::fmt::Debug for EvalContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalContext")
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl EvalContext<'_> {
    /// Evaluate a condition, treating unknown as `false`.
    ///
    /// # Errors
    ///
    /// Returns `ConditionError` if a placeholder is unbound, a column is out
    /// of scope, or an arithmetic operand is not numeric.
    pub fn evaluate(&self, expr: &Expr) -> Result<bool, ConditionError> {
        Ok(self.eval(expr)?.unwrap_or(false))
    }

    fn eval(&self, expr: &Expr) -> Result<Option<bool>, ConditionError> {
        match expr {
            Expr::Compare { left, op, right } => {
                let l = self.resolve(left)?;
                let r = self.resolve(right)?;
                Ok(compare(&l, &r, *op))
            }
            Expr::Between {
                value,
                low,
                high,
                negated,
            } => {
                let v = self.resolve(value)?;
                let lo = compare(&v, &self.resolve(low)?, CompareOp::Ge);
                let hi = compare(&v, &self.resolve(high)?, CompareOp::Le);
                Ok(and(lo, hi).map(|b| b != *negated))
            }
            Expr::In {
                value,
                list,
                negated,
            } => {
                let v = self.resolve(value)?;
                let mut result = Some(false);
                for item in list {
                    let hit = compare(&v, &self.resolve(item)?, CompareOp::Eq);
                    result = or(result, hit);
                    if result == Some(true) {
                        break;
                    }
                }
                Ok(result.map(|b| b != *negated))
            }
            Expr::Like {
                value,
                pattern,
                negated,
            } => {
                let v = self.resolve(value)?;
                let p = self.resolve(pattern)?;
                if v.is_null() || p.is_null() {
                    return Ok(None);
                }
                Ok(Some(like(&v.to_string(), &p.to_string()) != *negated))
            }
            Expr::IsNull { value, negated } => {
                let v = self.resolve(value)?;
                Ok(Some(v.is_null() != *negated))
            }
            Expr::Logical { op, left, right } => {
                let l = self.eval(left)?;
                match op {
                    LogicalOp::And if l == Some(false) => Ok(Some(false)),
                    LogicalOp::Or if l == Some(true) => Ok(Some(true)),
                    LogicalOp::And => Ok(and(l, self.eval(right)?)),
                    LogicalOp::Or => Ok(or(l, self.eval(right)?)),
                }
            }
            Expr::Not(inner) => Ok(self.eval(inner)?.map(|b| !b)),
        }
    }

    /// Resolve an operand to a value.
    ///
    /// # Errors
    ///
    /// Returns `ConditionError` for unbound placeholders, out-of-scope
    /// columns, and non-numeric arithmetic.
    pub fn resolve(&self, operand: &Operand) -> Result<Value, ConditionError> {
        match operand {
            Operand::Column(column) => self.scope.column(column),
            Operand::Literal(v) => Ok(v.clone()),
            Operand::Placeholder(index) => {
                self.args
                    .get(*index)
                    .cloned()
                    .ok_or(ConditionError::UnboundPlaceholder {
                        index: *index,
                        supplied: self.args.len(),
                    })
            }
            Operand::Arith { left, op, right } => {
                let l = self.resolve(left)?;
                let r = self.resolve(right)?;
                arith(&l, *op, &r)
            }
        }
    }

    /// Evaluate the right-hand side of each assignment against the current row.
    ///
    /// # Errors
    ///
    /// Returns `ConditionError` if any value fails to resolve.
    pub fn apply(&self, assignments: &[Assignment]) -> Result<Record, ConditionError> {
        assignments
            .iter()
            .map(|a| Ok((a.column.name.clone(), self.resolve(&a.value)?)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn compare(l: &Value, r: &Value, op: CompareOp) -> Option<bool> {
    let ord = l.compare(r)?;
    Some(match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
    })
}

fn and(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn or(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

/// Add or subtract two values. `NULL` on either side yields `NULL`; two
/// integers stay integral unless the result overflows.
///
/// # Errors
///
/// Returns `ConditionError::TypeMismatch` for non-numeric operands.
pub fn arith(l: &Value, op: ArithOp, r: &Value) -> Result<Value, ConditionError> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    if let (Value::Int(a), Value::Int(b)) = (l, r) {
        let exact = match op {
            ArithOp::Add => a.checked_add(*b),
            ArithOp::Sub => a.checked_sub(*b),
        };
        if let Some(v) = exact {
            return Ok(Value::Int(v));
        }
    }
    let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
        return Err(ConditionError::TypeMismatch {
            message: format!("cannot apply arithmetic to {l} and {r}"),
        });
    };
    Ok(Value::Float(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
    }))
}

/// Case-insensitive `LIKE` matching with `%` and `_` wildcards.
fn like(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.to_lowercase().chars().collect();
    let p: Vec<char> = pattern.to_lowercase().chars().collect();
    let (mut ti, mut pi) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while ti < t.len() {
        match p.get(pi) {
            Some('%') => {
                backtrack = Some((pi, ti));
                pi += 1;
            }
            Some('_') => {
                ti += 1;
                pi += 1;
            }
            Some(c) if *c == t[ti] => {
                ti += 1;
                pi += 1;
            }
            _ => match backtrack {
                Some((bp, bt)) => {
                    pi = bp + 1;
                    ti = bt + 1;
                    backtrack = Some((bp, bt + 1));
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|c| *c == '%')
}
