//! AST types for SQL condition fragments and assignment lists.
//!
//! The parser produces these from the text a caller hands to `where_sql`
//! or to a raw update payload; the evaluator walks them against a row.

use std::fmt;

use sqlext_model::Value;

/// Boolean condition node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `left op right`.
    Compare {
        /// Left-hand operand.
        left: Box<Operand>,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand operand.
        right: Box<Operand>,
    },
    /// `value [NOT] BETWEEN low AND high`.
    Between {
        /// Value to test.
        value: Box<Operand>,
        /// Lower bound (inclusive).
        low: Box<Operand>,
        /// Upper bound (inclusive).
        high: Box<Operand>,
        /// Whether `NOT` was present.
        negated: bool,
    },
    /// `value [NOT] IN (list...)`.
    In {
        /// Value to search for.
        value: Box<Operand>,
        /// Candidate values.
        list: Vec<Operand>,
        /// Whether `NOT` was present.
        negated: bool,
    },
    /// `value [NOT] LIKE pattern`.
    Like {
        /// Value to match.
        value: Box<Operand>,
        /// Pattern with `%` and `_` wildcards.
        pattern: Box<Operand>,
        /// Whether `NOT` was present.
        negated: bool,
    },
    /// `value IS [NOT] NULL`.
    IsNull {
        /// Value to test.
        value: Box<Operand>,
        /// Whether `NOT` was present.
        negated: bool,
    },
    /// `left AND right` or `left OR right`.
    Logical {
        /// Logical operator.
        op: LogicalOp,
        /// Left-hand expression.
        left: Box<Expr>,
        /// Right-hand expression.
        right: Box<Expr>,
    },
    /// `NOT expr`.
    Not(Box<Expr>),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>` or `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        })
    }
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `AND`
    And,
    /// `OR`
    Or,
}

/// Arithmetic operators usable inside operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
}

/// A column reference, optionally qualified by a table name or alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Table name or alias before the dot.
    pub qualifier: Option<String>,
    /// Column name.
    pub name: String,
}

impl ColumnRef {
    /// An unqualified column.
    #[must_use]
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
        }
    }

    /// A column qualified by `qualifier`.
    #[must_use]
    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{q}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Value-producing node.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Column lookup.
    Column(ColumnRef),
    /// Literal value.
    Literal(Value),
    /// Positional `?` placeholder, numbered from zero in source order.
    Placeholder(usize),
    /// `left op right`.
    Arith {
        /// Left-hand operand.
        left: Box<Operand>,
        /// Arithmetic operator.
        op: ArithOp,
        /// Right-hand operand.
        right: Box<Operand>,
    },
}

/// One `column = operand` entry of a raw assignment list.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Target column.
    pub column: ColumnRef,
    /// New value.
    pub value: Operand,
}

/// Count the placeholders referenced by an expression.
#[must_use]
pub fn placeholder_count(expr: &Expr) -> usize {
    let mut max = 0;
    visit_expr(expr, &mut |op| {
        if let Operand::Placeholder(i) = op {
            max = max.max(i + 1);
        }
    });
    max
}

fn visit_expr(expr: &Expr, f: &mut impl FnMut(&Operand)) {
    match expr {
        Expr::Compare { left, right, .. } => {
            visit_operand(left, f);
            visit_operand(right, f);
        }
        Expr::Between {
            value, low, high, ..
        } => {
            visit_operand(value, f);
            visit_operand(low, f);
            visit_operand(high, f);
        }
        Expr::In { value, list, .. } => {
            visit_operand(value, f);
            for item in list {
                visit_operand(item, f);
            }
        }
        Expr::Like { value, pattern, .. } => {
            visit_operand(value, f);
            visit_operand(pattern, f);
        }
        Expr::IsNull { value, .. } => visit_operand(value, f),
        Expr::Logical { left, right, .. } => {
            visit_expr(left, f);
            visit_expr(right, f);
        }
        Expr::Not(inner) => visit_expr(inner, f),
    }
}

fn visit_operand(op: &Operand, f: &mut impl FnMut(&Operand)) {
    f(op);
    if let Operand::Arith { left, right, .. } = op {
        visit_operand(left, f);
        visit_operand(right, f);
    }
}
