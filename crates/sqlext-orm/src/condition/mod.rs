//! SQL condition parsing and evaluation.
//!
//! The pipeline mirrors a small query engine:
//!
//! 1. **Lexing**: Tokenize the fragment into a token stream.
//! 2. **Parsing**: Build an AST by recursive descent.
//! 3. **Evaluation**: Walk the AST against a row and positional arguments.
//!
//! Execution layers that do not delegate to a database use this to filter
//! rows and to apply raw assignment lists.

pub mod ast;
pub mod evaluator;
pub mod parser;

pub use ast::{Assignment, ColumnRef, Expr, Operand, placeholder_count};
pub use evaluator::{EvalContext, Scope, arith};
pub use parser::{ConditionError, parse_assignments, parse_condition};
