//! Lexer and recursive-descent parser for SQL condition fragments.
//!
//! Accepts the subset of SQL that callers write in `where_sql` and raw
//! update payloads: comparisons, `AND`/`OR`/`NOT`, `IN`, `BETWEEN`, `LIKE`,
//! `IS [NOT] NULL`, parentheses, `+`/`-` arithmetic, qualified columns,
//! literals, and positional `?` placeholders. Keywords are matched
//! case-insensitively.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use sqlext_model::Value;

use super::ast::{ArithOp, Assignment, ColumnRef, CompareOp, Expr, LogicalOp, Operand};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced while parsing or evaluating a condition.
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    /// An unexpected token was encountered.
    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken {
        /// What was expected.
        expected: String,
        /// What was found.
        found: String,
    },
    /// The input ended prematurely.
    #[error("Unexpected end of condition")]
    UnexpectedEof,
    /// A string or quoted identifier was not closed.
    #[error("Unterminated {what} literal")]
    Unterminated {
        /// `string` or `identifier`.
        what: &'static str,
    },
    /// A placeholder has no bound argument.
    #[error("Placeholder #{index} is unbound: {supplied} argument(s) supplied")]
    UnboundPlaceholder {
        /// Zero-based placeholder index.
        index: usize,
        /// Number of arguments supplied.
        supplied: usize,
    },
    /// A qualified column names a table that is not in scope.
    #[error("Unknown column: {column}")]
    UnknownColumn {
        /// The column reference as written.
        column: String,
    },
    /// A type mismatch occurred during evaluation.
    #[error("Type mismatch: {message}")]
    TypeMismatch {
        /// Explanation.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Token type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Str(String),
    Number(String),
    Placeholder,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Dot,
    Comma,
    LParen,
    RParen,
    And,
    Or,
    Not,
    Between,
    In,
    Is,
    Null,
    Like,
    True,
    False,
    Where,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(s) => write!(f, "identifier '{s}'"),
            Self::Str(s) => write!(f, "string '{s}'"),
            Self::Number(n) => write!(f, "number {n}"),
            Self::Placeholder => write!(f, "'?'"),
            Self::Eq => write!(f, "'='"),
            Self::Ne => write!(f, "'<>'"),
            Self::Lt => write!(f, "'<'"),
            Self::Le => write!(f, "'<='"),
            Self::Gt => write!(f, "'>'"),
            Self::Ge => write!(f, "'>='"),
            Self::Plus => write!(f, "'+'"),
            Self::Minus => write!(f, "'-'"),
            Self::Dot => write!(f, "'.'"),
            Self::Comma => write!(f, "','"),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
            Self::Not => write!(f, "NOT"),
            Self::Between => write!(f, "BETWEEN"),
            Self::In => write!(f, "IN"),
            Self::Is => write!(f, "IS"),
            Self::Null => write!(f, "NULL"),
            Self::Like => write!(f, "LIKE"),
            Self::True => write!(f, "TRUE"),
            Self::False => write!(f, "FALSE"),
            Self::Where => write!(f, "WHERE"),
            Self::Eof => write!(f, "EOF"),
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn tokenize(&mut self) -> Result<Vec<Token>, ConditionError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            if tok == Token::Eof {
                tokens.push(Token::Eof);
                break;
            }
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(char::is_ascii_whitespace) {
            self.chars.next();
        }
    }

    fn single(&mut self, tok: Token) -> Token {
        self.chars.next();
        tok
    }

    fn next_token(&mut self) -> Result<Token, ConditionError> {
        self.skip_whitespace();

        let Some(&ch) = self.chars.peek() else {
            return Ok(Token::Eof);
        };

        match ch {
            '?' => Ok(self.single(Token::Placeholder)),
            '=' => Ok(self.single(Token::Eq)),
            '+' => Ok(self.single(Token::Plus)),
            '-' => Ok(self.single(Token::Minus)),
            '.' => Ok(self.single(Token::Dot)),
            ',' => Ok(self.single(Token::Comma)),
            '(' => Ok(self.single(Token::LParen)),
            ')' => Ok(self.single(Token::RParen)),
            '<' => Ok(self.read_lt_family()),
            '>' => Ok(self.read_gt_family()),
            '!' => {
                self.chars.next();
                if self.chars.next() == Some('=') {
                    Ok(Token::Ne)
                } else {
                    Err(ConditionError::UnexpectedToken {
                        expected: "'!='".to_owned(),
                        found: "'!'".to_owned(),
                    })
                }
            }
            '\'' => self.read_quoted('\'', "string").map(Token::Str),
            '`' => self.read_quoted('`', "identifier").map(Token::Identifier),
            '"' => self.read_quoted('"', "identifier").map(Token::Identifier),
            c if c.is_ascii_digit() => Ok(self.read_number()),
            c if is_ident_start(c) => Ok(self.read_identifier_or_keyword()),
            _ => Err(ConditionError::UnexpectedToken {
                expected: "valid token".to_owned(),
                found: format!("'{ch}'"),
            }),
        }
    }

    fn read_lt_family(&mut self) -> Token {
        self.chars.next(); // consume '<'
        match self.chars.peek() {
            Some('=') => self.single(Token::Le),
            Some('>') => self.single(Token::Ne),
            _ => Token::Lt,
        }
    }

    fn read_gt_family(&mut self) -> Token {
        self.chars.next(); // consume '>'
        if self.chars.peek() == Some(&'=') {
            self.single(Token::Ge)
        } else {
            Token::Gt
        }
    }

    /// Read up to the closing `quote`; a doubled quote is an escaped quote.
    fn read_quoted(&mut self, quote: char, what: &'static str) -> Result<String, ConditionError> {
        self.chars.next(); // consume opening quote
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some(c) if c == quote => {
                    if self.chars.peek() == Some(&quote) {
                        self.chars.next();
                        s.push(quote);
                    } else {
                        return Ok(s);
                    }
                }
                Some('\\') if quote == '\'' => match self.chars.next() {
                    Some(escaped) => s.push(escaped),
                    None => return Err(ConditionError::Unterminated { what }),
                },
                Some(c) => s.push(c),
                None => return Err(ConditionError::Unterminated { what }),
            }
        }
    }

    fn read_number(&mut self) -> Token {
        let mut s = String::new();
        let mut seen_dot = false;
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || (c == '.' && !seen_dot) {
                seen_dot |= c == '.';
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        Token::Number(s)
    }

    fn read_identifier_or_keyword(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(&c) = self.chars.peek() {
            if is_ident_continue(c) {
                ident.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        match ident.to_ascii_lowercase().as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "between" => Token::Between,
            "in" => Token::In,
            "is" => Token::Is,
            "null" => Token::Null,
            "like" => Token::Like,
            "true" => Token::True,
            "false" => Token::False,
            "where" => Token::Where,
            _ => Token::Identifier(ident),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    placeholders: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            placeholders: 0,
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<Token, ConditionError> {
        let tok = self.advance();
        if std::mem::discriminant(&tok) == std::mem::discriminant(expected) {
            Ok(tok)
        } else if tok == Token::Eof {
            Err(ConditionError::UnexpectedEof)
        } else {
            Err(ConditionError::UnexpectedToken {
                expected: expected.to_string(),
                found: tok.to_string(),
            })
        }
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn ensure_end(&self) -> Result<(), ConditionError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(ConditionError::UnexpectedToken {
                expected: "end of condition".to_owned(),
                found: self.peek().to_string(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Condition parsing (precedence climbing)
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_or_expr(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_and_expr()?;
        while matches!(self.peek(), Token::Or) {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_not_expr()?;
        while matches!(self.peek(), Token::And) {
            self.advance();
            let right = self.parse_not_expr()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr, ConditionError> {
        if matches!(self.peek(), Token::Not) {
            self.advance();
            let expr = self.parse_not_expr()?;
            return Ok(Expr::Not(Box::new(expr)));
        }
        self.parse_primary_expr()
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ConditionError> {
        if matches!(self.peek(), Token::LParen) {
            self.advance();
            let expr = self.parse_or_expr()?;
            self.expect(&Token::RParen)?;
            return Ok(expr);
        }
        let operand = self.parse_operand()?;
        self.parse_postfix_expr(operand)
    }

    fn parse_postfix_expr(&mut self, left: Operand) -> Result<Expr, ConditionError> {
        let negated = matches!(self.peek(), Token::Not)
            && matches!(self.peek_at(1), Token::Between | Token::In | Token::Like);
        if negated {
            self.advance();
        }
        match self.peek() {
            Token::Eq | Token::Ne | Token::Lt | Token::Le | Token::Gt | Token::Ge => {
                let op = self.parse_compare_op()?;
                let right = self.parse_operand()?;
                Ok(Expr::Compare {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                })
            }
            Token::Between => {
                self.advance();
                let low = self.parse_operand()?;
                self.expect(&Token::And)?;
                let high = self.parse_operand()?;
                Ok(Expr::Between {
                    value: Box::new(left),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated,
                })
            }
            Token::In => {
                self.advance();
                self.expect(&Token::LParen)?;
                let mut list = vec![self.parse_operand()?];
                while matches!(self.peek(), Token::Comma) {
                    self.advance();
                    list.push(self.parse_operand()?);
                }
                self.expect(&Token::RParen)?;
                Ok(Expr::In {
                    value: Box::new(left),
                    list,
                    negated,
                })
            }
            Token::Like => {
                self.advance();
                let pattern = self.parse_operand()?;
                Ok(Expr::Like {
                    value: Box::new(left),
                    pattern: Box::new(pattern),
                    negated,
                })
            }
            Token::Is => {
                self.advance();
                let negated = matches!(self.peek(), Token::Not);
                if negated {
                    self.advance();
                }
                self.expect(&Token::Null)?;
                Ok(Expr::IsNull {
                    value: Box::new(left),
                    negated,
                })
            }
            Token::Eof => Err(ConditionError::UnexpectedEof),
            _ => Err(ConditionError::UnexpectedToken {
                expected: "comparison operator, BETWEEN, IN, LIKE, or IS".to_owned(),
                found: self.peek().to_string(),
            }),
        }
    }

    fn parse_compare_op(&mut self) -> Result<CompareOp, ConditionError> {
        let tok = self.advance();
        match tok {
            Token::Eq => Ok(CompareOp::Eq),
            Token::Ne => Ok(CompareOp::Ne),
            Token::Lt => Ok(CompareOp::Lt),
            Token::Le => Ok(CompareOp::Le),
            Token::Gt => Ok(CompareOp::Gt),
            Token::Ge => Ok(CompareOp::Ge),
            _ => Err(ConditionError::UnexpectedToken {
                expected: "comparison operator".to_owned(),
                found: tok.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Operand parsing
// ---------------------------------------------------------------------------

impl Parser {
    /// Parse `term (('+' | '-') term)*`.
    fn parse_operand(&mut self) -> Result<Operand, ConditionError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => ArithOp::Add,
                Token::Minus => ArithOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_term()?;
            left = Operand::Arith {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Operand, ConditionError> {
        match self.advance() {
            Token::Placeholder => {
                let index = self.placeholders;
                self.placeholders += 1;
                Ok(Operand::Placeholder(index))
            }
            Token::Str(s) => Ok(Operand::Literal(Value::String(s))),
            Token::Number(n) => Ok(Operand::Literal(parse_number(&n, false)?)),
            Token::Minus => match self.advance() {
                Token::Number(n) => Ok(Operand::Literal(parse_number(&n, true)?)),
                other => Err(ConditionError::UnexpectedToken {
                    expected: "number after '-'".to_owned(),
                    found: other.to_string(),
                }),
            },
            Token::Null => Ok(Operand::Literal(Value::Null)),
            Token::True => Ok(Operand::Literal(Value::Bool(true))),
            Token::False => Ok(Operand::Literal(Value::Bool(false))),
            Token::Identifier(first) => {
                if matches!(self.peek(), Token::Dot) {
                    self.advance();
                    match self.advance() {
                        Token::Identifier(name) => {
                            Ok(Operand::Column(ColumnRef::qualified(first, name)))
                        }
                        other => Err(ConditionError::UnexpectedToken {
                            expected: "column name after '.'".to_owned(),
                            found: other.to_string(),
                        }),
                    }
                } else {
                    Ok(Operand::Column(ColumnRef::bare(first)))
                }
            }
            Token::Eof => Err(ConditionError::UnexpectedEof),
            other => Err(ConditionError::UnexpectedToken {
                expected: "operand".to_owned(),
                found: other.to_string(),
            }),
        }
    }

    fn parse_assignment(&mut self) -> Result<Assignment, ConditionError> {
        let Operand::Column(column) = self.parse_term()? else {
            return Err(ConditionError::UnexpectedToken {
                expected: "column name".to_owned(),
                found: "literal".to_owned(),
            });
        };
        self.expect(&Token::Eq)?;
        let value = self.parse_operand()?;
        Ok(Assignment { column, value })
    }
}

fn parse_number(text: &str, negative: bool) -> Result<Value, ConditionError> {
    let mismatch = || ConditionError::TypeMismatch {
        message: format!("'{text}' is not a valid number"),
    };
    if text.contains('.') {
        let v: f64 = text.parse().map_err(|_| mismatch())?;
        Ok(Value::Float(if negative { -v } else { v }))
    } else {
        let v: i64 = text.parse().map_err(|_| mismatch())?;
        Ok(Value::Int(if negative { -v } else { v }))
    }
}

/// Parse a condition fragment, with or without a leading `WHERE`.
///
/// # Errors
///
/// Returns `ConditionError` if the fragment is syntactically invalid.
pub fn parse_condition(input: &str) -> Result<Expr, ConditionError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser::new(tokens);
    if matches!(parser.peek(), Token::Where) {
        parser.advance();
    }
    let expr = parser.parse_or_expr()?;
    parser.ensure_end()?;
    Ok(expr)
}

/// Parse a comma-separated assignment list such as `a = 1, b = b + ?`.
///
/// # Errors
///
/// Returns `ConditionError` if the list is empty or syntactically invalid.
pub fn parse_assignments(input: &str) -> Result<Vec<Assignment>, ConditionError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser::new(tokens);
    let mut assignments = vec![parser.parse_assignment()?];
    while matches!(parser.peek(), Token::Comma) {
        parser.advance();
        assignments.push(parser.parse_assignment()?);
    }
    parser.ensure_end()?;
    Ok(assignments)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
