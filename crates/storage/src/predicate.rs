//! Predicate evaluation
//!
//! A predicate arrives as a flat list of [`Condition`] terms in infix
//! order, e.g. `a = 1 AND ( b = 2 OR c = 3 )`. It is converted once to
//! postfix with the shunting-yard algorithm (AND binds tighter than OR) and
//! then evaluated per row against named columns.

use std::fmt;

use tracing::warn;

use crate::error::StorageError;
use crate::Result;

/// Right-hand side of an equality
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Compared verbatim
    Literal(String),
    /// Another column of the same candidate row, `table.column`
    Column(String),
}

impl Operand {
    /// Classify unquoted text: `ident.ident` is a column reference,
    /// anything else a literal
    pub fn infer(raw: &str) -> Self {
        if is_column_reference(raw) {
            Operand::Column(raw.to_string())
        } else {
            Operand::Literal(raw.to_string())
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn is_column_reference(raw: &str) -> bool {
    match raw.split_once('.') {
        Some((table, column)) => is_identifier(table) && is_identifier(column),
        None => false,
    }
}

/// One term of an infix predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Open,
    Close,
    And,
    Or,
    Eq { column: String, value: Operand },
}

impl Condition {
    /// `column = 'literal'`
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Condition::Eq {
            column: column.into(),
            value: Operand::Literal(value.into()),
        }
    }

    /// `column = other.column`
    pub fn eq_column(column: impl Into<String>, other: impl Into<String>) -> Self {
        Condition::Eq {
            column: column.into(),
            value: Operand::Column(other.into()),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Condition::And => 2,
            Condition::Or => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Open => f.write_str("("),
            Condition::Close => f.write_str(")"),
            Condition::And => f.write_str("AND"),
            Condition::Or => f.write_str("OR"),
            Condition::Eq {
                column,
                value: Operand::Literal(v),
            } => write!(f, "{} = '{}'", column, v),
            Condition::Eq {
                column,
                value: Operand::Column(c),
            } => write!(f, "{} = {}", column, c),
        }
    }
}

/// Join a list of leaf comparisons with AND
pub fn all_of(leaves: Vec<Condition>) -> Vec<Condition> {
    let mut out = Vec::with_capacity(leaves.len() * 2);
    for (i, leaf) in leaves.into_iter().enumerate() {
        if i > 0 {
            out.push(Condition::And);
        }
        out.push(leaf);
    }
    out
}

/// Shunting-yard conversion to postfix order.
///
/// Parentheses never appear in the output. Unbalanced parentheses are
/// reported as [`StorageError::MalformedPredicate`].
pub fn to_postfix(conditions: &[Condition]) -> Result<Vec<Condition>> {
    let mut output = Vec::with_capacity(conditions.len());
    let mut stack: Vec<&Condition> = Vec::new();

    for term in conditions {
        match term {
            Condition::Open => stack.push(term),
            Condition::Close => loop {
                match stack.pop() {
                    Some(Condition::Open) => break,
                    Some(op) => output.push(op.clone()),
                    None => return Err(StorageError::malformed("unmatched ')'")),
                }
            },
            Condition::And | Condition::Or => {
                while let Some(top) = stack.last() {
                    if matches!(top, Condition::Open) || top.precedence() < term.precedence() {
                        break;
                    }
                    output.push((*top).clone());
                    stack.pop();
                }
                stack.push(term);
            }
            Condition::Eq { .. } => output.push(term.clone()),
        }
    }

    while let Some(op) = stack.pop() {
        if matches!(op, Condition::Open) {
            return Err(StorageError::malformed("unmatched '('"));
        }
        output.push(op.clone());
    }

    Ok(output)
}

fn lookup<'a>(columns: &[String], values: &'a [String], name: &str) -> Option<&'a String> {
    columns
        .iter()
        .position(|c| c == name)
        .and_then(|idx| values.get(idx))
}

/// A predicate compiled to postfix, ready to test rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    postfix: Vec<Condition>,
}

impl Predicate {
    pub fn compile(conditions: &[Condition]) -> Result<Self> {
        Ok(Self {
            postfix: to_postfix(conditions)?,
        })
    }

    /// The empty predicate, true for every row
    pub fn always() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.postfix.is_empty()
    }

    /// Evaluate against one row given as parallel column/value slices.
    ///
    /// A leaf naming an unknown column is false. Operands left over after
    /// the walk (terms with no connective between them) must all hold.
    pub fn evaluate(&self, columns: &[String], values: &[String]) -> Result<bool> {
        if self.postfix.is_empty() {
            return Ok(true);
        }

        let mut stack: Vec<bool> = Vec::new();
        for term in &self.postfix {
            match term {
                Condition::And | Condition::Or => {
                    let (Some(rhs), Some(lhs)) = (stack.pop(), stack.pop()) else {
                        return Err(StorageError::malformed(format!(
                            "'{}' needs two operands",
                            term
                        )));
                    };
                    stack.push(if matches!(term, Condition::And) {
                        lhs && rhs
                    } else {
                        lhs || rhs
                    });
                }
                Condition::Eq { column, value } => {
                    let result = match lookup(columns, values, column) {
                        None => false,
                        Some(left) => match value {
                            Operand::Literal(lit) => left == lit,
                            Operand::Column(other) => lookup(columns, values, other) == Some(left),
                        },
                    };
                    stack.push(result);
                }
                Condition::Open | Condition::Close => {
                    return Err(StorageError::malformed("parenthesis in postfix form"));
                }
            }
        }

        Ok(stack.into_iter().all(|b| b))
    }

    /// Like [`Predicate::evaluate`], but a malformed predicate is logged
    /// and counts as no match
    pub fn matches(&self, columns: &[String], values: &[String]) -> bool {
        match self.evaluate(columns, values) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Predicate evaluation failed");
                false
            }
        }
    }
}
