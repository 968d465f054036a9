//! Console statement parser
//!
//! Supports a fixed subset:
//!
//! ```text
//! INSERT INTO <table> VALUES ('v1', 'v2', ...)
//! SELECT <t.c>, ... FROM <t1>, <t2>, ... [WHERE <predicate>]
//! DELETE FROM <table> WHERE <predicate>
//! EXIT | QUIT
//! ```
//!
//! Keywords are case-insensitive. In a predicate a quoted value is a
//! literal and an unquoted `table.column` is a column reference.

use crate::error::StorageError;
use crate::predicate::{Condition, Operand};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert {
        table: String,
        values: Vec<String>,
    },
    Select {
        columns: Vec<String>,
        tables: Vec<String>,
        conditions: Vec<Condition>,
    },
    Delete {
        table: String,
        conditions: Vec<Condition>,
    },
    Exit,
}

impl Statement {
    /// Tables the statement touches, in the order they must be locked
    pub fn tables(&self) -> Vec<&str> {
        match self {
            Statement::Insert { table, .. } | Statement::Delete { table, .. } => vec![table.as_str()],
            Statement::Select { tables, .. } => tables.iter().map(String::as_str).collect(),
            Statement::Exit => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Comma,
    Open,
    Close,
    Equals,
    Semicolon,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '\'' | '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(q) if q == c => break,
                        Some(ch) => text.push(ch),
                        None => return Err(StorageError::parse("unterminated quoted value")),
                    }
                }
                tokens.push(Token::Quoted(text));
            }
            ',' | '(' | ')' | '=' | ';' => {
                chars.next();
                tokens.push(match c {
                    ',' => Token::Comma,
                    '(' => Token::Open,
                    ')' => Token::Close,
                    '=' => Token::Equals,
                    _ => Token::Semicolon,
                });
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || matches!(ch, ',' | '(' | ')' | '=' | ';' | '\'' | '"') {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            Ok(())
        } else {
            Err(StorageError::parse(format!("expected {}", keyword)))
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<()> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            _ => Err(StorageError::parse(format!("expected {}", what))),
        }
    }

    fn identifier(&mut self, what: &str) -> Result<String> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w),
            _ => Err(StorageError::parse(format!("expected {}", what))),
        }
    }

    /// `a, b, c` up to (not including) `stop` or the end
    fn identifier_list(&mut self, what: &str, stop: Option<&str>) -> Result<Vec<String>> {
        let mut items = vec![self.identifier(what)?];
        while matches!(self.peek(), Some(Token::Comma)) {
            self.pos += 1;
            items.push(self.identifier(what)?);
        }
        if let Some(stop) = stop {
            if !self.peek_keyword(stop) {
                return Err(StorageError::parse(format!("expected {}", stop)));
            }
        }
        Ok(items)
    }

    fn finish(&mut self) -> Result<()> {
        if matches!(self.peek(), Some(Token::Semicolon)) {
            self.pos += 1;
        }
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(StorageError::parse(format!("unexpected {:?}", t))),
        }
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Semicolon))
    }

    fn conditions(&mut self) -> Result<Vec<Condition>> {
        let mut conditions = Vec::new();
        while !self.at_end() {
            let term = match self.next() {
                Some(Token::Open) => Condition::Open,
                Some(Token::Close) => Condition::Close,
                Some(Token::Word(w)) if w.eq_ignore_ascii_case("AND") => Condition::And,
                Some(Token::Word(w)) if w.eq_ignore_ascii_case("OR") => Condition::Or,
                Some(Token::Word(column)) => {
                    self.expect(Token::Equals, "'=' after column name")?;
                    let value = match self.next() {
                        Some(Token::Quoted(v)) => Operand::Literal(v),
                        Some(Token::Word(v)) => Operand::infer(&v),
                        _ => return Err(StorageError::parse("expected value after '='")),
                    };
                    Condition::Eq { column, value }
                }
                other => {
                    return Err(StorageError::parse(format!(
                        "unexpected {:?} in WHERE clause",
                        other
                    )))
                }
            };
            conditions.push(term);
        }
        if conditions.is_empty() {
            return Err(StorageError::parse("empty WHERE clause"));
        }
        Ok(conditions)
    }

    fn values(&mut self) -> Result<Vec<String>> {
        self.expect(Token::Open, "'('")?;
        let mut values = Vec::new();
        if matches!(self.peek(), Some(Token::Close)) {
            self.pos += 1;
            return Ok(values);
        }
        loop {
            match self.next() {
                Some(Token::Quoted(v)) | Some(Token::Word(v)) => values.push(v),
                _ => return Err(StorageError::parse("expected value")),
            }
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::Close) => break,
                _ => return Err(StorageError::parse("expected ',' or ')'")),
            }
        }
        Ok(values)
    }
}

/// Parse one console line
pub fn parse_statement(input: &str) -> Result<Statement> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
    };

    let verb = match parser.next() {
        Some(Token::Word(w)) => w.to_ascii_uppercase(),
        _ => return Err(StorageError::parse("empty statement")),
    };

    let statement = match verb.as_str() {
        "INSERT" => {
            parser.expect_keyword("INTO")?;
            let table = parser.identifier("table name")?;
            parser.expect_keyword("VALUES")?;
            let values = parser.values()?;
            Statement::Insert { table, values }
        }
        "SELECT" => {
            let columns = parser.identifier_list("column name", Some("FROM"))?;
            parser.expect_keyword("FROM")?;
            let tables = parser.identifier_list("table name", None)?;
            let conditions = if parser.peek_keyword("WHERE") {
                parser.pos += 1;
                parser.conditions()?
            } else {
                Vec::new()
            };
            Statement::Select {
                columns,
                tables,
                conditions,
            }
        }
        "DELETE" => {
            parser.expect_keyword("FROM")?;
            let table = parser.identifier("table name")?;
            parser.expect_keyword("WHERE")?;
            let conditions = parser.conditions()?;
            Statement::Delete { table, conditions }
        }
        "EXIT" | "QUIT" => Statement::Exit,
        other => return Err(StorageError::parse(format!("unknown command {}", other))),
    };

    parser.finish()?;
    Ok(statement)
}
