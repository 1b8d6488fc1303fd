use std::iter::Peekable;

use crate::bql::parser::ast::{Column, Consts, Expression, Operation};
use crate::bql::parser::lexer::{Keyword, Lexer, Token, TokenKind};
use crate::bql::types::DataType;
use crate::error::{Error, ParseError, Result};

pub mod ast;
mod lexer;

/// BQL parser. Consumes the token stream and produces a statement AST.
/// Semantic checks against the schema happen later, in the executor.
pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given statement text
    pub fn new(input: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(input).peekable(),
        }
    }

    /// Parses the input as a single statement
    pub fn parse(&mut self) -> Result<ast::Statement> {
        let stmt = self.parse_statement()?;
        // Nothing may follow a complete statement
        if let Some(token) = self.peek()? {
            return Err(Self::unexpected("end of statement", &token.kind, token.pos));
        }
        Ok(stmt)
    }

    /// Dispatches on the statement's leading keyword
    fn parse_statement(&mut self) -> Result<ast::Statement> {
        match self.peek()? {
            Some(Token {
                kind: TokenKind::Keyword(Keyword::Create),
                ..
            }) => self.parse_create(),
            Some(Token {
                kind: TokenKind::Keyword(Keyword::Get),
                ..
            }) => self.parse_get(),
            Some(Token {
                kind: TokenKind::Keyword(Keyword::Put),
                ..
            }) => self.parse_put(),
            Some(Token {
                kind: TokenKind::Keyword(Keyword::Update),
                ..
            }) => self.parse_update(),
            Some(Token {
                kind: TokenKind::Keyword(Keyword::Delete),
                ..
            }) => self.parse_delete(),
            Some(token) => Err(Self::unexpected("a statement", &token.kind, token.pos)),
            None => Err(ParseError::UnexpectedEof.into()),
        }
    }

    /// Parses create database and create table statements
    fn parse_create(&mut self) -> Result<ast::Statement> {
        self.next_expect(TokenKind::Keyword(Keyword::Create))?;
        let token = self.next()?;
        match token.kind {
            TokenKind::Keyword(Keyword::Database) => Ok(ast::Statement::CreateDatabase {
                name: self.next_ident()?,
            }),
            TokenKind::Keyword(Keyword::Table) => self.parse_create_table(),
            _ => Err(Self::unexpected(
                "database or table",
                &token.kind,
                token.pos,
            )),
        }
    }

    /// Parses create table name [field, field, ...]. The table name is
    /// required and the field list must not be empty.
    fn parse_create_table(&mut self) -> Result<ast::Statement> {
        let name = self.next_ident()?;
        self.next_expect(TokenKind::OpenBracket)?;

        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_field()?);
            if self.next_if_token(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.next_expect(TokenKind::CloseBracket)?;
        Ok(ast::Statement::CreateTable { name, columns })
    }

    /// Parses a single name: type field declaration
    fn parse_field(&mut self) -> Result<Column> {
        let name = self.next_ident()?;
        self.next_expect(TokenKind::Colon)?;
        let token = self.next()?;
        let datatype = match token.kind {
            TokenKind::Keyword(Keyword::Number) => DataType::Number,
            TokenKind::Keyword(Keyword::Text) => DataType::Text,
            kind => return Err(Self::unexpected("number or text", &kind, token.pos)),
        };
        Ok(Column { name, datatype })
    }

    /// Parses get columns from table where filter. Also used for the
    /// parenthesized subquery form inside expressions.
    fn parse_get(&mut self) -> Result<ast::Statement> {
        self.next_expect(TokenKind::Keyword(Keyword::Get))?;
        let columns = if self.next_if_token(TokenKind::Asterisk).is_some() {
            None
        } else {
            let mut columns = Vec::new();
            loop {
                columns.push(self.next_ident()?);
                if self.next_if_token(TokenKind::Comma).is_none() {
                    break;
                }
            }
            Some(columns)
        };
        self.next_expect(TokenKind::Keyword(Keyword::From))?;
        let table_name = self.next_ident()?;
        let filter = self.parse_where_clause()?;
        Ok(ast::Statement::Get {
            columns,
            table_name,
            filter,
        })
    }

    /// Parses put [values] in table. An empty value list is legal; it
    /// feeds tables whose schema has become empty through column
    /// deletion.
    fn parse_put(&mut self) -> Result<ast::Statement> {
        self.next_expect(TokenKind::Keyword(Keyword::Put))?;
        self.next_expect(TokenKind::OpenBracket)?;

        let mut values = Vec::new();
        if self.next_if_token(TokenKind::CloseBracket).is_none() {
            loop {
                values.push(self.parse_expression()?);
                if self.next_if_token(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.next_expect(TokenKind::CloseBracket)?;
        }
        self.next_expect(TokenKind::Keyword(Keyword::In))?;
        let table_name = self.next_ident()?;
        Ok(ast::Statement::Put { values, table_name })
    }

    // 解析 update 语句，where 在 in 之前
    fn parse_update(&mut self) -> Result<ast::Statement> {
        self.next_expect(TokenKind::Keyword(Keyword::Update))?;
        self.next_expect(TokenKind::OpenBracket)?;

        let mut columns: Vec<(String, Expression)> = Vec::new();
        loop {
            let token = self.next()?;
            let (col, pos) = match token.kind {
                TokenKind::Ident(ident) => (ident, token.pos),
                kind => return Err(Self::unexpected("an identifier", &kind, token.pos)),
            };
            self.next_expect(TokenKind::Colon)?;
            let value = self.parse_expression()?;
            // 同一条语句里给一列赋值两次是错误
            if columns.iter().any(|(name, _)| name == &col) {
                return Err(ParseError::DuplicateAssignment { column: col, pos }.into());
            }
            columns.push((col, value));
            if self.next_if_token(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.next_expect(TokenKind::CloseBracket)?;

        let filter = self.parse_where_clause()?;
        self.next_expect(TokenKind::Keyword(Keyword::In))?;
        let table_name = self.next_ident()?;
        Ok(ast::Statement::Update {
            table_name,
            columns,
            filter,
        })
    }

    /// Parses the delete forms. delete [cols] from table removes
    /// columns; delete [names] drops whole tables; delete table t and
    /// delete database d are the single-name spellings.
    fn parse_delete(&mut self) -> Result<ast::Statement> {
        self.next_expect(TokenKind::Keyword(Keyword::Delete))?;

        if self
            .next_if_token(TokenKind::Keyword(Keyword::Table))
            .is_some()
        {
            return Ok(ast::Statement::Delete {
                columns: vec![self.next_ident()?],
                table_name: None,
            });
        }
        if self
            .next_if_token(TokenKind::Keyword(Keyword::Database))
            .is_some()
        {
            return Ok(ast::Statement::DropDatabase {
                name: self.next_ident()?,
            });
        }

        self.next_expect(TokenKind::OpenBracket)?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.next_ident()?);
            if self.next_if_token(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.next_expect(TokenKind::CloseBracket)?;

        let table_name = match self.next_if_token(TokenKind::Keyword(Keyword::From)) {
            Some(_) => Some(self.next_ident()?),
            None => None,
        };
        Ok(ast::Statement::Delete {
            columns,
            table_name,
        })
    }

    // 解析 where 条件
    fn parse_where_clause(&mut self) -> Result<Option<Expression>> {
        if self
            .next_if_token(TokenKind::Keyword(Keyword::Where))
            .is_none()
        {
            return Ok(None);
        }
        Ok(Some(self.parse_expression()?))
    }

    /// Entry point of the precedence chain, loosest tier first
    fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<Expression> {
        let mut lhs = self.parse_and_expr()?;
        while self
            .next_if_token(TokenKind::Keyword(Keyword::Or))
            .is_some()
        {
            let rhs = self.parse_and_expr()?;
            lhs = Operation::Or(Box::new(lhs), Box::new(rhs)).into();
        }
        Ok(lhs)
    }

    fn parse_and_expr(&mut self) -> Result<Expression> {
        let mut lhs = self.parse_equality_expr()?;
        while self
            .next_if_token(TokenKind::Keyword(Keyword::And))
            .is_some()
        {
            let rhs = self.parse_equality_expr()?;
            lhs = Operation::And(Box::new(lhs), Box::new(rhs)).into();
        }
        Ok(lhs)
    }

    fn parse_equality_expr(&mut self) -> Result<Expression> {
        let mut lhs = self.parse_comparison_expr()?;
        while let Some(token) =
            self.next_if(|k| matches!(k, TokenKind::Equal | TokenKind::NotEqual))
        {
            let rhs = self.parse_comparison_expr()?;
            lhs = match token.kind {
                TokenKind::Equal => Operation::Equal(Box::new(lhs), Box::new(rhs)),
                _ => Operation::NotEqual(Box::new(lhs), Box::new(rhs)),
            }
            .into();
        }
        Ok(lhs)
    }

    fn parse_comparison_expr(&mut self) -> Result<Expression> {
        let mut lhs = self.parse_term_expr()?;
        while let Some(token) = self.next_if(|k| {
            matches!(
                k,
                TokenKind::GreaterThan
                    | TokenKind::GreaterThanOrEqual
                    | TokenKind::LessThan
                    | TokenKind::LessThanOrEqual
            )
        }) {
            let rhs = self.parse_term_expr()?;
            lhs = match token.kind {
                TokenKind::GreaterThan => Operation::GreaterThan(Box::new(lhs), Box::new(rhs)),
                TokenKind::GreaterThanOrEqual => {
                    Operation::GreaterThanOrEqual(Box::new(lhs), Box::new(rhs))
                }
                TokenKind::LessThan => Operation::LessThan(Box::new(lhs), Box::new(rhs)),
                _ => Operation::LessThanOrEqual(Box::new(lhs), Box::new(rhs)),
            }
            .into();
        }
        Ok(lhs)
    }

    fn parse_term_expr(&mut self) -> Result<Expression> {
        let mut lhs = self.parse_factor_expr()?;
        while let Some(token) = self.next_if(|k| matches!(k, TokenKind::Plus | TokenKind::Minus)) {
            let rhs = self.parse_factor_expr()?;
            lhs = match token.kind {
                TokenKind::Plus => Operation::Add(Box::new(lhs), Box::new(rhs)),
                _ => Operation::Subtract(Box::new(lhs), Box::new(rhs)),
            }
            .into();
        }
        Ok(lhs)
    }

    // ** 和乘除同层，也是左结合：2 ** 3 ** 2 解析成 (2 ** 3) ** 2
    fn parse_factor_expr(&mut self) -> Result<Expression> {
        let mut lhs = self.parse_unary_expr()?;
        while let Some(token) = self.next_if(|k| {
            matches!(
                k,
                TokenKind::Asterisk
                    | TokenKind::Slash
                    | TokenKind::Percent
                    | TokenKind::DoubleAsterisk
            )
        }) {
            let rhs = self.parse_unary_expr()?;
            lhs = match token.kind {
                TokenKind::Asterisk => Operation::Multiply(Box::new(lhs), Box::new(rhs)),
                TokenKind::Slash => Operation::Divide(Box::new(lhs), Box::new(rhs)),
                TokenKind::Percent => Operation::Remainder(Box::new(lhs), Box::new(rhs)),
                _ => Operation::Exponentiate(Box::new(lhs), Box::new(rhs)),
            }
            .into();
        }
        Ok(lhs)
    }

    /// Prefix operators bind tighter than any binary operator and nest
    /// to the right
    fn parse_unary_expr(&mut self) -> Result<Expression> {
        if let Some(token) =
            self.next_if(|k| matches!(k, TokenKind::Minus | TokenKind::Plus | TokenKind::Bang))
        {
            let operand = self.parse_unary_expr()?;
            return Ok(match token.kind {
                TokenKind::Minus => Operation::Negate(Box::new(operand)),
                TokenKind::Plus => Operation::Identity(Box::new(operand)),
                _ => Operation::Not(Box::new(operand)),
            }
            .into());
        }
        self.parse_primary_expr()
    }

    /// Literals, field references, none, and parenthesized get queries.
    /// Parentheses introduce subqueries only; there is no grouping form.
    fn parse_primary_expr(&mut self) -> Result<Expression> {
        let token = self.next()?;
        Ok(match token.kind {
            TokenKind::Number(n) => {
                // The lexer keeps number lexemes as text; integer, hex
                // and float forms are told apart here
                if let Some(hex) = n.strip_prefix("0x") {
                    Consts::Integer(i64::from_str_radix(hex, 16)?).into()
                } else if n.chars().all(|c| c.is_ascii_digit()) {
                    Consts::Integer(n.parse()?).into()
                } else {
                    Consts::Float(n.parse()?).into()
                }
            }
            TokenKind::String(s) => Consts::String(s).into(),
            TokenKind::Keyword(Keyword::None) => Consts::None.into(),
            TokenKind::Ident(ident) => Expression::Field(ident),
            TokenKind::OpenParen => {
                let subquery = self.parse_get()?;
                self.next_expect(TokenKind::CloseParen)?;
                Expression::Subquery(Box::new(subquery))
            }
            kind => return Err(Self::unexpected("an expression", &kind, token.pos)),
        })
    }

    /// Peeks at the next token
    fn peek(&mut self) -> Result<Option<Token>> {
        self.lexer.peek().cloned().transpose()
    }

    /// Consumes and returns the next token
    fn next(&mut self) -> Result<Token> {
        self.lexer
            .next()
            .unwrap_or_else(|| Err(ParseError::UnexpectedEof.into()))
    }

    /// Expects and consumes an identifier
    fn next_ident(&mut self) -> Result<String> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Ident(ident) => Ok(ident),
            kind => Err(Self::unexpected("an identifier", &kind, token.pos)),
        }
    }

    /// Expects a specific token kind, returns an error otherwise
    fn next_expect(&mut self, expect: TokenKind) -> Result<()> {
        let token = self.next()?;
        if token.kind != expect {
            return Err(Self::unexpected(
                &expect.to_string(),
                &token.kind,
                token.pos,
            ));
        }
        Ok(())
    }

    /// Consumes the next token if its kind satisfies the predicate
    fn next_if<F: Fn(&TokenKind) -> bool>(&mut self, predicate: F) -> Option<Token> {
        self.peek().unwrap_or(None).filter(|t| predicate(&t.kind))?;
        self.next().ok()
    }

    /// Consumes the next token if it is exactly the given kind
    fn next_if_token(&mut self, kind: TokenKind) -> Option<Token> {
        self.next_if(|k| k == &kind)
    }

    /// Builds the error for a token that does not fit the grammar here
    fn unexpected(expected: &str, found: &TokenKind, pos: usize) -> Error {
        ParseError::Unexpected {
            expected: expected.to_string(),
            found: found.to_string(),
            pos,
        }
        .into()
    }
}
