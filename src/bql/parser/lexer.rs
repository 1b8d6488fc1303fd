//! BQL lexer - turns raw query text into a stream of tokens

use std::{fmt::Display, iter::Peekable, str::Chars};

use crate::error::{Error, LexError, Result};

/// A classified lexeme together with the character offset it started at.
/// The offset is carried for error reporting only.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

/// The kinds of token BQL source text can contain
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Reserved keyword
    Keyword(Keyword),
    /// Identifier such as a database, table or column name
    Ident(String),
    /// String literal
    String(String),
    /// Numeric literal (decimal integer, float, or 0x-prefixed hex)
    Number(String),
    // Punctuation
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    Comma,
    Colon,
    // Operators
    Asterisk,
    DoubleAsterisk,
    Plus,
    Minus,
    Slash,
    Percent,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Bang,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TokenKind::Keyword(keyword) => keyword.to_str(),
            TokenKind::Ident(ident) => ident,
            TokenKind::String(v) => v,
            TokenKind::Number(n) => n,
            TokenKind::OpenBracket => "[",
            TokenKind::CloseBracket => "]",
            TokenKind::OpenParen => "(",
            TokenKind::CloseParen => ")",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Asterisk => "*",
            TokenKind::DoubleAsterisk => "**",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Equal => "=",
            TokenKind::NotEqual => "!=",
            TokenKind::GreaterThan => ">",
            TokenKind::GreaterThanOrEqual => ">=",
            TokenKind::LessThan => "<",
            TokenKind::LessThanOrEqual => "<=",
            TokenKind::Bang => "!",
        })
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}

/// BQL reserved keywords. Matching is case-sensitive: `create` is a keyword,
/// `CREATE` is an ordinary identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyword {
    Create,
    Database,
    Table,
    Text,
    Number,
    Get,
    From,
    Put,
    In,
    Update,
    Where,
    Delete,
    Or,
    And,
    None,
}

impl Keyword {
    /// Attempts to match an identifier-shaped lexeme as a keyword
    pub fn from_str(ident: &str) -> Option<Keyword> {
        Some(match ident {
            "create" => Keyword::Create,
            "database" => Keyword::Database,
            "table" => Keyword::Table,
            "text" => Keyword::Text,
            "number" => Keyword::Number,
            "get" => Keyword::Get,
            "from" => Keyword::From,
            "put" => Keyword::Put,
            "in" => Keyword::In,
            "update" => Keyword::Update,
            "where" => Keyword::Where,
            "delete" => Keyword::Delete,
            "or" => Keyword::Or,
            "and" => Keyword::And,
            "none" => Keyword::None,
            _ => return None,
        })
    }

    /// Returns the source spelling of the keyword
    pub fn to_str(&self) -> &str {
        match self {
            Keyword::Create => "create",
            Keyword::Database => "database",
            Keyword::Table => "table",
            Keyword::Text => "text",
            Keyword::Number => "number",
            Keyword::Get => "get",
            Keyword::From => "from",
            Keyword::Put => "put",
            Keyword::In => "in",
            Keyword::Update => "update",
            Keyword::Where => "where",
            Keyword::Delete => "delete",
            Keyword::Or => "or",
            Keyword::And => "and",
            Keyword::None => "none",
        }
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

/// BQL lexical analyzer. Iterating yields tokens until the input is
/// exhausted; a character that fits no token class yields an error.
pub struct Lexer<'a> {
    iter: Peekable<Chars<'a>>,
    pos: usize,
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.scan() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => {
                let pos = self.pos;
                self.iter
                    .peek()
                    .map(|c| Err(Error::Lex(LexError::UnexpectedCharacter { ch: *c, pos })))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given statement text
    pub fn new(text: &'a str) -> Self {
        Self {
            iter: text.chars().peekable(),
            pos: 0,
        }
    }

    /// Consumes the next character, keeping the offset counter accurate.
    /// All consumption must go through here or `next_if`.
    fn advance(&mut self) -> Option<char> {
        let c = self.iter.next();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    /// Consumes the next character if it satisfies the predicate
    fn next_if<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<char> {
        self.iter.peek().filter(|&c| predicate(*c))?;
        self.advance()
    }

    /// Consumes consecutive characters while they satisfy the predicate
    fn next_while<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<String> {
        let mut value = String::new();
        while let Some(c) = self.next_if(&predicate) {
            value.push(c);
        }
        Some(value).filter(|v| !v.is_empty())
    }

    /// Removes whitespace from the input stream
    fn erase_whitespace(&mut self) {
        self.next_while(|c| c.is_whitespace());
    }

    /// Scans and returns the next token, stamped with its start offset
    fn scan(&mut self) -> Result<Option<Token>> {
        self.erase_whitespace();
        let pos = self.pos;
        let kind = match self.iter.peek() {
            Some('"') => self.scan_string()?,
            Some(c) if c.is_ascii_digit() => self.scan_number(),
            Some(c) if c.is_alphabetic() => self.scan_ident(),
            Some(_) => self.scan_symbol(),
            None => None,
        };
        Ok(kind.map(|kind| Token { kind, pos }))
    }

    /// Scans a string literal (double quotes, no escape sequences)
    fn scan_string(&mut self) -> Result<Option<TokenKind>> {
        let start = self.pos;
        if self.next_if(|c| c == '"').is_none() {
            return Ok(None);
        }
        let mut val = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some(c) => val.push(c),
                None => return Err(LexError::UnterminatedString { pos: start }.into()),
            }
        }
        Ok(Some(TokenKind::String(val)))
    }

    /// Scans a numeric literal. The lexeme is kept as text; the parser
    /// decides between integer, float and hex representations.
    fn scan_number(&mut self) -> Option<TokenKind> {
        let mut val = self.next_if(|c| c.is_ascii_digit())?.to_string();
        // 0x prefix switches to base-16 digits
        if val == "0" {
            if let Some(x) = self.next_if(|c| c == 'x') {
                val.push(x);
                while let Some(c) = self.next_if(|c| c.is_ascii_hexdigit()) {
                    val.push(c);
                }
                return Some(TokenKind::Number(val));
            }
        }
        while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
            val.push(c);
        }
        if let Some(sep) = self.next_if(|c| c == '.') {
            val.push(sep);
            while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
                val.push(c);
            }
        }
        Some(TokenKind::Number(val))
    }

    /// Scans an identifier or keyword. Identifiers keep their case.
    fn scan_ident(&mut self) -> Option<TokenKind> {
        let mut val = self.next_if(|c| c.is_alphabetic())?.to_string();
        while let Some(c) = self.next_if(|c| c.is_alphanumeric() || c == '_') {
            val.push(c);
        }
        Some(Keyword::from_str(&val).map_or(TokenKind::Ident(val), TokenKind::Keyword))
    }

    /// Scans a punctuation or operator token, preferring the longer form
    /// where two characters make one operator
    fn scan_symbol(&mut self) -> Option<TokenKind> {
        let kind = match *self.iter.peek()? {
            '[' => TokenKind::OpenBracket,
            ']' => TokenKind::CloseBracket,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '*' => TokenKind::Asterisk,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => TokenKind::Equal,
            '!' => TokenKind::Bang,
            '>' => TokenKind::GreaterThan,
            '<' => TokenKind::LessThan,
            _ => return None,
        };
        self.advance();
        Some(match kind {
            TokenKind::Asterisk if self.next_if(|c| c == '*').is_some() => {
                TokenKind::DoubleAsterisk
            }
            TokenKind::Bang if self.next_if(|c| c == '=').is_some() => TokenKind::NotEqual,
            TokenKind::GreaterThan if self.next_if(|c| c == '=').is_some() => {
                TokenKind::GreaterThanOrEqual
            }
            TokenKind::LessThan if self.next_if(|c| c == '=').is_some() => {
                TokenKind::LessThanOrEqual
            }
            kind => kind,
        })
    }
}
