use std::{array::TryFromSliceError, fmt::Display, string::FromUtf8Error, sync::PoisonError};

use bincode::ErrorKind;
use serde::{de, ser};

/// Custom Result type for bqldb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bqldb. Each processing stage reports its failures through
/// its own sub-enum so callers can tell a malformed statement apart from a
/// schema violation or an engine defect.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Lexical error (malformed text)
    Lex(LexError),
    /// Parse error (malformed structure)
    Parse(ParseError),
    /// Catalog error (naming conflicts, missing database/table)
    Catalog(CatalogError),
    /// Execution error (statement doesn't match the declared schema)
    Exec(ExecError),
    /// Expression evaluation error
    Eval(EvalError),
    /// Storage error (column surgery against a missing column)
    Storage(StorageError),
    /// Internal error (storage I/O, serialization, poisoned locks, etc.)
    Internal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    /// Input matched no token class
    UnexpectedCharacter { ch: char, pos: usize },
    /// A string literal was opened but never closed
    UnterminatedString { pos: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The next token was not one of the tokens the grammar allows here
    Unexpected {
        expected: String,
        found: String,
        pos: usize,
    },
    /// Input ended where more tokens were required
    UnexpectedEof,
    /// The same column was assigned twice in one update
    DuplicateAssignment { column: String, pos: usize },
    /// A numeric literal that cannot be represented
    InvalidNumber(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    DatabaseExists(String),
    NoSuchDatabase(String),
    NoCurrentDatabase,
    TableExists(String),
    NoSuchTable(String),
    DuplicateField(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecError {
    /// Value list length differs from the schema length
    ArityMismatch { expected: usize, given: usize },
    /// A value does not fit the declared type of its column
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },
    /// A statement named a column the schema does not declare
    UnknownColumn(String),
    /// A where clause evaluated to something other than a boolean
    FilterNotBoolean(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Operator applied to operands it is not defined for
    TypeMismatch(String),
    DivisionByZero,
    /// Integer arithmetic overflowed
    Overflow,
    /// An identifier not present in the row bindings
    UnknownColumn(String),
    /// A subquery used as a value did not yield exactly one row and column
    SubqueryCardinality { rows: usize, columns: usize },
    /// Subquery nesting exceeded the recursion limit
    SubqueryTooDeep,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    NoSuchColumn(String),
}

impl From<LexError> for Error {
    fn from(value: LexError) -> Self {
        Error::Lex(value)
    }
}

impl From<ParseError> for Error {
    fn from(value: ParseError) -> Self {
        Error::Parse(value)
    }
}

impl From<CatalogError> for Error {
    fn from(value: CatalogError) -> Self {
        Error::Catalog(value)
    }
}

impl From<ExecError> for Error {
    fn from(value: ExecError) -> Self {
        Error::Exec(value)
    }
}

impl From<EvalError> for Error {
    fn from(value: EvalError) -> Self {
        Error::Eval(value)
    }
}

impl From<StorageError> for Error {
    fn from(value: StorageError) -> Self {
        Error::Storage(value)
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(value: std::num::ParseIntError) -> Self {
        Error::Parse(ParseError::InvalidNumber(value.to_string()))
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(value: std::num::ParseFloatError) -> Self {
        Error::Parse(ParseError::InvalidNumber(value.to_string()))
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(value: PoisonError<T>) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<Box<ErrorKind>> for Error {
    fn from(value: Box<ErrorKind>) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<TryFromSliceError> for Error {
    fn from(value: TryFromSliceError) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<FromUtf8Error> for Error {
    fn from(value: FromUtf8Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl std::error::Error for Error {}

impl ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Internal(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Internal(msg.to_string())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Lex(err) => write!(f, "lex error: {}", err),
            Error::Parse(err) => write!(f, "parse error: {}", err),
            Error::Catalog(err) => write!(f, "catalog error: {}", err),
            Error::Exec(err) => write!(f, "execution error: {}", err),
            Error::Eval(err) => write!(f, "evaluation error: {}", err),
            Error::Storage(err) => write!(f, "storage error: {}", err),
            Error::Internal(err) => write!(f, "internal error: {}", err),
        }
    }
}

impl Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexError::UnexpectedCharacter { ch, pos } => {
                write!(f, "unexpected character {:?} at position {}", ch, pos)
            }
            LexError::UnterminatedString { pos } => {
                write!(f, "unterminated string literal starting at position {}", pos)
            }
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Unexpected {
                expected,
                found,
                pos,
            } => write!(
                f,
                "expected {}, found {} at position {}",
                expected, found, pos
            ),
            ParseError::UnexpectedEof => write!(f, "unexpected end of input"),
            ParseError::DuplicateAssignment { column, pos } => {
                write!(f, "column {} assigned twice at position {}", column, pos)
            }
            ParseError::InvalidNumber(err) => write!(f, "invalid number: {}", err),
        }
    }
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::DatabaseExists(name) => write!(f, "database {} already exists", name),
            CatalogError::NoSuchDatabase(name) => write!(f, "database {} does not exist", name),
            CatalogError::NoCurrentDatabase => write!(f, "no database selected"),
            CatalogError::TableExists(name) => write!(f, "table {} already exists", name),
            CatalogError::NoSuchTable(name) => write!(f, "table {} does not exist", name),
            CatalogError::DuplicateField(name) => write!(f, "duplicate field {}", name),
        }
    }
}

impl Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::ArityMismatch { expected, given } => {
                write!(f, "expected {} values, got {}", expected, given)
            }
            ExecError::TypeMismatch {
                column,
                expected,
                found,
            } => write!(
                f,
                "column {} holds {}, cannot store {}",
                column, expected, found
            ),
            ExecError::UnknownColumn(name) => write!(f, "unknown column {}", name),
            ExecError::FilterNotBoolean(found) => {
                write!(f, "where clause must be boolean, got {}", found)
            }
        }
    }
}

impl Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::TypeMismatch(msg) => write!(f, "{}", msg),
            EvalError::DivisionByZero => write!(f, "division by zero"),
            EvalError::Overflow => write!(f, "integer overflow"),
            EvalError::UnknownColumn(name) => write!(f, "unknown column {}", name),
            EvalError::SubqueryCardinality { rows, columns } => write!(
                f,
                "subquery must yield one row and one column, got {} rows and {} columns",
                rows, columns
            ),
            EvalError::SubqueryTooDeep => write!(f, "subquery nesting too deep"),
        }
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NoSuchColumn(name) => write!(f, "no such column {}", name),
        }
    }
}
