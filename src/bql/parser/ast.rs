use crate::bql::types::DataType;

/// Abstract syntax tree definitions for BQL statements

/// Field definition in a create table statement
#[derive(Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
}

/// Statement types supported by the engine
#[derive(Debug, PartialEq)]
pub enum Statement {
    CreateDatabase {
        name: String,
    },
    DropDatabase {
        name: String,
    },
    CreateTable {
        name: String,
        columns: Vec<Column>,
    },
    /// get a, b from tbl where expr
    /// A column list of None stands for `*`.
    Get {
        columns: Option<Vec<String>>,
        table_name: String,
        filter: Option<Expression>,
    },
    /// put [v1, v2] in tbl
    Put {
        values: Vec<Expression>,
        table_name: String,
    },
    /// update [a: v1, b: v2] where expr in tbl
    /// Assignments keep their written order.
    Update {
        table_name: String,
        columns: Vec<(String, Expression)>,
        filter: Option<Expression>,
    },
    /// delete [a, b] from tbl removes columns; without `from`, each
    /// name is dropped as a whole table from the current database
    Delete {
        columns: Vec<String>,
        table_name: Option<String>,
    },
}

/// Expression types in filters and value lists
#[derive(Debug, PartialEq)]
pub enum Expression {
    Field(String),
    Consts(Consts),
    Operation(Operation),
    /// A parenthesized get query used as a scalar value
    Subquery(Box<Statement>),
}

impl From<Consts> for Expression {
    fn from(c: Consts) -> Self {
        Self::Consts(c)
    }
}

impl From<Operation> for Expression {
    fn from(op: Operation) -> Self {
        Self::Operation(op)
    }
}

/// Constant values
#[derive(Debug, PartialEq)]
pub enum Consts {
    None,
    Integer(i64),
    Float(f64),
    String(String),
}

/// Unary and binary operations over expressions
#[derive(Debug, PartialEq)]
pub enum Operation {
    // Logic
    Or(Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    // Equality
    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    // Comparison
    GreaterThan(Box<Expression>, Box<Expression>),
    GreaterThanOrEqual(Box<Expression>, Box<Expression>),
    LessThan(Box<Expression>, Box<Expression>),
    LessThanOrEqual(Box<Expression>, Box<Expression>),
    // Arithmetic
    Add(Box<Expression>, Box<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Multiply(Box<Expression>, Box<Expression>),
    Divide(Box<Expression>, Box<Expression>),
    Exponentiate(Box<Expression>, Box<Expression>),
    Remainder(Box<Expression>, Box<Expression>),
    // Prefix
    Negate(Box<Expression>),
    Identity(Box<Expression>),
}
