use crate::bql::engine::Transaction;
use crate::bql::executor::{Executor, ResultSet};
use crate::bql::parser::ast::{Expression, Statement};
use crate::bql::schema::Table;
use crate::error::Result;

use self::planner::Planner;

mod planner;

/// Execution plan nodes. Each statement form lowers to one tree.
#[derive(Debug, PartialEq)]
pub enum Node {
    CreateDatabase {
        name: String,
    },
    DropDatabase {
        name: String,
    },
    CreateTable {
        schema: Table,
    },
    Insert {
        table_name: String,
        values: Vec<Expression>,
    },
    Scan {
        table_name: String,
        filter: Option<Expression>,
    },
    /// Narrows and reorders scan output to the named columns
    Projection {
        source: Box<Node>,
        columns: Vec<String>,
    },
    Update {
        table_name: String,
        columns: Vec<(String, Expression)>,
        filter: Option<Expression>,
    },
    /// delete 的两种形态共用一个节点
    /// table_name 存在时按名删列，不存在时把 columns 当表名整表删除
    Delete {
        table_name: Option<String>,
        columns: Vec<String>,
    },
}

/// 执行计划定义，底层是不同类型执行节点
#[derive(Debug)]
pub struct Plan(pub Node);

impl Plan {
    pub fn build(stmt: Statement) -> Self {
        Planner::new().build(stmt)
    }

    pub fn execute<T: Transaction + 'static>(self, txn: &mut T) -> Result<ResultSet> {
        <dyn Executor<T>>::build(self.0).execute(txn)
    }
}
