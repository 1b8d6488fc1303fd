use crate::bql::engine::Transaction;
use crate::bql::plan::Node;
use crate::bql::types::Row;
use crate::error::Result;

use self::mutation::{Delete, Insert, Update};
use self::query::{Projection, Scan};
use self::schema::{CreateDatabase, CreateTable, DropDatabase};

mod expression;
mod mutation;
mod query;
mod schema;

/// 执行器，每种计划节点一个实现
pub trait Executor<T: Transaction> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet>;
}

impl<T: Transaction + 'static> dyn Executor<T> {
    /// 把计划节点递归构建成执行器
    pub fn build(node: Node) -> Box<dyn Executor<T>> {
        match node {
            Node::CreateDatabase { name } => CreateDatabase::new(name),
            Node::DropDatabase { name } => DropDatabase::new(name),
            Node::CreateTable { schema } => CreateTable::new(schema),
            Node::Insert { table_name, values } => Insert::new(table_name, values),
            Node::Scan { table_name, filter } => Scan::new(table_name, filter),
            Node::Projection { source, columns } => Projection::new(Self::build(*source), columns),
            Node::Update {
                table_name,
                columns,
                filter,
            } => Update::new(table_name, columns, filter),
            Node::Delete {
                table_name,
                columns,
            } => Delete::new(table_name, columns),
        }
    }
}

/// 语句执行结果
#[derive(Debug, PartialEq)]
pub enum ResultSet {
    CreateDatabase { name: String },
    DropDatabase { name: String },
    CreateTable { name: String },
    Insert { count: usize },
    Scan { columns: Vec<String>, rows: Vec<Row> },
    Update { count: usize },
    Delete { count: usize },
}
