use crate::bql::engine::Transaction;
use crate::bql::schema::Table;
use crate::error::Result;

use super::{Executor, ResultSet};

/// create database 执行器
pub struct CreateDatabase {
    name: String,
}

impl CreateDatabase {
    pub fn new(name: String) -> Box<Self> {
        Box::new(Self { name })
    }
}

impl<T: Transaction> Executor<T> for CreateDatabase {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        txn.create_database(self.name.clone())?;
        Ok(ResultSet::CreateDatabase { name: self.name })
    }
}

/// delete database 执行器
pub struct DropDatabase {
    name: String,
}

impl DropDatabase {
    pub fn new(name: String) -> Box<Self> {
        Box::new(Self { name })
    }
}

impl<T: Transaction> Executor<T> for DropDatabase {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        txn.drop_database(self.name.clone())?;
        Ok(ResultSet::DropDatabase { name: self.name })
    }
}

/// create table 执行器
pub struct CreateTable {
    schema: Table,
}

impl CreateTable {
    pub fn new(schema: Table) -> Box<Self> {
        Box::new(Self { schema })
    }
}

impl<T: Transaction> Executor<T> for CreateTable {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let name = self.schema.name.clone();
        txn.create_table(self.schema)?;
        Ok(ResultSet::CreateTable { name })
    }
}
