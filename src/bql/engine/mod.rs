use crate::error::{CatalogError, Error, Result};

use super::executor::ResultSet;
use super::parser::Parser;
use super::plan::Plan;
use super::schema::Table;
use super::types::Row;

pub mod kv;

/// 查询引擎抽象，事务实现可以替换
pub trait Engine: Clone {
    type Transaction: Transaction;

    fn begin(&self) -> Result<Self::Transaction>;

    fn session(&self) -> Result<Session<Self>> {
        Ok(Session {
            engine: self.clone(),
        })
    }
}

/// 一条语句执行期间可用的目录和行操作
pub trait Transaction {
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;

    // 数据库目录操作
    fn create_database(&mut self, name: String) -> Result<()>;
    fn drop_database(&mut self, name: String) -> Result<()>;
    fn current_database(&self) -> Result<Option<String>>;
    /// 当前数据库名，尚未选中任何库时报错
    fn must_current_database(&self) -> Result<String> {
        self.current_database()?
            .ok_or(Error::Catalog(CatalogError::NoCurrentDatabase))
    }

    // 表结构操作
    fn create_table(&mut self, table: Table) -> Result<()>;
    fn drop_table(&mut self, table_name: String) -> Result<()>;
    /// 从表结构和所有行里删掉指定列，列名必须存在且已去重
    fn drop_columns(&mut self, table_name: String, columns: Vec<String>) -> Result<()>;
    fn get_table(&self, table_name: String) -> Result<Option<Table>>;
    /// 表结构，表不存在时报错
    fn must_get_table(&self, table_name: String) -> Result<Table> {
        self.get_table(table_name.clone())?
            .ok_or(Error::Catalog(CatalogError::NoSuchTable(table_name)))
    }

    // 行操作，row id 由存储层分配，scan_table 原样带出来
    fn create_row(&mut self, table_name: String, row: Row) -> Result<()>;
    fn update_row(&mut self, table_name: String, id: u64, row: Row) -> Result<()>;
    fn delete_row(&mut self, table_name: String, id: u64) -> Result<()>;
    fn scan_table(&self, table_name: String) -> Result<Vec<(u64, Row)>>;
}

/// 会话，一次执行一条语句
pub struct Session<E: Engine> {
    engine: E,
}

impl<E: Engine + 'static> Session<E> {
    /// 解析并执行一条语句，出错时回滚，语句之外没有事务概念
    pub fn execute(&mut self, text: &str) -> Result<ResultSet> {
        let stmt = Parser::new(text).parse()?;
        let mut txn = self.engine.begin()?;
        match Plan::build(stmt).execute(&mut txn) {
            Ok(result) => {
                txn.commit()?;
                Ok(result)
            }
            Err(err) => {
                txn.rollback()?;
                Err(err)
            }
        }
    }
}
