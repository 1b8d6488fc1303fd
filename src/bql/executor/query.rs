use crate::bql::engine::Transaction;
use crate::bql::parser::ast::Expression;
use crate::bql::types::{Row, Value};
use crate::error::{Error, ExecError, Result};

use super::expression::evaluate_expr;
use super::{Executor, ResultSet};

/// get 语句的扫描执行器，where 过滤在扫描时完成
pub struct Scan {
    table_name: String,
    filter: Option<Expression>,
}

impl Scan {
    pub fn new(table_name: String, filter: Option<Expression>) -> Box<Self> {
        Box::new(Self { table_name, filter })
    }
}

impl<T: Transaction> Executor<T> for Scan {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let (columns, rows) = scan_rows(&self.table_name, self.filter.as_ref(), txn, 0)?;
        Ok(ResultSet::Scan { columns, rows })
    }
}

/// 列投影，包在扫描外面，按语句里给的顺序取列
pub struct Projection<T: Transaction + 'static> {
    source: Box<dyn Executor<T>>,
    columns: Vec<String>,
}

impl<T: Transaction + 'static> Projection<T> {
    pub fn new(source: Box<dyn Executor<T>>, columns: Vec<String>) -> Box<Self> {
        Box::new(Self { source, columns })
    }
}

impl<T: Transaction + 'static> Executor<T> for Projection<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        match self.source.execute(txn)? {
            ResultSet::Scan { columns, rows } => {
                let (columns, rows) = project(&columns, &self.columns, rows)?;
                Ok(ResultSet::Scan { columns, rows })
            }
            result => Err(Error::Internal(format!(
                "projection over unexpected result {:?}",
                result
            ))),
        }
    }
}

/// 扫描一张表，返回全部列名和过滤后的行，保持插入顺序
/// 子查询也从这里走，depth 用来限制嵌套
pub(super) fn scan_rows<T: Transaction>(
    table_name: &str,
    filter: Option<&Expression>,
    txn: &mut T,
    depth: usize,
) -> Result<(Vec<String>, Vec<Row>)> {
    let table = txn.must_get_table(table_name.to_string())?;
    let columns: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();

    let mut rows = Vec::new();
    for (_, row) in txn.scan_table(table_name.to_string())? {
        match filter {
            Some(expr) => match evaluate_expr(expr, &columns, &row, txn, depth)? {
                Value::Boolean(true) => rows.push(row),
                Value::Boolean(false) => {}
                value => {
                    return Err(Error::Exec(ExecError::FilterNotBoolean(
                        value.type_name().to_string(),
                    )));
                }
            },
            None => rows.push(row),
        }
    }
    Ok((columns, rows))
}

/// 把行投影到指定的列，列名可以重复，顺序按给定的来
pub(super) fn project(
    all_columns: &[String],
    wanted: &[String],
    rows: Vec<Row>,
) -> Result<(Vec<String>, Vec<Row>)> {
    // 列名先解析成下标，任何未知列名都让整条语句失败
    let mut indexes = Vec::with_capacity(wanted.len());
    for name in wanted {
        match all_columns.iter().position(|c| c == name) {
            Some(i) => indexes.push(i),
            None => return Err(Error::Exec(ExecError::UnknownColumn(name.clone()))),
        }
    }
    let rows = rows
        .into_iter()
        .map(|row| indexes.iter().map(|&i| row[i].clone()).collect())
        .collect();
    Ok((wanted.to_vec(), rows))
}

#[cfg(test)]
mod tests {
    use crate::bql::engine::kv::KVEngine;
    use crate::bql::engine::Engine;
    use crate::bql::executor::ResultSet;
    use crate::bql::types::Value;
    use crate::error::{Error, ExecError, Result};
    use crate::storage::memory::MemoryEngine;

    #[test]
    fn test_projection_order_and_repeats() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;
        session.execute("create database shop")?;
        session.execute("create table customers [name: text, id: number]")?;
        session.execute("put [\"james\", 1] in customers")?;

        // 投影顺序按语句里的来，而不是表结构的顺序，列可以重复
        assert_eq!(
            session.execute("get id, name, id from customers")?,
            ResultSet::Scan {
                columns: vec!["id".to_string(), "name".to_string(), "id".to_string()],
                rows: vec![vec![
                    Value::Integer(1),
                    Value::Text("james".to_string()),
                    Value::Integer(1),
                ]],
            }
        );

        assert_eq!(
            session.execute("get ghost from customers"),
            Err(Error::Exec(ExecError::UnknownColumn("ghost".to_string())))
        );
        Ok(())
    }

    #[test]
    fn test_filter_keeps_insertion_order() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;
        session.execute("create database shop")?;
        session.execute("create table nums [n: number]")?;
        for n in [5, 3, 8, 1] {
            session.execute(&format!("put [{}] in nums", n))?;
        }

        assert_eq!(
            session.execute("get n from nums where n > 2")?,
            ResultSet::Scan {
                columns: vec!["n".to_string()],
                rows: vec![
                    vec![Value::Integer(5)],
                    vec![Value::Integer(3)],
                    vec![Value::Integer(8)],
                ],
            }
        );

        // 同一个查询执行两次结果一样
        assert_eq!(
            session.execute("get n from nums where n > 2")?,
            session.execute("get n from nums where n > 2")?,
        );
        Ok(())
    }

    #[test]
    fn test_filter_must_be_boolean() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;
        session.execute("create database shop")?;
        session.execute("create table nums [n: number]")?;
        session.execute("put [1] in nums")?;

        // where 后面的表达式算出非布尔值时整条 get 失败
        assert_eq!(
            session.execute("get n from nums where n + 1"),
            Err(Error::Exec(ExecError::FilterNotBoolean(
                "number".to_string()
            )))
        );
        assert_eq!(
            session.execute("get n from nums where none"),
            Err(Error::Exec(ExecError::FilterNotBoolean("none".to_string())))
        );
        Ok(())
    }
}
