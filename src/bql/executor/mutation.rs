use crate::bql::engine::Transaction;
use crate::bql::parser::ast::Expression;
use crate::bql::types::Value;
use crate::error::{Error, ExecError, Result};

use super::expression::evaluate_expr;
use super::{Executor, ResultSet};

/// put 语句执行器
pub struct Insert {
    table_name: String,
    values: Vec<Expression>,
}

impl Insert {
    pub fn new(table_name: String, values: Vec<Expression>) -> Box<Self> {
        Box::new(Self { table_name, values })
    }
}

impl<T: Transaction> Executor<T> for Insert {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let table = txn.must_get_table(self.table_name.clone())?;
        if self.values.len() != table.columns.len() {
            return Err(Error::Exec(ExecError::ArityMismatch {
                expected: table.columns.len(),
                given: self.values.len(),
            }));
        }

        // 值可以是任意表达式，在空的绑定环境下求值，再逐列做类型检查
        let mut row = Vec::with_capacity(self.values.len());
        for (expr, column) in self.values.iter().zip(table.columns.iter()) {
            let value = evaluate_expr(expr, &[], &Vec::new(), txn, 0)?;
            if !column.datatype.matches(&value) {
                return Err(Error::Exec(ExecError::TypeMismatch {
                    column: column.name.clone(),
                    expected: column.datatype.to_string(),
                    found: value.type_name().to_string(),
                }));
            }
            row.push(value);
        }

        txn.create_row(self.table_name, row)?;
        Ok(ResultSet::Insert { count: 1 })
    }
}

/// update 语句执行器
pub struct Update {
    table_name: String,
    columns: Vec<(String, Expression)>,
    filter: Option<Expression>,
}

impl Update {
    pub fn new(
        table_name: String,
        columns: Vec<(String, Expression)>,
        filter: Option<Expression>,
    ) -> Box<Self> {
        Box::new(Self {
            table_name,
            columns,
            filter,
        })
    }
}

impl<T: Transaction> Executor<T> for Update {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let table = txn.must_get_table(self.table_name.clone())?;
        let column_names: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();

        // 赋值目标列先解析成下标
        let mut assignments = Vec::with_capacity(self.columns.len());
        for (name, expr) in &self.columns {
            match table.column_index(name) {
                Some(i) => assignments.push((i, expr)),
                None => return Err(Error::Exec(ExecError::UnknownColumn(name.clone()))),
            }
        }

        // 对快照逐行求值，所有新行都算出来并通过校验之后才写回，
        // 中途任何一行出错整条语句都不生效
        let mut updates = Vec::new();
        for (id, row) in txn.scan_table(self.table_name.clone())? {
            if let Some(expr) = &self.filter {
                match evaluate_expr(expr, &column_names, &row, txn, 0)? {
                    Value::Boolean(true) => {}
                    Value::Boolean(false) => continue,
                    value => {
                        return Err(Error::Exec(ExecError::FilterNotBoolean(
                            value.type_name().to_string(),
                        )));
                    }
                }
            }

            // 赋值表达式引用的列取更新前的值
            let mut new_row = row.clone();
            for (i, expr) in &assignments {
                let value = evaluate_expr(expr, &column_names, &row, txn, 0)?;
                let column = &table.columns[*i];
                if !column.datatype.matches(&value) {
                    return Err(Error::Exec(ExecError::TypeMismatch {
                        column: column.name.clone(),
                        expected: column.datatype.to_string(),
                        found: value.type_name().to_string(),
                    }));
                }
                new_row[*i] = value;
            }
            updates.push((id, new_row));
        }

        let count = updates.len();
        for (id, row) in updates {
            txn.update_row(self.table_name.clone(), id, row)?;
        }
        Ok(ResultSet::Update { count })
    }
}

/// delete 语句执行器，两种形态：
/// 带 from 删的是表里的列，不带 from 删的是整张表
pub struct Delete {
    table_name: Option<String>,
    columns: Vec<String>,
}

impl Delete {
    pub fn new(table_name: Option<String>, columns: Vec<String>) -> Box<Self> {
        Box::new(Self {
            table_name,
            columns,
        })
    }
}

impl<T: Transaction> Executor<T> for Delete {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        // 名字列表保序去重，重复的名字只算一次
        let mut names: Vec<String> = Vec::with_capacity(self.columns.len());
        for name in self.columns {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        let count = names.len();

        match self.table_name {
            Some(table_name) => {
                txn.drop_columns(table_name, names)?;
            }
            None => {
                // 先确认每个名字都是存在的表再动手删
                for name in &names {
                    txn.must_get_table(name.clone())?;
                }
                for name in names {
                    txn.drop_table(name)?;
                }
            }
        }
        Ok(ResultSet::Delete { count })
    }
}
