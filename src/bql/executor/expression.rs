use std::cmp::Ordering;

use crate::bql::engine::Transaction;
use crate::bql::parser::ast::{Consts, Expression, Operation, Statement};
use crate::bql::types::{Row, Value};
use crate::error::{Error, EvalError, Result};

use super::query::{project, scan_rows};

/// 子查询嵌套上限，防止自引用查询无限递归
pub const MAX_SUBQUERY_DEPTH: usize = 16;

/// 在一行的绑定环境里求值表达式
/// columns 和 row 按位置一一对应，子查询重入执行器时 depth 加一
pub fn evaluate_expr<T: Transaction>(
    expr: &Expression,
    columns: &[String],
    row: &Row,
    txn: &mut T,
    depth: usize,
) -> Result<Value> {
    match expr {
        Expression::Field(name) => match columns.iter().position(|c| c == name) {
            Some(i) => Ok(row[i].clone()),
            None => Err(Error::Eval(EvalError::UnknownColumn(name.clone()))),
        },
        Expression::Consts(c) => Ok(match c {
            Consts::None => Value::None,
            Consts::Integer(n) => Value::Integer(*n),
            Consts::Float(f) => Value::Float(*f),
            Consts::String(s) => Value::Text(s.clone()),
        }),
        Expression::Operation(op) => evaluate_operation(op, columns, row, txn, depth),
        Expression::Subquery(stmt) => evaluate_subquery(stmt, txn, depth),
    }
}

fn evaluate_operation<T: Transaction>(
    op: &Operation,
    columns: &[String],
    row: &Row,
    txn: &mut T,
    depth: usize,
) -> Result<Value> {
    match op {
        Operation::Not(expr) => match evaluate_expr(expr, columns, row, txn, depth)? {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            value => Err(Error::Eval(EvalError::TypeMismatch(format!(
                "! requires a boolean operand, got {}",
                value.type_name()
            )))),
        },
        Operation::Negate(expr) => match evaluate_expr(expr, columns, row, txn, depth)? {
            Value::Integer(n) => n
                .checked_neg()
                .map(Value::Integer)
                .ok_or(Error::Eval(EvalError::Overflow)),
            Value::Float(f) => Ok(Value::Float(-f)),
            value => Err(Error::Eval(EvalError::TypeMismatch(format!(
                "cannot negate {}",
                value.type_name()
            )))),
        },
        Operation::Identity(expr) => match evaluate_expr(expr, columns, row, txn, depth)? {
            value @ (Value::Integer(_) | Value::Float(_)) => Ok(value),
            value => Err(Error::Eval(EvalError::TypeMismatch(format!(
                "unary + requires a number, got {}",
                value.type_name()
            )))),
        },
        // 二元运算的两个操作数都会求值，and/or 也不短路
        Operation::Or(lhs, rhs)
        | Operation::And(lhs, rhs)
        | Operation::Equal(lhs, rhs)
        | Operation::NotEqual(lhs, rhs)
        | Operation::GreaterThan(lhs, rhs)
        | Operation::GreaterThanOrEqual(lhs, rhs)
        | Operation::LessThan(lhs, rhs)
        | Operation::LessThanOrEqual(lhs, rhs)
        | Operation::Add(lhs, rhs)
        | Operation::Subtract(lhs, rhs)
        | Operation::Multiply(lhs, rhs)
        | Operation::Divide(lhs, rhs)
        | Operation::Exponentiate(lhs, rhs)
        | Operation::Remainder(lhs, rhs) => {
            let lhs = evaluate_expr(lhs, columns, row, txn, depth)?;
            let rhs = evaluate_expr(rhs, columns, row, txn, depth)?;
            apply_binary(op, lhs, rhs)
        }
    }
}

fn apply_binary(op: &Operation, lhs: Value, rhs: Value) -> Result<Value> {
    match op {
        Operation::Or(..) => match (lhs, rhs) {
            (Value::Boolean(l), Value::Boolean(r)) => Ok(Value::Boolean(l || r)),
            (l, r) => Err(logic_mismatch("or", &l, &r)),
        },
        Operation::And(..) => match (lhs, rhs) {
            (Value::Boolean(l), Value::Boolean(r)) => Ok(Value::Boolean(l && r)),
            (l, r) => Err(logic_mismatch("and", &l, &r)),
        },
        Operation::Equal(..) => Ok(Value::Boolean(values_equal(&lhs, &rhs)?)),
        Operation::NotEqual(..) => Ok(Value::Boolean(!values_equal(&lhs, &rhs)?)),
        Operation::GreaterThan(..) => {
            Ok(Value::Boolean(compare_values(&lhs, &rhs)? == Ordering::Greater))
        }
        Operation::GreaterThanOrEqual(..) => {
            Ok(Value::Boolean(compare_values(&lhs, &rhs)? != Ordering::Less))
        }
        Operation::LessThan(..) => {
            Ok(Value::Boolean(compare_values(&lhs, &rhs)? == Ordering::Less))
        }
        Operation::LessThanOrEqual(..) => {
            Ok(Value::Boolean(compare_values(&lhs, &rhs)? != Ordering::Greater))
        }
        Operation::Add(..) => add_values(lhs, rhs),
        Operation::Subtract(..) => subtract_values(lhs, rhs),
        Operation::Multiply(..) => multiply_values(lhs, rhs),
        Operation::Divide(..) => divide_values(lhs, rhs),
        Operation::Exponentiate(..) => exponentiate_values(lhs, rhs),
        Operation::Remainder(..) => remainder_values(lhs, rhs),
        op => Err(Error::Internal(format!("{:?} is not a binary operator", op))),
    }
}

fn evaluate_subquery<T: Transaction>(stmt: &Statement, txn: &mut T, depth: usize) -> Result<Value> {
    if depth >= MAX_SUBQUERY_DEPTH {
        return Err(Error::Eval(EvalError::SubqueryTooDeep));
    }
    let (columns, mut rows) = match stmt {
        Statement::Get {
            columns,
            table_name,
            filter,
        } => {
            let (all_columns, rows) = scan_rows(table_name, filter.as_ref(), txn, depth + 1)?;
            match columns {
                Some(wanted) => project(&all_columns, wanted, rows)?,
                None => (all_columns, rows),
            }
        }
        stmt => {
            return Err(Error::Internal(format!(
                "subquery must be a get statement, got {:?}",
                stmt
            )));
        }
    };

    // 作为标量使用，结果必须恰好一行一列
    if rows.len() != 1 || columns.len() != 1 {
        return Err(Error::Eval(EvalError::SubqueryCardinality {
            rows: rows.len(),
            columns: columns.len(),
        }));
    }
    Ok(rows.remove(0).remove(0))
}

/// 相等没有三值逻辑：None 只等于 None，和其他任何值都不相等
fn values_equal(lhs: &Value, rhs: &Value) -> Result<bool> {
    Ok(match (lhs, rhs) {
        (Value::None, Value::None) => true,
        (Value::None, _) | (_, Value::None) => false,
        (Value::Integer(l), Value::Integer(r)) => l == r,
        (Value::Float(l), Value::Float(r)) => l == r,
        (Value::Integer(l), Value::Float(r)) => (*l as f64) == *r,
        (Value::Float(l), Value::Integer(r)) => *l == (*r as f64),
        (Value::Text(l), Value::Text(r)) => l == r,
        (Value::Boolean(l), Value::Boolean(r)) => l == r,
        (l, r) => return Err(mismatch("compare", l, r)),
    })
}

fn compare_values(lhs: &Value, rhs: &Value) -> Result<Ordering> {
    match (lhs, rhs) {
        (Value::Integer(l), Value::Integer(r)) => Ok(l.cmp(r)),
        (Value::Integer(l), Value::Float(r)) => float_cmp(*l as f64, *r),
        (Value::Float(l), Value::Integer(r)) => float_cmp(*l, *r as f64),
        (Value::Float(l), Value::Float(r)) => float_cmp(*l, *r),
        (Value::Text(l), Value::Text(r)) => Ok(l.cmp(r)),
        (l, r) => Err(mismatch("compare", l, r)),
    }
}

fn float_cmp(l: f64, r: f64) -> Result<Ordering> {
    l.partial_cmp(&r).ok_or(Error::Eval(EvalError::TypeMismatch(
        "NaN is not comparable".to_string(),
    )))
}

fn add_values(lhs: Value, rhs: Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Integer(l), Value::Integer(r)) => l
            .checked_add(r)
            .map(Value::Integer)
            .ok_or(Error::Eval(EvalError::Overflow)),
        (Value::Integer(l), Value::Float(r)) => Ok(Value::Float(l as f64 + r)),
        (Value::Float(l), Value::Integer(r)) => Ok(Value::Float(l + r as f64)),
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l + r)),
        // 加号也做字符串拼接
        (Value::Text(l), Value::Text(r)) => Ok(Value::Text(l + &r)),
        (l, r) => Err(mismatch("add", &l, &r)),
    }
}

fn subtract_values(lhs: Value, rhs: Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Integer(l), Value::Integer(r)) => l
            .checked_sub(r)
            .map(Value::Integer)
            .ok_or(Error::Eval(EvalError::Overflow)),
        (Value::Integer(l), Value::Float(r)) => Ok(Value::Float(l as f64 - r)),
        (Value::Float(l), Value::Integer(r)) => Ok(Value::Float(l - r as f64)),
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l - r)),
        (l, r) => Err(mismatch("subtract", &l, &r)),
    }
}

fn multiply_values(lhs: Value, rhs: Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Integer(l), Value::Integer(r)) => l
            .checked_mul(r)
            .map(Value::Integer)
            .ok_or(Error::Eval(EvalError::Overflow)),
        (Value::Integer(l), Value::Float(r)) => Ok(Value::Float(l as f64 * r)),
        (Value::Float(l), Value::Integer(r)) => Ok(Value::Float(l * r as f64)),
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l * r)),
        (l, r) => Err(mismatch("multiply", &l, &r)),
    }
}

fn divide_values(lhs: Value, rhs: Value) -> Result<Value> {
    // 0 和 0.0 做除数都直接报错，浮点除法不走 inf/NaN
    if matches!(&rhs, Value::Integer(0)) || matches!(&rhs, Value::Float(f) if *f == 0.0) {
        return Err(Error::Eval(EvalError::DivisionByZero));
    }
    match (lhs, rhs) {
        (Value::Integer(l), Value::Integer(r)) => l
            .checked_div(r)
            .map(Value::Integer)
            .ok_or(Error::Eval(EvalError::Overflow)),
        (Value::Integer(l), Value::Float(r)) => Ok(Value::Float(l as f64 / r)),
        (Value::Float(l), Value::Integer(r)) => Ok(Value::Float(l / r as f64)),
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l / r)),
        (l, r) => Err(mismatch("divide", &l, &r)),
    }
}

fn exponentiate_values(lhs: Value, rhs: Value) -> Result<Value> {
    match (lhs, rhs) {
        // 整数的非负整数次幂保持整数，负次幂落到浮点
        (Value::Integer(l), Value::Integer(r)) if r >= 0 => {
            let exp = u32::try_from(r).map_err(|_| Error::Eval(EvalError::Overflow))?;
            l.checked_pow(exp)
                .map(Value::Integer)
                .ok_or(Error::Eval(EvalError::Overflow))
        }
        (Value::Integer(l), Value::Integer(r)) => Ok(Value::Float((l as f64).powf(r as f64))),
        (Value::Integer(l), Value::Float(r)) => Ok(Value::Float((l as f64).powf(r))),
        (Value::Float(l), Value::Integer(r)) => Ok(Value::Float(l.powf(r as f64))),
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l.powf(r))),
        (l, r) => Err(mismatch("exponentiate", &l, &r)),
    }
}

fn remainder_values(lhs: Value, rhs: Value) -> Result<Value> {
    if matches!(&rhs, Value::Integer(0)) || matches!(&rhs, Value::Float(f) if *f == 0.0) {
        return Err(Error::Eval(EvalError::DivisionByZero));
    }
    match (lhs, rhs) {
        (Value::Integer(l), Value::Integer(r)) => l
            .checked_rem(r)
            .map(Value::Integer)
            .ok_or(Error::Eval(EvalError::Overflow)),
        (Value::Integer(l), Value::Float(r)) => Ok(Value::Float(l as f64 % r)),
        (Value::Float(l), Value::Integer(r)) => Ok(Value::Float(l % r as f64)),
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l % r)),
        (l, r) => Err(mismatch("take the remainder of", &l, &r)),
    }
}

fn mismatch(verb: &str, lhs: &Value, rhs: &Value) -> Error {
    Error::Eval(EvalError::TypeMismatch(format!(
        "cannot {} {} and {}",
        verb,
        lhs.type_name(),
        rhs.type_name()
    )))
}

fn logic_mismatch(op: &str, lhs: &Value, rhs: &Value) -> Error {
    Error::Eval(EvalError::TypeMismatch(format!(
        "{} requires boolean operands, got {} and {}",
        op,
        lhs.type_name(),
        rhs.type_name()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bql::engine::kv::KVEngine;
    use crate::bql::engine::Engine;
    use crate::bql::executor::ResultSet;
    use crate::error::{Error, EvalError, Result};
    use crate::storage::memory::MemoryEngine;

    #[test]
    fn test_value_equality() -> Result<()> {
        assert!(values_equal(&Value::None, &Value::None)?);
        assert!(!values_equal(&Value::None, &Value::Integer(1))?);
        assert!(!values_equal(&Value::Text("a".to_string()), &Value::None)?);
        assert!(values_equal(&Value::Integer(1), &Value::Float(1.0))?);
        assert!(!values_equal(&Value::Integer(1), &Value::Float(1.5))?);
        assert!(values_equal(
            &Value::Text("a".to_string()),
            &Value::Text("a".to_string())
        )?);
        assert!(values_equal(&Value::Boolean(true), &Value::Boolean(true))?);
        assert!(values_equal(&Value::Integer(1), &Value::Text("1".to_string())).is_err());
        Ok(())
    }

    #[test]
    fn test_value_comparison() -> Result<()> {
        assert_eq!(
            compare_values(&Value::Integer(2), &Value::Integer(1))?,
            std::cmp::Ordering::Greater
        );
        assert_eq!(
            compare_values(&Value::Integer(1), &Value::Float(1.5))?,
            std::cmp::Ordering::Less
        );
        assert_eq!(
            compare_values(
                &Value::Text("abc".to_string()),
                &Value::Text("abd".to_string())
            )?,
            std::cmp::Ordering::Less
        );
        // None 和跨类型都不可比较
        assert!(compare_values(&Value::None, &Value::Integer(1)).is_err());
        assert!(compare_values(&Value::Integer(1), &Value::Text("1".to_string())).is_err());
        Ok(())
    }

    #[test]
    fn test_arithmetic() -> Result<()> {
        assert_eq!(
            add_values(Value::Integer(2), Value::Integer(3))?,
            Value::Integer(5)
        );
        assert_eq!(
            add_values(Value::Integer(2), Value::Float(0.5))?,
            Value::Float(2.5)
        );
        assert_eq!(
            add_values(Value::Text("ab".to_string()), Value::Text("cd".to_string()))?,
            Value::Text("abcd".to_string())
        );
        assert_eq!(
            add_values(Value::Integer(i64::MAX), Value::Integer(1)),
            Err(Error::Eval(EvalError::Overflow))
        );

        // 整数除法向零截断
        assert_eq!(
            divide_values(Value::Integer(7), Value::Integer(2))?,
            Value::Integer(3)
        );
        assert_eq!(
            divide_values(Value::Integer(7), Value::Integer(0)),
            Err(Error::Eval(EvalError::DivisionByZero))
        );
        assert_eq!(
            divide_values(Value::Float(1.0), Value::Float(0.0)),
            Err(Error::Eval(EvalError::DivisionByZero))
        );
        assert_eq!(
            remainder_values(Value::Integer(7), Value::Integer(2))?,
            Value::Integer(1)
        );

        assert_eq!(
            exponentiate_values(Value::Integer(2), Value::Integer(10))?,
            Value::Integer(1024)
        );
        assert_eq!(
            exponentiate_values(Value::Integer(2), Value::Integer(-1))?,
            Value::Float(0.5)
        );
        assert_eq!(
            exponentiate_values(Value::Integer(i64::MAX), Value::Integer(2)),
            Err(Error::Eval(EvalError::Overflow))
        );
        Ok(())
    }

    #[test]
    fn test_filter_expression_semantics() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;
        session.execute("create database shop")?;
        session.execute("create table nums [n: number]")?;
        session.execute("put [2] in nums")?;
        session.execute("put [3] in nums")?;

        assert_eq!(
            session.execute("get n from nums where n = 2 or n = 3")?,
            ResultSet::Scan {
                columns: vec!["n".to_string()],
                rows: vec![vec![Value::Integer(2)], vec![Value::Integer(3)]],
            }
        );
        assert_eq!(
            session.execute("get n from nums where n + 1 = 3")?,
            ResultSet::Scan {
                columns: vec!["n".to_string()],
                rows: vec![vec![Value::Integer(2)]],
            }
        );
        assert_eq!(
            session.execute("get n from nums where n ** 2 = 9")?,
            ResultSet::Scan {
                columns: vec!["n".to_string()],
                rows: vec![vec![Value::Integer(3)]],
            }
        );

        // none 只等于 none，所以这两个过滤器一个全要一个全不要
        assert_eq!(
            session.execute("get n from nums where none = none")?,
            ResultSet::Scan {
                columns: vec!["n".to_string()],
                rows: vec![vec![Value::Integer(2)], vec![Value::Integer(3)]],
            }
        );
        assert_eq!(
            session.execute("get n from nums where n = none")?,
            ResultSet::Scan {
                columns: vec!["n".to_string()],
                rows: vec![],
            }
        );

        assert_eq!(
            session.execute("get n from nums where n / 0 = 1"),
            Err(Error::Eval(EvalError::DivisionByZero))
        );
        // 没有布尔字面量，! 的操作数在这套类型里永远不是布尔值
        assert_eq!(
            session.execute("get n from nums where !n"),
            Err(Error::Eval(EvalError::TypeMismatch(
                "! requires a boolean operand, got number".to_string()
            )))
        );
        Ok(())
    }

    #[test]
    fn test_subquery_as_scalar() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;
        session.execute("create database shop")?;
        session.execute("create table items [name: text, price: number]")?;
        session.execute("put [\"apple\", 3] in items")?;
        session.execute("put [\"pear\", 5] in items")?;

        assert_eq!(
            session.execute(
                "get name from items where price = (get price from items where name = \"pear\")"
            )?,
            ResultSet::Scan {
                columns: vec!["name".to_string()],
                rows: vec![vec![Value::Text("pear".to_string())]],
            }
        );

        // 多行或多列的子查询不能当标量用
        assert_eq!(
            session.execute("get name from items where price = (get price from items)"),
            Err(Error::Eval(EvalError::SubqueryCardinality {
                rows: 2,
                columns: 1
            }))
        );
        assert_eq!(
            session.execute(
                "get name from items where price = (get name, price from items where name = \"pear\")"
            ),
            Err(Error::Eval(EvalError::SubqueryCardinality {
                rows: 1,
                columns: 2
            }))
        );
        Ok(())
    }

    #[test]
    fn test_subquery_depth_limit() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;
        session.execute("create database shop")?;
        session.execute("create table nums [n: number]")?;
        session.execute("put [1] in nums")?;

        let nest = |layers: usize| {
            let mut filter = "1".to_string();
            for _ in 0..layers {
                filter = format!("(get n from nums where n = {})", filter);
            }
            format!("get n from nums where n = {}", filter)
        };

        // 刚好在上限之内
        assert_eq!(
            session.execute(&nest(MAX_SUBQUERY_DEPTH))?,
            ResultSet::Scan {
                columns: vec!["n".to_string()],
                rows: vec![vec![Value::Integer(1)]],
            }
        );
        // 超过上限
        assert_eq!(
            session.execute(&nest(MAX_SUBQUERY_DEPTH + 1)),
            Err(Error::Eval(EvalError::SubqueryTooDeep))
        );
        Ok(())
    }
}
