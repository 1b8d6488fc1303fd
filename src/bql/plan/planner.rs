use crate::bql::parser::ast;
use crate::bql::plan::{Node, Plan};
use crate::bql::schema;

/// 把语法树降成执行计划，语句和节点一一对应，没有重写规则
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self {}
    }

    pub fn build(&mut self, stmt: ast::Statement) -> Plan {
        Plan(self.build_statement(stmt))
    }

    fn build_statement(&self, stmt: ast::Statement) -> Node {
        match stmt {
            ast::Statement::CreateDatabase { name } => Node::CreateDatabase { name },
            ast::Statement::DropDatabase { name } => Node::DropDatabase { name },
            ast::Statement::CreateTable { name, columns } => Node::CreateTable {
                schema: schema::Table {
                    name,
                    columns: columns
                        .into_iter()
                        .map(|c| schema::Column {
                            name: c.name,
                            datatype: c.datatype,
                        })
                        .collect(),
                },
            },
            ast::Statement::Put { values, table_name } => Node::Insert { table_name, values },
            ast::Statement::Get {
                columns,
                table_name,
                filter,
            } => {
                let scan = Node::Scan { table_name, filter };
                // `get *` 不加投影，直接透传扫描结果
                match columns {
                    Some(columns) => Node::Projection {
                        source: Box::new(scan),
                        columns,
                    },
                    None => scan,
                }
            }
            ast::Statement::Update {
                table_name,
                columns,
                filter,
            } => Node::Update {
                table_name,
                columns,
                filter,
            },
            ast::Statement::Delete {
                columns,
                table_name,
            } => Node::Delete {
                table_name,
                columns,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bql::parser::ast::{Consts, Expression, Operation};
    use crate::bql::parser::Parser;
    use crate::bql::schema::{Column, Table};
    use crate::bql::types::DataType;
    use crate::error::Result;

    fn build(text: &str) -> Result<Node> {
        Ok(Plan::build(Parser::new(text).parse()?).0)
    }

    #[test]
    fn test_build_create_table() -> Result<()> {
        assert_eq!(
            build("create table customers [name: text, id: number]")?,
            Node::CreateTable {
                schema: Table {
                    name: "customers".to_string(),
                    columns: vec![
                        Column {
                            name: "name".to_string(),
                            datatype: DataType::Text,
                        },
                        Column {
                            name: "id".to_string(),
                            datatype: DataType::Number,
                        },
                    ],
                },
            }
        );
        Ok(())
    }

    #[test]
    fn test_build_get() -> Result<()> {
        // 带列清单的 get 在扫描外面包一层投影
        assert_eq!(
            build("get id, name from customers")?,
            Node::Projection {
                source: Box::new(Node::Scan {
                    table_name: "customers".to_string(),
                    filter: None,
                }),
                columns: vec!["id".to_string(), "name".to_string()],
            }
        );
        assert_eq!(
            build("get * from customers")?,
            Node::Scan {
                table_name: "customers".to_string(),
                filter: None,
            }
        );
        Ok(())
    }

    #[test]
    fn test_build_update() -> Result<()> {
        assert_eq!(
            build("update [id: 7] where id = 5 in customers")?,
            Node::Update {
                table_name: "customers".to_string(),
                columns: vec![("id".to_string(), Expression::from(Consts::Integer(7)))],
                filter: Some(Expression::Operation(Operation::Equal(
                    Box::new(Expression::Field("id".to_string())),
                    Box::new(Expression::from(Consts::Integer(5))),
                ))),
            }
        );
        Ok(())
    }

    #[test]
    fn test_build_delete_forms() -> Result<()> {
        assert_eq!(
            build("delete [age, name] from customers")?,
            Node::Delete {
                table_name: Some("customers".to_string()),
                columns: vec!["age".to_string(), "name".to_string()],
            }
        );
        assert_eq!(
            build("delete [t1, t2]")?,
            Node::Delete {
                table_name: None,
                columns: vec!["t1".to_string(), "t2".to_string()],
            }
        );
        // delete table t 和 delete [t] 等价
        assert_eq!(
            build("delete table t1")?,
            Node::Delete {
                table_name: None,
                columns: vec!["t1".to_string()],
            }
        );
        assert_eq!(
            build("delete database shop")?,
            Node::DropDatabase {
                name: "shop".to_string(),
            }
        );
        Ok(())
    }
}
