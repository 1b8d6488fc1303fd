use std::io::{self, Write};
use std::path::PathBuf;

use bqldb::bql::engine::kv::KVEngine;
use bqldb::bql::engine::Engine;
use bqldb::bql::executor::ResultSet;
use bqldb::error::Result;
use bqldb::storage::disk::DiskEngine;
use bqldb::storage::memory::MemoryEngine;

fn main() -> Result<()> {
    // 带路径参数就落盘，不带就用纯内存引擎
    match std::env::args().nth(1) {
        Some(path) => repl(KVEngine::new(DiskEngine::new(PathBuf::from(path))?)),
        None => repl(KVEngine::new(MemoryEngine::new())),
    }
}

fn repl<E: Engine + 'static>(engine: E) -> Result<()> {
    let mut session = engine.session()?;
    loop {
        print!("bql> ");
        io::stdout().flush()?;

        let mut input = String::new();
        // EOF 也按退出处理
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input == "q" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        match session.execute(input) {
            Ok(result) => print_result(result),
            Err(err) => eprintln!("{}", err),
        }
    }
    Ok(())
}

fn print_result(result: ResultSet) {
    match result {
        ResultSet::CreateDatabase { name } => println!("database {} created", name),
        ResultSet::DropDatabase { name } => println!("database {} dropped", name),
        ResultSet::CreateTable { name } => println!("table {} created", name),
        ResultSet::Insert { count } => println!("{} rows put", count),
        ResultSet::Update { count } => println!("{} rows updated", count),
        ResultSet::Delete { count } => println!("{} deleted", count),
        ResultSet::Scan { columns, rows } => {
            let mut table = prettytable::Table::new();
            table.add_row(prettytable::Row::new(
                columns
                    .iter()
                    .map(|c| prettytable::Cell::new(c))
                    .collect(),
            ));
            for row in rows {
                table.add_row(prettytable::Row::new(
                    row.iter()
                        .map(|v| prettytable::Cell::new(&v.to_string()))
                        .collect(),
                ));
            }
            table.printstd();
        }
    }
}
