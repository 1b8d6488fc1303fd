use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::bql::schema::Table;
use crate::bql::types::Row;
use crate::error::{CatalogError, Error, Result, StorageError};
use crate::storage::engine::Engine as StorageEngine;
use crate::storage::keycode::{deserialize_key, serialize_key};

use super::{Engine, Transaction};

/// 基于 KV 存储的查询引擎，目录和行数据都落在同一个字节存储里
pub struct KVEngine<E: StorageEngine> {
    engine: Arc<Mutex<E>>,
}

impl<E: StorageEngine> Clone for KVEngine<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<E: StorageEngine> KVEngine<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
        }
    }
}

impl<E: StorageEngine> Engine for KVEngine<E> {
    type Transaction = KVTransaction<E>;

    fn begin(&self) -> Result<Self::Transaction> {
        Ok(KVTransaction {
            engine: self.engine.clone(),
        })
    }
}

/// KV 事务，每个操作内部短暂持有引擎锁
/// 语句之间没有跨语句事务，commit 和 rollback 都是空操作，
/// 语句原子性靠执行器先校验后改动来保证
pub struct KVTransaction<E: StorageEngine> {
    engine: Arc<Mutex<E>>,
}

impl<E: StorageEngine> KVTransaction<E> {
    fn read_table(engine: &mut E, db: &str, table_name: &str) -> Result<Option<Table>> {
        let key = Key::Table(db.to_string(), table_name.to_string()).encode()?;
        Ok(engine
            .get(key)?
            .map(|v| bincode::deserialize(&v))
            .transpose()?)
    }

    /// 给表分配下一个 row id，从 1 开始单调递增，删除不回收
    fn next_row_id(engine: &mut E, db: &str, table_name: &str) -> Result<u64> {
        let key = Key::NextRowId(db.to_string(), table_name.to_string()).encode()?;
        let next = match engine.get(key.clone())? {
            Some(value) => bincode::deserialize::<u64>(&value)?,
            None => 1,
        };
        engine.set(key, bincode::serialize(&(next + 1))?)?;
        Ok(next)
    }

    /// 删掉表结构、行数据和 row id 计数器
    /// 先把 key 收集完，扫描过程中不碰存储
    fn remove_table(engine: &mut E, db: &str, table_name: &str) -> Result<()> {
        let prefix = KeyPrefix::Row(db.to_string(), table_name.to_string()).encode()?;
        let mut delete_keys = Vec::new();
        let mut iter = engine.scan_prefix(prefix);
        while let Some((key, _)) = iter.next().transpose()? {
            delete_keys.push(key);
        }
        drop(iter);

        delete_keys.push(Key::NextRowId(db.to_string(), table_name.to_string()).encode()?);
        delete_keys.push(Key::Table(db.to_string(), table_name.to_string()).encode()?);
        for key in delete_keys {
            engine.delete(key)?;
        }
        Ok(())
    }
}

impl<E: StorageEngine> Transaction for KVTransaction<E> {
    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        Ok(())
    }

    fn create_database(&mut self, name: String) -> Result<()> {
        let mut engine = self.engine.lock()?;
        let key = Key::Database(name.clone()).encode()?;
        if engine.get(key.clone())?.is_some() {
            return Err(Error::Catalog(CatalogError::DatabaseExists(name)));
        }
        engine.set(key, bincode::serialize(&name)?)?;
        // 建库后自动切换成当前库
        engine.set(Key::CurrentDatabase.encode()?, bincode::serialize(&name)?)?;
        Ok(())
    }

    fn drop_database(&mut self, name: String) -> Result<()> {
        let mut engine = self.engine.lock()?;
        let db_key = Key::Database(name.clone()).encode()?;
        if engine.get(db_key.clone())?.is_none() {
            return Err(Error::Catalog(CatalogError::NoSuchDatabase(name)));
        }

        // 库里每张表连同行数据一起删
        let mut table_names = Vec::new();
        let mut iter = engine.scan_prefix(KeyPrefix::Table(name.clone()).encode()?);
        while let Some((key, _)) = iter.next().transpose()? {
            match Key::decode(&key)? {
                Key::Table(_, table_name) => table_names.push(table_name),
                key => {
                    return Err(Error::Internal(format!(
                        "unexpected key {:?} in table scan",
                        key
                    )));
                }
            }
        }
        drop(iter);
        for table_name in table_names {
            Self::remove_table(&mut engine, &name, &table_name)?;
        }
        engine.delete(db_key)?;

        // 被删的是当前库时，清掉当前库指针
        let current_key = Key::CurrentDatabase.encode()?;
        if let Some(value) = engine.get(current_key.clone())? {
            let current: String = bincode::deserialize(&value)?;
            if current == name {
                engine.delete(current_key)?;
            }
        }
        Ok(())
    }

    fn current_database(&self) -> Result<Option<String>> {
        let mut engine = self.engine.lock()?;
        Ok(engine
            .get(Key::CurrentDatabase.encode()?)?
            .map(|v| bincode::deserialize(&v))
            .transpose()?)
    }

    fn create_table(&mut self, table: Table) -> Result<()> {
        let db = self.must_current_database()?;
        let mut engine = self.engine.lock()?;
        if Self::read_table(&mut engine, &db, &table.name)?.is_some() {
            return Err(Error::Catalog(CatalogError::TableExists(table.name)));
        }
        table.validate()?;

        let key = Key::Table(db, table.name.clone()).encode()?;
        engine.set(key, bincode::serialize(&table)?)?;
        Ok(())
    }

    fn drop_table(&mut self, table_name: String) -> Result<()> {
        let db = self.must_current_database()?;
        let mut engine = self.engine.lock()?;
        if Self::read_table(&mut engine, &db, &table_name)?.is_none() {
            return Err(Error::Catalog(CatalogError::NoSuchTable(table_name)));
        }
        Self::remove_table(&mut engine, &db, &table_name)
    }

    fn drop_columns(&mut self, table_name: String, columns: Vec<String>) -> Result<()> {
        let db = self.must_current_database()?;
        let mut engine = self.engine.lock()?;
        let mut table = match Self::read_table(&mut engine, &db, &table_name)? {
            Some(table) => table,
            None => return Err(Error::Catalog(CatalogError::NoSuchTable(table_name))),
        };

        // 任何一个列名不存在，整条语句失败，什么都不改
        let mut indexes = Vec::with_capacity(columns.len());
        for name in &columns {
            match table.column_index(name) {
                Some(i) => indexes.push(i),
                None => return Err(Error::Storage(StorageError::NoSuchColumn(name.clone()))),
            }
        }
        // 从大到小删，前面的下标不会移位
        indexes.sort_unstable_by(|a, b| b.cmp(a));
        indexes.dedup();

        let prefix = KeyPrefix::Row(db.clone(), table_name.clone()).encode()?;
        let mut updates = Vec::new();
        let mut iter = engine.scan_prefix(prefix);
        while let Some((key, value)) = iter.next().transpose()? {
            let mut row: Row = bincode::deserialize(&value)?;
            for &i in &indexes {
                row.remove(i);
            }
            updates.push((key, row));
        }
        drop(iter);

        for &i in &indexes {
            table.columns.remove(i);
        }
        for (key, row) in updates {
            engine.set(key, bincode::serialize(&row)?)?;
        }
        let key = Key::Table(db, table_name).encode()?;
        engine.set(key, bincode::serialize(&table)?)?;
        Ok(())
    }

    fn get_table(&self, table_name: String) -> Result<Option<Table>> {
        let db = self.must_current_database()?;
        let mut engine = self.engine.lock()?;
        Self::read_table(&mut engine, &db, &table_name)
    }

    fn create_row(&mut self, table_name: String, row: Row) -> Result<()> {
        let db = self.must_current_database()?;
        let mut engine = self.engine.lock()?;
        let id = Self::next_row_id(&mut engine, &db, &table_name)?;
        let key = Key::Row(db, table_name, id).encode()?;
        engine.set(key, bincode::serialize(&row)?)?;
        Ok(())
    }

    fn update_row(&mut self, table_name: String, id: u64, row: Row) -> Result<()> {
        let db = self.must_current_database()?;
        let mut engine = self.engine.lock()?;
        let key = Key::Row(db, table_name, id).encode()?;
        engine.set(key, bincode::serialize(&row)?)?;
        Ok(())
    }

    fn delete_row(&mut self, table_name: String, id: u64) -> Result<()> {
        let db = self.must_current_database()?;
        let mut engine = self.engine.lock()?;
        let key = Key::Row(db, table_name, id).encode()?;
        engine.delete(key)?;
        Ok(())
    }

    fn scan_table(&self, table_name: String) -> Result<Vec<(u64, Row)>> {
        let db = self.must_current_database()?;
        let mut engine = self.engine.lock()?;
        let prefix = KeyPrefix::Row(db, table_name).encode()?;
        let mut rows = Vec::new();
        let mut iter = engine.scan_prefix(prefix);
        while let Some((key, value)) = iter.next().transpose()? {
            let id = match Key::decode(&key)? {
                Key::Row(_, _, id) => id,
                key => {
                    return Err(Error::Internal(format!(
                        "unexpected key {:?} in row scan",
                        key
                    )));
                }
            };
            rows.push((id, bincode::deserialize(&value)?));
        }
        Ok(rows)
    }
}

/// 存储 key 布局，order-preserving 编码
/// 前两个变体的下标必须和 KeyPrefix 对齐
#[derive(Debug, Serialize, Deserialize)]
enum Key {
    Table(String, String),
    Row(String, String, u64),
    NextRowId(String, String),
    Database(String),
    CurrentDatabase,
}

impl Key {
    fn encode(self) -> Result<Vec<u8>> {
        serialize_key(&self)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        deserialize_key(bytes)
    }
}

/// 按库或按表扫描时用的 key 前缀
#[derive(Debug, Serialize)]
enum KeyPrefix {
    Table(String),
    Row(String, String),
}

impl KeyPrefix {
    fn encode(self) -> Result<Vec<u8>> {
        serialize_key(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::KVEngine;
    use crate::bql::engine::{Engine, Transaction};
    use crate::bql::executor::ResultSet;
    use crate::bql::types::Value;
    use crate::error::{CatalogError, Error, ExecError, Result};
    use crate::storage::disk::DiskEngine;
    use crate::storage::memory::MemoryEngine;

    #[test]
    fn test_put_then_get_roundtrip() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;

        assert_eq!(
            session.execute("create database shop")?,
            ResultSet::CreateDatabase {
                name: "shop".to_string()
            }
        );
        assert_eq!(
            session.execute("create table customers [name: text, id: number]")?,
            ResultSet::CreateTable {
                name: "customers".to_string()
            }
        );
        assert_eq!(
            session.execute("put [\"james\", 0xA] in customers")?,
            ResultSet::Insert { count: 1 }
        );
        assert_eq!(
            session.execute("get * from customers")?,
            ResultSet::Scan {
                columns: vec!["name".to_string(), "id".to_string()],
                rows: vec![vec![Value::Text("james".to_string()), Value::Integer(10)]],
            }
        );
        Ok(())
    }

    #[test]
    fn test_get_with_filter_and_projection() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;
        session.execute("create database shop")?;
        session.execute("create table customers [name: text, id: number]")?;
        session.execute("put [\"james\", 0xA] in customers")?;

        assert_eq!(
            session.execute("get id from customers where id > 5")?,
            ResultSet::Scan {
                columns: vec!["id".to_string()],
                rows: vec![vec![Value::Integer(10)]],
            }
        );
        assert_eq!(
            session.execute("get id from customers where id > 50")?,
            ResultSet::Scan {
                columns: vec!["id".to_string()],
                rows: vec![],
            }
        );
        Ok(())
    }

    #[test]
    fn test_update_rows() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;
        session.execute("create database shop")?;
        session.execute("create table customers [name: text, id: number]")?;
        session.execute("put [\"james\", 10] in customers")?;

        assert_eq!(
            session.execute("update [id: 20] where name = \"james\" in customers")?,
            ResultSet::Update { count: 1 }
        );
        assert_eq!(
            session.execute("get * from customers")?,
            ResultSet::Scan {
                columns: vec!["name".to_string(), "id".to_string()],
                rows: vec![vec![Value::Text("james".to_string()), Value::Integer(20)]],
            }
        );
        Ok(())
    }

    #[test]
    fn test_database_catalog_errors() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;

        // 没有当前库时建表失败
        assert_eq!(
            session.execute("create table t [a: number]"),
            Err(Error::Catalog(CatalogError::NoCurrentDatabase))
        );

        session.execute("create database shop")?;
        assert_eq!(
            session.execute("create database shop"),
            Err(Error::Catalog(CatalogError::DatabaseExists(
                "shop".to_string()
            )))
        );

        session.execute("create table t [a: number]")?;
        assert_eq!(
            session.execute("create table t [b: number]"),
            Err(Error::Catalog(CatalogError::TableExists("t".to_string())))
        );
        assert_eq!(
            session.execute("get * from missing"),
            Err(Error::Catalog(CatalogError::NoSuchTable(
                "missing".to_string()
            )))
        );
        Ok(())
    }

    #[test]
    fn test_delete_drops_tables() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;
        session.execute("create database shop")?;
        session.execute("create table t1 [a: number]")?;
        session.execute("create table t2 [a: number]")?;
        session.execute("put [1] in t1")?;

        // 不带 from 的 delete 把列表里的名字当作表删掉
        assert_eq!(
            session.execute("delete [t1, t2]")?,
            ResultSet::Delete { count: 2 }
        );
        assert_eq!(
            session.execute("get * from t1"),
            Err(Error::Catalog(CatalogError::NoSuchTable("t1".to_string())))
        );

        // delete table 单数形式
        session.execute("create table t3 [a: number]")?;
        assert_eq!(
            session.execute("delete table t3")?,
            ResultSet::Delete { count: 1 }
        );
        assert_eq!(
            session.execute("get * from t3"),
            Err(Error::Catalog(CatalogError::NoSuchTable("t3".to_string())))
        );

        // 有一个表不存在时整条语句失败，存在的表保持不动
        session.execute("create table t4 [a: number]")?;
        assert_eq!(
            session.execute("delete [t4, ghost]"),
            Err(Error::Catalog(CatalogError::NoSuchTable("ghost".to_string())))
        );
        session.execute("get * from t4")?;
        Ok(())
    }

    #[test]
    fn test_delete_drops_columns() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;
        session.execute("create database shop")?;
        session.execute("create table customers [name: text, id: number, age: number]")?;
        session.execute("put [\"james\", 1, 30] in customers")?;
        session.execute("put [\"jim\", 2, 40] in customers")?;

        assert_eq!(
            session.execute("delete [age] from customers")?,
            ResultSet::Delete { count: 1 }
        );
        assert_eq!(
            session.execute("get * from customers")?,
            ResultSet::Scan {
                columns: vec!["name".to_string(), "id".to_string()],
                rows: vec![
                    vec![Value::Text("james".to_string()), Value::Integer(1)],
                    vec![Value::Text("jim".to_string()), Value::Integer(2)],
                ],
            }
        );

        // 删光所有列之后行还在，只是宽度为零
        assert_eq!(
            session.execute("delete [name, id] from customers")?,
            ResultSet::Delete { count: 2 }
        );
        assert_eq!(
            session.execute("get * from customers")?,
            ResultSet::Scan {
                columns: vec![],
                rows: vec![vec![], vec![]],
            }
        );

        // 被删掉的列从此不可见，按名字读写都会报错
        assert_eq!(
            session.execute("get name from customers"),
            Err(Error::Exec(ExecError::UnknownColumn("name".to_string())))
        );
        assert_eq!(
            session.execute("put [\"james\", 1] in customers"),
            Err(Error::Exec(ExecError::ArityMismatch {
                expected: 0,
                given: 2
            }))
        );
        Ok(())
    }

    #[test]
    fn test_delete_row_removes_only_that_row() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;
        session.execute("create database shop")?;
        session.execute("create table customers [name: text, id: number]")?;
        session.execute("put [\"james\", 1] in customers")?;
        session.execute("put [\"jim\", 2] in customers")?;
        session.execute("put [\"joe\", 3] in customers")?;

        // 按行 id 删掉中间一行，其余行和它们的顺序不受影响
        let mut txn = engine.begin()?;
        let rows = txn.scan_table("customers".to_string())?;
        assert_eq!(rows.len(), 3);
        let (middle_id, middle_row) = &rows[1];
        assert_eq!(middle_row[0], Value::Text("jim".to_string()));
        txn.delete_row("customers".to_string(), *middle_id)?;
        txn.commit()?;

        assert_eq!(
            session.execute("get name from customers")?,
            ResultSet::Scan {
                columns: vec!["name".to_string()],
                rows: vec![
                    vec![Value::Text("james".to_string())],
                    vec![Value::Text("joe".to_string())],
                ],
            }
        );

        // 删除不回收 id，新插入的行排在扫描顺序的最后
        session.execute("put [\"jan\", 4] in customers")?;
        assert_eq!(
            session.execute("get name from customers")?,
            ResultSet::Scan {
                columns: vec!["name".to_string()],
                rows: vec![
                    vec![Value::Text("james".to_string())],
                    vec![Value::Text("joe".to_string())],
                    vec![Value::Text("jan".to_string())],
                ],
            }
        );
        Ok(())
    }

    #[test]
    fn test_drop_database_clears_current() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;
        session.execute("create database shop")?;
        session.execute("create table t [a: number]")?;

        assert_eq!(
            session.execute("delete database shop")?,
            ResultSet::DropDatabase {
                name: "shop".to_string()
            }
        );
        assert_eq!(
            session.execute("create table t [a: number]"),
            Err(Error::Catalog(CatalogError::NoCurrentDatabase))
        );

        // 重建同名库，之前的表已经不在了
        session.execute("create database shop")?;
        assert_eq!(
            session.execute("get * from t"),
            Err(Error::Catalog(CatalogError::NoSuchTable("t".to_string())))
        );
        Ok(())
    }

    #[test]
    fn test_disk_engine_keeps_data_across_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bql.log");

        let engine = KVEngine::new(DiskEngine::new(path.clone())?);
        let mut session = engine.session()?;
        session.execute("create database shop")?;
        session.execute("create table customers [name: text, id: number]")?;
        session.execute("put [\"james\", 10] in customers")?;
        drop(session);
        drop(engine);

        // 重新打开，目录指针和数据都还在
        let engine = KVEngine::new(DiskEngine::new(path)?);
        let mut session = engine.session()?;
        assert_eq!(
            session.execute("get * from customers")?,
            ResultSet::Scan {
                columns: vec!["name".to_string(), "id".to_string()],
                rows: vec![vec![Value::Text("james".to_string()), Value::Integer(10)]],
            }
        );
        Ok(())
    }
}
