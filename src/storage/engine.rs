use std::ops::{Bound, RangeBounds};

use crate::error::Result;

/// 字节级存储引擎接口，目录和行存储都建立在它之上
/// 持久化策略由具体实现决定
pub trait Engine {
    type EngineIterator<'a>: EngineIterator
    where
        Self: 'a;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()>;

    fn get(&mut self, key: Vec<u8>) -> Result<Option<Vec<u8>>>;

    /// 删除 key 对应的数据，key 不存在时忽略
    fn delete(&mut self, key: Vec<u8>) -> Result<()>;

    /// 按 key 顺序扫描一段范围
    fn scan(&mut self, range: impl RangeBounds<Vec<u8>>) -> Self::EngineIterator<'_>;

    /// 扫描所有以 prefix 开头的 key
    fn scan_prefix(&mut self, prefix: Vec<u8>) -> Self::EngineIterator<'_> {
        let start = Bound::Included(prefix.clone());
        // 终点是前缀最后一个字节加一，末尾的 0xff 无法进位，先弹出
        let mut bound = prefix;
        while bound.last() == Some(&0xff) {
            bound.pop();
        }
        let end = match bound.last_mut() {
            Some(last) => {
                *last += 1;
                Bound::Excluded(bound)
            }
            None => Bound::Unbounded,
        };
        self.scan((start, end))
    }
}

/// 存储引擎迭代器，支持双向扫描
pub trait EngineIterator: DoubleEndedIterator<Item = Result<(Vec<u8>, Vec<u8>)>> {}
