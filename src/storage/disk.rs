use std::collections::{BTreeMap, btree_map};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::ops::RangeBounds;
use std::path::PathBuf;

use crate::error::Result;
use crate::storage::engine::{Engine, EngineIterator};

/// key -> (value 在日志中的偏移, value 长度)
type KeyDir = BTreeMap<Vec<u8>, (u64, u32)>;

const LOG_HEADER_SIZE: u32 = 8;

/// 磁盘存储引擎，所有写入都追加到一个日志文件末尾
/// 内存中的 keydir 记录每个 key 最新 value 的位置，启动时重放日志重建
// TODO: 启动时重写存活条目到新文件，回收被覆盖和被删除的空间
pub struct DiskEngine {
    keydir: KeyDir,
    log: Log,
}

impl DiskEngine {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut log = Log::new(path)?;
        let keydir = log.build_keydir()?;
        Ok(Self { keydir, log })
    }
}

impl Engine for DiskEngine {
    type EngineIterator<'a> = DiskEngineIterator<'a>;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let (offset, size) = self.log.write_entry(&key, Some(value.as_slice()))?;
        // value 在条目的末尾
        let value_offset = offset + size as u64 - value.len() as u64;
        self.keydir.insert(key, (value_offset, value.len() as u32));
        Ok(())
    }

    fn get(&mut self, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
        match self.keydir.get(&key) {
            Some((offset, len)) => {
                let value = self.log.read_value(*offset, *len)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        if self.keydir.contains_key(&key) {
            self.log.write_entry(&key, None)?;
            self.keydir.remove(&key);
        }
        Ok(())
    }

    fn scan(&mut self, range: impl RangeBounds<Vec<u8>>) -> Self::EngineIterator<'_> {
        DiskEngineIterator {
            inner: self.keydir.range(range),
            log: &mut self.log,
        }
    }
}

/// 磁盘引擎迭代器，顺着 keydir 走，value 按需从日志读出
pub struct DiskEngineIterator<'a> {
    inner: btree_map::Range<'a, Vec<u8>, (u64, u32)>,
    log: &'a mut Log,
}

impl<'a> DiskEngineIterator<'a> {
    fn map(&mut self, item: (&Vec<u8>, &(u64, u32))) -> <Self as Iterator>::Item {
        let (key, (offset, len)) = item;
        let value = self.log.read_value(*offset, *len)?;
        Ok((key.clone(), value))
    }
}

impl<'a> Iterator for DiskEngineIterator<'a> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|item| self.map(item))
    }
}

impl<'a> DoubleEndedIterator for DiskEngineIterator<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|item| self.map(item))
    }
}

impl<'a> EngineIterator for DiskEngineIterator<'a> {}

/// 追加写日志文件
///
/// 条目格式：
/// +----------------+------------------+----------+------------+
/// | key 长度 u32 BE | value 长度 i32 BE | key 原始 | value 原始 |
/// +----------------+------------------+----------+------------+
/// value 长度为 -1 表示删除标记，没有 value 部分
struct Log {
    file: File,
}

impl Log {
    fn new(path: PathBuf) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        Ok(Self { file })
    }

    /// 重放整个日志重建 keydir
    /// 尾部写了一半的条目当作崩溃残留，直接截断
    fn build_keydir(&mut self) -> Result<KeyDir> {
        let mut keydir = KeyDir::new();
        let file_size = self.file.metadata()?.len();
        let mut reader = BufReader::new(&mut self.file);
        reader.seek(SeekFrom::Start(0))?;

        let mut offset = 0;
        let mut truncate_to = None;
        while offset < file_size {
            match Self::read_entry(&mut reader, offset) {
                Ok((key, value_offset, Some(value_len))) => {
                    keydir.insert(key, (value_offset, value_len));
                    offset = value_offset + value_len as u64;
                }
                Ok((key, value_offset, None)) => {
                    keydir.remove(&key);
                    offset = value_offset;
                }
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    truncate_to = Some(offset);
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        drop(reader);
        if let Some(valid_len) = truncate_to {
            self.file.set_len(valid_len)?;
        }
        Ok(keydir)
    }

    /// 读出一个条目，返回 key、value 偏移和 value 长度，删除标记没有长度
    /// 调用方保证 reader 已经位于 offset 处
    fn read_entry(
        reader: &mut BufReader<&mut File>,
        offset: u64,
    ) -> std::io::Result<(Vec<u8>, u64, Option<u32>)> {
        let mut header = [0u8; 4];
        reader.read_exact(&mut header)?;
        let key_len = u32::from_be_bytes(header);
        reader.read_exact(&mut header)?;
        let value_len = i32::from_be_bytes(header);

        let mut key = vec![0; key_len as usize];
        reader.read_exact(&mut key)?;

        let value_offset = offset + LOG_HEADER_SIZE as u64 + key_len as u64;
        if value_len < 0 {
            return Ok((key, value_offset, None));
        }
        // 把 value 读完整，写了一半的条目在这里暴露出来
        let mut value = vec![0; value_len as usize];
        reader.read_exact(&mut value)?;
        Ok((key, value_offset, Some(value_len as u32)))
    }

    /// 追加一个条目，返回条目起始偏移和总长度
    /// value 为 None 时写入删除标记
    fn write_entry(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<(u64, u32)> {
        let offset = self.file.seek(SeekFrom::End(0))?;
        let key_len = key.len() as u32;
        let value_len = value.map_or(0, |v| v.len() as u32);
        let total_len = LOG_HEADER_SIZE + key_len + value_len;

        let mut writer = BufWriter::with_capacity(total_len as usize, &mut self.file);
        writer.write_all(&key_len.to_be_bytes())?;
        writer.write_all(&value.map_or(-1, |v| v.len() as i32).to_be_bytes())?;
        writer.write_all(key)?;
        if let Some(value) = value {
            writer.write_all(value)?;
        }
        writer.flush()?;

        Ok((offset, total_len))
    }

    fn read_value(&mut self, offset: u64, value_len: u32) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut value = vec![0; value_len as usize];
        self.file.read_exact(&mut value)?;
        Ok(value)
    }
}
