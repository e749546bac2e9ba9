// crates/nh_io/src/checkpoint.rs

//! 检查点保存/恢复
//!
//! 扁平键值布局：`<模块名>:<字段名>` → 长度为 `n_faces` 的 f64 数组。
//! 模块只序列化无法从变量存储重算的面状态字段。
//!
//! # 文件格式 (v1)
//!
//! ```text
//! [魔数: 4 bytes] "NHCK"
//! [版本: u32]
//! [模拟时间: i64 unix 秒]
//! [步数: u64]
//! [面数: u64]
//! [条目数: u64]
//! 每条目:
//!     [键长: u32][键: utf8][值: n_faces * f64]
//! [CRC32: u32]（覆盖魔数之后、CRC 之前的全部字节）
//! ```
//!
//! 加载时，活动模块声明的每个键都必须存在，否则以
//! `checkpoint-mismatch` 失败。

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// 检查点文件格式版本
const CHECKPOINT_VERSION: u32 = 1;

/// 检查点魔数
const CHECKPOINT_MAGIC: &[u8; 4] = b"NHCK";

/// 检查点错误
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// IO 错误
    #[error("checkpoint io: {0}")]
    Io(#[from] std::io::Error),

    /// 非检查点文件或已损坏
    #[error("checkpoint format: {0}")]
    Format(String),

    /// 版本不兼容
    #[error("checkpoint version {file} not supported (current {current})")]
    Version {
        /// 文件中的版本
        file: u32,
        /// 当前支持版本
        current: u32,
    },

    /// 面数与活动网格不一致
    #[error("checkpoint face count {found} does not match mesh ({expected})")]
    FaceCountMismatch {
        /// 网格面数
        expected: usize,
        /// 文件面数
        found: usize,
    },

    /// 活动模块声明的键缺失
    #[error("checkpoint mismatch: key '{0}' not present")]
    MissingKey(String),

    /// 字段长度与面数不一致
    #[error("field '{key}' has {found} values, expected {expected}")]
    FieldLength {
        /// 键
        key: String,
        /// 期望长度
        expected: usize,
        /// 实际长度
        found: usize,
    },

    /// 校验和错误
    #[error("checksum mismatch: expected {expected:08x}, found {found:08x}")]
    Checksum {
        /// 文件记录的校验和
        expected: u32,
        /// 计算得到的校验和
        found: u32,
    },
}

/// 检查点操作结果
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// 扁平键值检查点
///
/// 保存时由各模块通过 [`CheckpointStore::put`] 填充；
/// 加载时通过 [`CheckpointStore::get`] 取回。
#[derive(Debug)]
pub struct CheckpointStore {
    /// 检查点对应的模拟时间
    pub time: DateTime<Utc>,
    /// 已完成的时间步数
    pub step: u64,
    n_faces: usize,
    fields: IndexMap<String, Vec<f64>>,
}

impl CheckpointStore {
    /// 创建空检查点
    #[must_use]
    pub fn new(time: DateTime<Utc>, step: u64, n_faces: usize) -> Self {
        Self {
            time,
            step,
            n_faces,
            fields: IndexMap::new(),
        }
    }

    /// 面数
    #[must_use]
    pub fn n_faces(&self) -> usize {
        self.n_faces
    }

    /// 写入一个字段
    ///
    /// 键约定为 `<模块名>:<字段名>`；长度必须等于面数。
    pub fn put(&mut self, key: impl Into<String>, values: Vec<f64>) -> CheckpointResult<()> {
        let key = key.into();
        if values.len() != self.n_faces {
            return Err(CheckpointError::FieldLength {
                key,
                expected: self.n_faces,
                found: values.len(),
            });
        }
        self.fields.insert(key, values);
        Ok(())
    }

    /// 读取一个字段
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.fields.get(key).map(Vec::as_slice)
    }

    /// 读取一个必需字段；缺失即 `checkpoint-mismatch`
    pub fn require(&self, key: &str) -> CheckpointResult<&[f64]> {
        self.get(key)
            .ok_or_else(|| CheckpointError::MissingKey(key.to_string()))
    }

    /// 全部键（写入顺序）
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// 保存到文件
    pub fn save(&self, path: &Path) -> CheckpointResult<()> {
        let mut body: Vec<u8> = Vec::new();
        body.extend_from_slice(&CHECKPOINT_VERSION.to_le_bytes());
        body.extend_from_slice(&self.time.timestamp().to_le_bytes());
        body.extend_from_slice(&self.step.to_le_bytes());
        body.extend_from_slice(&(self.n_faces as u64).to_le_bytes());
        body.extend_from_slice(&(self.fields.len() as u64).to_le_bytes());
        for (key, values) in &self.fields {
            body.extend_from_slice(&(key.len() as u32).to_le_bytes());
            body.extend_from_slice(key.as_bytes());
            for v in values {
                body.extend_from_slice(&v.to_le_bytes());
            }
        }
        let crc = crc32(&body);

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(CHECKPOINT_MAGIC)?;
        writer.write_all(&body)?;
        writer.write_all(&crc.to_le_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// 从文件加载
    pub fn load(path: &Path) -> CheckpointResult<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != CHECKPOINT_MAGIC {
            return Err(CheckpointError::Format("bad magic".to_string()));
        }

        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        if raw.len() < 4 {
            return Err(CheckpointError::Format("truncated file".to_string()));
        }
        let (body, crc_bytes) = raw.split_at(raw.len() - 4);
        let expected = u32::from_le_bytes(crc_bytes.try_into().expect("4 bytes"));
        let found = crc32(body);
        if expected != found {
            return Err(CheckpointError::Checksum { expected, found });
        }

        let mut cursor = Cursor { data: body, pos: 0 };
        let version = cursor.read_u32()?;
        if version != CHECKPOINT_VERSION {
            return Err(CheckpointError::Version {
                file: version,
                current: CHECKPOINT_VERSION,
            });
        }
        let timestamp = cursor.read_i64()?;
        let step = cursor.read_u64()?;
        let n_faces = cursor.read_u64()? as usize;
        let n_entries = cursor.read_u64()? as usize;

        let time = DateTime::<Utc>::from_timestamp(timestamp, 0)
            .ok_or_else(|| CheckpointError::Format("bad timestamp".to_string()))?;

        let mut fields = IndexMap::with_capacity(n_entries);
        for _ in 0..n_entries {
            let key_len = cursor.read_u32()? as usize;
            let key_bytes = cursor.read_bytes(key_len)?;
            let key = String::from_utf8(key_bytes.to_vec())
                .map_err(|_| CheckpointError::Format("non-utf8 key".to_string()))?;
            let mut values = Vec::with_capacity(n_faces);
            for _ in 0..n_faces {
                values.push(cursor.read_f64()?);
            }
            fields.insert(key, values);
        }

        Ok(Self {
            time,
            step,
            n_faces,
            fields,
        })
    }

    /// 验证面数与活动网格一致
    pub fn check_faces(&self, expected: usize) -> CheckpointResult<()> {
        if self.n_faces != expected {
            return Err(CheckpointError::FaceCountMismatch {
                expected,
                found: self.n_faces,
            });
        }
        Ok(())
    }
}

/// 顺序读取游标
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn read_bytes(&mut self, n: usize) -> CheckpointResult<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(CheckpointError::Format("unexpected end of file".to_string()));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn read_u32(&mut self) -> CheckpointResult<u32> {
        Ok(u32::from_le_bytes(self.read_bytes(4)?.try_into().unwrap()))
    }

    fn read_u64(&mut self) -> CheckpointResult<u64> {
        Ok(u64::from_le_bytes(self.read_bytes(8)?.try_into().unwrap()))
    }

    fn read_i64(&mut self) -> CheckpointResult<i64> {
        Ok(i64::from_le_bytes(self.read_bytes(8)?.try_into().unwrap()))
    }

    fn read_f64(&mut self) -> CheckpointResult<f64> {
        Ok(f64::from_le_bytes(self.read_bytes(8)?.try_into().unwrap()))
    }
}

/// CRC32 (IEEE 802.3)
fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xffff_ffffu32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xedb8_8320 & mask);
        }
    }
    !crc
}
