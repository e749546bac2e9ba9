// crates/nh_engine/src/store.rs

//! 面变量存储
//!
//! (面, 变量名) → f64 的列式存储。列在调度计划建立时为每个
//! 模块提供的变量创建一次；消费者读取未创建的列是错误：
//! 声明了依赖却读到缺列意味着图解析有漏洞。
//!
//! 存储独占持有全部单元；模块经调度器结构化地串行写入
//! （同一 tick 内每个变量只有一个写者，由图构造保证）。

use indexmap::IndexMap;
use nh_foundation::constants::NODATA;
use nh_foundation::error::{NhError, NhResult};

/// 列句柄
///
/// 调度计划建立后稳定；热路径用它绕过名字查找。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnId(pub(crate) usize);

/// 面变量存储
#[derive(Debug)]
pub struct FaceStore {
    n_faces: usize,
    columns: IndexMap<String, Vec<f64>>,
}

impl FaceStore {
    /// 创建空存储
    #[must_use]
    pub fn new(n_faces: usize) -> Self {
        Self {
            n_faces,
            columns: IndexMap::new(),
        }
    }

    /// 面数量
    #[inline]
    #[must_use]
    pub fn n_faces(&self) -> usize {
        self.n_faces
    }

    /// 确保变量列存在，返回列句柄
    ///
    /// 新列以缺测哨兵填充。
    pub fn ensure_column(&mut self, name: &str) -> ColumnId {
        if let Some(idx) = self.columns.get_index_of(name) {
            return ColumnId(idx);
        }
        let idx = self.columns.len();
        self.columns
            .insert(name.to_string(), vec![NODATA; self.n_faces]);
        ColumnId(idx)
    }

    /// 查找列句柄
    #[must_use]
    pub fn column_id(&self, name: &str) -> Option<ColumnId> {
        self.columns.get_index_of(name).map(ColumnId)
    }

    /// 读取面变量
    ///
    /// # 错误
    ///
    /// 列不存在时返回 `missing-variable`（携带面号与变量名）。
    pub fn get(&self, face: usize, name: &str) -> NhResult<f64> {
        let col = self
            .columns
            .get(name)
            .ok_or_else(|| NhError::missing_variable(name, format!("face {}", face)))?;
        col.get(face)
            .copied()
            .ok_or_else(|| NhError::internal(format!("face {} out of range", face)))
    }

    /// 经列句柄读取
    #[inline]
    #[must_use]
    pub fn get_by_id(&self, face: usize, col: ColumnId) -> f64 {
        self.columns[col.0][face]
    }

    /// 写入面变量；列不存在时创建
    pub fn set(&mut self, face: usize, name: &str, value: f64) {
        let col = self.ensure_column(name);
        self.set_by_id(face, col, value);
    }

    /// 经列句柄写入
    #[inline]
    pub fn set_by_id(&mut self, face: usize, col: ColumnId, value: f64) {
        self.columns[col.0][face] = value;
    }

    /// 整列只读视图
    pub fn column(&self, name: &str) -> NhResult<&[f64]> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| NhError::missing_variable(name, "column view"))
    }

    /// 当前存在的变量名（创建顺序）
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}
