// crates/nh_io/src/error.rs

//! 导入错误类型
//!
//! IO 层的高层错误，转换为 [`NhError`] 向下兼容。

use nh_foundation::error::NhError;
use std::path::PathBuf;
use thiserror::Error;

/// 导入错误
#[derive(Debug, Error)]
pub enum ImportError {
    /// 文件不存在
    #[error("missing file: {0}")]
    MissingFile(PathBuf),

    /// IO 失败
    #[error("io error reading {path}: {source}")]
    Io {
        /// 出错的文件
        path: PathBuf,
        /// 底层错误
        source: std::io::Error,
    },

    /// 行解析失败
    #[error("{path}:{line}: {message}")]
    Parse {
        /// 出错的文件
        path: PathBuf,
        /// 行号（1 起）
        line: usize,
        /// 原因
        message: String,
    },

    /// 时间步长不一致
    ///
    /// 步长由前两行导出，之后每对相邻行都必须相等。
    #[error("inconsistent dt in {path}: expected {expected}s, found {found}s at row {row}")]
    InconsistentDt {
        /// 出错的文件
        path: PathBuf,
        /// 期望步长 [s]
        expected: i64,
        /// 实际步长 [s]
        found: i64,
        /// 出错的数据行号（1 起）
        row: usize,
    },

    /// 文件没有可用数据
    #[error("no usable rows in {0}")]
    Empty(PathBuf),

    /// 结构不符合约定
    #[error("invalid format in {path}: {message}")]
    Format {
        /// 出错的文件
        path: PathBuf,
        /// 原因
        message: String,
    },
}

impl From<ImportError> for NhError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::MissingFile(path) => NhError::file_not_found(path),
            ImportError::Io { path, source } => {
                NhError::io_with_source(format!("reading {}", path.display()), source)
            }
            other => NhError::invalid_input(other.to_string()),
        }
    }
}
