// crates/nh_met/src/error.rs

//! 气象层错误
//!
//! 初始化错误（缺文件、步长不一致、窗口为空、投影失败）
//! 全部致命；`next()` 要么完整推进要么终止，从不静默失败。

use nh_foundation::error::NhError;
use nh_io::ImportError;
use thiserror::Error;

/// 气象协调器错误
#[derive(Debug, Error)]
pub enum MetError {
    /// 数据导入失败
    #[error(transparent)]
    Import(#[from] ImportError),

    /// 站点数据源不提供该变量
    #[error("station '{station}' does not supply variable '{variable}'")]
    MissingVariable {
        /// 站点 id
        station: String,
        /// 变量名
        variable: String,
    },

    /// 各站点统一窗口为空
    #[error("empty overlap: unified window [{start}, {end}] is empty")]
    EmptyOverlap {
        /// 统一起点
        start: String,
        /// 统一终点
        end: String,
    },

    /// 站点间时间步长不一致
    #[error("station '{station}' has dt {found}s, expected {expected}s")]
    InconsistentDt {
        /// 站点 id
        station: String,
        /// 期望步长 [s]
        expected: i64,
        /// 实际步长 [s]
        found: i64,
    },

    /// 站点坐标无法重投影到网格参考系
    #[error("projection failure for station '{station}': {message}")]
    Projection {
        /// 站点 id
        station: String,
        /// 原因
        message: String,
    },

    /// 非法的子集窗口
    #[error("invalid subset window: {0}")]
    InvalidSubset(String),

    /// 内部不变量被破坏
    #[error("met coordinator internal: {0}")]
    Internal(String),
}

impl From<MetError> for NhError {
    fn from(e: MetError) -> Self {
        match e {
            MetError::Import(inner) => inner.into(),
            MetError::MissingVariable { station, variable } => {
                NhError::missing_variable(variable, format!("station {}", station))
            }
            other => NhError::invalid_input(other.to_string()),
        }
    }
}
