// crates/nh_foundation/src/error.rs

//! 基础错误类型
//!
//! 定义整个项目的基础错误类型，仅包含与基础设施相关的错误。
//! 高层错误（气象、模块图、检查点）各自定义 `thiserror` 枚举，
//! 并提供到 [`NhError`] 的转换。
//!
//! # 错误分层
//!
//! ```text
//! 高层错误 (nh_met::MetError, nh_engine::GraphError, nh_io::CheckpointError)
//!        ↓ (转换)
//! 基础错误 ← 你在这里 (nh_foundation::NhError)
//! ```
//!
//! # 可见性约定
//!
//! 面向用户的错误输出是"类别 + 出错的面/站点/变量名"，
//! 而不是不透明的调用栈。

use std::io;
use std::path::PathBuf;

/// 基础结果类型
///
/// 用于简化函数签名，等价于 `Result<T, NhError>`。
pub type NhResult<T> = Result<T, NhError>;

/// Foundation 层基础错误
///
/// 包含所有基础设施级别的错误，是错误体系的根基。
///
/// # 错误分类
///
/// - **IO 错误**: 文件读写失败
/// - **配置错误**: 缺失或非法的配置值（启动期致命）
/// - **数据错误**: 缺失变量、数据不足（按模块契约决定是否致命）
/// - **逻辑错误**: 无效输入、内部不变量被破坏
#[derive(Debug)]
pub enum NhError {
    /// IO 操作失败
    Io {
        /// 描述性错误信息
        message: String,
        /// 底层 IO 错误源
        source: Option<io::Error>,
    },

    /// 文件不存在
    FileNotFound {
        /// 未找到的文件路径
        path: PathBuf,
    },

    /// 配置缺失或非法
    Config {
        /// 说明出错的键与原因
        message: String,
    },

    /// 输入数据验证失败
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 消费者读取了未被提供的变量
    MissingVariable {
        /// 变量名
        variable: String,
        /// 出错位置（面 id、站点 id 等）
        context: String,
    },

    /// 可用数据不足（如搜索半径内无有效站点）
    InsufficientData {
        /// 出错位置与原因
        context: String,
    },

    /// 数组或集合大小不匹配
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 功能或资源未找到
    NotFound {
        /// 资源名称或标识
        resource: String,
    },

    /// 内部实现错误
    ///
    /// 程序进入不应到达的状态时使用，通常表示不变量被破坏。
    Internal {
        /// 内部错误描述
        message: String,
    },
}

// ============================================================================
// 便捷构造方法
// ============================================================================

impl NhError {
    /// 创建 IO 错误
    #[inline]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带源的 IO 错误
    #[inline]
    pub fn io_with_source(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 创建文件未找到错误
    #[inline]
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// 创建配置错误
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 创建无效输入错误
    #[inline]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 创建缺失变量错误
    #[inline]
    pub fn missing_variable(variable: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingVariable {
            variable: variable.into(),
            context: context.into(),
        }
    }

    /// 创建数据不足错误
    #[inline]
    pub fn insufficient_data(context: impl Into<String>) -> Self {
        Self::InsufficientData {
            context: context.into(),
        }
    }

    /// 创建大小不匹配错误
    #[inline]
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 创建资源未找到错误
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// 创建内部错误
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 判断错误是否属于启动期致命类别
    ///
    /// 配置、文件与输入验证错误在初始化阶段全部致命。
    #[must_use]
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::FileNotFound { .. }
                | Self::Io { .. }
                | Self::InvalidInput { .. }
        )
    }
}

impl std::fmt::Display for NhError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { message, source } => match source {
                Some(e) => write!(f, "IO错误: {} ({})", message, e),
                None => write!(f, "IO错误: {}", message),
            },
            Self::FileNotFound { path } => write!(f, "文件不存在: {}", path.display()),
            Self::Config { message } => write!(f, "配置错误: {}", message),
            Self::InvalidInput { message } => write!(f, "无效输入: {}", message),
            Self::MissingVariable { variable, context } => {
                write!(f, "缺失变量 '{}' ({})", variable, context)
            }
            Self::InsufficientData { context } => write!(f, "数据不足: {}", context),
            Self::SizeMismatch {
                name,
                expected,
                actual,
            } => write!(f, "大小不匹配 {}: 期望 {}, 实际 {}", name, expected, actual),
            Self::NotFound { resource } => write!(f, "未找到: {}", resource),
            Self::Internal { message } => write!(f, "内部错误: {}", message),
        }
    }
}

impl std::error::Error for NhError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io {
                source: Some(e), ..
            } => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for NhError {
    fn from(e: io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
            source: Some(e),
        }
    }
}
