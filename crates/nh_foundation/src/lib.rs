// crates/nh_foundation/src/lib.rs

//! NivaHydro Foundation Layer
//!
//! 零业务依赖基础层，提供整个项目的基础抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 [`NhError`] / [`NhResult`]
//! - [`config`]: 层级配置树，带类型化 `get(key, default)` 访问
//! - [`constants`]: 共享常量（缺测哨兵值等）
//!
//! # 设计原则
//!
//! 1. **纯净性**: 本层不引入网格、气象、模块等领域概念
//! 2. **可转换性**: 高层错误最终转换为 [`NhError`]
//! 3. **显式上下文**: 不提供任何全局单例，配置通过 [`config::ConfigTree`] 显式传递

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod constants;
pub mod error;

pub use config::ConfigTree;
pub use constants::{is_nodata, NODATA};
pub use error::{NhError, NhResult};
