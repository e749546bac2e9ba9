// crates/nh_interp/src/lib.rs

//! NivaHydro 插值层
//!
//! 把站点观测抬升到可比参考面、按几何插值、再降回查询高程，
//! 是气象分布模块的共同骨架。本层提供：
//!
//! - [`interp`]: 按名字选择的无状态空间插值算子
//!   （`spline` → 薄板样条，`idw` → 反距离加权，`nn` → 最近邻）
//! - [`spline`] / [`idw`] / [`nearest`]: 具体算子实现
//! - [`lapse`]: 垂直递减率抬升（常数、逐月表、
//!   按时间步最小二乘拟合 + 时间戳缓存）
//! - [`thermo`]: Magnus 饱和水汽压与 Dodson–Marks
//!   海平面位温变换
//!
//! 抬升/降回由调用方（模块）负责；纯几何算子忽略 `z`。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod idw;
pub mod interp;
pub mod lapse;
pub mod nearest;
pub mod spline;
pub mod thermo;

pub use interp::{InterpAlgorithm, Sample};
pub use lapse::{fit_lapse_ols, MonthlyLapseTable, TimeCachedLapse};
