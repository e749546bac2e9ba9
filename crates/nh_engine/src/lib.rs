// crates/nh_engine/src/lib.rs

//! NivaHydro 引擎层
//!
//! 模型核心的执行机制：
//!
//! - [`store`]: 面变量存储（(面, 变量名) → f64）
//! - [`module`]: 模块契约：声明依赖/提供/并行度，
//!   提供逐面或全域入口
//! - [`registry`]: 模块工厂注册表（显式对象，替代注册宏）
//! - [`graph`]: 模块依赖图：提供者解析、确定性拓扑排序、
//!   批次划分与并行度验证
//! - [`scheduler`]: 按批次分派：面并行批先并行计算再串行写回，
//!   全域串行模块在驱动线程顺序执行
//! - [`context`]: 显式全局参数上下文（无单例）
//! - [`driver`]: 外层循环：推进气象、分派模块、产出输出、检查点
//!
//! # 每 tick 的控制流
//!
//! 驱动请求协调器推进；协调器从后端取一个时间步进站点集合
//! （施加逐站过滤器）；驱动请求调度器执行有序模块表；每个模块
//! 经空间索引与插值器读站点、按面读写变量存储，并可经网格读取
//! 邻面状态；随后驱动写输出并推进时间。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod driver;
pub mod graph;
pub mod module;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use context::EngineContext;
pub use driver::Simulation;
pub use graph::{GraphError, ModuleGraph};
pub use module::{Depend, FaceWrites, Module, Parallelism, SpatialType, TickInfo};
pub use registry::ModuleRegistry;
pub use scheduler::Scheduler;
pub use store::FaceStore;
