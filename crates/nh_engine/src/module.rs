// crates/nh_engine/src/module.rs

//! 模块契约
//!
//! 模块是一个计算单元：声明依赖、提供的变量与并行度，
//! 提供逐面 `run_face` 或全域 `run_domain` 入口。
//!
//! # 并行度
//!
//! - **面并行** ([`Parallelism::Data`]): 调度器可对任意不相交的
//!   面子集并发调用 `run_face`。契约禁止修改自己面状态块与
//!   当前面变量行之外的任何数据；写入通过 [`FaceWrites`] 收集，
//!   由调度器串行写回。
//! - **全域串行** ([`Parallelism::Domain`]): 调度器恰好调用一次
//!   `run_domain`，模块可按任意顺序遍历并读写任意面。
//!   邻面耦合住在这里。ghost 面只读，任何全域模块不得写它。
//!
//! # 依赖的空间注记
//!
//! [`SpatialType::Neighbour`] 声明该依赖还会从邻面读取。
//! 调度器用它验证非法访问模式：面并行模块的邻面依赖必须由
//! 更早批次（或气象输入）满足，否则会出现竞态。

use crate::context::EngineContext;
use crate::store::FaceStore;
use chrono::{DateTime, Utc};
use nh_foundation::error::{NhError, NhResult};
use nh_io::CheckpointStore;
use nh_mesh::{Face, TriMesh};
use nh_met::MetCoordinator;
use smallvec::SmallVec;

/// 模块并行度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    /// 面并行
    Data,
    /// 全域串行
    Domain,
}

/// 依赖的空间注记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpatialType {
    /// 仅读同面
    #[default]
    Same,
    /// 还会读邻面
    Neighbour,
}

/// 同面/邻面依赖声明
#[derive(Debug, Clone)]
pub struct Depend {
    /// 变量名
    pub name: String,
    /// 空间注记
    pub spatial: SpatialType,
}

impl Depend {
    /// 声明同面依赖
    #[must_use]
    pub fn same(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spatial: SpatialType::Same,
        }
    }

    /// 声明邻面依赖
    #[must_use]
    pub fn neighbour(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spatial: SpatialType::Neighbour,
        }
    }
}

/// 一个 tick 的只读上下文
pub struct TickInfo<'a> {
    /// 网格（只读拓扑/几何）
    pub mesh: &'a TriMesh,
    /// 气象协调器（站点查询）
    pub met: &'a MetCoordinator,
    /// 当前模拟时间
    pub time: DateTime<Utc>,
    /// 引擎全局参数
    pub engine: &'a EngineContext,
}

/// 面并行模块的写出缓冲
///
/// 只接受模块声明过的变量名；由调度器映射到列句柄后串行写回，
/// 因此结果与线程数无关。
pub struct FaceWrites<'a> {
    provides: &'a [String],
    out: SmallVec<[(u32, f64); 4]>,
}

impl<'a> FaceWrites<'a> {
    /// 为一个模块的 provides 列表创建缓冲
    #[must_use]
    pub fn new(provides: &'a [String]) -> Self {
        Self {
            provides,
            out: SmallVec::new(),
        }
    }

    /// 写一个提供的变量
    ///
    /// # 错误
    ///
    /// 写未声明的变量违反模块契约。
    pub fn set(&mut self, name: &str, value: f64) -> NhResult<()> {
        let slot = self
            .provides
            .iter()
            .position(|p| p == name)
            .ok_or_else(|| {
                NhError::internal(format!(
                    "module wrote undeclared variable '{}' (provides: {:?})",
                    name, self.provides
                ))
            })?;
        self.out.push((slot as u32, value));
        Ok(())
    }

    /// 已收集的 (提供槽位, 值) 对
    #[must_use]
    pub fn slots(&self) -> &[(u32, f64)] {
        &self.out
    }

    /// 取出 (提供槽位, 值) 对
    #[must_use]
    pub(crate) fn into_slots(self) -> SmallVec<[(u32, f64); 4]> {
        self.out
    }
}

/// 模块契约
///
/// 构造发生在工厂里（见 [`crate::registry`]），构造器读取模块
/// 私有配置段并固定声明集。`init` 在网格加载后、第一个 tick 前
/// 恰好调用一次，负责在每个面上分配模块私有状态。
pub trait Module: Send + Sync {
    /// 模块名（唯一）
    fn name(&self) -> &str;

    /// 并行度
    fn parallelism(&self) -> Parallelism;

    /// 提供的变量名
    fn provides(&self) -> &[String];

    /// 同面/邻面依赖（由其他模块或气象提供）
    fn depends(&self) -> &[Depend] {
        &[]
    }

    /// 来自气象输入（站点观测）的依赖
    fn depends_from_met(&self) -> &[String] {
        &[]
    }

    /// 分配每面状态；每次运行恰好一次
    ///
    /// 在网格加载后、第一个 tick 前调用；可向存储写入
    /// 初始化即确定的提供变量（列已由调度计划创建）。
    fn init(
        &mut self,
        mesh: &TriMesh,
        store: &mut FaceStore,
        engine: &EngineContext,
    ) -> NhResult<()> {
        let _ = (mesh, store, engine);
        Ok(())
    }

    /// 面并行入口
    ///
    /// 默认实现报告契约违反；面并行模块必须覆盖。
    fn run_face(
        &self,
        face: &Face,
        store: &FaceStore,
        tick: &TickInfo,
        out: &mut FaceWrites,
    ) -> NhResult<()> {
        let _ = (face, store, tick, out);
        Err(NhError::internal(format!(
            "module '{}' has no face-parallel entry point",
            self.name()
        )))
    }

    /// 全域串行入口
    ///
    /// 默认实现报告契约违反；全域模块必须覆盖。
    fn run_domain(&self, store: &mut FaceStore, tick: &TickInfo) -> NhResult<()> {
        let _ = (store, tick);
        Err(NhError::internal(format!(
            "module '{}' has no domain entry point",
            self.name()
        )))
    }

    /// 序列化无法从变量存储重算的每面状态
    fn checkpoint(&self, mesh: &TriMesh, sink: &mut CheckpointStore) -> NhResult<()> {
        let _ = (mesh, sink);
        Ok(())
    }

    /// 从检查点恢复每面状态
    ///
    /// 模块声明的每个键都必须存在，缺失以 `checkpoint-mismatch`
    /// 失败。
    fn load_checkpoint(&mut self, mesh: &TriMesh, source: &CheckpointStore) -> NhResult<()> {
        let _ = (mesh, source);
        Ok(())
    }
}
