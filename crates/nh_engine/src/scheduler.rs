// crates/nh_engine/src/scheduler.rs

//! 批次调度器
//!
//! 启动时建立模块图并为每个模块提供的变量创建存储列；
//! 运行时按拓扑序逐批分派：
//!
//! - **面并行批**: 用 rayon 对面下标做并行映射，同一面上按声明
//!   顺序调用批内每个模块的 `run_face`，写入先并行收集、再在
//!   驱动线程串行写回。收集-写回两段式使逐面写入与线程数无关。
//! - **全域串行批**: 在驱动线程按声明顺序依次调用 `run_domain`。
//!
//! 批次严格按拓扑序执行：前一批在所有面上完成之前，
//! 下一批的任何模块不得开始。

use crate::context::EngineContext;
use crate::graph::{Batch, ModuleGraph};
use crate::module::{FaceWrites, Module, Parallelism, TickInfo};
use crate::store::{ColumnId, FaceStore};
use nh_foundation::error::{NhError, NhResult};
use nh_mesh::TriMesh;
use nh_met::MetCoordinator;
use rayon::prelude::*;
use smallvec::SmallVec;

/// 一个面在一个批次内收集到的写入
type FaceRow = SmallVec<[(ColumnId, f64); 8]>;

/// 批次调度器
pub struct Scheduler {
    graph: ModuleGraph,
    /// 模块下标 → 该模块 provides 的列句柄（声明序）
    provide_cols: Vec<Vec<ColumnId>>,
}

impl Scheduler {
    /// 建立执行计划
    ///
    /// 解析依赖图（失败即启动期致命），并为每个模块提供的
    /// 变量在存储里创建列。
    pub fn plan(
        modules: &[Box<dyn Module>],
        met: &MetCoordinator,
        store: &mut FaceStore,
    ) -> NhResult<Self> {
        let graph = ModuleGraph::build(modules, met.list_variables())
            .map_err(|e| NhError::config(e.to_string()))?;

        let provide_cols = modules
            .iter()
            .map(|m| {
                m.provides()
                    .iter()
                    .map(|name| store.ensure_column(name))
                    .collect()
            })
            .collect();

        Ok(Self {
            graph,
            provide_cols,
        })
    }

    /// 已解析的模块图
    #[must_use]
    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    /// 执行一个 tick 的全部批次
    ///
    /// 任何模块错误中止整个 tick 并上抛；调度器不代模块捕获
    /// 同伴模块的错误。
    pub fn run_tick(
        &self,
        modules: &[Box<dyn Module>],
        mesh: &TriMesh,
        met: &MetCoordinator,
        store: &mut FaceStore,
        engine: &EngineContext,
    ) -> NhResult<()> {
        let tick = TickInfo {
            mesh,
            met,
            time: met.current_time(),
            engine,
        };

        for batch in self.graph.batches() {
            match batch.parallelism {
                Parallelism::Data => {
                    self.run_data_batch(batch, modules, mesh, store, &tick)?;
                }
                Parallelism::Domain => {
                    for &mi in &batch.modules {
                        modules[mi].run_domain(store, &tick)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// 面并行批：并行收集，串行写回
    fn run_data_batch(
        &self,
        batch: &Batch,
        modules: &[Box<dyn Module>],
        mesh: &TriMesh,
        store: &mut FaceStore,
        tick: &TickInfo,
    ) -> NhResult<()> {
        let n = mesh.n_faces();

        let rows: Vec<FaceRow> = {
            let read_store: &FaceStore = store;
            (0..n)
                .into_par_iter()
                .map(|i| {
                    let face = mesh.face(i);
                    let mut row = FaceRow::new();
                    // ghost 面提供只读 halo 状态，不在本分区计算
                    if face.is_ghost() {
                        return Ok(row);
                    }
                    for &mi in &batch.modules {
                        let module = &modules[mi];
                        let mut writes = FaceWrites::new(module.provides());
                        module.run_face(face, read_store, tick, &mut writes)?;
                        for (slot, value) in writes.into_slots() {
                            row.push((self.provide_cols[mi][slot as usize], value));
                        }
                    }
                    Ok(row)
                })
                .collect::<Result<Vec<FaceRow>, NhError>>()?
        };

        for (i, row) in rows.into_iter().enumerate() {
            for (col, value) in row {
                store.set_by_id(i, col, value);
            }
        }
        Ok(())
    }
}
