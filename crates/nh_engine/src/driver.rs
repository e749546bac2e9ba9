// crates/nh_engine/src/driver.rs

//! 模拟驱动
//!
//! 外层循环：推进气象 → 按批次分派模块 → 产出输出 → 周期检查点。
//! 任一模块的致命错误中止当前 tick；若配置了失败检查点，
//! 驱动在退出前尽力保存一份状态。

use crate::context::EngineContext;
use crate::module::Module;
use crate::scheduler::Scheduler;
use crate::store::FaceStore;
use chrono::{DateTime, Utc};
use nh_foundation::config::ConfigTree;
use nh_foundation::error::{NhError, NhResult};
use nh_io::exporters::vtu::write_vtu;
use nh_io::CheckpointStore;
use nh_mesh::TriMesh;
use nh_met::MetCoordinator;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// 输出设置
#[derive(Debug, Clone)]
struct OutputSettings {
    /// 每多少个 tick 写一次
    interval: u64,
    /// 输出的变量名
    variables: Vec<String>,
    /// 输出目录
    directory: PathBuf,
}

/// 检查点设置
#[derive(Debug, Clone)]
struct CheckpointSettings {
    /// 周期（tick 数）；`None` 关闭周期检查点
    interval: Option<u64>,
    /// tick 失败时是否保存
    on_failure: bool,
    /// 检查点目录
    directory: PathBuf,
}

/// 运行摘要
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    /// 执行的 tick 数
    pub ticks: u64,
    /// 墙钟耗时
    pub wall_time: std::time::Duration,
}

/// 模拟实例
///
/// 组合网格、气象协调器、模块表与调度器；`run` 驱动整个窗口。
pub struct Simulation {
    mesh: TriMesh,
    met: MetCoordinator,
    modules: Vec<Box<dyn Module>>,
    store: FaceStore,
    scheduler: Scheduler,
    engine: EngineContext,
    output: Option<OutputSettings>,
    checkpoint: CheckpointSettings,
    step: u64,
    initialized: bool,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("step", &self.step)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// 组装模拟
    ///
    /// 建立执行计划（依赖解析失败即致命），读取输出与检查点
    /// 设置。未知顶层配置键只警告。
    pub fn new(
        mesh: TriMesh,
        met: MetCoordinator,
        modules: Vec<Box<dyn Module>>,
        cfg: &ConfigTree,
    ) -> NhResult<Self> {
        let engine = EngineContext::from_config(cfg)?;
        let mut store = FaceStore::new(mesh.n_faces());
        let scheduler = Scheduler::plan(&modules, &met, &mut store)?;

        let mut known: Vec<&str> = vec![
            "interp_algorithm",
            "station_search_radius",
            "modules",
            "output",
            "checkpoint",
            "mesh",
            "met",
        ];
        for m in &modules {
            known.push(m.name());
        }
        cfg.warn_unknown_keys(&known);

        let output = {
            let section = cfg.section("output");
            let variables: Vec<String> = section.get("variables", Vec::new());
            if variables.is_empty() {
                None
            } else {
                Some(OutputSettings {
                    interval: section.get("interval", 1u64).max(1),
                    variables,
                    directory: PathBuf::from(
                        section.get("directory", "output".to_string()),
                    ),
                })
            }
        };

        let ck = cfg.section("checkpoint");
        let checkpoint = CheckpointSettings {
            interval: ck.get_opt::<u64>("interval").filter(|&i| i > 0),
            on_failure: ck.get("on_failure", false),
            directory: PathBuf::from(ck.get("directory", "checkpoints".to_string())),
        };

        Ok(Self {
            mesh,
            met,
            modules,
            store,
            scheduler,
            engine,
            output,
            checkpoint,
            step: 0,
            initialized: false,
        })
    }

    /// 收窄模拟窗口（转发到气象协调器）
    pub fn subset(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> NhResult<()> {
        self.met.subset(start, end).map_err(NhError::from)
    }

    /// 初始化所有模块（每次运行恰好一次）
    pub fn init(&mut self) -> NhResult<()> {
        if self.initialized {
            return Err(NhError::internal("simulation initialized twice"));
        }
        for module in &mut self.modules {
            module.init(&self.mesh, &mut self.store, &self.engine)?;
        }
        self.initialized = true;
        Ok(())
    }

    /// 推进一个 tick
    ///
    /// 返回 `false` 表示气象窗口耗尽。
    pub fn step(&mut self) -> NhResult<bool> {
        if !self.initialized {
            self.init()?;
        }
        if !self.met.next().map_err(NhError::from)? {
            return Ok(false);
        }

        self.scheduler.run_tick(
            &self.modules,
            &self.mesh,
            &self.met,
            &mut self.store,
            &self.engine,
        )?;
        self.step += 1;

        if let Some(out) = &self.output {
            if self.step % out.interval == 0 {
                self.write_output()?;
            }
        }
        if let Some(every) = self.checkpoint.interval {
            if self.step % every == 0 {
                let path = self
                    .checkpoint
                    .directory
                    .join(format!("checkpoint_{:08}.nhck", self.step));
                self.write_checkpoint(&path)?;
            }
        }
        Ok(true)
    }

    /// 运行整个窗口
    ///
    /// tick 失败时（若配置）保存失败检查点，然后上抛原错误。
    pub fn run(&mut self) -> NhResult<RunSummary> {
        let started = Instant::now();
        loop {
            match self.step() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    log::error!("tick {} failed: {}", self.step + 1, e);
                    if self.checkpoint.on_failure {
                        let path = self.checkpoint.directory.join("failure.nhck");
                        if let Err(ck_err) = self.write_checkpoint(&path) {
                            log::error!("failure checkpoint not written: {}", ck_err);
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(RunSummary {
            ticks: self.step,
            wall_time: started.elapsed(),
        })
    }

    /// 把当前模块状态写入检查点文件
    pub fn write_checkpoint(&self, path: &Path) -> NhResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| NhError::io_with_source("create checkpoint directory", e))?;
        }
        let mut sink =
            CheckpointStore::new(self.met.current_time(), self.step, self.mesh.n_faces());
        for module in &self.modules {
            module.checkpoint(&self.mesh, &mut sink)?;
        }
        sink.save(path)
            .map_err(|e| NhError::io(format!("save checkpoint: {}", e)))
    }

    /// 从检查点恢复模块状态
    ///
    /// 活动模块声明的每个键必须存在；面数必须匹配网格。
    pub fn load_checkpoint(&mut self, path: &Path) -> NhResult<()> {
        let source = CheckpointStore::load(path)
            .map_err(|e| NhError::invalid_input(format!("load checkpoint: {}", e)))?;
        source
            .check_faces(self.mesh.n_faces())
            .map_err(|e| NhError::invalid_input(e.to_string()))?;
        for module in &mut self.modules {
            module.load_checkpoint(&self.mesh, &source)?;
        }
        self.step = source.step;
        Ok(())
    }

    /// 写当前 tick 的 VTU 输出
    fn write_output(&self) -> NhResult<()> {
        let out = self.output.as_ref().expect("caller checked");
        std::fs::create_dir_all(&out.directory)
            .map_err(|e| NhError::io_with_source("create output directory", e))?;

        let mut fields: Vec<(&str, &[f64])> = Vec::with_capacity(out.variables.len());
        for name in &out.variables {
            match self.store.column(name) {
                Ok(col) => fields.push((name.as_str(), col)),
                Err(_) => {
                    log::warn!("output variable '{}' not in store, skipped", name);
                }
            }
        }
        if fields.is_empty() {
            return Ok(());
        }
        let path = out.directory.join(format!("fields_{:08}.vtu", self.step));
        write_vtu(&path, &self.mesh, &fields)
    }

    // ------------------------------------------------------------------
    // 访问器
    // ------------------------------------------------------------------

    /// 面变量存储
    #[must_use]
    pub fn store(&self) -> &FaceStore {
        &self.store
    }

    /// 气象协调器
    #[must_use]
    pub fn met(&self) -> &MetCoordinator {
        &self.met
    }

    /// 网格
    #[must_use]
    pub fn mesh(&self) -> &TriMesh {
        &self.mesh
    }

    /// 调度器（模块图检视）
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// 已执行的 tick 数
    #[must_use]
    pub fn completed_ticks(&self) -> u64 {
        self.step
    }

    /// 模块表
    #[must_use]
    pub fn modules(&self) -> &[Box<dyn Module>] {
        &self.modules
    }
}
