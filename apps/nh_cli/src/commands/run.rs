// apps/nh_cli/src/commands/run.rs

//! 运行模拟命令

use super::common::build_simulation;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// 运行模拟参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 从检查点续算
    #[arg(long)]
    pub resume: Option<PathBuf>,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== NivaHydro 模拟启动 ===");
    let mut sim = build_simulation(&args.config)?;

    info!(
        "网格 {} 面, {} 站点, 窗口 [{}, {}], dt = {}s",
        sim.mesh().n_faces(),
        sim.met().n_stations(),
        sim.met().start_time(),
        sim.met().end_time(),
        sim.met().dt().num_seconds()
    );

    sim.init().context("module init")?;
    if let Some(path) = &args.resume {
        sim.load_checkpoint(path)
            .with_context(|| format!("resuming from {}", path.display()))?;
        info!("已从检查点恢复 (tick {})", sim.completed_ticks());
    }

    let summary = sim.run().context("simulation run")?;
    info!(
        "=== 完成: {} ticks, 耗时 {:.2}s ===",
        summary.ticks,
        summary.wall_time.as_secs_f64()
    );
    Ok(())
}
