// apps/nh_cli/src/commands/info.rs

//! 概况命令

use super::common::build_simulation;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// 概况参数
#[derive(Args)]
pub struct InfoArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,
}

/// 打印网格与气象概况
pub fn execute(args: InfoArgs) -> Result<()> {
    let sim = build_simulation(&args.config)?;
    let mesh = sim.mesh();
    let met = sim.met();

    println!("网格:");
    println!("  面数: {}", mesh.n_faces());
    println!("  参考系: {:?}", mesh.projection());

    println!("气象:");
    println!("  站点数: {}", met.n_stations());
    println!("  窗口: [{}, {}]", met.start_time(), met.end_time());
    println!("  dt: {}s", met.dt().num_seconds());
    println!("  时间步数: {}", met.n_timesteps());
    println!("  变量:");
    for v in met.list_variables() {
        println!("    - {}", v);
    }

    println!("模块:");
    for m in sim.modules() {
        println!("  - {}", m.name());
    }
    Ok(())
}
