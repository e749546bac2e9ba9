// apps/nh_cli/src/commands/validate.rs

//! 启动期验证命令
//!
//! 装配全部组件并解析依赖图，但不推进任何 tick。
//! 配置、输入与图错误都会在这里暴露。

use super::common::build_simulation;
use anyhow::Result;
use clap::Args;
use nh_engine::Parallelism;
use std::path::PathBuf;

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,
}

/// 执行验证
pub fn execute(args: ValidateArgs) -> Result<()> {
    let sim = build_simulation(&args.config)?;
    let modules = sim.modules();
    let graph = sim.scheduler().graph();

    println!("依赖图解析成功。");
    println!("执行顺序:");
    for &i in graph.execution_order() {
        println!("  {}", modules[i].name());
    }
    println!("批次:");
    for (bi, batch) in graph.batches().iter().enumerate() {
        let tag = match batch.parallelism {
            Parallelism::Data => "面并行",
            Parallelism::Domain => "全域串行",
        };
        let names: Vec<&str> = batch.modules.iter().map(|&i| modules[i].name()).collect();
        println!("  [{}] {}: {}", bi, tag, names.join(", "));
    }
    Ok(())
}
