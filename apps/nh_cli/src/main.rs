// apps/nh_cli/src/main.rs

//! NivaHydro 命令行界面
//!
//! 分布式水文模型核心的命令行工具：装配网格、气象驱动与
//! 模块表，推进模拟并产出结果。

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// NivaHydro 分布式水文模型命令行工具
#[derive(Parser)]
#[command(name = "nh_cli")]
#[command(author = "NivaHydro Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "NivaHydro distributed hydrological model", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行模拟
    Run(commands::run::RunArgs),
    /// 显示配置对应的网格与气象概况
    Info(commands::info::InfoArgs),
    /// 只做启动期验证（依赖图、批次划分），不运行
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}
