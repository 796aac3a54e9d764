//! 脊髓节段测量命令行工具.

use clap::{Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;

mod discs;
mod distances;
mod levels;
mod overlap;
mod staging;
mod summary;

#[derive(Parser, Debug)]
#[command(version, about = "根据神经根分割确定脊髓节段, 并测量各节段到 PMJ 的距离")]
struct Cli {
    /// 日志详细程度. `-v` 输出 debug 日志, `-vv` 输出 trace 日志.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 由神经根分割计算脊髓节段测量表.
    Levels(levels::Levels),

    /// 由椎间盘标记计算椎骨节段测量表.
    Discs(discs::Discs),

    /// 计算两个节段体数据之间的逐节段重叠率.
    Overlap(overlap::Overlap),

    /// 测量每个神经根到 PMJ 及到同编号椎间盘的曲线距离.
    Distances(distances::Distances),
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    SimpleLogger::new().with_level(log_level(cli.verbose)).init()?;

    match cli.command {
        Command::Levels(cmd) => cmd.run(),
        Command::Discs(cmd) => cmd.run(),
        Command::Overlap(cmd) => cmd.run(),
        Command::Distances(cmd) => cmd.run(),
    }
}
