use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use spine_levels::centerline::{Centerline, SliceMatch};
use spine_levels::pipeline::{self, LevelsConfig};
use spine_levels::table::write_distances;
use spine_levels::LabelVolume;

use crate::summary;

#[derive(Args, Debug)]
pub struct Distances {
    /// 多标签神经根分割.
    #[arg(short = 'r', long)]
    rootlets: PathBuf,

    /// 椎间盘标记 (每个椎间盘一个体素, 值为编号).
    #[arg(short = 'd', long = "disclabel")]
    disc_label: PathBuf,

    /// 中心线文件 (3×N 或 N×3, 无表头).
    #[arg(short = 'c', long)]
    centerline: PathBuf,

    /// 输出距离表路径.
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// 写入 `subject` 列的受试者标识.
    #[arg(long)]
    subject: String,

    /// 切片必须与中心线采样点完全匹配.
    #[arg(long)]
    exact: bool,
}

impl Distances {
    pub fn run(&self) -> anyhow::Result<()> {
        let open = |p: &PathBuf| {
            LabelVolume::open(p).with_context(|| format!("failed to load `{}`", p.display()))
        };
        let rootlets = open(&self.rootlets)?;
        let discs = open(&self.disc_label)?;
        let centerline = Centerline::open(&self.centerline)
            .with_context(|| format!("failed to load `{}`", self.centerline.display()))?;

        let config = LevelsConfig {
            slice_match: if self.exact {
                SliceMatch::Exact
            } else {
                SliceMatch::Nearest
            },
            ..Default::default()
        };
        let records =
            pipeline::run_rootlet_discs(&rootlets, &discs, &centerline, &self.subject, &config)?;
        write_distances(&records, &self.output)
            .with_context(|| format!("failed to write `{}`", self.output.display()))?;

        summary::print_distances(&records);
        Ok(())
    }
}
