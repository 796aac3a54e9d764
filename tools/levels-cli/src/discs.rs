use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use spine_levels::centerline::{Centerline, SliceMatch};
use spine_levels::pipeline::{self, LevelsConfig};
use spine_levels::table::write_csv;
use spine_levels::LabelVolume;

use crate::summary;

#[derive(Args, Debug)]
pub struct Discs {
    /// 椎间盘标记 (每个椎间盘一个体素, 值为编号).
    #[arg(short = 'd', long = "disclabel")]
    disc_label: PathBuf,

    /// 中心线文件 (3×N 或 N×3, 无表头).
    #[arg(short = 'c', long)]
    centerline: PathBuf,

    /// 输出测量表路径.
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// 切片必须与中心线采样点完全匹配.
    #[arg(long)]
    exact: bool,
}

impl Discs {
    pub fn run(&self) -> anyhow::Result<()> {
        let discs = LabelVolume::open(&self.disc_label)
            .with_context(|| format!("failed to load `{}`", self.disc_label.display()))?;
        let centerline = Centerline::open(&self.centerline)
            .with_context(|| format!("failed to load `{}`", self.centerline.display()))?;
        let source = self
            .disc_label
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let config = LevelsConfig {
            slice_match: if self.exact {
                SliceMatch::Exact
            } else {
                SliceMatch::Nearest
            },
            ..Default::default()
        };
        let records = pipeline::run_discs(&discs, &centerline, &source, &config)?;
        write_csv(&records, &self.output)
            .with_context(|| format!("failed to write `{}`", self.output.display()))?;

        summary::print_records("Vertebral levels", &records);
        Ok(())
    }
}
