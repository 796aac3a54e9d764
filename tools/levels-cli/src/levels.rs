use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use log::info;
use spine_levels::centerline::SliceMatch;
use spine_levels::consts::{DEFAULT_DILATION, MAX_DILATION, TABLE_HEADER};
use spine_levels::error::LevelsError;
use spine_levels::pipeline::{self, LevelsConfig, LevelsInputs};
use spine_levels::table::write_records;

use crate::staging::Staging;
use crate::summary;

#[derive(Args, Debug)]
pub struct Levels {
    /// 多标签神经根分割 (nii / nii.gz).
    #[arg(short = 'i', long)]
    rootlets: PathBuf,

    /// 二值脊髓分割.
    #[arg(short = 's', long)]
    seg: PathBuf,

    /// 中心线文件 (3×N 或 N×3, 无表头).
    #[arg(short = 'c', long)]
    centerline: PathBuf,

    /// 输出测量表路径.
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// 求交前脊髓分割的膨胀半径, 以体素为单位.
    #[arg(
        long,
        default_value_t = DEFAULT_DILATION,
        value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_DILATION)),
    )]
    dilate: u32,

    /// PMJ 标记. 给定时以其所在切片确定参考点, 并使用其体素分辨率.
    #[arg(long)]
    pmj: Option<PathBuf>,

    /// 写入 `fname` 列的来源标识. 默认为神经根分割文件名.
    #[arg(long)]
    fname: Option<String>,

    /// 切片必须与中心线采样点完全匹配.
    #[arg(long)]
    exact: bool,

    /// 输入不是 RPI 方向时直接报错, 而不是重定向.
    #[arg(long = "no-reorient")]
    no_reorient: bool,

    /// 同时保存交集与节段体数据.
    #[arg(long = "save-volumes")]
    save_volumes: bool,
}

/// `<dir>/<stem>_intersect.nii.gz` 与 `<dir>/<stem>_spinal_levels.nii.gz`.
fn volume_paths(output: &Path) -> (PathBuf, PathBuf) {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (
        output.with_file_name(format!("{stem}_intersect.nii.gz")),
        output.with_file_name(format!("{stem}_spinal_levels.nii.gz")),
    )
}

impl Levels {
    pub fn config(&self) -> LevelsConfig {
        LevelsConfig {
            dilation: self.dilate,
            slice_match: if self.exact {
                SliceMatch::Exact
            } else {
                SliceMatch::Nearest
            },
            allow_reorient: !self.no_reorient,
        }
    }

    pub fn run(&self) -> anyhow::Result<()> {
        let mut inputs = LevelsInputs::open(
            &self.rootlets,
            &self.seg,
            &self.centerline,
            self.pmj.as_deref(),
        )
        .context("failed to load inputs")?;
        if let Some(f) = &self.fname {
            inputs.source.clone_from(f);
        }

        let out = pipeline::run(&inputs, &self.config())?;

        // 所有输出写完后再统一提交, 失败时不留下部分结果.
        let mut staging = Staging::new();
        if self.save_volumes {
            let (intersect, spinal_levels) = volume_paths(&self.output);
            out.intersection
                .save(staging.stage(&intersect))
                .with_context(|| format!("failed to write `{}`", intersect.display()))?;
            out.spinal_levels
                .save(staging.stage(&spinal_levels))
                .with_context(|| format!("failed to write `{}`", spinal_levels.display()))?;
        }
        File::create(staging.stage(&self.output))
            .map_err(LevelsError::from)
            .and_then(|f| write_records(&TABLE_HEADER, &out.records, f))
            .with_context(|| format!("failed to write `{}`", self.output.display()))?;
        staging.commit()?;
        info!(
            "{} record(s) written to `{}`",
            out.records.len(),
            self.output.display()
        );

        summary::print_records("Spinal levels", &out.records);
        let missing = out.missing();
        if !missing.is_empty() {
            println!("Levels not found in the cord: {missing:?}");
        }
        Ok(())
    }
}
