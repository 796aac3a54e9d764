use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use spine_levels::overlap::level_overlap;
use spine_levels::pipeline::conform;
use spine_levels::LabelVolume;

use crate::summary;

#[derive(Args, Debug)]
pub struct Overlap {
    /// 待评估的节段体数据.
    #[arg(long)]
    candidate: PathBuf,

    /// 参考节段体数据.
    #[arg(long)]
    reference: PathBuf,
}

impl Overlap {
    pub fn run(&self) -> anyhow::Result<()> {
        let open = |p: &PathBuf| {
            LabelVolume::open(p).with_context(|| format!("failed to load `{}`", p.display()))
        };
        let candidate = open(&self.candidate)?;
        let reference = open(&self.reference)?;
        let candidate = conform(&candidate, "candidate", true)?;
        let reference = conform(&reference, "reference", true)?;

        let overlaps = level_overlap(candidate.data(), reference.data())?;
        summary::print_overlaps(&overlaps);
        Ok(())
    }
}
