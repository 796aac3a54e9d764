//! 两个节段体数据之间的逐节段重叠率.

use itertools::Itertools;
use ndarray::{ArrayView3, Zip};

use crate::consts::label::is_foreground;
use crate::error::{LevelsError, Result};

/// 单个节段的重叠率.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LevelOverlap {
    /// 节段编号.
    pub level: u8,
    /// `|cand == l ∧ ref == l| / |ref == l| × 100`. 参考体数据中没有该节段时为 `None`.
    pub percent: Option<f64>,
}

/// 对 `candidate` 中出现的每个节段, 计算其与 `reference` 中同一节段的重叠百分比.
/// 结果按节段升序排列.
///
/// 形状不一致时返回 `Err(LevelsError::ShapeMismatch)`.
pub fn level_overlap(
    candidate: ArrayView3<u8>,
    reference: ArrayView3<u8>,
) -> Result<Vec<LevelOverlap>> {
    if candidate.dim() != reference.dim() {
        return Err(LevelsError::ShapeMismatch {
            left: candidate.dim(),
            right: reference.dim(),
        });
    }

    // 下标为节段编号: (交集体素数, 参考体素数).
    let mut counts = [(0usize, 0usize); 256];
    Zip::from(&candidate).and(&reference).for_each(|&c, &r| {
        if is_foreground(r) {
            counts[r as usize].1 += 1;
            if c == r {
                counts[r as usize].0 += 1;
            }
        }
    });

    Ok(candidate
        .iter()
        .copied()
        .filter(|&p| is_foreground(p))
        .unique()
        .sorted_unstable()
        .map(|level| {
            let (both, total) = counts[level as usize];
            let percent = (total > 0).then(|| both as f64 / total as f64 * 100.0);
            LevelOverlap { level, percent }
        })
        .collect())
}
