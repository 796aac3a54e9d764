//! 神经根与脊髓求交, 以及脊髓节段投影.

use std::collections::BTreeMap;

use itertools::{Itertools, MinMaxResult};
use log::debug;
use ndarray::{s, Array3, ArrayView3, Axis, Zip};

use crate::consts::label::*;
use crate::error::{LevelsError, Result};

/// 某个节段在轴向上的切片范围, 闭区间 `start..=end`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SliceExtent {
    /// 最小切片下标 (RPI 方向下最尾侧).
    pub start: usize,
    /// 最大切片下标 (RPI 方向下最头侧).
    pub end: usize,
}

impl SliceExtent {
    /// 范围内的切片个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// 永远为 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// 节段投影的结果.
#[derive(Clone, Debug)]
pub struct Projection {
    /// 按节段标记的脊髓体数据, `(z, h, w)` 排列.
    pub volume: Array3<u8>,
    /// 在交集中出现过的节段及其切片范围.
    pub extents: BTreeMap<u8, SliceExtent>,
}

#[inline]
fn check_shape(left: &ArrayView3<u8>, right: &ArrayView3<u8>) -> Result<()> {
    if left.dim() == right.dim() {
        Ok(())
    } else {
        Err(LevelsError::ShapeMismatch {
            left: left.dim(),
            right: right.dim(),
        })
    }
}

/// 神经根标签与脊髓掩码求交: 掩码非零处保留神经根标签, 其余置 0.
///
/// 两者形状不一致时返回 `Err(LevelsError::ShapeMismatch)`.
pub fn intersect(rootlets: ArrayView3<u8>, mask: ArrayView3<u8>) -> Result<Array3<u8>> {
    check_shape(&rootlets, &mask)?;
    Ok(Zip::from(&rootlets)
        .and(&mask)
        .map_collect(|&r, &m| if is_foreground(m) { r } else { BACKGROUND }))
}

/// 获取值为 `label` 的体素所在轴向切片的范围. 不存在该标签时返回 `None`.
pub fn slice_extent(volume: ArrayView3<u8>, label: u8) -> Option<SliceExtent> {
    let slices = volume
        .axis_iter(Axis(0))
        .enumerate()
        .filter(|(_, slice)| slice.iter().any(|&p| p == label))
        .map(|(z, _)| z);
    match slices.minmax() {
        MinMaxResult::NoElements => None,
        MinMaxResult::OneElement(z) => Some(SliceExtent { start: z, end: z }),
        MinMaxResult::MinMax(start, end) => Some(SliceExtent { start, end }),
    }
}

/// 将交集中的每个节段投影回完整的脊髓横截面.
///
/// 对 `levels` 中的每个节段 (按升序处理), 取其在 `intersection` 中的切片范围,
/// 将该范围内 (闭区间) `cord` 的所有前景体素标记为该节段.
/// 范围重叠时, 后处理的 (较大的) 节段覆盖先处理的节段.
/// 不属于任何节段的脊髓体素为 0.
///
/// 在交集中没有体素的节段不出现在结果中.
pub fn project(
    intersection: ArrayView3<u8>,
    cord: ArrayView3<u8>,
    levels: &[u8],
) -> Result<Projection> {
    check_shape(&intersection, &cord)?;
    let mut volume = Array3::<u8>::zeros(cord.dim());
    let mut extents = BTreeMap::new();

    for &level in levels.iter().filter(|&&l| is_foreground(l)).sorted().dedup() {
        let Some(extent) = slice_extent(intersection, level) else {
            debug!("level {level}: no voxel inside the cord");
            continue;
        };
        debug!("level {level}: slices {}..={}", extent.start, extent.end);

        let (z0, z1) = (extent.start, extent.end);
        Zip::from(volume.slice_mut(s![z0..=z1, .., ..]))
            .and(cord.slice(s![z0..=z1, .., ..]))
            .for_each(|v, &c| {
                if is_foreground(c) {
                    *v = level;
                }
            });
        extents.insert(level, extent);
    }

    Ok(Projection { volume, extents })
}
