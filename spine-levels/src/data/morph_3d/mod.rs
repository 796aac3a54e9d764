//! 3D 形态学操作.

use ndarray::{Array3, ArrayView3, ArrayViewMut2, Axis};

use crate::consts::label::*;
use crate::data::LabelVolume;
use crate::Idx3d;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 有符号三维偏移量, 按 `(z, h, w)` 排列.
type Offset3d = (isize, isize, isize);

/// 生成半径为 `radius` (体素单位) 的球形结构元素, 包含所有满足
/// `dz² + dh² + dw² <= radius²` 的偏移量.
pub fn ball(radius: u32) -> Vec<Offset3d> {
    let r = radius as isize;
    let r2 = r * r;
    let mut offsets = Vec::new();
    for dz in -r..=r {
        for dh in -r..=r {
            for dw in -r..=r {
                if dz * dz + dh * dh + dw * dw <= r2 {
                    offsets.push((dz, dh, dw));
                }
            }
        }
    }
    offsets
}

#[inline]
fn shift((z, h, w): Idx3d, (dz, dh, dw): Offset3d, (lz, lh, lw): Idx3d) -> Option<Idx3d> {
    let z = z.checked_add_signed(dz).filter(|&v| v < lz)?;
    let h = h.checked_add_signed(dh).filter(|&v| v < lh)?;
    let w = w.checked_add_signed(dw).filter(|&v| v < lw)?;
    Some((z, h, w))
}

/// 体数据内任意两个体素间距离的上界 (对角线长度向上取整).
/// 更大的半径不会改变膨胀结果.
fn radius_cap((lz, lh, lw): Idx3d) -> u32 {
    let diag = ((lz * lz + lh * lh + lw * lw) as f64).sqrt().ceil();
    diag.min(u32::MAX as f64) as u32
}

/// 计算第 `z` 层输出切片: 若结构元素平移后覆盖任一前景体素, 则置为 [`CORD`].
fn dilate_slice(mask: &ArrayView3<u8>, z: usize, mut out: ArrayViewMut2<u8>, se: &[Offset3d]) {
    let shape = mask.dim();
    for ((h, w), p) in out.indexed_iter_mut() {
        let hit = se.iter().any(|&o| {
            shift((z, h, w), o, shape).is_some_and(|pos| is_foreground(mask[pos]))
        });
        *p = if hit { CORD } else { BACKGROUND };
    }
}

/// 以半径为 `radius` 的球形结构元素对二值 `mask` 进行三维膨胀.
/// 所有非零体素视为前景, 输出为 0/[`CORD`] 二值体数据.
///
/// 结构元素以体素为单位, 不考虑体素的各向异性.
/// `radius == 0` 时输出与输入的二值化结果一致.
///
/// 开启 `rayon` feature 时按水平切片并行计算.
pub fn dilate(mask: ArrayView3<u8>, radius: u32) -> Array3<u8> {
    let mut out = Array3::<u8>::zeros(mask.dim());
    if radius == 0 {
        out.zip_mut_with(&mask, |o, &m| {
            if is_foreground(m) {
                *o = CORD
            }
        });
        return out;
    }
    let se = ball(radius.min(radius_cap(mask.dim())));

    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            out.axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(z, slice)| dilate_slice(&mask, z, slice, &se));
        } else {
            out.axis_iter_mut(Axis(0))
                .enumerate()
                .for_each(|(z, slice)| dilate_slice(&mask, z, slice, &se));
        }
    }
    out
}

/// 形态学实现块
impl LabelVolume {
    /// 返回 `self` 的球形膨胀结果, header 保持不变. 详见 [`dilate`].
    pub fn dilated(&self, radius: u32) -> Self {
        let data = dilate(self.data(), radius);
        Self {
            header: self.header.clone(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    /// 半径 1 的球形结构元素为 6-邻域加中心.
    #[test]
    fn test_ball_radius_1() {
        let se = ball(1);
        assert_eq!(se.len(), 7);
        assert!(se.contains(&(0, 0, 0)));
        assert!(!se.contains(&(1, 1, 0)));
        assert_eq!(ball(0), vec![(0, 0, 0)]);
        // 半径 2: 1 + 6 + 12 + 8 + 6 = 33.
        assert_eq!(ball(2).len(), 33);
    }

    #[test]
    fn test_dilate_single_voxel() {
        let mut m = Array3::<u8>::zeros((7, 7, 7));
        m[(3, 3, 3)] = 1;
        let d = dilate(m.view(), 2);
        assert_eq!(d.iter().filter(|&&p| p == CORD).count(), 33);
        assert_eq!(d[(1, 3, 3)], CORD);
        assert_eq!(d[(5, 3, 3)], CORD);
        assert_eq!(d[(2, 2, 2)], CORD);
        assert_eq!(d[(1, 2, 3)], BACKGROUND);
        assert_eq!(d[(0, 3, 3)], BACKGROUND);
    }

    #[test]
    fn test_dilate_clipped_at_border() {
        let mut m = Array3::<u8>::zeros((3, 3, 3));
        m[(0, 0, 0)] = 5;
        let d = dilate(m.view(), 1);
        assert_eq!(d.iter().filter(|&&p| p == CORD).count(), 4);
        assert_eq!(d[(0, 0, 0)], CORD);
        assert_eq!(d[(0, 0, 1)], CORD);
        assert_eq!(d[(1, 1, 0)], BACKGROUND);
    }

    #[test]
    fn test_dilate_radius_0_binarizes() {
        let mut m = Array3::<u8>::zeros((2, 2, 2));
        m[(1, 0, 1)] = 9;
        let d = dilate(m.view(), 0);
        assert_eq!(d[(1, 0, 1)], CORD);
        assert_eq!(d.sum(), 1);
    }

    #[test]
    fn test_dilate_huge_radius() {
        let mut m = Array3::<u8>::zeros((4, 3, 2));
        m[(3, 0, 1)] = 1;
        assert_eq!(radius_cap(m.dim()), 6);
        let d = dilate(m.view(), u32::MAX);
        assert!(d.iter().all(|&p| p == CORD));
        assert_eq!(d, dilate(m.view(), 6));
    }

    #[test]
    fn test_dilate_is_superset() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(7);
        let m = Array3::from_shape_fn((6, 5, 4), |_| u8::from(rng.random_bool(0.1)));
        let d = dilate(m.view(), 1);
        for (pos, &p) in m.indexed_iter() {
            if p != 0 {
                assert_eq!(d[pos], CORD);
            }
        }
    }
}
