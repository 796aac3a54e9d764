//! 沿中心线的累积曲线距离.

use log::warn;
use ordered_float::OrderedFloat;

use crate::consts::NEAREST_MAX_GAP;
use crate::error::{LevelsError, Result};

/// 切片下标与中心线采样点的匹配方式.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SliceMatch {
    /// 采样点的 z 坐标必须与切片下标完全相等.
    Exact,

    /// 取 z 坐标最近的采样点 (相同距离时取较小下标).
    /// 若最近采样点相差超过 [`NEAREST_MAX_GAP`] 个切片, 视为没有匹配.
    #[default]
    Nearest,
}

/// 稳定的最近邻查找: 返回 `values` 中与 `target` 差的绝对值最小的元素下标.
/// 存在多个最小值时返回最小下标. `values` 为空时返回 `None`.
///
/// NaN 元素被视为比任何有限值都远.
pub fn nearest_index(values: &[f64], target: f64) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| {
            let d = (*v - target).abs();
            OrderedFloat(if d.is_nan() { f64::INFINITY } else { d })
        })
        .map(|(i, _)| i)
}

/// 单个采样点的距离信息.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DistanceEntry {
    /// 该采样点的 z 坐标 (连续切片坐标).
    pub slice: f64,
    /// 从参考点到该采样点的累积曲线距离, 单位为毫米.
    pub distance: f64,
}

/// 中心线下标 `0..=z_ref` 上, 每个采样点到参考点的累积曲线距离.
///
/// 第 `i` 项对应中心线第 `i` 个采样点, 第 `z_ref` 项距离为 0.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceTable {
    entries: Vec<DistanceEntry>,
}

impl DistanceTable {
    /// 所有条目, 按中心线下标排列.
    #[inline]
    pub fn entries(&self) -> &[DistanceEntry] {
        &self.entries
    }

    /// 条目个数, 即 `z_ref + 1`.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空? 由构造方式保证永远为 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 第 `index` 个采样点的距离.
    #[inline]
    pub fn distance_at(&self, index: usize) -> Option<f64> {
        self.entries.get(index).map(|e| e.distance)
    }

    /// 按切片下标查找距离. 没有匹配时返回 `None`.
    pub fn lookup(&self, slice: usize, mode: SliceMatch) -> Option<f64> {
        let target = slice as f64;
        match mode {
            SliceMatch::Exact => self
                .entries
                .iter()
                .find(|e| e.slice == target)
                .map(|e| e.distance),
            SliceMatch::Nearest => {
                let slices: Vec<f64> = self.entries.iter().map(|e| e.slice).collect();
                let i = nearest_index(&slices, target)?;
                let gap = (slices[i] - target).abs();
                if gap > NEAREST_MAX_GAP {
                    warn!("slice {slice}: nearest centerline sample is {gap:.2} slices away");
                    None
                } else {
                    Some(self.entries[i].distance)
                }
            }
        }
    }
}

/// 计算中心线下标 `0..=z_ref` 的每个采样点到 `z_ref` 的累积曲线距离.
///
/// 从 `z_ref` 向下标 0 逐段累加相邻采样点之间的欧氏距离,
/// 每段各分量先乘以体素分辨率 `spacing = [px, py, pz]`:
/// `d = sqrt((Δx·px)² + (Δy·py)² + (Δz·pz)²)`.
///
/// 不检查中心线是否单调.
///
/// # 返回值
///
/// `z_ref` 越界时返回 `Err(LevelsError::DegenerateCenterline)`.
/// `z_ref == 0` 时结果只有一个距离为 0 的条目.
pub fn pmj_distance(
    points: &[[f64; 3]],
    z_ref: usize,
    spacing: [f64; 3],
) -> Result<DistanceTable> {
    if z_ref >= points.len() {
        return Err(LevelsError::DegenerateCenterline(format!(
            "reference index {z_ref} out of range for {} point(s)",
            points.len()
        )));
    }

    let mut acc = 0.0;
    let mut lengths = Vec::with_capacity(z_ref + 1);
    lengths.push(0.0);
    for i in (1..=z_ref).rev() {
        let (a, b) = (points[i], points[i - 1]);
        let seg = (0..3)
            .map(|k| ((a[k] - b[k]) * spacing[k]).powi(2))
            .sum::<f64>()
            .sqrt();
        acc += seg;
        lengths.push(acc);
    }
    lengths.reverse();

    let entries = lengths
        .into_iter()
        .zip(points)
        .map(|(distance, p)| DistanceEntry {
            slice: p[2],
            distance,
        })
        .collect();
    Ok(DistanceTable { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn straight(n: usize) -> Vec<[f64; 3]> {
        (0..n).map(|z| [10.0, 20.0, z as f64]).collect()
    }

    #[test]
    fn test_zero_length_base_case() {
        let t = pmj_distance(&straight(5), 0, [1.0; 3]).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.distance_at(0), Some(0.0));
    }

    /// 直线中心线: 下标 `i` 到参考点 10 的距离恰为 `10 - i`.
    #[test]
    fn test_straight_line() {
        let t = pmj_distance(&straight(11), 10, [1.0; 3]).unwrap();
        assert_eq!(t.len(), 11);
        for i in 0..=10 {
            assert!(float_eq(t.distance_at(i).unwrap(), (10 - i) as f64));
            assert_eq!(t.entries()[i].slice, i as f64);
        }
    }

    #[test]
    fn test_scale_linearity() {
        let pts: Vec<[f64; 3]> = (0..8)
            .map(|i| {
                let t = i as f64;
                [t.sin() * 3.0, (t * 0.5).cos(), t]
            })
            .collect();
        let a = pmj_distance(&pts, 7, [0.8, 0.6, 1.5]).unwrap();
        let b = pmj_distance(&pts, 7, [1.6, 1.2, 3.0]).unwrap();
        for (x, y) in a.entries().iter().zip(b.entries()) {
            assert!(float_eq(2.0 * x.distance, y.distance));
        }
    }

    #[test]
    fn test_anisotropic_segment() {
        let pts = [[0.0, 0.0, 0.0], [3.0, 4.0, 1.0]];
        let t = pmj_distance(&pts, 1, [1.0, 1.0, 0.0]).unwrap();
        assert!(float_eq(t.distance_at(0).unwrap(), 5.0));
        assert_eq!(t.distance_at(1), Some(0.0));
    }

    #[test]
    fn test_reference_out_of_range() {
        let e = pmj_distance(&straight(3), 3, [1.0; 3]).unwrap_err();
        assert!(matches!(e, LevelsError::DegenerateCenterline(_)));
    }

    #[test]
    fn test_nearest_index_ties_to_lower() {
        assert_eq!(nearest_index(&[0.0, 1.0, 2.0, 3.0], 1.5), Some(1));
        assert_eq!(nearest_index(&[5.0, 2.0, 2.0], 2.1), Some(1));
        assert_eq!(nearest_index(&[f64::NAN, 4.0], 0.0), Some(1));
        assert_eq!(nearest_index(&[], 0.0), None);
    }

    #[test]
    fn test_lookup_modes() {
        let pts = vec![[0.0, 0.0, 0.0], [0.0, 0.0, 1.4], [0.0, 0.0, 3.0]];
        let t = pmj_distance(&pts, 2, [1.0; 3]).unwrap();
        assert_eq!(t.lookup(3, SliceMatch::Exact), Some(0.0));
        assert_eq!(t.lookup(1, SliceMatch::Exact), None);
        assert!(float_eq(t.lookup(1, SliceMatch::Nearest).unwrap(), 1.6));
        // 切片 5 与最近的采样点 (z = 3) 相差 2.
        assert_eq!(t.lookup(5, SliceMatch::Nearest), None);
    }
}
