//! 由椎间盘标记确定椎骨节段.
//!
//! 相邻两个椎间盘之间为一个椎骨节段, 以较头侧的椎间盘编号命名.
//! 结果与脊髓节段共用 [`crate::table`] 的记录格式.
//!
//! 另外, 可以测量每个神经根到 PMJ 以及到同编号椎间盘的曲线距离.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::debug;
use ndarray::ArrayView3;

use crate::centerline::{DistanceTable, SliceMatch};
use crate::consts::label::is_foreground;
use crate::levels::SliceExtent;
use crate::table::RootletDistance;

/// 单个椎间盘标记.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Disc {
    /// 椎间盘编号 (标记值).
    pub label: u8,
    /// 所在轴向切片下标.
    pub slice: usize,
}

/// 每个前景标签所在的最大 (最头侧) 切片下标, 按标签升序.
pub fn top_slices(volume: ArrayView3<u8>) -> BTreeMap<u8, usize> {
    let mut top = BTreeMap::<u8, usize>::new();
    for ((z, _, _), &p) in volume.indexed_iter() {
        if is_foreground(p) {
            top.entry(p).and_modify(|s| *s = (*s).max(z)).or_insert(z);
        }
    }
    top
}

/// 收集所有椎间盘标记, 按头侧到尾侧 (切片下标降序) 排列.
///
/// 同一编号出现在多个体素上时, 取最大的切片下标.
pub fn disc_labels(volume: ArrayView3<u8>) -> Vec<Disc> {
    top_slices(volume)
        .into_iter()
        .map(|(label, slice)| Disc { label, slice })
        .sorted_by(|a, b| b.slice.cmp(&a.slice).then(a.label.cmp(&b.label)))
        .collect()
}

/// 由按头侧到尾侧排列的椎间盘计算椎骨节段范围.
///
/// 每对相邻椎间盘 `(头侧, 尾侧)` 确定一个节段, 编号为头侧椎间盘编号,
/// `start` 为尾侧椎间盘切片, `end` 为头侧椎间盘切片.
/// 少于两个椎间盘时结果为空.
pub fn vertebral_extents(discs: &[Disc]) -> BTreeMap<u8, SliceExtent> {
    discs
        .iter()
        .tuple_windows()
        .map(|(rostral, caudal)| {
            (
                rostral.label,
                SliceExtent {
                    start: caudal.slice,
                    end: rostral.slice,
                },
            )
        })
        .collect()
}

/// 对 `rootlets` 中出现的每个神经根, 测量其到 PMJ 及到同编号椎间盘的曲线距离.
/// 结果按神经根编号升序.
///
/// 神经根的位置取其最头侧切片 (见 [`top_slices`]).
/// 没有同编号椎间盘, 或切片在 `distances` 中找不到匹配时, 对应字段为缺失值.
pub fn rootlet_distances(
    rootlets: ArrayView3<u8>,
    discs: &[Disc],
    distances: &DistanceTable,
    mode: SliceMatch,
    subject: &str,
) -> Vec<RootletDistance> {
    top_slices(rootlets)
        .into_iter()
        .map(|(rootlet, slice)| {
            let distance_pmj = distances.lookup(slice, mode);
            let disc = discs.iter().find(|d| d.label == rootlet);
            let distance_disc = disc
                .and_then(|d| distances.lookup(d.slice, mode))
                .zip(distance_pmj)
                .map(|(d, r)| d - r);
            let r = RootletDistance {
                subject: subject.to_owned(),
                rootlet,
                disc: disc.map(|d| d.label),
                distance_pmj,
                distance_disc,
            };
            debug!("{r:?}");
            r
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::centerline::pmj_distance;
    use ndarray::Array3;

    fn float_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_disc_labels_sorted_rostral_first() {
        let mut v = Array3::<u8>::zeros((30, 3, 3));
        v[(25, 1, 1)] = 2;
        v[(18, 1, 1)] = 3;
        v[(10, 1, 2)] = 4;
        v[(11, 0, 0)] = 4;
        v[(3, 1, 1)] = 5;
        let d = disc_labels(v.view());
        assert_eq!(
            d,
            vec![
                Disc { label: 2, slice: 25 },
                Disc { label: 3, slice: 18 },
                Disc { label: 4, slice: 11 },
                Disc { label: 5, slice: 3 },
            ]
        );
    }

    #[test]
    fn test_vertebral_extents() {
        let discs = [
            Disc { label: 2, slice: 25 },
            Disc { label: 3, slice: 18 },
            Disc { label: 4, slice: 11 },
        ];
        let e = vertebral_extents(&discs);
        assert_eq!(e.len(), 2);
        assert_eq!(e[&2], SliceExtent { start: 18, end: 25 });
        assert_eq!(e[&3], SliceExtent { start: 11, end: 18 });
        assert!(vertebral_extents(&discs[..1]).is_empty());
    }

    #[test]
    fn test_rootlet_distances() {
        let pts: Vec<[f64; 3]> = (0..30).map(|z| [1.0, 1.0, z as f64]).collect();
        let t = pmj_distance(&pts, 29, [1.0, 1.0, 2.0]).unwrap();

        let mut rootlets = Array3::<u8>::zeros((30, 3, 3));
        rootlets[(24, 0, 0)] = 3;
        rootlets[(22, 1, 1)] = 3;
        rootlets[(15, 1, 1)] = 4;
        rootlets[(5, 2, 2)] = 8;
        let discs = [
            Disc { label: 3, slice: 20 },
            Disc { label: 4, slice: 17 },
        ];

        let rs = rootlet_distances(rootlets.view(), &discs, &t, SliceMatch::Nearest, "sub-01");
        assert_eq!(rs.len(), 3);

        // 神经根 3 取最头侧切片 24.
        assert_eq!((rs[0].rootlet, rs[0].disc), (3, Some(3)));
        assert!(float_eq(rs[0].distance_pmj.unwrap(), 10.0));
        assert!(float_eq(rs[0].distance_disc.unwrap(), 8.0));

        // 神经根 4 位于椎间盘 4 尾侧.
        assert!(float_eq(rs[1].distance_pmj.unwrap(), 28.0));
        assert!(float_eq(rs[1].distance_disc.unwrap(), -4.0));

        assert_eq!((rs[2].rootlet, rs[2].disc), (8, None));
        assert!(float_eq(rs[2].distance_pmj.unwrap(), 48.0));
        assert_eq!(rs[2].distance_disc, None);
        assert_eq!(rs[2].subject, "sub-01");
    }
}
