//! 脊髓中心线.
//!
//! 中心线是按轴向切片排列的一系列连续体素坐标 `(x, y, z)`, 每个轴向切片一个采样点.
//! 该模块负责读取中心线文件, 确定参考点 (PMJ 在中心线上的投影) 并计算累积曲线距离.

use std::cmp::Reverse;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use log::debug;
use ordered_float::OrderedFloat;

use crate::error::{ensure_exists, LevelsError, Result};

mod distance;

pub use distance::{nearest_index, pmj_distance, DistanceEntry, DistanceTable, SliceMatch};

/// 根据首行内容猜测分隔符: 制表符多于逗号时为 `\t`, 否则为 `,`.
fn detect_delimiter(path: &Path) -> Result<u8> {
    let mut first_line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first_line)?;

    let tabs = first_line.matches('\t').count();
    let commas = first_line.matches(',').count();
    Ok(if tabs > commas { b'\t' } else { b',' })
}

/// 脊髓中心线, 坐标为连续体素坐标 (RPI 方向).
#[derive(Clone, Debug, PartialEq)]
pub struct Centerline {
    points: Vec<[f64; 3]>,
}

impl Centerline {
    /// 由采样点序列创建中心线.
    ///
    /// 少于 2 个点时返回 `Err(LevelsError::DegenerateCenterline)`,
    /// 存在非有限坐标时返回 `Err(LevelsError::CenterlineFormat)`.
    pub fn new(points: Vec<[f64; 3]>) -> Result<Self> {
        if points.len() < 2 {
            return Err(LevelsError::DegenerateCenterline(format!(
                "need at least 2 points, got {}",
                points.len()
            )));
        }
        if let Some(i) = points.iter().position(|p| p.iter().any(|v| !v.is_finite())) {
            return Err(LevelsError::CenterlineFormat(format!(
                "point {i} has a non-finite coordinate"
            )));
        }
        Ok(Self { points })
    }

    /// 由表格数据创建中心线. 自动识别 3×N 和 N×3 两种布局, 3×3 按 3×N 处理.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        if let Some(i) = rows.iter().position(|r| r.len() != n_cols) {
            return Err(LevelsError::CenterlineFormat(format!(
                "row {i} has {} column(s), expected {n_cols}",
                rows[i].len()
            )));
        }

        let points = if n_rows == 3 {
            debug!("centerline layout: 3x{n_cols}");
            (0..n_cols)
                .map(|j| [rows[0][j], rows[1][j], rows[2][j]])
                .collect()
        } else if n_cols == 3 {
            debug!("centerline layout: {n_rows}x3");
            rows.into_iter().map(|r| [r[0], r[1], r[2]]).collect()
        } else {
            return Err(LevelsError::CenterlineFormat(format!(
                "expected a 3xN or Nx3 table, got {n_rows}x{n_cols}"
            )));
        };
        Self::new(points)
    }

    /// 读取逗号 (或制表符) 分隔, 不含表头的中心线文件.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        ensure_exists(path)?;
        let delimiter = detect_delimiter(path)?;

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .trim(Trim::All)
            .from_path(path)?;

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row = record
                .iter()
                .filter(|f| !f.is_empty())
                .map(|f| {
                    f.parse::<f64>().map_err(|_| {
                        LevelsError::CenterlineFormat(format!("row {i}: `{f}` is not a number"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            if !row.is_empty() {
                rows.push(row);
            }
        }
        Self::from_rows(rows)
    }

    /// 采样点序列.
    #[inline]
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// 采样点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否为空? 由构造方式保证永远为 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 所有采样点的 z 坐标.
    pub fn z_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p[2]).collect()
    }

    /// z 坐标最大的采样点下标 (RPI 方向下最头侧). 存在多个最大值时取最小下标.
    pub fn top_index(&self) -> usize {
        self.points
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| Reverse(OrderedFloat(p[2])))
            .map_or(0, |(i, _)| i)
    }

    /// z 坐标与 `slice` 最接近的采样点下标. 存在多个时取最小下标.
    pub fn nearest_index(&self, slice: f64) -> usize {
        nearest_index(&self.z_values(), slice).unwrap_or(0)
    }

    /// 参考点下标: 给定 PMJ 所在切片时取最近的采样点, 否则取 [`Self::top_index`].
    pub fn reference_index(&self, pmj_slice: Option<usize>) -> usize {
        match pmj_slice {
            Some(s) => self.nearest_index(s as f64),
            None => self.top_index(),
        }
    }

    /// 计算下标 `0..=z_ref` 的采样点到 `z_ref` 的累积曲线距离. 详见 [`pmj_distance`].
    #[inline]
    pub fn distance_from(&self, z_ref: usize, spacing: [f64; 3]) -> Result<DistanceTable> {
        pmj_distance(&self.points, z_ref, spacing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("spine-levels-{}-{name}", std::process::id()));
        let mut f = File::create(&p).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        p
    }

    #[test]
    fn test_layout_3xn() {
        let c = Centerline::from_rows(vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![5.0, 6.0, 7.0, 8.0],
            vec![0.0, 1.0, 2.0, 3.0],
        ])
        .unwrap();
        assert_eq!(c.len(), 4);
        assert_eq!(c.points()[2], [3.0, 7.0, 2.0]);
    }

    #[test]
    fn test_layout_nx3_and_3x3() {
        let c = Centerline::from_rows(vec![vec![1.0, 2.0, 0.0], vec![1.0, 2.0, 1.0]]).unwrap();
        assert_eq!(c.points()[1], [1.0, 2.0, 1.0]);

        // 3×3 视为 3×N.
        let c = Centerline::from_rows(vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ])
        .unwrap();
        assert_eq!(c.points()[0], [1.0, 4.0, 7.0]);
    }

    #[test]
    fn test_bad_layouts() {
        let e = Centerline::from_rows(vec![vec![1.0, 2.0]; 4]).unwrap_err();
        assert!(matches!(e, LevelsError::CenterlineFormat(_)));
        let e = Centerline::from_rows(vec![vec![1.0, 2.0, 3.0], vec![1.0]]).unwrap_err();
        assert!(matches!(e, LevelsError::CenterlineFormat(_)));
        let e = Centerline::from_rows(vec![vec![1.0], vec![2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(e, LevelsError::DegenerateCenterline(_)));
        let e = Centerline::from_rows(vec![]).unwrap_err();
        assert!(matches!(e, LevelsError::CenterlineFormat(_)));
    }

    #[test]
    fn test_reference_index() {
        let c = Centerline::new(vec![
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 4.0],
            [0.0, 0.0, 4.0],
            [0.0, 0.0, 2.0],
        ])
        .unwrap();
        assert_eq!(c.top_index(), 1);
        assert_eq!(c.reference_index(None), 1);
        assert_eq!(c.reference_index(Some(3)), 1);
        assert_eq!(c.reference_index(Some(1)), 0);
    }

    #[test]
    fn test_open_comma_and_tab() {
        let p = temp_file("cl-comma.csv", "1.0,2.0,3.0\n4.0,5.0,6.0\n0,1,2\n");
        let c = Centerline::open(&p).unwrap();
        std::fs::remove_file(&p).ok();
        assert_eq!(c.points()[1], [2.0, 5.0, 1.0]);

        let p = temp_file("cl-tab.csv", "1\t2\t0\n1\t2\t1\n1\t2.5\t2\n1\t3\t3\n");
        let c = Centerline::open(&p).unwrap();
        std::fs::remove_file(&p).ok();
        assert_eq!(c.len(), 4);
        assert_eq!(c.points()[2], [1.0, 2.5, 2.0]);
    }

    #[test]
    fn test_open_errors() {
        let missing = std::env::temp_dir().join("spine-levels-no-such.csv");
        let e = Centerline::open(missing).unwrap_err();
        assert!(matches!(e, LevelsError::InputNotFound(_)));

        let p = temp_file("cl-bad.csv", "1,2,x\n4,5,6\n");
        let e = Centerline::open(&p).unwrap_err();
        std::fs::remove_file(&p).ok();
        assert!(matches!(e, LevelsError::CenterlineFormat(_)));
    }
}
