//! 体数据方向.
//!
//! 方向使用三个字母描述, 每个字母对应一个 nifti 体素轴 (i, j, k),
//! 表示该轴 **出发** 的解剖方位. 例如 `RPI` 表示:
//!
//! 1. i 轴从右 (Right) 指向左;
//! 2. j 轴从后 (Posterior) 指向前;
//! 3. k 轴从下 (Inferior) 指向上.
//!
//! nifti 世界坐标系是 RAS+ 的 (x 轴指向右, y 轴指向前, z 轴指向上),
//! 因此单位仿射矩阵对应的方向为 `LPI`.
//!
//! 注意 [`crate::LabelVolume`] 内部按 `(z, h, w)` 即 `(k, j, i)` 存储体素,
//! 这里所有的轴编号都是 nifti 原始的 `(i, j, k)` 编号.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ndarray::{Array3, ArrayView3, Axis};
use nifti::NiftiHeader;

use crate::error::{LevelsError, Result};

/// 4x4 仿射矩阵, 将 `(i, j, k, 1)` 映射为 RAS+ 世界坐标.
pub type Affine = [[f64; 4]; 4];

/// 单个轴的出发方位.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AxisCode {
    /// 右.
    R,
    /// 左.
    L,
    /// 前.
    A,
    /// 后.
    P,
    /// 下.
    I,
    /// 上.
    S,
}

impl AxisCode {
    /// 相反方位.
    #[inline]
    pub const fn opposite(self) -> Self {
        use AxisCode::*;
        match self {
            R => L,
            L => R,
            A => P,
            P => A,
            I => S,
            S => I,
        }
    }

    /// 所在的解剖轴: 左右为 0, 前后为 1, 上下为 2.
    #[inline]
    pub const fn anatomical_axis(self) -> usize {
        use AxisCode::*;
        match self {
            R | L => 0,
            A | P => 1,
            I | S => 2,
        }
    }

    /// 从单个字母解析 (大小写不敏感).
    pub fn from_char(c: char) -> Option<Self> {
        use AxisCode::*;
        match c.to_ascii_uppercase() {
            'R' => Some(R),
            'L' => Some(L),
            'A' => Some(A),
            'P' => Some(P),
            'I' => Some(I),
            'S' => Some(S),
            _ => None,
        }
    }

    /// 对应的大写字母.
    #[inline]
    pub const fn as_char(self) -> char {
        use AxisCode::*;
        match self {
            R => 'R',
            L => 'L',
            A => 'A',
            P => 'P',
            I => 'I',
            S => 'S',
        }
    }

    /// 世界坐标轴 `axis` 上的方向向量 (符号为 `positive`) 所 **指向** 的方位,
    /// 取反即得出发方位.
    #[inline]
    fn from_world_direction(axis: usize, positive: bool) -> Self {
        use AxisCode::*;
        let toward = match (axis, positive) {
            (0, true) => R,
            (0, false) => L,
            (1, true) => A,
            (1, false) => P,
            (_, true) => S,
            (_, false) => I,
        };
        toward.opposite()
    }
}

/// 三个 nifti 体素轴的方位.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Orientation([AxisCode; 3]);

impl Orientation {
    /// 流程要求的 `RPI` 方向.
    pub const RPI: Self = Self([AxisCode::R, AxisCode::P, AxisCode::I]);

    /// 单位仿射矩阵对应的 `LPI` 方向.
    pub const LPI: Self = Self([AxisCode::L, AxisCode::P, AxisCode::I]);

    /// 由三个方位构建. 如果两个轴落在同一解剖轴上, 则返回 `None`.
    pub fn new(codes: [AxisCode; 3]) -> Option<Self> {
        let mut seen = [false; 3];
        for c in codes {
            let a = c.anatomical_axis();
            if seen[a] {
                return None;
            }
            seen[a] = true;
        }
        Some(Self(codes))
    }

    /// 获取 `(i, j, k)` 三个轴的方位.
    #[inline]
    pub fn codes(&self) -> [AxisCode; 3] {
        self.0
    }

    /// 从仿射矩阵推断方向. 每个体素轴取其方向向量中绝对值最大的世界分量.
    pub fn from_affine(affine: &Affine) -> Result<Self> {
        let mut codes = [AxisCode::R; 3];
        for (col, code) in codes.iter_mut().enumerate() {
            let v = [affine[0][col], affine[1][col], affine[2][col]];
            if v.iter().any(|x| !x.is_finite()) {
                return Err(LevelsError::UnknownOrientation(format!(
                    "non-finite affine column {col}: {v:?}"
                )));
            }
            let (axis, value) = v
                .iter()
                .copied()
                .enumerate()
                .fold((0, 0.0f64), |(ba, bv), (a, x)| {
                    if x.abs() > bv.abs() {
                        (a, x)
                    } else {
                        (ba, bv)
                    }
                });
            if value == 0.0 {
                return Err(LevelsError::UnknownOrientation(format!(
                    "zero affine column {col}"
                )));
            }
            *code = AxisCode::from_world_direction(axis, value > 0.0);
        }
        Self::new(codes).ok_or_else(|| {
            LevelsError::UnknownOrientation(format!(
                "two voxel axes share one anatomical axis: {}{}{}",
                codes[0].as_char(),
                codes[1].as_char(),
                codes[2].as_char()
            ))
        })
    }

    /// 从 nifti 元数据 `header` 中推断方向.
    #[inline]
    pub fn from_header(header: &NiftiHeader) -> Result<Self> {
        Self::from_affine(&header_affine(header))
    }
}

impl Display for Orientation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{}{}{}", a.as_char(), b.as_char(), c.as_char())
    }
}

impl FromStr for Orientation {
    type Err = LevelsError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || LevelsError::UnknownOrientation(format!("invalid orientation string `{s}`"));
        let mut chars = s.chars().map(AxisCode::from_char);
        let (Some(Some(a)), Some(Some(b)), Some(Some(c)), None) =
            (chars.next(), chars.next(), chars.next(), chars.next())
        else {
            return Err(bad());
        };
        Self::new([a, b, c]).ok_or_else(bad)
    }
}

/// 按 nifti 规范计算体素到世界坐标的仿射矩阵.
///
/// 1. `sform_code > 0` 时使用 `srow_*`;
/// 2. 否则 `qform_code > 0` 时使用四元数 (考虑 `qfac`);
/// 3. 否则仅使用 `pixdim` 缩放.
pub fn header_affine(h: &NiftiHeader) -> Affine {
    let pix = [h.pixdim[1] as f64, h.pixdim[2] as f64, h.pixdim[3] as f64];
    if h.sform_code > 0 {
        let row = |r: &[f32; 4]| [r[0] as f64, r[1] as f64, r[2] as f64, r[3] as f64];
        return [
            row(&h.srow_x),
            row(&h.srow_y),
            row(&h.srow_z),
            [0.0, 0.0, 0.0, 1.0],
        ];
    }
    if h.qform_code > 0 {
        let (mut b, mut c, mut d) = (h.quatern_b as f64, h.quatern_c as f64, h.quatern_d as f64);
        let a2 = 1.0 - (b * b + c * c + d * d);
        let a = if a2 < 1e-7 {
            // 纯 180 度旋转, 重新归一化 (b, c, d).
            let n = (b * b + c * c + d * d).sqrt();
            (b, c, d) = (b / n, c / n, d / n);
            0.0
        } else {
            a2.sqrt()
        };
        let qfac = if h.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let r = [
            [
                a * a + b * b - c * c - d * d,
                2.0 * (b * c - a * d),
                2.0 * (b * d + a * c),
            ],
            [
                2.0 * (b * c + a * d),
                a * a + c * c - b * b - d * d,
                2.0 * (c * d - a * b),
            ],
            [
                2.0 * (b * d - a * c),
                2.0 * (c * d + a * b),
                a * a + d * d - c * c - b * b,
            ],
        ];
        let scale = [pix[0], pix[1], pix[2] * qfac];
        let t = [h.quatern_x as f64, h.quatern_y as f64, h.quatern_z as f64];
        let mut m = [[0.0; 4]; 4];
        for row in 0..3 {
            for col in 0..3 {
                m[row][col] = r[row][col] * scale[col];
            }
            m[row][3] = t[row];
        }
        m[3][3] = 1.0;
        return m;
    }
    [
        [pix[0], 0.0, 0.0, 0.0],
        [0.0, pix[1], 0.0, 0.0],
        [0.0, 0.0, pix[2], 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// 由方向和体素分辨率构建一个不含平移的仿射矩阵.
pub fn affine_from_orientation(o: Orientation, pix_dim: [f64; 3]) -> Affine {
    let mut m = [[0.0; 4]; 4];
    for (col, code) in o.codes().into_iter().enumerate() {
        // 出发方位的反方向才是轴所指向的方位.
        let toward = code.opposite();
        let sign = match toward {
            AxisCode::R | AxisCode::A | AxisCode::S => 1.0,
            _ => -1.0,
        };
        m[toward.anatomical_axis()][col] = sign * pix_dim[col];
    }
    m[3][3] = 1.0;
    m
}

/// 计算从 `from` 到 `to` 的轴映射. 对目标轴 `t`, 其数据来自源轴 `perm[t]`,
/// 且当 `flip[t]` 为 `true` 时需要反转.
fn axis_mapping(from: Orientation, to: Orientation) -> ([usize; 3], [bool; 3]) {
    let mut perm = [0; 3];
    let mut flip = [false; 3];
    for (t, target) in to.codes().into_iter().enumerate() {
        // `Orientation` 保证三个解剖轴互不相同, 因此一定能找到.
        let (s, source) = from
            .codes()
            .into_iter()
            .enumerate()
            .find(|(_, c)| c.anatomical_axis() == target.anatomical_axis())
            .unwrap_or((t, target));
        perm[t] = s;
        flip[t] = source != target;
    }
    (perm, flip)
}

/// 将 `(z, h, w)` 排列的体素数据从 `from` 方向重定向到 `to` 方向.
///
/// 该函数是纯函数, 不修改输入. 返回值同样按 `(z, h, w)` 排列, 且为标准内存布局.
pub fn reorient<A: Clone>(
    data: ArrayView3<'_, A>,
    from: Orientation,
    to: Orientation,
) -> Array3<A> {
    let (perm, flip) = axis_mapping(from, to);
    // (z, h, w) -> (i, j, k) -> 目标轴顺序.
    let mut v = data.permuted_axes([2, 1, 0]).permuted_axes(perm);
    for (t, f) in flip.into_iter().enumerate() {
        if f {
            v.invert_axis(Axis(t));
        }
    }
    v.permuted_axes([2, 1, 0]).as_standard_layout().into_owned()
}

/// 4x4 矩阵乘法.
fn mat4_mul(a: &Affine, b: &Affine) -> Affine {
    let mut m = [[0.0; 4]; 4];
    for (r, row) in m.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = (0..4).map(|k| a[r][k] * b[k][c]).sum();
        }
    }
    m
}

/// 生成与 [`reorient`] 结果一致的新 header: 交换 `dim`, `pixdim`,
/// 并以 sform 形式写入新的仿射矩阵 (qform 被清除).
pub(crate) fn reorient_header(h: &NiftiHeader, from: Orientation, to: Orientation) -> NiftiHeader {
    let (perm, flip) = axis_mapping(from, to);
    let old_affine = header_affine(h);

    // 新索引 -> 旧索引.
    let mut t = [[0.0; 4]; 4];
    t[3][3] = 1.0;
    for (new_axis, (&old_axis, &f)) in perm.iter().zip(flip.iter()).enumerate() {
        let n = h.dim[old_axis + 1] as f64;
        if f {
            t[old_axis][new_axis] = -1.0;
            t[old_axis][3] = n - 1.0;
        } else {
            t[old_axis][new_axis] = 1.0;
        }
    }
    let affine = mat4_mul(&old_affine, &t);

    let mut out = h.clone();
    for (new_axis, &old_axis) in perm.iter().enumerate() {
        out.dim[new_axis + 1] = h.dim[old_axis + 1];
        out.pixdim[new_axis + 1] = h.pixdim[old_axis + 1];
    }
    write_sform(&mut out, &affine);
    if out.sform_code <= 0 {
        out.sform_code = if h.qform_code > 0 { h.qform_code } else { 1 };
    }
    out.qform_code = 0;
    out
}

/// 将仿射矩阵写入 `srow_*`.
pub(crate) fn write_sform(h: &mut NiftiHeader, affine: &Affine) {
    let row = |r: &[f64; 4]| [r[0] as f32, r[1] as f32, r[2] as f32, r[3] as f32];
    h.srow_x = row(&affine[0]);
    h.srow_y = row(&affine[1]);
    h.srow_z = row(&affine[2]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn header_with(o: Orientation, dims: [usize; 3], pix: [f64; 3]) -> NiftiHeader {
        let mut h = NiftiHeader::default();
        h.dim = [3, dims[0] as _, dims[1] as _, dims[2] as _, 1, 1, 1, 1];
        h.pixdim = [1.0, pix[0] as f32, pix[1] as f32, pix[2] as f32, 1.0, 1.0, 1.0, 1.0];
        h.sform_code = 1;
        h.qform_code = 0;
        write_sform(&mut h, &affine_from_orientation(o, pix));
        h
    }

    #[test]
    fn test_orientation_parse_and_display() {
        let o: Orientation = "rpi".parse().unwrap();
        assert_eq!(o, Orientation::RPI);
        assert_eq!(o.to_string(), "RPI");

        assert!("RRI".parse::<Orientation>().is_err());
        assert!("RP".parse::<Orientation>().is_err());
        assert!("RPIS".parse::<Orientation>().is_err());
        assert!("RPX".parse::<Orientation>().is_err());
    }

    /// 单位仿射矩阵为 `LPI`, x 轴取反为 `RPI`.
    #[test]
    fn test_orientation_from_affine() {
        let mut m = affine_from_orientation(Orientation::LPI, [1.0; 3]);
        assert_eq!(m[0][0], 1.0);
        assert_eq!(Orientation::from_affine(&m).unwrap(), Orientation::LPI);

        m[0][0] = -0.8;
        assert_eq!(Orientation::from_affine(&m).unwrap(), Orientation::RPI);

        // 两个体素轴同时指向 z.
        let bad = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        assert!(Orientation::from_affine(&bad).is_err());
    }

    /// 不设置任何 form 时退化为 pixdim 缩放.
    #[test]
    fn test_orientation_from_default_header() {
        let mut h = NiftiHeader::default();
        h.pixdim = [1.0, 0.5, 0.5, 2.0, 1.0, 1.0, 1.0, 1.0];
        h.sform_code = 0;
        h.qform_code = 0;
        assert_eq!(Orientation::from_header(&h).unwrap(), Orientation::LPI);
    }

    /// 绕 z 轴 180 度的四元数 (0, 0, 1) 将 x, y 同时取反.
    #[test]
    fn test_orientation_from_qform() {
        let mut h = NiftiHeader::default();
        h.pixdim = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        h.sform_code = 0;
        h.qform_code = 1;
        (h.quatern_b, h.quatern_c, h.quatern_d) = (0.0, 0.0, 1.0);
        assert_eq!(Orientation::from_header(&h).unwrap().to_string(), "RAI");

        // qfac = -1 翻转 k 轴.
        h.pixdim[0] = -1.0;
        assert_eq!(Orientation::from_header(&h).unwrap().to_string(), "RAS");
    }

    #[test]
    fn test_reorient_flip_only() {
        // (z, h, w) = (1, 1, 3)
        let data = Array3::from_shape_vec((1, 1, 3), vec![1u8, 2, 3]).unwrap();
        let out = reorient(data.view(), Orientation::LPI, Orientation::RPI);
        assert_eq!(out.into_raw_vec(), vec![3, 2, 1]);
    }

    #[test]
    fn test_reorient_roundtrip_is_identity() {
        let data = Array3::from_shape_fn((4, 3, 2), |(z, h, w)| (z * 6 + h * 2 + w) as u8);
        let from: Orientation = "ASL".parse().unwrap();
        let there = reorient(data.view(), from, Orientation::RPI);
        // ASL: i 前后, j 上下, k 左右. 重定向后 (i, j, k) 的长度为 (4, 2, 3).
        assert_eq!(there.dim(), (3, 2, 4));
        let back = reorient(there.view(), Orientation::RPI, from);
        assert_eq!(back, data);
    }

    /// 重定向后, 同一体素在新旧 header 下的世界坐标必须一致.
    #[test]
    fn test_reorient_header_keeps_world_coordinates() {
        let from: Orientation = "SAL".parse().unwrap();
        let h = header_with(from, [4, 3, 2], [2.0, 1.0, 0.5]);
        let h2 = reorient_header(&h, from, Orientation::RPI);
        assert_eq!(Orientation::from_header(&h2).unwrap(), Orientation::RPI);
        let dims: Vec<usize> = h2.dim[1..4].iter().map(|&v| v as usize).collect();
        assert_eq!(dims, vec![2, 3, 4]);
        assert_eq!(h2.pixdim[1..4], [0.5, 1.0, 2.0]);

        let (perm, flip) = axis_mapping(from, Orientation::RPI);
        let (a1, a2) = (header_affine(&h), header_affine(&h2));
        let world = |m: &Affine, p: [f64; 3]| {
            [0, 1, 2].map(|r| m[r][0] * p[0] + m[r][1] * p[1] + m[r][2] * p[2] + m[r][3])
        };
        let new_idx = [1.0, 2.0, 3.0];
        let mut old_idx = [0.0; 3];
        for t in 0..3 {
            let n = h.dim[perm[t] + 1] as f64;
            old_idx[perm[t]] = if flip[t] { n - 1.0 - new_idx[t] } else { new_idx[t] };
        }
        let (w1, w2) = (world(&a1, old_idx), world(&a2, new_idx));
        for r in 0..3 {
            assert!((w1[r] - w2[r]).abs() < 1e-5, "{w1:?} vs {w2:?}");
        }
    }
}
