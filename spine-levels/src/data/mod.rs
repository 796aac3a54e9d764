use std::ops::{Index, IndexMut};
use std::path::Path;

use itertools::Itertools;
use ndarray::{Array3, ArrayView, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use num::ToPrimitive;

use crate::consts::label::*;
use crate::error::{ensure_exists, LevelsError, Result};
use crate::Idx3d;

pub mod morph_3d;
pub mod orientation;

use orientation::{affine_from_orientation, reorient, reorient_header, write_sform, Orientation};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// 将读入的浮点体素值转换为 `u8` 标签. 结果四舍五入.
#[inline]
fn to_label(v: f32) -> Result<u8> {
    v.round().to_u8().ok_or(LevelsError::LabelOutOfRange(v))
}

/// 3D nii 文件 header 的共用属性和部分通用操作.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小.
    #[inline]
    fn shape(&self) -> Idx3d {
        get_shape_from_header(self.header())
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 获取单个体素分辨率, 以毫米为单位, 按 `(z, h, w)` 排列.
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [_, w, h, z, ..] = self.header().pixdim;
        [z as f64, h as f64, w as f64]
    }

    /// 获取单个体素分辨率, 以毫米为单位, 按 nifti 的 `(x, y, z)` 排列.
    ///
    /// 中心线坐标以该顺序给出, 因此曲线距离计算使用该值.
    #[inline]
    fn spacing(&self) -> [f64; 3] {
        let [z, h, w] = self.pix_dim();
        [w, h, z]
    }

    /// 从 header 推断体数据方向.
    #[inline]
    fn orientation(&self) -> Result<Orientation> {
        Orientation::from_header(self.header())
    }
}

/// nii 格式 3D 标签体数据, 包括 header 和标签. 标签值以 `u8` 保存, 0 为背景.
///
/// 神经根分割, 脊髓分割, PMJ 标记和椎间盘标记都以该结构表示.
#[derive(Debug, Clone)]
pub struct LabelVolume {
    header: BoxedHeader,
    data: Array3<u8>,
}

impl NiftiHeaderAttr for LabelVolume {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for LabelVolume {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for LabelVolume {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl LabelVolume {
    /// 打开 nii (或 nii.gz) 文件格式的 3D 标签. `path` 为文件的本地路径.
    ///
    /// 体素值被四舍五入为 `u8`; 无法表示的值返回
    /// `Err(LevelsError::LabelOutOfRange)`. 文件不存在时返回
    /// `Err(LevelsError::InputNotFound)`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        ensure_exists(path)?;
        let obj = ReaderOptions::new().read_file(path)?;
        let header = Box::new(obj.header().clone());
        let shape = get_shape_from_header(&header);

        // [W, H, z, (1..)] -> [(1..), z, H, W].
        let data = obj.into_volume().into_ndarray::<f32>()?;
        let rev: Vec<usize> = (0..data.ndim()).rev().collect();
        let data = data.permuted_axes(rev);
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        if data.len() != shape.0 * shape.1 * shape.2 {
            return Err(LevelsError::NotVolume3d(header.dim[0] as usize));
        }

        let raw = data
            .into_raw_vec()
            .into_iter()
            .map(to_label)
            .collect::<Result<Vec<u8>>>()?;
        let data = Array3::from_shape_vec(shape, raw)
            .map_err(|_| LevelsError::NotVolume3d(header.dim[0] as usize))?;

        Ok(Self { header, data })
    }

    /// 根据裸标签数据和部分元信息直接创建 `LabelVolume` 实体.
    ///
    /// # 参数
    ///
    /// 1. `data` 按照 nifti 惯用标准以 \[w, h, z\] 格式存储.
    /// 2. `pix_dim` 按照 \[w, h, z\] 格式存储, 单位为毫米.
    /// 3. `orientation` 写入 header 的 sform, 不含平移.
    pub fn from_raw(data: Array3<u8>, pix_dim: [f32; 3], orientation: Orientation) -> Self {
        let (w, h, z) = data.dim();
        let data = data.permuted_axes([2, 1, 0]);
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };

        let mut header = Box::<NiftiHeader>::default();
        header.dim = [3, w as _, h as _, z as _, 1, 1, 1, 1];
        header.pixdim = [1.0, pix_dim[0], pix_dim[1], pix_dim[2], 1.0, 1.0, 1.0, 1.0];
        header.qform_code = 0;
        header.sform_code = 1;
        let affine = affine_from_orientation(orientation, pix_dim.map(f64::from));
        write_sform(&mut header, &affine);

        Self { header, data }
    }

    /// 在与 `self` 相同的体素网格 (及 header) 上创建新的标签体数据.
    /// `data` 按 `(z, h, w)` 排列. 形状不一致时返回 `Err(LevelsError::ShapeMismatch)`.
    pub fn with_data(&self, data: Array3<u8>) -> Result<Self> {
        if data.dim() != self.shape() {
            return Err(LevelsError::ShapeMismatch {
                left: self.shape(),
                right: data.dim(),
            });
        }
        Ok(Self {
            header: self.header.clone(),
            data,
        })
    }

    /// 以 `self.header` 为参考 header, 将标签保存为 nii (或 nii.gz) 文件.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        // [z, H, W] -> [W, H, z]
        WriterOptions::new(path.as_ref())
            .reference_header(&self.header)
            .write_nifti(&self.data.view().permuted_axes([2, 1, 0]))?;
        Ok(())
    }

    /// 检查 `other` 是否与 `self` 位于相同形状的体素网格上.
    pub fn check_same_grid(&self, other: &impl NiftiHeaderAttr) -> Result<()> {
        if self.shape() == other.shape() {
            Ok(())
        } else {
            Err(LevelsError::ShapeMismatch {
                left: self.shape(),
                right: other.shape(),
            })
        }
    }

    /// 返回重定向到 `to` 方向后的新体数据. `self` 不会被修改.
    ///
    /// 无法推断 `self` 的方向时返回 `Err(LevelsError::UnknownOrientation)`.
    pub fn reoriented(&self, to: Orientation) -> Result<Self> {
        let from = self.orientation()?;
        if from == to {
            return Ok(self.clone());
        }
        let data = reorient(self.data.view(), from, to);
        let header = Box::new(reorient_header(&self.header, from, to));
        debug_assert_eq!(data.dim(), get_shape_from_header(&header));
        Ok(Self { header, data })
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u8, Ix3> {
        self.data.view()
    }

    /// 获取 3D 标签中值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u8) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }

    /// 获取所有出现过的非零标签, 升序且去重.
    pub fn levels(&self) -> Vec<u8> {
        self.data
            .iter()
            .copied()
            .filter(|&p| is_foreground(p))
            .unique()
            .sorted_unstable()
            .collect()
    }

    /// 是否不包含任何前景体素?
    #[inline]
    pub fn is_background(&self) -> bool {
        self.data.iter().all(|&p| is_background(p))
    }

    /// 获取二值化的副本: 所有非零体素置为 [`CORD`].
    pub fn binarized(&self) -> Self {
        Self {
            header: self.header.clone(),
            data: self
                .data
                .mapv(|p| if is_foreground(p) { CORD } else { BACKGROUND }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("spine-levels-{}-{name}", std::process::id()));
        p
    }

    /// `(w, h, z) = (2, 3, 4)`, 值为 nifti 线性下标 (Fortran 序) 对 7 取余.
    fn small_volume() -> LabelVolume {
        let raw = Array3::from_shape_fn((2, 3, 4), |(w, h, z)| ((w + 2 * h + 6 * z) % 7) as u8);
        LabelVolume::from_raw(raw, [0.5, 0.5, 2.0], Orientation::RPI)
    }

    #[test]
    fn test_from_raw_layout() {
        let v = small_volume();
        assert_eq!(v.shape(), (4, 3, 2));
        assert_eq!(v[(3, 2, 1)], ((1 + 2 * 2 + 6 * 3) % 7) as u8);
        assert_eq!(v.spacing(), [0.5, 0.5, 2.0]);
        assert_eq!(v.pix_dim(), [2.0, 0.5, 0.5]);
        assert_eq!(v.orientation().unwrap(), Orientation::RPI);
        assert!(v.data().is_standard_layout());
    }

    #[test]
    fn test_levels_and_binarized() {
        let v = small_volume();
        assert_eq!(v.levels(), vec![1, 2, 3, 4, 5, 6]);
        let b = v.binarized();
        assert_eq!(b.levels(), vec![CORD]);
        assert_eq!(b.count(CORD), v.size() - v.count(BACKGROUND));
    }

    #[test]
    fn test_with_data_shape_mismatch() {
        let v = small_volume();
        let e = v.with_data(Array3::zeros((1, 2, 3))).unwrap_err();
        assert!(matches!(e, LevelsError::ShapeMismatch { .. }));
        assert!(v.with_data(Array3::zeros((4, 3, 2))).is_ok());
    }

    #[test]
    fn test_reoriented_does_not_touch_input() {
        let raw = Array3::from_shape_fn((3, 1, 1), |(w, _, _)| w as u8 + 1);
        let v = LabelVolume::from_raw(raw, [1.0; 3], Orientation::LPI);
        let r = v.reoriented(Orientation::RPI).unwrap();
        assert_eq!(v.data().iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(r.data().iter().copied().collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(r.orientation().unwrap(), Orientation::RPI);
    }

    #[test]
    fn test_open_missing_file() {
        let e = LabelVolume::open(temp_path("does-not-exist.nii.gz")).unwrap_err();
        assert!(matches!(e, LevelsError::InputNotFound(_)));
    }

    #[test]
    fn test_save_and_open() {
        let v = small_volume();
        let path = temp_path("roundtrip.nii.gz");
        v.save(&path).unwrap();
        let back = LabelVolume::open(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(back.shape(), v.shape());
        assert_eq!(back.data(), v.data());
        assert_eq!(back.spacing(), v.spacing());
        assert_eq!(back.orientation().unwrap(), Orientation::RPI);
    }
}
