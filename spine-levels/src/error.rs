//! 运行时错误.

use std::path::PathBuf;

use crate::Idx3d;

/// 脊髓节段测量流程中的致命错误.
///
/// 注意 "某个节段与脊髓没有交集" 不属于错误: 该情况以缺失值的形式保留在
/// [`crate::table::LevelRecord`] 中.
#[derive(Debug, thiserror::Error)]
pub enum LevelsError {
    /// 输入文件不存在.
    #[error("input file `{}` does not exist", .0.display())]
    InputNotFound(PathBuf),

    /// 两个本应位于同一体素网格上的体数据形状不一致. 形状以 `(z, h, w)` 表示.
    #[error("shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch {
        /// 左操作数形状.
        left: Idx3d,
        /// 右操作数形状.
        right: Idx3d,
    },

    /// 体数据方向与要求不符, 且调用方不允许重定向.
    #[error("volume is in `{found}` orientation, expected `{expected}`")]
    OrientationAssumptionViolated {
        /// 实际方向.
        found: String,
        /// 期望方向.
        expected: String,
    },

    /// 无法从 header 中确定体数据方向.
    #[error("cannot determine orientation: {0}")]
    UnknownOrientation(String),

    /// 中心线退化 (点数不足, 或参考索引越界).
    #[error("degenerate centerline: {0}")]
    DegenerateCenterline(String),

    /// 中心线文件格式错误.
    #[error("malformed centerline file: {0}")]
    CenterlineFormat(String),

    /// 输入不是 3D 体数据. 参数为 header 中的维数.
    #[error("expected a 3D volume, got {0} dimension(s)")]
    NotVolume3d(usize),

    /// PMJ 标记中没有任何非零体素.
    #[error("landmark volume has no labelled voxel")]
    EmptyLandmark,

    /// 体素值无法表示为 `u8` 标签.
    #[error("voxel value `{0}` is not a valid label")]
    LabelOutOfRange(f32),

    /// nifti 读写错误.
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    /// csv 读写错误.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// 其它 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 本 crate 的 `Result` 别名.
pub type Result<T> = std::result::Result<T, LevelsError>;

/// 若 `path` 不存在则返回 [`LevelsError::InputNotFound`].
pub(crate) fn ensure_exists(path: &std::path::Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(LevelsError::InputNotFound(path.to_owned()))
    }
}
