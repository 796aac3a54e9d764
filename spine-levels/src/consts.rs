//! 通用常量.

/// 单通道标签值.
pub mod label {
    /// 背景的体素值.
    pub const BACKGROUND: u8 = 0;

    /// 二值脊髓分割中, 脊髓 (前景) 的体素值.
    pub const CORD: u8 = 1;

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, BACKGROUND)
    }

    /// 体素是否是前景 (任意非零标签)?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        !is_background(p)
    }
}

/// 脊髓分割默认的膨胀半径, 以体素为单位.
pub const DEFAULT_DILATION: u32 = 2;

/// 命令行允许的最大膨胀半径, 以体素为单位.
pub const MAX_DILATION: u32 = 64;

/// 最近邻切片匹配时允许的最大切片差. 超过该值视为没有匹配.
pub const NEAREST_MAX_GAP: f64 = 1.0;

/// 输出测量表的表头, 顺序固定.
pub const TABLE_HEADER: [&str; 7] = [
    "spinal_level",
    "fname",
    "slice_start",
    "slice_end",
    "distance_from_pmj_start",
    "distance_from_pmj_end",
    "height",
];

/// 神经根距离表的表头, 顺序固定.
pub const DISTANCE_HEADER: [&str; 5] = [
    "subject",
    "rootlet",
    "disc",
    "distance_from_pmj",
    "distance_from_disc",
];
