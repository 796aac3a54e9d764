#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 根据神经根分割确定脊髓节段, 并沿脊髓中心线测量各节段到 PMJ
//! (脑桥延髓交界) 的曲线距离.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 所有计算都在 RPI 方向下进行. 其它方向的输入会被重定向
//!   (或在 [`pipeline::LevelsConfig::allow_reorient`] 为 `false` 时报错).
//! 2. 体数据在内存中按 `(z, h, w)` 排列, 即 nifti 轴序的反序.
//!   中心线坐标和体素分辨率则沿用 nifti 的 `(x, y, z)` 顺序.
//!
//! # 开发计划
//!
//! ### nii 标签读写与方向处理 ✅
//!
//! 1. 从 sform / qform / pixdim 推断方向. ✅
//! 2. 纯函数式重定向, 同时更新 header 仿射矩阵. ✅
//!
//! 实现位于 `spine-levels/src/data`.
//!
//! ### 三维形态学膨胀 ✅
//!
//! 球形结构元素, 以体素为单位. 开启 `rayon` 时按切片并行.
//!
//! 实现位于 `spine-levels/src/data/morph_3d`.
//!
//! ### 中心线累积曲线距离 ✅
//!
//! 从参考点向下标 0 逐段累加按体素分辨率缩放的欧氏距离.
//! 最近邻查找在相同距离时取较小下标.
//!
//! 实现位于 `spine-levels/src/centerline`.
//!
//! ### 神经根与脊髓求交, 节段投影 ✅
//!
//! 实现位于 `spine-levels/src/levels.rs`.
//!
//! ### 测量表 ✅
//!
//! 缺失值以 `NaN` 输出, 不丢弃任何节段. 先写临时文件, 成功后再重命名.
//!
//! 实现位于 `spine-levels/src/table.rs`.
//!
//! ### 小功能 ✅
//!
//! 1. 由椎间盘标记确定椎骨节段. ✅
//! 2. 两个节段体数据之间的逐节段重叠率. ✅
//! 3. 神经根到 PMJ 及到同编号椎间盘的曲线距离. ✅

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 3D nii 文件基础数据结构.
pub mod data;

pub use data::{LabelVolume, NiftiHeaderAttr};

pub mod centerline;
pub mod consts;
pub mod discs;
pub mod error;
pub mod levels;
pub mod overlap;
pub mod pipeline;
pub mod prelude;
pub mod table;
