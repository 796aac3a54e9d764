//! 完整流程: 体数据 + 中心线 → 交集 → 节段投影 → 距离查找 → 测量表.

use std::borrow::Cow;
use std::path::Path;

use log::{info, warn};

use crate::centerline::{Centerline, SliceMatch};
use crate::consts::{label::is_foreground, DEFAULT_DILATION};
use crate::data::orientation::Orientation;
use crate::data::{LabelVolume, NiftiHeaderAttr};
use crate::discs::{disc_labels, rootlet_distances, vertebral_extents};
use crate::error::{LevelsError, Result};
use crate::levels::{intersect, project};
use crate::table::{build_records, LevelRecord, RootletDistance};

/// 流程配置.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LevelsConfig {
    /// 求交前脊髓分割的膨胀半径, 以体素为单位. 0 表示不膨胀.
    pub dilation: u32,
    /// 切片与中心线采样点的匹配方式.
    pub slice_match: SliceMatch,
    /// 输入不是 RPI 方向时, 是否允许自动重定向. 为 `false` 时直接报错.
    pub allow_reorient: bool,
}

impl Default for LevelsConfig {
    fn default() -> Self {
        Self {
            dilation: DEFAULT_DILATION,
            slice_match: SliceMatch::default(),
            allow_reorient: true,
        }
    }
}

/// 确保 `volume` 为 RPI 方向. 必要且允许时返回重定向后的副本.
pub fn conform<'a>(
    volume: &'a LabelVolume,
    name: &str,
    allow_reorient: bool,
) -> Result<Cow<'a, LabelVolume>> {
    let found = volume.orientation()?;
    if found == Orientation::RPI {
        return Ok(Cow::Borrowed(volume));
    }
    if !allow_reorient {
        return Err(LevelsError::OrientationAssumptionViolated {
            found: found.to_string(),
            expected: Orientation::RPI.to_string(),
        });
    }
    warn!("{name}: reorienting {found} -> {}", Orientation::RPI);
    Ok(Cow::Owned(volume.reoriented(Orientation::RPI)?))
}

/// PMJ 标记所在的轴向切片 (多个体素时取最大切片). 没有前景体素时返回 `None`.
pub fn landmark_slice(volume: &LabelVolume) -> Option<usize> {
    volume
        .data()
        .indexed_iter()
        .filter(|(_, &p)| is_foreground(p))
        .map(|((z, _, _), _)| z)
        .max()
}

/// 脊髓节段流程的输入.
#[derive(Clone, Debug)]
pub struct LevelsInputs {
    /// 多标签神经根分割.
    pub rootlets: LabelVolume,
    /// 二值脊髓分割.
    pub cord: LabelVolume,
    /// 脊髓中心线.
    pub centerline: Centerline,
    /// 可选的 PMJ 标记.
    pub pmj: Option<LabelVolume>,
    /// 写入测量表 `fname` 列的来源标识.
    pub source: String,
}

impl LevelsInputs {
    /// 从文件读取所有输入. 来源标识默认为神经根分割的文件名.
    pub fn open(
        rootlets: &Path,
        cord: &Path,
        centerline: &Path,
        pmj: Option<&Path>,
    ) -> Result<Self> {
        let source = rootlets
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            rootlets: LabelVolume::open(rootlets)?,
            cord: LabelVolume::open(cord)?,
            centerline: Centerline::open(centerline)?,
            pmj: pmj.map(LabelVolume::open).transpose()?,
            source,
        })
    }
}

/// 脊髓节段流程的输出.
#[derive(Clone, Debug)]
pub struct LevelsOutput {
    /// 神经根与 (膨胀后) 脊髓的交集, RPI 方向.
    pub intersection: LabelVolume,
    /// 按节段标记的脊髓, RPI 方向.
    pub spinal_levels: LabelVolume,
    /// 每个节段一条记录, 按节段升序.
    pub records: Vec<LevelRecord>,
    /// 中心线上的参考点下标.
    pub reference_index: usize,
}

impl LevelsOutput {
    /// 未在脊髓中找到的节段.
    pub fn missing(&self) -> Vec<u8> {
        self.records
            .iter()
            .filter(|r| r.is_missing())
            .map(|r| r.level)
            .collect()
    }
}

/// 执行完整的脊髓节段流程.
///
/// 1. 所有体数据重定向到 RPI (或在不允许时报错).
/// 2. 脊髓分割二值化并按 `config.dilation` 膨胀, 与神经根分割求交.
/// 3. 对神经根分割中出现的每个节段, 投影到 (未膨胀的) 脊髓.
/// 4. 计算中心线到参考点的曲线距离, 生成测量记录.
///
/// 体素分辨率取自 PMJ 标记 (若有), 否则取自神经根分割.
/// 参考点为最接近 PMJ 切片的采样点 (若有), 否则为 z 坐标最大的采样点.
pub fn run(inputs: &LevelsInputs, config: &LevelsConfig) -> Result<LevelsOutput> {
    let rootlets = conform(&inputs.rootlets, "rootlets", config.allow_reorient)?;
    let cord = conform(&inputs.cord, "cord", config.allow_reorient)?;
    let pmj = inputs
        .pmj
        .as_ref()
        .map(|v| conform(v, "pmj", config.allow_reorient))
        .transpose()?;
    rootlets.check_same_grid(&*cord)?;
    if let Some(p) = pmj.as_deref() {
        rootlets.check_same_grid(p)?;
    }
    if rootlets.is_background() {
        warn!("rootlets: no labelled voxel");
    }

    let cord = cord.binarized();
    let mask = cord.dilated(config.dilation);
    let intersection = intersect(rootlets.data(), mask.data())?;
    let levels = rootlets.levels();
    info!("{} level(s) in rootlets: {levels:?}", levels.len());

    let projection = project(intersection.view(), cord.data(), &levels)?;
    info!("{} level(s) projected onto the cord", projection.extents.len());

    let (spacing, pmj_slice) = match pmj.as_deref() {
        Some(p) => (
            p.spacing(),
            Some(landmark_slice(p).ok_or(LevelsError::EmptyLandmark)?),
        ),
        None => (rootlets.spacing(), None),
    };
    let reference_index = inputs.centerline.reference_index(pmj_slice);
    info!("reference index on centerline: {reference_index}, spacing {spacing:?}");
    let distances = inputs.centerline.distance_from(reference_index, spacing)?;

    let records = build_records(
        &levels,
        &projection.extents,
        &distances,
        config.slice_match,
        &inputs.source,
    );
    for r in records.iter().filter(|r| r.is_missing()) {
        warn!("level {}: rootlets do not intersect the cord", r.level);
    }
    for r in records.iter().filter(|r| !r.is_missing() && r.height.is_none()) {
        warn!("level {}: slice range not covered by the centerline", r.level);
    }

    Ok(LevelsOutput {
        intersection: rootlets.with_data(intersection)?,
        spinal_levels: cord.with_data(projection.volume)?,
        records,
        reference_index,
    })
}

/// 由椎间盘标记计算椎骨节段的测量记录.
///
/// 体素分辨率取自 `discs`, 参考点为 z 坐标最大的采样点.
pub fn run_discs(
    discs: &LabelVolume,
    centerline: &Centerline,
    source: &str,
    config: &LevelsConfig,
) -> Result<Vec<LevelRecord>> {
    let discs = conform(discs, "discs", config.allow_reorient)?;
    let found = disc_labels(discs.data());
    info!("{} disc(s) found", found.len());

    let extents = vertebral_extents(&found);
    let levels: Vec<u8> = extents.keys().copied().collect();
    let distances = centerline.distance_from(centerline.top_index(), discs.spacing())?;
    Ok(build_records(
        &levels,
        &extents,
        &distances,
        config.slice_match,
        source,
    ))
}

/// 测量每个神经根到 PMJ 及到同编号椎间盘的曲线距离.
///
/// 两个体数据必须位于相同的体素网格上. 体素分辨率取自 `discs`,
/// 参考点为 z 坐标最大的采样点.
pub fn run_rootlet_discs(
    rootlets: &LabelVolume,
    discs: &LabelVolume,
    centerline: &Centerline,
    subject: &str,
    config: &LevelsConfig,
) -> Result<Vec<RootletDistance>> {
    let rootlets = conform(rootlets, "rootlets", config.allow_reorient)?;
    let discs = conform(discs, "discs", config.allow_reorient)?;
    rootlets.check_same_grid(&*discs)?;

    let found = disc_labels(discs.data());
    info!("{} disc(s) found", found.len());
    let distances = centerline.distance_from(centerline.top_index(), discs.spacing())?;
    let records = rootlet_distances(
        rootlets.data(),
        &found,
        &distances,
        config.slice_match,
        subject,
    );
    for r in records.iter().filter(|r| r.disc.is_none()) {
        warn!("rootlet {}: no disc with the same label", r.rootlet);
    }
    Ok(records)
}
