//! 按节段的测量表.
//!
//! 每个节段对应一条不可变记录 [`LevelRecord`]. 记录一次性构造, 最后统一写入 csv.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Serialize, Serializer};

use crate::centerline::{DistanceTable, SliceMatch};
use crate::consts::{DISTANCE_HEADER, TABLE_HEADER};
use crate::error::{LevelsError, Result};
use crate::levels::SliceExtent;

/// 缺失值输出为 `NaN`.
fn nan_if_none<T, S>(v: &Option<T>, s: S) -> std::result::Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match v {
        Some(v) => v.serialize(s),
        None => s.serialize_f64(f64::NAN),
    }
}

/// 单个节段的测量结果. 字段顺序与输出表的列顺序一致.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LevelRecord {
    /// 节段编号.
    pub level: u8,
    /// 数据来源标识 (一般为输入文件名).
    pub source: String,
    /// 起始 (最小) 切片下标.
    #[serde(serialize_with = "nan_if_none")]
    pub slice_start: Option<usize>,
    /// 终止 (最大) 切片下标.
    #[serde(serialize_with = "nan_if_none")]
    pub slice_end: Option<usize>,
    /// 起始切片到 PMJ 的曲线距离, 单位为毫米.
    #[serde(serialize_with = "nan_if_none")]
    pub distance_start: Option<f64>,
    /// 终止切片到 PMJ 的曲线距离, 单位为毫米.
    #[serde(serialize_with = "nan_if_none")]
    pub distance_end: Option<f64>,
    /// 节段高度 `distance_start - distance_end`, 单位为毫米.
    #[serde(serialize_with = "nan_if_none")]
    pub height: Option<f64>,
}

impl LevelRecord {
    /// 构造一条记录. 两端距离都存在时计算高度.
    pub fn new(
        level: u8,
        source: &str,
        extent: Option<SliceExtent>,
        distance_start: Option<f64>,
        distance_end: Option<f64>,
    ) -> Self {
        let height = distance_start.zip(distance_end).map(|(s, e)| s - e);
        Self {
            level,
            source: source.to_owned(),
            slice_start: extent.map(|e| e.start),
            slice_end: extent.map(|e| e.end),
            distance_start,
            distance_end,
            height,
        }
    }

    /// 该节段是否未在脊髓中找到?
    #[inline]
    pub fn is_missing(&self) -> bool {
        self.slice_start.is_none() || self.slice_end.is_none()
    }

    /// 是否有任意一个字段缺失?
    #[inline]
    pub fn is_incomplete(&self) -> bool {
        self.is_missing() || self.height.is_none()
    }
}

/// 单个神经根到 PMJ 及同编号椎间盘的距离. 字段顺序与 [`DISTANCE_HEADER`] 一致.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RootletDistance {
    /// 受试者标识.
    pub subject: String,
    /// 神经根编号.
    pub rootlet: u8,
    /// 同编号的椎间盘. 不存在时为 `None`.
    #[serde(serialize_with = "nan_if_none")]
    pub disc: Option<u8>,
    /// 神经根所在切片到 PMJ 的曲线距离, 单位为毫米.
    #[serde(serialize_with = "nan_if_none")]
    pub distance_pmj: Option<f64>,
    /// `d(椎间盘) - d(神经根)`, 单位为毫米. 神经根位于椎间盘头侧时为正.
    #[serde(serialize_with = "nan_if_none")]
    pub distance_disc: Option<f64>,
}

/// 为 `levels` 中的每个节段构造一条记录, 顺序与 `levels` 一致.
///
/// `extents` 中没有的节段, 以及切片在 `distances` 中找不到匹配的端点,
/// 其对应字段为缺失值. 该函数不会丢弃任何节段.
pub fn build_records(
    levels: &[u8],
    extents: &BTreeMap<u8, SliceExtent>,
    distances: &DistanceTable,
    mode: SliceMatch,
    source: &str,
) -> Vec<LevelRecord> {
    levels
        .iter()
        .map(|&level| {
            let extent = extents.get(&level).copied();
            let (ds, de) = match extent {
                Some(e) => (distances.lookup(e.start, mode), distances.lookup(e.end, mode)),
                None => (None, None),
            };
            let r = LevelRecord::new(level, source, extent, ds, de);
            debug!("{r:?}");
            r
        })
        .collect()
}

/// `<path>.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(".tmp");
    PathBuf::from(s)
}

/// 以 `header` 为表头, 将记录以 csv 格式写入 `writer`.
pub fn write_records<R, W>(header: &[&str], records: &[R], writer: W) -> Result<()>
where
    R: Serialize,
    W: io::Write,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(header)?;
    for r in records {
        writer.serialize(r)?;
    }
    writer.flush()?;
    Ok(())
}

/// 将记录写入 `path` 处的 csv 文件.
///
/// 先写入 `<path>.tmp`, 成功后再重命名为 `path`. 失败时不会留下不完整的 `path`.
pub fn write_table<R, P>(header: &[&str], records: &[R], path: P) -> Result<()>
where
    R: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let tmp = temp_path(path);

    let written = File::create(&tmp)
        .map_err(LevelsError::from)
        .and_then(|f| write_records(header, records, f));
    if let Err(e) = written {
        fs::remove_file(&tmp).ok();
        return Err(e);
    }

    fs::rename(&tmp, path)?;
    info!("{} record(s) written to `{}`", records.len(), path.display());
    Ok(())
}

/// 将节段记录写入 `path` 处的 csv 文件, 表头见 [`TABLE_HEADER`]. 详见 [`write_table`].
#[inline]
pub fn write_csv<P: AsRef<Path>>(records: &[LevelRecord], path: P) -> Result<()> {
    write_table(&TABLE_HEADER, records, path)
}

/// 将神经根距离记录写入 `path` 处的 csv 文件, 表头见 [`DISTANCE_HEADER`].
#[inline]
pub fn write_distances<P: AsRef<Path>>(records: &[RootletDistance], path: P) -> Result<()> {
    write_table(&DISTANCE_HEADER, records, path)
}
