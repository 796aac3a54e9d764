//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::data::orientation::{reorient, AxisCode, Orientation};
pub use crate::data::{LabelVolume, NiftiHeaderAttr};

pub use crate::centerline::{pmj_distance, Centerline, DistanceTable, SliceMatch};
pub use crate::levels::{intersect, project, Projection, SliceExtent};
pub use crate::table::{build_records, write_csv, write_distances, LevelRecord, RootletDistance};

pub use crate::discs::{rootlet_distances, Disc};
pub use crate::pipeline::{LevelsConfig, LevelsInputs, LevelsOutput};

pub use crate::consts::label::{BACKGROUND, CORD};
pub use crate::error::{LevelsError, Result};
